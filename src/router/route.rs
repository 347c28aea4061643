//! Routes: filters plus a connector selection policy.

use std::fmt;
use std::sync::Arc;

use rand::seq::SliceRandom;

use super::connector::{Connector, Direction};
use super::filter::{Filter, FilterError};
use super::routable::Routable;
use super::table::{EntryKind, TableEntry, TableError};
use super::user::User;
use crate::billing::Bill;

/// Route construction errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RouteError {
    #[error("invalid route parameter: {0}")]
    InvalidParameter(String),

    #[error("{filter} can not be used in {kind} routes")]
    InvalidFilterType { filter: String, kind: EntryKind },
}

/// How a matched route picks its connector.
#[derive(Debug, Clone, PartialEq)]
pub enum RoutePolicy {
    Default(Connector),
    Static(Connector),
    /// Uniformly random pick on every call
    RandomRoundrobin(Vec<Connector>),
    /// Connectors tried in order, one per call
    Failover(Vec<Connector>),
}

/// A routing rule.
#[derive(Debug, Clone)]
pub struct Route {
    kind: EntryKind,
    policy: RoutePolicy,
    filters: Vec<Filter>,
    rate: f64,
}

impl Route {
    /// Catch-all route. Its kind is `default` and filters do not apply.
    pub fn default_route(connector: Connector, rate: f64) -> Result<Self, RouteError> {
        Self::build(EntryKind::Default, RoutePolicy::Default(connector), Vec::new(), rate)
    }

    pub fn static_mo(filters: Vec<Filter>, connector: Connector) -> Result<Self, RouteError> {
        Self::build(EntryKind::Mo, RoutePolicy::Static(connector), filters, 0.0)
    }

    pub fn static_mt(
        filters: Vec<Filter>,
        connector: Connector,
        rate: f64,
    ) -> Result<Self, RouteError> {
        Self::build(EntryKind::Mt, RoutePolicy::Static(connector), filters, rate)
    }

    pub fn random_roundrobin_mo(
        filters: Vec<Filter>,
        connectors: Vec<Connector>,
    ) -> Result<Self, RouteError> {
        Self::build(EntryKind::Mo, RoutePolicy::RandomRoundrobin(connectors), filters, 0.0)
    }

    pub fn random_roundrobin_mt(
        filters: Vec<Filter>,
        connectors: Vec<Connector>,
        rate: f64,
    ) -> Result<Self, RouteError> {
        Self::build(EntryKind::Mt, RoutePolicy::RandomRoundrobin(connectors), filters, rate)
    }

    /// MO failover route; connectors must all be of the same kind.
    pub fn failover_mo(
        filters: Vec<Filter>,
        connectors: Vec<Connector>,
    ) -> Result<Self, RouteError> {
        if let Some(first) = connectors.first() {
            if connectors.iter().any(|c| c.kind() != first.kind()) {
                return Err(RouteError::InvalidParameter(
                    "failover MO route connectors must be of the same kind".to_string(),
                ));
            }
        }
        Self::build(EntryKind::Mo, RoutePolicy::Failover(connectors), filters, 0.0)
    }

    pub fn failover_mt(
        filters: Vec<Filter>,
        connectors: Vec<Connector>,
        rate: f64,
    ) -> Result<Self, RouteError> {
        Self::build(EntryKind::Mt, RoutePolicy::Failover(connectors), filters, rate)
    }

    fn build(
        kind: EntryKind,
        policy: RoutePolicy,
        filters: Vec<Filter>,
        rate: f64,
    ) -> Result<Self, RouteError> {
        if !rate.is_finite() || rate < 0.0 {
            return Err(RouteError::InvalidParameter(format!(
                "rate must be a non-negative number, got {}",
                rate
            )));
        }

        if let RoutePolicy::RandomRoundrobin(cs) | RoutePolicy::Failover(cs) = &policy {
            if cs.is_empty() {
                return Err(RouteError::InvalidParameter(
                    "route needs at least one connector".to_string(),
                ));
            }
        }

        if let Some(direction) = kind.direction() {
            if let Some(filter) = filters.iter().find(|f| !f.used_for().contains(&direction)) {
                return Err(RouteError::InvalidFilterType {
                    filter: filter.type_name().to_string(),
                    kind,
                });
            }
        }

        // MO traffic is never rated
        let rate = if kind == EntryKind::Mo { 0.0 } else { rate };

        Ok(Self {
            kind,
            policy,
            filters,
            rate,
        })
    }

    pub fn kind(&self) -> EntryKind {
        self.kind
    }

    pub fn policy(&self) -> &RoutePolicy {
        &self.policy
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Every connector this route may select.
    pub fn connectors(&self) -> &[Connector] {
        match &self.policy {
            RoutePolicy::Default(c) | RoutePolicy::Static(c) => std::slice::from_ref(c),
            RoutePolicy::RandomRoundrobin(cs) | RoutePolicy::Failover(cs) => cs,
        }
    }

    /// Route type name, as shown in listings.
    pub fn type_name(&self) -> &'static str {
        match (&self.policy, self.kind) {
            (RoutePolicy::Default(_), _) => "DefaultRoute",
            (RoutePolicy::Static(_), EntryKind::Mo) => "StaticMORoute",
            (RoutePolicy::Static(_), _) => "StaticMTRoute",
            (RoutePolicy::RandomRoundrobin(_), EntryKind::Mo) => "RandomRoundrobinMORoute",
            (RoutePolicy::RandomRoundrobin(_), _) => "RandomRoundrobinMTRoute",
            (RoutePolicy::Failover(_), EntryKind::Mo) => "FailoverMORoute",
            (RoutePolicy::Failover(_), _) => "FailoverMTRoute",
        }
    }

    /// Check the route filters; all must match.
    ///
    /// The default route matches everything. Evaluation stops at the first
    /// filter that does not match.
    pub fn matches(&self, routable: &Routable) -> Result<bool, FilterError> {
        if self.kind == EntryKind::Default {
            return Ok(true);
        }
        for filter in &self.filters {
            if !filter.matches(routable)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Bill for `user` sending through this route.
    pub fn get_bill_for(&self, user: &User) -> Bill {
        if self.kind == EntryKind::Mo {
            return Bill::new();
        }
        Bill::for_rate(self.rate, user.quotas())
    }
}

impl TableEntry for Route {
    fn kind(&self) -> EntryKind {
        self.kind
    }

    fn check_direction(&self, direction: Direction) -> Result<(), TableError> {
        match self.connectors().iter().find(|c| !direction.accepts(c.kind())) {
            Some(c) => Err(TableError::InvalidParameter(format!(
                "{} connector {} can not be used in {} routing tables",
                c.kind(),
                c.id(),
                direction
            ))),
            None => Ok(()),
        }
    }

    fn matches(&self, routable: &Routable) -> Result<bool, FilterError> {
        Route::matches(self, routable)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let connectors: Vec<String> = self.connectors().iter().map(ToString::to_string).collect();
        write!(f, "{} to {}", self.type_name(), connectors.join(", "))?;
        if self.kind != EntryKind::Mo {
            if self.rate > 0.0 {
                write!(f, " rated {:.2}", self.rate)?;
            } else {
                write!(f, " NOT RATED")?;
            }
        }
        if !self.filters.is_empty() {
            let filters: Vec<String> = self.filters.iter().map(ToString::to_string).collect();
            write!(f, " [{}]", filters.join(", "))?;
        }
        Ok(())
    }
}

/// A matched route, ready to hand out connectors.
///
/// Failover progress is tracked here, so concurrent matches of the same
/// route do not interfere.
#[derive(Debug, Clone)]
pub struct RouteDecision {
    order: u32,
    route: Arc<Route>,
    cursor: usize,
}

impl RouteDecision {
    pub fn new(order: u32, route: Arc<Route>) -> Self {
        Self {
            order,
            route,
            cursor: 0,
        }
    }

    pub fn order(&self) -> u32 {
        self.order
    }

    pub fn route(&self) -> &Arc<Route> {
        &self.route
    }

    /// Next connector to try.
    ///
    /// Failover routes yield each connector once, in order, then `None`.
    /// Other policies always yield a connector.
    pub fn get_connector(&mut self) -> Option<&Connector> {
        match &self.route.policy {
            RoutePolicy::Default(c) | RoutePolicy::Static(c) => Some(c),
            RoutePolicy::RandomRoundrobin(cs) => cs.choose(&mut rand::thread_rng()),
            RoutePolicy::Failover(cs) => {
                let connector = cs.get(self.cursor);
                if connector.is_some() {
                    self.cursor += 1;
                }
                connector
            }
        }
    }

    /// Bill for `user`.
    pub fn get_bill_for(&self, user: &User) -> Bill {
        self.route.get_bill_for(user)
    }
}
