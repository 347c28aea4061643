//! Message dispatcher over the routing and interception tables.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info, warn};

use super::connector::Direction;
use super::filter::FilterError;
use super::interceptor::Interceptor;
use super::routable::Routable;
use super::route::{Route, RouteDecision};
use super::table::{InterceptionTable, RoutingTable, TableError};
use crate::billing::Bill;
use crate::script::{InterceptorRunner, ScriptError, ScriptOutcome};

/// Router errors.
#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    #[error("filter evaluation failed: {0}")]
    Filter(#[from] FilterError),

    #[error("interception failed: {0}")]
    Interception(#[from] ScriptError),
}

/// Outcome of dispatching a message.
#[derive(Debug)]
pub enum Dispatch {
    /// A route matched
    Routed {
        routable: Routable,
        decision: RouteDecision,
        /// Bill for the sender, MT messages only
        bill: Option<Bill>,
    },
    /// An interceptor script rejected the message
    Intercepted {
        smpp_status: u32,
        http_status: u16,
        extra: serde_json::Value,
    },
    /// No route matched
    NoRoute { routable: Routable },
}

/// Routing and interception tables for both directions.
///
/// Tables can be changed while messages are dispatched; each lookup sees
/// a consistent table.
pub struct Router {
    mt_routes: RwLock<RoutingTable>,
    mo_routes: RwLock<RoutingTable>,
    mt_interceptors: RwLock<InterceptionTable>,
    mo_interceptors: RwLock<InterceptionTable>,
    runner: Arc<dyn InterceptorRunner>,
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("mt_routes", &read(&self.mt_routes).len())
            .field("mo_routes", &read(&self.mo_routes).len())
            .field("mt_interceptors", &read(&self.mt_interceptors).len())
            .field("mo_interceptors", &read(&self.mo_interceptors).len())
            .finish()
    }
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

impl Router {
    /// Create a router with empty tables.
    pub fn new(runner: Arc<dyn InterceptorRunner>) -> Self {
        Self {
            mt_routes: RwLock::new(RoutingTable::mt()),
            mo_routes: RwLock::new(RoutingTable::mo()),
            mt_interceptors: RwLock::new(InterceptionTable::mt()),
            mo_interceptors: RwLock::new(InterceptionTable::mo()),
            runner,
        }
    }

    fn routes_lock(&self, direction: Direction) -> &RwLock<RoutingTable> {
        match direction {
            Direction::Mo => &self.mo_routes,
            Direction::Mt => &self.mt_routes,
        }
    }

    fn interceptors_lock(&self, direction: Direction) -> &RwLock<InterceptionTable> {
        match direction {
            Direction::Mo => &self.mo_interceptors,
            Direction::Mt => &self.mt_interceptors,
        }
    }

    // Routes

    pub fn add_route(
        &self,
        direction: Direction,
        route: impl Into<Arc<Route>>,
        order: u32,
    ) -> Result<(), TableError> {
        write(self.routes_lock(direction)).add(route, order)
    }

    pub fn remove_route(&self, direction: Direction, order: u32) -> bool {
        write(self.routes_lock(direction)).remove(order)
    }

    pub fn flush_routes(&self, direction: Direction) {
        write(self.routes_lock(direction)).flush();
    }

    /// Snapshot of a routing table, highest order first.
    pub fn routes(&self, direction: Direction) -> Vec<(u32, Arc<Route>)> {
        read(self.routes_lock(direction)).get_all().to_vec()
    }

    pub fn route_for(
        &self,
        direction: Direction,
        routable: &Routable,
    ) -> Result<Option<RouteDecision>, FilterError> {
        read(self.routes_lock(direction)).get_route_for(routable)
    }

    // Interceptors

    pub fn add_interceptor(
        &self,
        direction: Direction,
        interceptor: impl Into<Arc<Interceptor>>,
        order: u32,
    ) -> Result<(), TableError> {
        write(self.interceptors_lock(direction)).add(interceptor, order)
    }

    pub fn remove_interceptor(&self, direction: Direction, order: u32) -> bool {
        write(self.interceptors_lock(direction)).remove(order)
    }

    pub fn flush_interceptors(&self, direction: Direction) {
        write(self.interceptors_lock(direction)).flush();
    }

    /// Snapshot of an interception table, highest order first.
    pub fn interceptors(&self, direction: Direction) -> Vec<(u32, Arc<Interceptor>)> {
        read(self.interceptors_lock(direction)).get_all().to_vec()
    }

    pub fn interceptor_for(
        &self,
        direction: Direction,
        routable: &Routable,
    ) -> Result<Option<Arc<Interceptor>>, FilterError> {
        read(self.interceptors_lock(direction)).get_interceptor_for(routable)
    }

    /// Intercept, then route a message.
    pub async fn dispatch(
        &self,
        direction: Direction,
        mut routable: Routable,
    ) -> Result<Dispatch, RouterError> {
        // Guards are released before the script runs
        let interceptor = self.interceptor_for(direction, &routable)?;

        if let Some(interceptor) = interceptor {
            debug!(%direction, interceptor = %interceptor, "message intercepted");
            match self.runner.run(interceptor.script(), routable).await? {
                ScriptOutcome::Routable(r) => routable = r,
                ScriptOutcome::Rejected {
                    smpp_status,
                    http_status,
                    extra,
                } => {
                    info!(%direction, smpp_status, http_status, "message rejected by interceptor");
                    return Ok(Dispatch::Intercepted {
                        smpp_status,
                        http_status,
                        extra,
                    });
                }
            }
        }

        let Some(decision) = self.route_for(direction, &routable)? else {
            warn!(%direction, "no route matched");
            return Ok(Dispatch::NoRoute { routable });
        };

        let bill = match (direction, routable.user()) {
            (Direction::Mt, Some(user)) => Some(decision.get_bill_for(user)),
            _ => None,
        };

        debug!(
            %direction,
            order = decision.order(),
            route = %decision.route(),
            "message routed"
        );

        Ok(Dispatch::Routed {
            routable,
            decision,
            bill,
        })
    }
}
