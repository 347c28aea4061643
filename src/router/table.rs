//! Ordered rule tables.
//!
//! Routing and interception tables share one implementation: entries keyed
//! by order, visited from the highest order down, first match wins. Order
//! `0` is reserved for the default entry.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::connector::Direction;
use super::filter::FilterError;
use super::interceptor::Interceptor;
use super::routable::Routable;
use super::route::{Route, RouteDecision};

/// Table errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TableError {
    #[error("invalid table parameter: {0}")]
    InvalidParameter(String),
}

/// Kind of a table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Default,
    Mo,
    Mt,
}

impl EntryKind {
    /// Direction of non-default kinds.
    pub fn direction(&self) -> Option<Direction> {
        match self {
            EntryKind::Default => None,
            EntryKind::Mo => Some(Direction::Mo),
            EntryKind::Mt => Some(Direction::Mt),
        }
    }
}

impl From<Direction> for EntryKind {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Mo => EntryKind::Mo,
            Direction::Mt => EntryKind::Mt,
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryKind::Default => f.write_str("default"),
            EntryKind::Mo => f.write_str("mo"),
            EntryKind::Mt => f.write_str("mt"),
        }
    }
}

/// Something a [`RuleTable`] can hold.
pub trait TableEntry {
    fn kind(&self) -> EntryKind;

    /// Check that the entry's connectors or script suit a table direction.
    fn check_direction(&self, direction: Direction) -> Result<(), TableError>;

    fn matches(&self, routable: &Routable) -> Result<bool, FilterError>;
}

/// Ordered table of routing or interception entries.
#[derive(Debug, Clone)]
pub struct RuleTable<E> {
    direction: Direction,
    /// Sorted by descending order, unique orders
    entries: Vec<(u32, Arc<E>)>,
}

/// Table of routes.
pub type RoutingTable = RuleTable<Route>;

/// Table of interceptors.
pub type InterceptionTable = RuleTable<Interceptor>;

impl<E: TableEntry + fmt::Display> RuleTable<E> {
    pub fn new(direction: Direction) -> Self {
        Self {
            direction,
            entries: Vec::new(),
        }
    }

    pub fn mo() -> Self {
        Self::new(Direction::Mo)
    }

    pub fn mt() -> Self {
        Self::new(Direction::Mt)
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Add an entry, replacing any entry already at `order`.
    ///
    /// Order 0 takes a default entry only; other orders take entries of the
    /// table's own kind. The table is unchanged on error.
    pub fn add(&mut self, entry: impl Into<Arc<E>>, order: u32) -> Result<(), TableError> {
        let entry = entry.into();
        entry.check_direction(self.direction)?;

        let kind = entry.kind();
        let expected = if order == 0 {
            EntryKind::Default
        } else {
            EntryKind::from(self.direction)
        };
        if kind != expected {
            return Err(TableError::InvalidParameter(format!(
                "order {} takes a {} entry, got {}",
                order, expected, kind
            )));
        }

        match self.entries.binary_search_by(|(o, _)| order.cmp(o)) {
            Ok(idx) => {
                debug!(direction = %self.direction, order, entry = %entry, "replacing table entry");
                self.entries[idx].1 = entry;
            }
            Err(idx) => {
                debug!(direction = %self.direction, order, entry = %entry, "adding table entry");
                self.entries.insert(idx, (order, entry));
            }
        }
        Ok(())
    }

    /// Remove the entry at `order`. Returns whether one was there.
    pub fn remove(&mut self, order: u32) -> bool {
        match self.entries.binary_search_by(|(o, _)| order.cmp(o)) {
            Ok(idx) => {
                self.entries.remove(idx);
                debug!(direction = %self.direction, order, "removed table entry");
                true
            }
            Err(_) => false,
        }
    }

    /// Entries, highest order first.
    pub fn get_all(&self) -> &[(u32, Arc<E>)] {
        &self.entries
    }

    pub fn get(&self, order: u32) -> Option<&Arc<E>> {
        self.entries
            .binary_search_by(|(o, _)| order.cmp(o))
            .ok()
            .map(|idx| &self.entries[idx].1)
    }

    pub fn flush(&mut self) {
        debug!(direction = %self.direction, count = self.entries.len(), "flushing table");
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First entry matching `routable`, from the highest order down.
    pub fn get_match_for(
        &self,
        routable: &Routable,
    ) -> Result<Option<(u32, &Arc<E>)>, FilterError> {
        for (order, entry) in &self.entries {
            if entry.matches(routable)? {
                trace!(direction = %self.direction, order, entry = %entry, "table entry matched");
                return Ok(Some((*order, entry)));
            }
        }
        trace!(direction = %self.direction, "no table entry matched");
        Ok(None)
    }
}

impl RoutingTable {
    /// Match a routable to a route decision.
    pub fn get_route_for(&self, routable: &Routable) -> Result<Option<RouteDecision>, FilterError> {
        Ok(self
            .get_match_for(routable)?
            .map(|(order, route)| RouteDecision::new(order, Arc::clone(route))))
    }
}

impl InterceptionTable {
    /// Match a routable to an interceptor.
    pub fn get_interceptor_for(
        &self,
        routable: &Routable,
    ) -> Result<Option<Arc<Interceptor>>, FilterError> {
        Ok(self.get_match_for(routable)?.map(|(_, i)| Arc::clone(i)))
    }
}

impl<E: fmt::Display> fmt::Display for RuleTable<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (order, entry) in &self.entries {
            writeln!(f, "#{} {}", order, entry)?;
        }
        Ok(())
    }
}
