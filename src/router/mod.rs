//! Message routing and interception.
//!
//! Messages are matched against ordered tables of rules:
//! - Interception tables pick a script to transform or reject a message
//! - Routing tables pick the connector that carries it, and the bill
//!
//! Rules combine filters on:
//! - Origin connector (MO) or sender user/group (MT)
//! - Source/destination address and content patterns
//! - Reception date and time of day
//! - Tags set by interceptor scripts
//! - Custom Lua expressions

mod connector;
mod filter;
mod interceptor;
mod matcher;
mod routable;
mod route;
#[allow(clippy::module_inception)]
mod router;
mod table;
mod user;

pub use connector::{Connector, ConnectorKind, Direction};
pub use filter::{Filter, FilterError};
pub use interceptor::{Interceptor, InterceptorError};
pub use matcher::FieldPattern;
pub use routable::{is_pdu_field, Command, Param, Pdu, Routable, RoutableError, Tag, PDU_FIELDS};
pub use route::{Route, RouteDecision, RouteError, RoutePolicy};
pub use router::{Dispatch, Router, RouterError};
pub use table::{EntryKind, InterceptionTable, RoutingTable, RuleTable, TableEntry, TableError};
pub use user::{MtQuotas, User};
