//! Configuration loading and router construction.
//!
//! A single YAML file declares the connectors, users and groups known to
//! the gateway, and the routing and interception tables for both
//! directions. Declarations are checked for consistency when loaded; table
//! rules are enforced when [`Config::build_router`] populates a router.

mod build;
pub mod loader;
mod types;

pub(crate) use types::humantime_serde;
pub use types::{
    Config, ConnectorConfig, FilterSpec, InterceptorEntryConfig, InterceptorSpec,
    RouteEntryConfig, RouteSpec, ScriptSource,
};
