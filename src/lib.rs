//! smsrouter - routing, interception and billing engine for an SMS gateway.
//!
//! Messages entering the gateway are wrapped in a [`router::Routable`],
//! optionally rewritten or rejected by an interceptor script, then matched
//! against an ordered routing table that picks the outgoing connector and
//! the bill charged to the sending user.

pub mod billing;
pub mod config;
pub mod router;
pub mod script;
pub mod telemetry;
