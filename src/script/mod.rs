//! Embedded scripting for filters and interceptors.
//!
//! Two kinds of scripts run against a [`Routable`]:
//!
//! - **Filter scripts** (`EvalScript` filters) see a read-only `routable`
//!   and set the global `result` to a boolean.
//! - **Interceptor scripts** may modify `routable`, or reject the message
//!   by setting `smpp_status` and/or `http_status` (plus optional `extra`
//!   data for the caller).
//!
//! # Example
//!
//! ```yaml
//! scripts:
//!   memory_mb: 16
//!   timeout: 500ms
//!   slow_threshold: 100ms
//! ```

pub mod lua;

pub use lua::LuaScriptEngine;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::router::Routable;

/// SMPP status used when a script rejects without setting one (ESME_RUNKNOWNERR).
pub const DEFAULT_SMPP_STATUS: u32 = 255;

/// HTTP status used when a script rejects without setting one.
pub const DEFAULT_HTTP_STATUS: u16 = 520;

/// Script error types.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ScriptError {
    #[error("script compilation failed: {0}")]
    Compile(String),

    #[error("script execution failed: {0}")]
    Runtime(String),

    #[error("script timed out after {0:?}")]
    Timeout(Duration),

    #[error("script memory limit exceeded")]
    MemoryLimitExceeded,

    #[error("script returned invalid {name}: {reason}")]
    InvalidResult { name: String, reason: String },

    #[error("script engine unavailable: {0}")]
    Unavailable(String),
}

/// Direction a script was written for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptKind {
    Mo,
    Mt,
}

impl fmt::Display for ScriptKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptKind::Mo => f.write_str("mo"),
            ScriptKind::Mt => f.write_str("mt"),
        }
    }
}

/// An interceptor script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    kind: ScriptKind,
    source: Arc<str>,
}

impl Script {
    /// MO interceptor script.
    pub fn mo(source: impl Into<Arc<str>>) -> Self {
        Self {
            kind: ScriptKind::Mo,
            source: source.into(),
        }
    }

    /// MT interceptor script.
    pub fn mt(source: impl Into<Arc<str>>) -> Self {
        Self {
            kind: ScriptKind::Mt,
            source: source.into(),
        }
    }

    pub fn kind(&self) -> ScriptKind {
        self.kind
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

impl fmt::Display for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // First line is enough to recognize a script in listings
        let first = self.source.lines().next().unwrap_or_default();
        if first.len() < self.source.trim_end().len() {
            write!(f, "{}Script({} ...)", self.kind.to_string().to_uppercase(), first)
        } else {
            write!(f, "{}Script({})", self.kind.to_string().to_uppercase(), first)
        }
    }
}

/// A status global as a script left it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusValue {
    Unset,
    Integer(i64),
    /// Set to something that is not an integer
    Invalid,
}

impl StatusValue {
    fn is_unset(&self) -> bool {
        matches!(self, StatusValue::Unset)
    }

    fn integer(&self) -> Option<i64> {
        match self {
            StatusValue::Integer(v) => Some(*v),
            _ => None,
        }
    }
}

/// Result of running an interceptor script.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptOutcome {
    /// Continue with this (possibly modified) routable
    Routable(Routable),
    /// Reject the message with both statuses set
    Rejected {
        smpp_status: u32,
        http_status: u16,
        extra: serde_json::Value,
    },
}

impl ScriptOutcome {
    /// Build a rejection from whatever statuses the script set.
    ///
    /// Returns `None` when neither status was set. Otherwise the missing
    /// or unusable one gets its default so both channels report an error.
    pub fn from_statuses(
        smpp_status: StatusValue,
        http_status: StatusValue,
        extra: serde_json::Value,
    ) -> Option<Self> {
        if smpp_status.is_unset() && http_status.is_unset() {
            return None;
        }

        let smpp_status = smpp_status
            .integer()
            .and_then(|s| u32::try_from(s).ok())
            .unwrap_or(DEFAULT_SMPP_STATUS);
        let http_status = http_status
            .integer()
            .and_then(|s| u16::try_from(s).ok())
            .unwrap_or(DEFAULT_HTTP_STATUS);

        Some(ScriptOutcome::Rejected {
            smpp_status,
            http_status,
            extra,
        })
    }
}

/// Resource limits applied to every script execution.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ScriptLimits {
    /// Maximum interpreter memory in MB
    #[serde(default = "default_memory_mb")]
    pub memory_mb: usize,

    /// Maximum execution time per call
    #[serde(default = "default_timeout", with = "crate::config::humantime_serde")]
    pub timeout: Duration,

    /// Executions taking at least this long are logged
    #[serde(default, with = "crate::config::humantime_serde::option")]
    pub slow_threshold: Option<Duration>,
}

impl Default for ScriptLimits {
    fn default() -> Self {
        Self {
            memory_mb: default_memory_mb(),
            timeout: default_timeout(),
            slow_threshold: None,
        }
    }
}

fn default_memory_mb() -> usize {
    32
}

fn default_timeout() -> Duration {
    Duration::from_secs(1)
}

/// Synchronous script evaluation.
///
/// Implementations cache compiled code per distinct source, so compiling
/// the same filter twice is cheap.
pub trait ScriptEngine: Send + Sync {
    /// Compile (and cache) a filter script, reporting syntax errors.
    fn compile(&self, source: &str) -> Result<(), ScriptError>;

    /// Evaluate a filter script; non-boolean `result` values count as false.
    fn eval_filter(&self, source: &str, routable: &Routable) -> Result<bool, ScriptError>;

    /// Run an interceptor script to completion.
    fn run_interceptor(&self, script: &Script, routable: Routable)
        -> Result<ScriptOutcome, ScriptError>;
}

/// Asynchronous interceptor execution, as used by the dispatcher.
#[async_trait]
pub trait InterceptorRunner: Send + Sync {
    async fn run(&self, script: &Script, routable: Routable) -> Result<ScriptOutcome, ScriptError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_outcome_without_statuses() {
        assert_eq!(
            ScriptOutcome::from_statuses(StatusValue::Unset, StatusValue::Unset, json!({})),
            None
        );
    }

    #[test]
    fn test_outcome_http_only() {
        let outcome =
            ScriptOutcome::from_statuses(StatusValue::Unset, StatusValue::Integer(404), json!({}))
                .unwrap();
        assert_eq!(
            outcome,
            ScriptOutcome::Rejected {
                smpp_status: 255,
                http_status: 404,
                extra: json!({}),
            }
        );
    }

    #[test]
    fn test_outcome_smpp_only() {
        let outcome = ScriptOutcome::from_statuses(
            StatusValue::Integer(64),
            StatusValue::Unset,
            json!({"k": 1}),
        )
        .unwrap();
        assert_eq!(
            outcome,
            ScriptOutcome::Rejected {
                smpp_status: 64,
                http_status: 520,
                extra: json!({"k": 1}),
            }
        );
    }

    #[test]
    fn test_outcome_out_of_range_status() {
        let outcome = ScriptOutcome::from_statuses(
            StatusValue::Integer(-1),
            StatusValue::Integer(70000),
            json!(null),
        )
        .unwrap();
        assert!(matches!(
            outcome,
            ScriptOutcome::Rejected {
                smpp_status: 255,
                http_status: 520,
                ..
            }
        ));
    }

    #[test]
    fn test_outcome_non_integer_status() {
        let outcome = ScriptOutcome::from_statuses(
            StatusValue::Invalid,
            StatusValue::Integer(403),
            json!(null),
        )
        .unwrap();
        assert!(matches!(
            outcome,
            ScriptOutcome::Rejected {
                smpp_status: 255,
                http_status: 403,
                ..
            }
        ));
    }

    #[test]
    fn test_script_display() {
        assert_eq!(Script::mt("smpp_status = 64").to_string(), "MTScript(smpp_status = 64)");
        assert_eq!(
            Script::mo("a = 1\nb = 2").to_string(),
            "MOScript(a = 1 ...)"
        );
    }

    #[test]
    fn test_limits_from_yaml() {
        let limits: ScriptLimits =
            serde_yaml::from_str("timeout: 250ms\nslow_threshold: 50ms").unwrap();
        assert_eq!(limits.memory_mb, 32);
        assert_eq!(limits.timeout, Duration::from_millis(250));
        assert_eq!(limits.slow_threshold, Some(Duration::from_millis(50)));

        let limits: ScriptLimits = serde_yaml::from_str("{}").unwrap();
        assert_eq!(limits, ScriptLimits::default());
    }
}
