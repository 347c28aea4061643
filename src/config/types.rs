use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;
use std::path::PathBuf;

use crate::router::{ConnectorKind, Tag, User};
use crate::script::ScriptLimits;
use crate::telemetry::TracingConfig;

/// Root configuration for smsrouter
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Logging settings
    #[serde(default)]
    pub telemetry: TracingConfig,

    /// Limits for filter and interceptor scripts
    #[serde(default)]
    pub scripts: ScriptLimits,

    /// Known connectors
    #[serde(default)]
    pub connectors: Vec<ConnectorConfig>,

    /// Known user groups
    #[serde(default)]
    pub groups: Vec<String>,

    /// Known users, with their MT quotas
    #[serde(default)]
    pub users: Vec<User>,

    /// MT routing table
    #[serde(default)]
    pub mt_routes: Vec<RouteEntryConfig>,

    /// MO routing table
    #[serde(default)]
    pub mo_routes: Vec<RouteEntryConfig>,

    /// MT interception table
    #[serde(default)]
    pub mt_interceptors: Vec<InterceptorEntryConfig>,

    /// MO interception table
    #[serde(default)]
    pub mo_interceptors: Vec<InterceptorEntryConfig>,
}

/// Connector declaration
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectorConfig {
    /// Connector id
    pub id: String,

    /// Connector type
    #[serde(rename = "type")]
    pub kind: ConnectorKind,
}

/// Routing table entry
#[derive(Debug, Clone, Deserialize)]
pub struct RouteEntryConfig {
    /// Table order (0 = default route)
    pub order: u32,

    #[serde(flatten)]
    pub route: RouteSpec,
}

/// Route types
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RouteSpec {
    Default {
        connector: String,
        #[serde(default)]
        rate: f64,
    },
    StaticMo {
        connector: String,
        #[serde(default)]
        filters: Vec<FilterSpec>,
    },
    StaticMt {
        connector: String,
        #[serde(default)]
        rate: f64,
        #[serde(default)]
        filters: Vec<FilterSpec>,
    },
    RandomRoundrobinMo {
        connectors: Vec<String>,
        #[serde(default)]
        filters: Vec<FilterSpec>,
    },
    RandomRoundrobinMt {
        connectors: Vec<String>,
        #[serde(default)]
        rate: f64,
        #[serde(default)]
        filters: Vec<FilterSpec>,
    },
    FailoverMo {
        connectors: Vec<String>,
        #[serde(default)]
        filters: Vec<FilterSpec>,
    },
    FailoverMt {
        connectors: Vec<String>,
        #[serde(default)]
        rate: f64,
        #[serde(default)]
        filters: Vec<FilterSpec>,
    },
}

impl RouteSpec {
    /// Connector ids referenced by the route.
    pub fn connector_ids(&self) -> Vec<&str> {
        match self {
            RouteSpec::Default { connector, .. }
            | RouteSpec::StaticMo { connector, .. }
            | RouteSpec::StaticMt { connector, .. } => vec![connector.as_str()],
            RouteSpec::RandomRoundrobinMo { connectors, .. }
            | RouteSpec::RandomRoundrobinMt { connectors, .. }
            | RouteSpec::FailoverMo { connectors, .. }
            | RouteSpec::FailoverMt { connectors, .. } => {
                connectors.iter().map(String::as_str).collect()
            }
        }
    }

    pub fn filters(&self) -> &[FilterSpec] {
        match self {
            RouteSpec::Default { .. } => &[],
            RouteSpec::StaticMo { filters, .. }
            | RouteSpec::StaticMt { filters, .. }
            | RouteSpec::RandomRoundrobinMo { filters, .. }
            | RouteSpec::RandomRoundrobinMt { filters, .. }
            | RouteSpec::FailoverMo { filters, .. }
            | RouteSpec::FailoverMt { filters, .. } => filters,
        }
    }
}

/// Interception table entry
#[derive(Debug, Clone, Deserialize)]
pub struct InterceptorEntryConfig {
    /// Table order (0 = default interceptor)
    pub order: u32,

    #[serde(flatten)]
    pub interceptor: InterceptorSpec,
}

/// Interceptor types
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InterceptorSpec {
    /// Script kind follows the table it is declared in
    Default { script: ScriptSource },
    StaticMo {
        script: ScriptSource,
        #[serde(default)]
        filters: Vec<FilterSpec>,
    },
    StaticMt {
        script: ScriptSource,
        #[serde(default)]
        filters: Vec<FilterSpec>,
    },
}

impl InterceptorSpec {
    pub fn filters(&self) -> &[FilterSpec] {
        match self {
            InterceptorSpec::Default { .. } => &[],
            InterceptorSpec::StaticMo { filters, .. }
            | InterceptorSpec::StaticMt { filters, .. } => filters,
        }
    }
}

/// Filter types
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FilterSpec {
    Transparent,
    Connector { id: String },
    User { id: String },
    Group { id: String },
    SourceAddr { pattern: String },
    DestinationAddr { pattern: String },
    ShortMessage { pattern: String },
    /// Two dates, `YYYY-MM-DD`
    DateInterval { bounds: Vec<NaiveDate> },
    /// Two times, `HH:MM:SS`
    TimeInterval { bounds: Vec<NaiveTime> },
    EvalScript { script: ScriptSource },
    Tag { tag: Tag },
}

/// Script given inline or as a file path
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ScriptSource {
    Inline(String),
    File { file: PathBuf },
}

/// Humantime serde support module
pub(crate) mod humantime_serde {
    use serde::{self, Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }

    pub mod option {
        use super::*;

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
        where
            D: Deserializer<'de>,
        {
            match Option::<String>::deserialize(deserializer)? {
                Some(s) => humantime::parse_duration(&s)
                    .map(Some)
                    .map_err(serde::de::Error::custom),
                None => Ok(None),
            }
        }
    }
}
