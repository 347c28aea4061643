use anyhow::{anyhow, Result};
use serde::Deserialize;
use tracing::info;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

/// Logging settings, under `telemetry:` in the config file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TracingConfig {
    /// Reported in the startup event
    pub service_name: String,

    /// Level or `EnvFilter` directive, e.g. `info,smsrouter::script=debug`
    pub log_level: String,

    /// One JSON object per line instead of human-readable output
    pub json_logs: bool,

    /// Also log span close events with their timings
    pub log_spans: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            service_name: "smsrouter".to_string(),
            log_level: "info".to_string(),
            json_logs: false,
            log_spans: false,
        }
    }
}

/// Install the global subscriber.
///
/// `RUST_LOG` takes precedence over `log_level`. Fails if a subscriber is
/// already installed.
pub fn init_tracing(config: &TracingConfig) -> Result<()> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.log_level)
            .map_err(|e| anyhow!("invalid log level '{}': {}", config.log_level, e))?,
    };

    let span_events = if config.log_spans {
        FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let output = if config.json_logs {
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_events(span_events)
            .boxed()
    } else {
        fmt::layer().pretty().with_span_events(span_events).boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(output)
        .try_init()?;

    info!(
        service = %config.service_name,
        log_level = %config.log_level,
        json = config.json_logs,
        "logging ready"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config: TracingConfig = serde_yaml::from_str("json_logs: true").unwrap();
        assert_eq!(config.service_name, "smsrouter");
        assert_eq!(config.log_level, "info");
        assert!(config.json_logs);
        assert!(!config.log_spans);
    }

    #[test]
    fn test_invalid_level_rejected() {
        // Only meaningful without RUST_LOG overriding the level
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        let config = TracingConfig {
            log_level: "smsrouter=loud".to_string(),
            ..Default::default()
        };
        assert!(init_tracing(&config).is_err());
    }
}
