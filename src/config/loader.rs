use anyhow::{Context, Result};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use super::types::{Config, FilterSpec, InterceptorEntryConfig, RouteEntryConfig};

impl Config {
    /// Load configuration from a YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        debug!(path = %path.display(), "loading configuration");

        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        Self::from_yaml(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Parse configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)
            .context("failed to parse YAML configuration")?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    ///
    /// Checks references between sections. Table rules (order 0 holds the
    /// default entry, connector and script kinds) are enforced when the
    /// router is built.
    pub fn validate(&self) -> Result<()> {
        let mut connector_ids = HashSet::new();
        for connector in &self.connectors {
            if !connector_ids.insert(connector.id.as_str()) {
                anyhow::bail!("duplicate connector id: {}", connector.id);
            }
        }

        let mut group_ids = HashSet::new();
        for group in &self.groups {
            if !group_ids.insert(group.as_str()) {
                anyhow::bail!("duplicate group id: {}", group);
            }
        }

        let mut user_ids = HashSet::new();
        for user in &self.users {
            if !user_ids.insert(user.id()) {
                anyhow::bail!("duplicate user id: {}", user.id());
            }
            if !group_ids.contains(user.group_id()) {
                anyhow::bail!(
                    "user '{}' references unknown group: {}",
                    user.id(),
                    user.group_id()
                );
            }
        }

        let refs = References {
            connectors: &connector_ids,
            groups: &group_ids,
            users: &user_ids,
        };

        validate_routes("mt_routes", &self.mt_routes, &refs)?;
        validate_routes("mo_routes", &self.mo_routes, &refs)?;
        validate_interceptors("mt_interceptors", &self.mt_interceptors, &refs)?;
        validate_interceptors("mo_interceptors", &self.mo_interceptors, &refs)?;

        info!("configuration validated successfully");
        Ok(())
    }
}

struct References<'a> {
    connectors: &'a HashSet<&'a str>,
    groups: &'a HashSet<&'a str>,
    users: &'a HashSet<&'a str>,
}

fn validate_routes(table: &str, entries: &[RouteEntryConfig], refs: &References<'_>) -> Result<()> {
    let mut orders = HashSet::new();
    for entry in entries {
        if !orders.insert(entry.order) {
            anyhow::bail!("{}: duplicate order {}", table, entry.order);
        }
        for id in entry.route.connector_ids() {
            if !refs.connectors.contains(id) {
                anyhow::bail!(
                    "{}: route at order {} references unknown connector: {}",
                    table,
                    entry.order,
                    id
                );
            }
        }
        validate_filters(table, entry.order, entry.route.filters(), refs)?;
    }
    Ok(())
}

fn validate_interceptors(
    table: &str,
    entries: &[InterceptorEntryConfig],
    refs: &References<'_>,
) -> Result<()> {
    let mut orders = HashSet::new();
    for entry in entries {
        if !orders.insert(entry.order) {
            anyhow::bail!("{}: duplicate order {}", table, entry.order);
        }
        validate_filters(table, entry.order, entry.interceptor.filters(), refs)?;
    }
    Ok(())
}

fn validate_filters(
    table: &str,
    order: u32,
    filters: &[FilterSpec],
    refs: &References<'_>,
) -> Result<()> {
    for filter in filters {
        let (what, id, known) = match filter {
            FilterSpec::Connector { id } => ("connector", id, refs.connectors),
            FilterSpec::User { id } => ("user", id, refs.users),
            FilterSpec::Group { id } => ("group", id, refs.groups),
            _ => continue,
        };
        if !known.contains(id.as_str()) {
            anyhow::bail!(
                "{}: filter at order {} references unknown {}: {}",
                table,
                order,
                what,
                id
            );
        }
    }
    Ok(())
}
