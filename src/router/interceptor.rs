//! Interceptors: filters plus a script to run on matching messages.

use std::fmt;

use super::connector::Direction;
use super::filter::{Filter, FilterError};
use super::routable::Routable;
use super::table::{EntryKind, TableEntry, TableError};
use crate::script::{Script, ScriptKind};

/// Interceptor construction errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InterceptorError {
    #[error("invalid interceptor parameter: {0}")]
    InvalidParameter(String),

    #[error("{filter} can not be used in {kind} interceptors")]
    InvalidFilterType { filter: String, kind: EntryKind },

    #[error("{script} script can not be used in {kind} interceptors")]
    InvalidScriptType { script: ScriptKind, kind: EntryKind },
}

/// An interception rule.
#[derive(Debug, Clone)]
pub struct Interceptor {
    kind: EntryKind,
    filters: Vec<Filter>,
    script: Script,
}

impl Interceptor {
    /// Catch-all interceptor, accepting a script of either kind.
    pub fn default_interceptor(script: Script) -> Self {
        Self {
            kind: EntryKind::Default,
            filters: Vec::new(),
            script,
        }
    }

    pub fn static_mo(filters: Vec<Filter>, script: Script) -> Result<Self, InterceptorError> {
        Self::build(EntryKind::Mo, filters, script)
    }

    pub fn static_mt(filters: Vec<Filter>, script: Script) -> Result<Self, InterceptorError> {
        Self::build(EntryKind::Mt, filters, script)
    }

    fn build(
        kind: EntryKind,
        filters: Vec<Filter>,
        script: Script,
    ) -> Result<Self, InterceptorError> {
        let Some(direction) = kind.direction() else {
            return Err(InterceptorError::InvalidParameter(
                "use default_interceptor for default entries".to_string(),
            ));
        };

        if script_direction(script.kind()) != direction {
            return Err(InterceptorError::InvalidScriptType {
                script: script.kind(),
                kind,
            });
        }

        if let Some(filter) = filters.iter().find(|f| !f.used_for().contains(&direction)) {
            return Err(InterceptorError::InvalidFilterType {
                filter: filter.type_name().to_string(),
                kind,
            });
        }

        Ok(Self {
            kind,
            filters,
            script,
        })
    }

    pub fn kind(&self) -> EntryKind {
        self.kind
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn script(&self) -> &Script {
        &self.script
    }

    pub fn type_name(&self) -> &'static str {
        match self.kind {
            EntryKind::Default => "DefaultInterceptor",
            EntryKind::Mo => "StaticMOInterceptor",
            EntryKind::Mt => "StaticMTInterceptor",
        }
    }

    /// Check the interceptor filters; all must match.
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
}

fn script_direction(kind: ScriptKind) -> Direction {
    match kind {
        ScriptKind::Mo => Direction::Mo,
        ScriptKind::Mt => Direction::Mt,
    }
}

impl TableEntry for Interceptor {
    fn kind(&self) -> EntryKind {
        self.kind
    }

    fn check_direction(&self, direction: Direction) -> Result<(), TableError> {
        if script_direction(self.script.kind()) != direction {
            return Err(TableError::InvalidParameter(format!(
                "{} script can not be used in {} interception tables",
                self.script.kind(),
                direction
            )));
        }
        Ok(())
    }

    fn matches(&self, routable: &Routable) -> Result<bool, FilterError> {
        Interceptor::matches(self, routable)
    }
}

impl fmt::Display for Interceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.type_name(), self.script)?;
        if !self.filters.is_empty() {
            let filters: Vec<String> = self.filters.iter().map(ToString::to_string).collect();
            write!(f, " [{}]", filters.join(", "))?;
        }
        Ok(())
    }
}
