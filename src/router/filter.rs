//! Route and interceptor filters.
//!
//! A filter is a predicate over a [`Routable`]. Each variant declares which
//! directions it makes sense for; routes and interceptors refuse filters
//! that cannot apply to their kind.

use std::fmt;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};

use super::connector::Direction;
use super::matcher::FieldPattern;
use super::routable::{Param, Routable, Tag};
use crate::script::{ScriptEngine, ScriptError};

const BOTH: &[Direction] = &[Direction::Mo, Direction::Mt];
const MO_ONLY: &[Direction] = &[Direction::Mo];
const MT_ONLY: &[Direction] = &[Direction::Mt];

/// Filter errors.
#[derive(Debug, thiserror::Error)]
pub enum FilterError {
    #[error("invalid filter parameter: {0}")]
    InvalidParameter(String),

    #[error("invalid pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error(transparent)]
    Script(#[from] ScriptError),
}

/// Routing/interception filter.
#[derive(Clone)]
pub enum Filter {
    /// Always matches
    Transparent,
    /// Message came in through this connector
    Connector { id: String },
    /// Message was sent by this user
    User { id: String },
    /// Message was sent by a member of this group
    Group { id: String },
    /// `source_addr` matches a pattern
    SourceAddr(FieldPattern),
    /// `destination_addr` matches a pattern
    DestinationAddr(FieldPattern),
    /// Message content matches a pattern
    ShortMessage(FieldPattern),
    /// Reception date within inclusive bounds
    DateInterval { from: NaiveDate, to: NaiveDate },
    /// Reception time of day within inclusive bounds
    TimeInterval { from: NaiveTime, to: NaiveTime },
    /// Script sets `result` to true
    EvalScript {
        source: Arc<str>,
        engine: Arc<dyn ScriptEngine>,
    },
    /// Routable carries this tag
    Tag(Tag),
}

impl Filter {
    pub fn connector(id: impl Into<String>) -> Self {
        Filter::Connector { id: id.into() }
    }

    pub fn user(id: impl Into<String>) -> Self {
        Filter::User { id: id.into() }
    }

    pub fn group(id: impl Into<String>) -> Self {
        Filter::Group { id: id.into() }
    }

    pub fn source_addr(pattern: &str) -> Result<Self, FilterError> {
        Ok(Filter::SourceAddr(FieldPattern::new(pattern)?))
    }

    pub fn destination_addr(pattern: &str) -> Result<Self, FilterError> {
        Ok(Filter::DestinationAddr(FieldPattern::new(pattern)?))
    }

    pub fn short_message(pattern: &str) -> Result<Self, FilterError> {
        Ok(Filter::ShortMessage(FieldPattern::new(pattern)?))
    }

    /// Date interval from exactly two ordered bounds.
    pub fn date_interval(bounds: &[NaiveDate]) -> Result<Self, FilterError> {
        let (from, to) = ordered_pair(bounds, "date")?;
        Ok(Filter::DateInterval { from, to })
    }

    /// Time interval from exactly two ordered bounds.
    pub fn time_interval(bounds: &[NaiveTime]) -> Result<Self, FilterError> {
        let (from, to) = ordered_pair(bounds, "time")?;
        Ok(Filter::TimeInterval { from, to })
    }

    /// Script filter; the script is compiled right away.
    pub fn eval_script(
        source: impl Into<Arc<str>>,
        engine: Arc<dyn ScriptEngine>,
    ) -> Result<Self, FilterError> {
        let source = source.into();
        engine.compile(&source)?;
        Ok(Filter::EvalScript { source, engine })
    }

    pub fn tag(tag: impl Into<Tag>) -> Self {
        Filter::Tag(tag.into())
    }

    /// Directions this filter applies to.
    pub fn used_for(&self) -> &'static [Direction] {
        match self {
            // MT senders choose their own source address
            Filter::Connector { .. } | Filter::SourceAddr(_) => MO_ONLY,
            Filter::User { .. } | Filter::Group { .. } => MT_ONLY,
            _ => BOTH,
        }
    }

    /// Filter type name, as used in configuration and listings.
    pub fn type_name(&self) -> &'static str {
        match self {
            Filter::Transparent => "TransparentFilter",
            Filter::Connector { .. } => "ConnectorFilter",
            Filter::User { .. } => "UserFilter",
            Filter::Group { .. } => "GroupFilter",
            Filter::SourceAddr(_) => "SourceAddrFilter",
            Filter::DestinationAddr(_) => "DestinationAddrFilter",
            Filter::ShortMessage(_) => "ShortMessageFilter",
            Filter::DateInterval { .. } => "DateIntervalFilter",
            Filter::TimeInterval { .. } => "TimeIntervalFilter",
            Filter::EvalScript { .. } => "EvalScriptFilter",
            Filter::Tag(_) => "TagFilter",
        }
    }

    /// Check if the routable matches.
    ///
    /// Only script filters can fail; their errors are returned as-is.
    pub fn matches(&self, routable: &Routable) -> Result<bool, FilterError> {
        let matched = match self {
            Filter::Transparent => true,
            Filter::Connector { id } => routable.connector().is_some_and(|c| c.id() == id),
            Filter::User { id } => routable.user().is_some_and(|u| u.id() == id),
            Filter::Group { id } => routable.user().is_some_and(|u| u.group_id() == id),
            Filter::SourceAddr(pattern) => field_matches(routable.field("source_addr"), pattern),
            Filter::DestinationAddr(pattern) => {
                field_matches(routable.field("destination_addr"), pattern)
            }
            Filter::ShortMessage(pattern) => {
                let content = routable
                    .field("short_message")
                    .or_else(|| routable.field("message_payload"));
                field_matches(content, pattern)
            }
            Filter::DateInterval { from, to } => {
                let date = routable.timestamp().date();
                *from <= date && date <= *to
            }
            Filter::TimeInterval { from, to } => {
                let time = routable.timestamp().time();
                *from <= time && time <= *to
            }
            Filter::EvalScript { source, engine } => engine.eval_filter(source, routable)?,
            Filter::Tag(tag) => routable.has_tag(tag),
        };

        Ok(matched)
    }
}

fn field_matches(value: Option<&Param>, pattern: &FieldPattern) -> bool {
    value.is_some_and(|v| pattern.matches(&v.as_text()))
}

fn ordered_pair<T: PartialOrd + Copy + fmt::Display>(
    bounds: &[T],
    what: &str,
) -> Result<(T, T), FilterError> {
    match bounds {
        [from, to] if from < to => Ok((*from, *to)),
        [from, to] => Err(FilterError::InvalidParameter(format!(
            "{} interval must be ordered, got {} >= {}",
            what, from, to
        ))),
        _ => Err(FilterError::InvalidParameter(format!(
            "{} interval needs exactly two bounds, got {}",
            what,
            bounds.len()
        ))),
    }
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::EvalScript { source, .. } => f
                .debug_struct("EvalScript")
                .field("source", source)
                .finish(),
            other => write!(f, "{}", other),
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.type_name();
        match self {
            Filter::Transparent => f.write_str(name),
            Filter::Connector { id } => write!(f, "{}(cid={})", name, id),
            Filter::User { id } => write!(f, "{}(uid={})", name, id),
            Filter::Group { id } => write!(f, "{}(gid={})", name, id),
            Filter::SourceAddr(p) => write!(f, "{}(source_addr={})", name, p),
            Filter::DestinationAddr(p) => write!(f, "{}(destination_addr={})", name, p),
            Filter::ShortMessage(p) => write!(f, "{}(msg={})", name, p),
            Filter::DateInterval { from, to } => {
                write!(f, "{}(leftBorder={}, rightBorder={})", name, from, to)
            }
            Filter::TimeInterval { from, to } => {
                write!(f, "{}(leftBorder={}, rightBorder={})", name, from, to)
            }
            Filter::EvalScript { source, .. } => {
                let first = source.lines().next().unwrap_or_default();
                write!(f, "{}({})", name, first)
            }
            Filter::Tag(tag) => write!(f, "{}(tag={})", name, tag),
        }
    }
}
