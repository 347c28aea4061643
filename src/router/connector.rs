//! Connectors and message directions.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Message direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Mobile originated (SMSC -> gateway -> application)
    Mo,
    /// Mobile terminated (application -> gateway -> SMSC)
    Mt,
}

impl Direction {
    /// Whether a connector of `kind` may carry traffic in this direction.
    pub fn accepts(&self, kind: ConnectorKind) -> bool {
        match self {
            Direction::Mo => matches!(kind, ConnectorKind::Http | ConnectorKind::Smpps),
            Direction::Mt => kind == ConnectorKind::Smppc,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Mo => "mo",
            Direction::Mt => "mt",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connector type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectorKind {
    /// Upstream SMPP client bound to an SMSC
    Smppc,
    /// SMPP server session bound by an ESME
    Smpps,
    /// HTTP client pushing MO messages to an application
    Http,
}

impl fmt::Display for ConnectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectorKind::Smppc => f.write_str("smppc"),
            ConnectorKind::Smpps => f.write_str("smpps"),
            ConnectorKind::Http => f.write_str("http"),
        }
    }
}

/// An addressable inbound or outbound channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Connector {
    id: String,
    kind: ConnectorKind,
}

impl Connector {
    pub fn new(id: impl Into<String>, kind: ConnectorKind) -> Self {
        Self {
            id: id.into(),
            kind,
        }
    }

    /// SMPP client connector.
    pub fn smppc(id: impl Into<String>) -> Self {
        Self::new(id, ConnectorKind::Smppc)
    }

    /// SMPP server connector.
    pub fn smpps(id: impl Into<String>) -> Self {
        Self::new(id, ConnectorKind::Smpps)
    }

    /// HTTP client connector.
    pub fn http(id: impl Into<String>) -> Self {
        Self::new(id, ConnectorKind::Http)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> ConnectorKind {
        self.kind
    }
}

impl fmt::Display for Connector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind, self.id)
    }
}
