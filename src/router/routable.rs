//! Per-message routing context.
//!
//! A [`Routable`] wraps the PDU being routed together with who sent it
//! (MT), where it came from (MO), when it was received, and the tags and
//! field locks interceptor scripts attach to it.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::connector::Connector;
use super::user::User;

/// PDU parameter names a routable recognizes.
pub const PDU_FIELDS: &[&str] = &[
    "service_type",
    "source_addr_ton",
    "source_addr_npi",
    "source_addr",
    "dest_addr_ton",
    "dest_addr_npi",
    "destination_addr",
    "esm_class",
    "protocol_id",
    "priority_flag",
    "schedule_delivery_time",
    "validity_period",
    "registered_delivery",
    "replace_if_present_flag",
    "data_coding",
    "sm_default_msg_id",
    "sm_length",
    "short_message",
    "message_payload",
    "user_message_reference",
    "sar_msg_ref_num",
    "sar_total_segments",
    "sar_segment_seqnum",
];

/// Whether `name` is a recognized PDU parameter.
pub fn is_pdu_field(name: &str) -> bool {
    PDU_FIELDS.contains(&name)
}

/// Routable errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RoutableError {
    #[error("invalid tag: expected integer or string, got {0}")]
    InvalidTag(String),

    #[error("tag not found: {0}")]
    TagNotFound(Tag),

    #[error("invalid lock: '{0}' is not a PDU parameter")]
    InvalidLock(String),

    #[error("unknown PDU parameter: {0}")]
    UnknownField(String),
}

/// A routable tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Tag {
    Int(i64),
    Str(String),
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tag::Int(v) => write!(f, "{}", v),
            Tag::Str(v) => write!(f, "'{}'", v),
        }
    }
}

impl From<i64> for Tag {
    fn from(v: i64) -> Self {
        Tag::Int(v)
    }
}

impl From<&str> for Tag {
    fn from(v: &str) -> Self {
        Tag::Str(v.to_string())
    }
}

impl From<String> for Tag {
    fn from(v: String) -> Self {
        Tag::Str(v)
    }
}

/// A PDU parameter value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Param {
    Int(i64),
    Text(String),
    Bytes(Vec<u8>),
}

impl Param {
    /// Textual view of the value, as seen by pattern filters.
    pub fn as_text(&self) -> std::borrow::Cow<'_, str> {
        match self {
            Param::Int(v) => std::borrow::Cow::Owned(v.to_string()),
            Param::Text(v) => std::borrow::Cow::Borrowed(v),
            Param::Bytes(v) => String::from_utf8_lossy(v),
        }
    }
}

impl From<i64> for Param {
    fn from(v: i64) -> Self {
        Param::Int(v)
    }
}

impl From<&str> for Param {
    fn from(v: &str) -> Self {
        Param::Text(v.to_string())
    }
}

impl From<String> for Param {
    fn from(v: String) -> Self {
        Param::Text(v)
    }
}

impl From<Vec<u8>> for Param {
    fn from(v: Vec<u8>) -> Self {
        Param::Bytes(v)
    }
}

/// SMPP operation carried by a routable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    SubmitSm,
    DeliverSm,
    DataSm,
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::SubmitSm => f.write_str("submit_sm"),
            Command::DeliverSm => f.write_str("deliver_sm"),
            Command::DataSm => f.write_str("data_sm"),
        }
    }
}

/// Decoded PDU: command plus its parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pdu {
    command: Command,
    params: BTreeMap<String, Param>,
}

impl Pdu {
    pub fn new(command: Command) -> Self {
        Self {
            command,
            params: BTreeMap::new(),
        }
    }

    /// submit_sm with the usual addressing and content fields.
    pub fn submit_sm(source_addr: &str, destination_addr: &str, short_message: &str) -> Self {
        Self::new(Command::SubmitSm)
            .with("source_addr", source_addr)
            .with("destination_addr", destination_addr)
            .with("short_message", short_message)
    }

    /// deliver_sm with the usual addressing and content fields.
    pub fn deliver_sm(source_addr: &str, destination_addr: &str, short_message: &str) -> Self {
        Self::new(Command::DeliverSm)
            .with("source_addr", source_addr)
            .with("destination_addr", destination_addr)
            .with("short_message", short_message)
    }

    /// Builder-style parameter setter.
    ///
    /// Unknown names are kept; [`Pdu::set`] is the checked variant.
    pub fn with(mut self, name: &str, value: impl Into<Param>) -> Self {
        self.params.insert(name.to_string(), value.into());
        self
    }

    pub fn command(&self) -> Command {
        self.command
    }

    pub fn get(&self, name: &str) -> Option<&Param> {
        self.params.get(name)
    }

    /// Set a recognized parameter.
    pub fn set(&mut self, name: &str, value: impl Into<Param>) -> Result<(), RoutableError> {
        if !is_pdu_field(name) {
            return Err(RoutableError::UnknownField(name.to_string()));
        }
        self.params.insert(name.to_string(), value.into());
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Option<Param> {
        self.params.remove(name)
    }

    pub fn params(&self) -> &BTreeMap<String, Param> {
        &self.params
    }
}

/// Routing context for one message.
#[derive(Debug, Clone, PartialEq)]
pub struct Routable {
    pdu: Pdu,
    user: Option<User>,
    connector: Option<Connector>,
    timestamp: NaiveDateTime,
    tags: Vec<Tag>,
    locks: BTreeSet<String>,
}

impl Routable {
    /// Create a routable received now, with no sender or origin.
    pub fn new(pdu: Pdu) -> Self {
        Self {
            pdu,
            user: None,
            connector: None,
            timestamp: chrono::Local::now().naive_local(),
            tags: Vec::new(),
            locks: BTreeSet::new(),
        }
    }

    /// MT routable submitted by `user`.
    pub fn submit_sm(pdu: Pdu, user: User) -> Self {
        Self::new(pdu).with_user(user)
    }

    /// MO routable received from `connector`.
    pub fn deliver_sm(pdu: Pdu, connector: Connector) -> Self {
        Self::new(pdu).with_connector(connector)
    }

    /// Set the sender.
    pub fn with_user(mut self, user: User) -> Self {
        self.user = Some(user);
        self
    }

    /// Set the origin connector.
    pub fn with_connector(mut self, connector: Connector) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Set the reception timestamp.
    pub fn with_timestamp(mut self, timestamp: NaiveDateTime) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn pdu(&self) -> &Pdu {
        &self.pdu
    }

    pub fn pdu_mut(&mut self) -> &mut Pdu {
        &mut self.pdu
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn connector(&self) -> Option<&Connector> {
        self.connector.as_ref()
    }

    pub fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }

    /// Get a PDU parameter.
    pub fn field(&self, name: &str) -> Option<&Param> {
        self.pdu.get(name)
    }

    /// Set a PDU parameter.
    pub fn set_field(&mut self, name: &str, value: impl Into<Param>) -> Result<(), RoutableError> {
        self.pdu.set(name, value)
    }

    // Tags

    /// Append a tag; duplicates are kept.
    pub fn add_tag(&mut self, tag: impl Into<Tag>) {
        self.tags.push(tag.into());
    }

    pub fn has_tag(&self, tag: &Tag) -> bool {
        self.tags.contains(tag)
    }

    /// Remove the first occurrence of `tag`.
    pub fn remove_tag(&mut self, tag: &Tag) -> Result<(), RoutableError> {
        match self.tags.iter().position(|t| t == tag) {
            Some(idx) => {
                self.tags.remove(idx);
                Ok(())
            }
            None => Err(RoutableError::TagNotFound(tag.clone())),
        }
    }

    /// Tags in insertion order.
    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    pub fn flush_tags(&mut self) {
        self.tags.clear();
    }

    // Locks

    /// Lock a PDU parameter against later overrides.
    pub fn lock_field(&mut self, name: &str) -> Result<(), RoutableError> {
        if !is_pdu_field(name) {
            return Err(RoutableError::InvalidLock(name.to_string()));
        }
        self.locks.insert(name.to_string());
        Ok(())
    }

    pub fn is_field_locked(&self, name: &str) -> Result<bool, RoutableError> {
        if !is_pdu_field(name) {
            return Err(RoutableError::InvalidLock(name.to_string()));
        }
        Ok(self.locks.contains(name))
    }

    pub fn locked_fields(&self) -> impl Iterator<Item = &str> {
        self.locks.iter().map(String::as_str)
    }

    pub fn flush_locks(&mut self) {
        self.locks.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn routable() -> Routable {
        Routable::submit_sm(
            Pdu::submit_sm("20203060", "20203060", "hello world"),
            User::new("1", "100"),
        )
    }

    #[test]
    fn test_submit_sm_routable() {
        let r = routable();
        assert_eq!(r.user().map(User::id), Some("1"));
        assert_eq!(r.user().map(User::group_id), Some("100"));
        assert!(r.connector().is_none());
        assert_eq!(r.pdu().command(), Command::SubmitSm);
    }

    #[test]
    fn test_deliver_sm_routable() {
        let r = Routable::deliver_sm(
            Pdu::deliver_sm("1234", "5678", "hi"),
            Connector::smppc("abc"),
        );
        assert_eq!(r.connector().map(Connector::id), Some("abc"));
        assert!(r.user().is_none());
    }

    #[test]
    fn test_integer_tags() {
        let mut r = routable();
        r.add_tag(23);
        assert!(r.has_tag(&Tag::Int(23)));
        assert!(!r.has_tag(&Tag::Int(30)));
        assert_eq!(
            r.remove_tag(&Tag::Int(30)),
            Err(RoutableError::TagNotFound(Tag::Int(30)))
        );
        assert_eq!(r.tags(), &[Tag::Int(23)]);
        r.flush_tags();
        assert!(r.tags().is_empty());
    }

    #[test]
    fn test_string_tags_are_distinct_from_integers() {
        let mut r = routable();
        r.add_tag("23");
        assert!(r.has_tag(&Tag::from("23")));
        assert!(!r.has_tag(&Tag::Int(23)));
    }

    #[test]
    fn test_mixed_tags_keep_insertion_order() {
        let mut r = routable();
        r.add_tag("23");
        r.add_tag(23);
        r.add_tag("23");
        assert_eq!(
            r.tags(),
            &[Tag::from("23"), Tag::Int(23), Tag::from("23")]
        );

        // Only the first occurrence goes
        r.remove_tag(&Tag::from("23")).unwrap();
        assert_eq!(r.tags(), &[Tag::Int(23), Tag::from("23")]);
    }

    #[test]
    fn test_locking() {
        let mut r = routable();
        assert_eq!(
            r.lock_field("anything"),
            Err(RoutableError::InvalidLock("anything".to_string()))
        );
        assert!(r.is_field_locked("anything").is_err());

        r.lock_field("service_type").unwrap();
        assert!(r.is_field_locked("service_type").unwrap());
        assert!(!r.is_field_locked("source_addr_ton").unwrap());

        r.flush_locks();
        assert!(!r.is_field_locked("service_type").unwrap());
    }

    #[test]
    fn test_set_field() {
        let mut r = routable();
        r.set_field("sm_default_msg_id", 10).unwrap();
        assert_eq!(r.field("sm_default_msg_id"), Some(&Param::Int(10)));
        assert!(matches!(
            r.set_field("not_a_field", 1),
            Err(RoutableError::UnknownField(_))
        ));
    }

    #[test]
    fn test_param_as_text() {
        assert_eq!(Param::Int(7).as_text(), "7");
        assert_eq!(Param::from("abc").as_text(), "abc");
        assert_eq!(Param::Bytes(b"xyz".to_vec()).as_text(), "xyz");
    }
}
