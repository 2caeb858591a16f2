// Copyright (c) 2026 dvmcp contributors
// SPDX-License-Identifier: AGPL-3.0

// Wire event model for the relay network (NIP-01 shaped).
//
// Every protocol kind the bridge speaks is resolved into `EventKind` once
// at this boundary; handler logic matches on named variants, never on raw
// numbers.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::domain::error::BridgeError;
use crate::domain::job::JobStatus;

/// Hex-encoded event identifier (sha-256 digest of the canonical form).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(String);

impl EventId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Hex-encoded public identity of an event author.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pubkey(String);

impl Pubkey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Pubkey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Protocol event kinds the bridge publishes or consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Relay-list metadata (NIP-65).
    RelayList,
    /// Deletion / retraction request (NIP-09).
    Deletion,
    /// Service and tool-catalog announcement.
    ServiceAnnouncement,
    /// Incoming job request addressed to the bridge.
    JobRequest,
    /// Job result or catalog-listing response.
    JobResponse,
    /// Job status feedback (processing / success / error).
    JobStatus,
}

impl EventKind {
    pub fn as_u16(self) -> u16 {
        match self {
            Self::RelayList => 10002,
            Self::Deletion => 5,
            Self::ServiceAnnouncement => 31990,
            Self::JobRequest => 5910,
            Self::JobResponse => 6910,
            Self::JobStatus => 7000,
        }
    }

    pub fn from_u16(kind: u16) -> Option<Self> {
        match kind {
            10002 => Some(Self::RelayList),
            5 => Some(Self::Deletion),
            31990 => Some(Self::ServiceAnnouncement),
            5910 => Some(Self::JobRequest),
            6910 => Some(Self::JobResponse),
            7000 => Some(Self::JobStatus),
            _ => None,
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_u16())
    }
}

/// A fully signed, addressable relay event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayEvent {
    pub id: EventId,
    pub pubkey: Pubkey,
    pub created_at: i64,
    pub kind: u16,
    pub tags: Vec<Vec<String>>,
    pub content: String,
    pub sig: String,
}

impl RelayEvent {
    /// Resolve the wire kind into a named variant, if the bridge knows it.
    pub fn event_kind(&self) -> Option<EventKind> {
        EventKind::from_u16(self.kind)
    }

    /// First value of the first tag with the given name.
    pub fn tag_value(&self, name: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|tag| tag.first().map(String::as_str) == Some(name))
            .and_then(|tag| tag.get(1))
            .map(String::as_str)
    }

    /// All tags with the given name.
    pub fn tags_named(&self, name: &str) -> Vec<&Vec<String>> {
        self.tags
            .iter()
            .filter(|tag| tag.first().map(String::as_str) == Some(name))
            .collect()
    }
}

/// The unsigned skeleton of an event, handed to an [`EventSigner`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventTemplate {
    pub kind: u16,
    pub created_at: i64,
    pub tags: Vec<Vec<String>>,
    pub content: String,
}

impl EventTemplate {
    /// New template for the given kind, stamped with the current time.
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind: kind.as_u16(),
            created_at: Utc::now().timestamp(),
            tags: Vec::new(),
            content: String::new(),
        }
    }

    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    pub fn tag(mut self, tag: Vec<String>) -> Self {
        self.tags.push(tag);
        self
    }

    pub fn tags(mut self, tags: impl IntoIterator<Item = Vec<String>>) -> Self {
        self.tags.extend(tags);
        self
    }
}

/// Typed constructors for the tag vocabulary the bridge emits.
pub struct Tag;

impl Tag {
    /// `e`: reference to an originating event id.
    pub fn event(id: &EventId) -> Vec<String> {
        vec!["e".to_string(), id.as_str().to_string()]
    }

    /// `p`: reference to a requester identity.
    pub fn pubkey(key: &Pubkey) -> Vec<String> {
        vec!["p".to_string(), key.as_str().to_string()]
    }

    /// `d`: stable identifier driving replace-semantics on announcements.
    pub fn identifier(value: impl Into<String>) -> Vec<String> {
        vec!["d".to_string(), value.into()]
    }

    /// `k`: referenced kind being announced or deleted.
    pub fn kind(kind: EventKind) -> Vec<String> {
        vec!["k".to_string(), kind.as_u16().to_string()]
    }

    /// `t`: topical discoverability tag.
    pub fn topic(value: impl Into<String>) -> Vec<String> {
        vec!["t".to_string(), value.into()]
    }

    /// `r`: relay endpoint URL.
    pub fn relay(url: impl Into<String>) -> Vec<String> {
        vec!["r".to_string(), url.into()]
    }

    /// `capabilities`: protocol capability marker.
    pub fn capabilities(value: impl Into<String>) -> Vec<String> {
        vec!["capabilities".to_string(), value.into()]
    }

    /// `status`: status keyword, optionally with an error message.
    pub fn status(status: &JobStatus) -> Vec<String> {
        let mut tag = vec!["status".to_string(), status.keyword().to_string()];
        if let Some(message) = status.message() {
            tag.push(message.to_string());
        }
        tag
    }

    /// `request`: the full original request, re-serialized for audit.
    pub fn request(event: &RelayEvent) -> Result<Vec<String>, BridgeError> {
        let serialized = serde_json::to_string(event)
            .map_err(|e| BridgeError::Signing(format!("failed to serialize request: {e}")))?;
        Ok(vec!["request".to_string(), serialized])
    }
}

/// Signs event templates with the bridge's identity.
///
/// Injected into the announcement manager and the request gateway; never
/// ambient process-wide state.
pub trait EventSigner: Send + Sync {
    /// Sign a template, producing an addressable event authored by
    /// [`EventSigner::public_key`].
    fn sign(&self, template: EventTemplate) -> Result<RelayEvent, BridgeError>;

    /// The bridge's public identity.
    fn public_key(&self) -> Pubkey;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trip() {
        for kind in [
            EventKind::RelayList,
            EventKind::Deletion,
            EventKind::ServiceAnnouncement,
            EventKind::JobRequest,
            EventKind::JobResponse,
            EventKind::JobStatus,
        ] {
            assert_eq!(EventKind::from_u16(kind.as_u16()), Some(kind));
        }
        assert_eq!(EventKind::from_u16(1), None);
    }

    #[test]
    fn test_tag_value_returns_first_match() {
        let event = RelayEvent {
            id: EventId::new("abc"),
            pubkey: Pubkey::new("def"),
            created_at: 0,
            kind: EventKind::JobRequest.as_u16(),
            tags: vec![
                vec!["c".to_string(), "list-tools".to_string()],
                vec!["c".to_string(), "ignored".to_string()],
                vec!["e".to_string()],
            ],
            content: String::new(),
            sig: String::new(),
        };
        assert_eq!(event.tag_value("c"), Some("list-tools"));
        // Tag present but without a value.
        assert_eq!(event.tag_value("e"), None);
        assert_eq!(event.tag_value("missing"), None);
    }

    #[test]
    fn test_status_tag_carries_error_message() {
        let tag = Tag::status(&JobStatus::Error("connection refused".to_string()));
        assert_eq!(tag, vec!["status", "error", "connection refused"]);

        let tag = Tag::status(&JobStatus::Processing);
        assert_eq!(tag, vec!["status", "processing"]);
    }

    #[test]
    fn test_template_builder() {
        let template = EventTemplate::new(EventKind::JobStatus)
            .content("hello")
            .tag(Tag::identifier("svc"));
        assert_eq!(template.kind, 7000);
        assert_eq!(template.content, "hello");
        assert_eq!(template.tags, vec![vec!["d".to_string(), "svc".to_string()]]);
        assert!(template.created_at > 0);
    }

    #[test]
    fn test_event_serialization_shape() {
        let event = RelayEvent {
            id: EventId::new("00ff"),
            pubkey: Pubkey::new("aa"),
            created_at: 1700000000,
            kind: 5910,
            tags: vec![],
            content: "{}".to_string(),
            sig: "bb".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["id"], "00ff");
        assert_eq!(json["kind"], 5910);
        let back: RelayEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }
}
