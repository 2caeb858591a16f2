// Copyright (c) 2026 dvmcp contributors
// SPDX-License-Identifier: AGPL-3.0

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::error::BridgeError;
use crate::domain::event::RelayEvent;

/// The payload of a job-request event: a tool name plus structured
/// parameters, carried as JSON in the event content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRequestPayload {
    pub name: String,
    #[serde(default)]
    pub parameters: Value,
}

impl JobRequestPayload {
    /// Parse the content of a job-request event.
    ///
    /// The request itself is read-only to the bridge; a payload that does
    /// not parse is reported back to the requester as a terminal error,
    /// never propagated.
    pub fn parse(event: &RelayEvent) -> Result<Self, BridgeError> {
        serde_json::from_str(&event.content)
            .map_err(|e| BridgeError::MalformedRequest(e.to_string()))
    }
}

/// Explicit command carried in the `c` tag of a job request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Return the current tool catalog instead of running a job.
    ListTools,
}

impl Command {
    pub fn from_tag(value: Option<&str>) -> Option<Self> {
        match value {
            Some("list-tools") => Some(Self::ListTools),
            _ => None,
        }
    }
}

/// Phase of handling a single job request. Transient; only ever emitted,
/// never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Processing,
    Success,
    Error(String),
}

impl JobStatus {
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::Success => "success",
            Self::Error(_) => "error",
        }
    }

    /// Extra status-tag value, present only for errors with a message.
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Error(message) if !message.is_empty() => Some(message),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::event::{EventId, EventKind, Pubkey};
    use serde_json::json;

    fn request_event(content: &str) -> RelayEvent {
        RelayEvent {
            id: EventId::new("req"),
            pubkey: Pubkey::new("requester"),
            created_at: 0,
            kind: EventKind::JobRequest.as_u16(),
            tags: vec![],
            content: content.to_string(),
            sig: String::new(),
        }
    }

    #[test]
    fn test_parse_job_payload() {
        let event = request_event(r#"{"name":"echo","parameters":{"msg":"hi"}}"#);
        let payload = JobRequestPayload::parse(&event).unwrap();
        assert_eq!(payload.name, "echo");
        assert_eq!(payload.parameters, json!({"msg": "hi"}));
    }

    #[test]
    fn test_parse_defaults_missing_parameters() {
        let event = request_event(r#"{"name":"echo"}"#);
        let payload = JobRequestPayload::parse(&event).unwrap();
        assert_eq!(payload.parameters, Value::Null);
    }

    #[test]
    fn test_parse_rejects_malformed_content() {
        let event = request_event("not json");
        let err = JobRequestPayload::parse(&event).unwrap_err();
        assert!(matches!(err, BridgeError::MalformedRequest(_)));
    }

    #[test]
    fn test_command_recognition() {
        assert_eq!(Command::from_tag(Some("list-tools")), Some(Command::ListTools));
        assert_eq!(Command::from_tag(Some("other")), None);
        assert_eq!(Command::from_tag(None), None);
    }

    #[test]
    fn test_status_keywords() {
        assert_eq!(JobStatus::Processing.keyword(), "processing");
        assert_eq!(JobStatus::Success.keyword(), "success");
        let error = JobStatus::Error("boom".to_string());
        assert_eq!(error.keyword(), "error");
        assert_eq!(error.message(), Some("boom"));
        assert_eq!(JobStatus::Success.message(), None);
        // A message-less rejection tags plain ["status", "error"].
        assert_eq!(JobStatus::Error(String::new()).message(), None);
    }
}
