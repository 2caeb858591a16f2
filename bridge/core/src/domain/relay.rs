// Copyright (c) 2026 dvmcp contributors
// SPDX-License-Identifier: AGPL-3.0

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::error::BridgeError;
use crate::domain::event::{EventKind, Pubkey, RelayEvent};

/// Filter over stored relay events, used for announcement queries and the
/// live job-request subscription.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventFilter {
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub kinds: Vec<u16>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub authors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub since: Option<i64>,
}

impl EventFilter {
    pub fn kind(kind: EventKind) -> Self {
        Self {
            kinds: vec![kind.as_u16()],
            ..Self::default()
        }
    }

    pub fn author(mut self, pubkey: &Pubkey) -> Self {
        self.authors.push(pubkey.as_str().to_string());
        self
    }

    pub fn since(mut self, timestamp: i64) -> Self {
        self.since = Some(timestamp);
        self
    }
}

/// Callback invoked once per live-subscription event, each on its own task.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn handle(&self, event: RelayEvent);
}

/// The relay transport: publishes signed events to a set of relay
/// endpoints, queries past events, and delivers a deduplicated live
/// subscription.
#[async_trait]
pub trait RelayTransport: Send + Sync {
    /// Deliver a signed event to the relay set.
    async fn publish(&self, event: RelayEvent) -> Result<(), BridgeError>;

    /// Fetch stored events matching the filter, deduplicated across relays.
    async fn query(&self, filter: EventFilter) -> Result<Vec<RelayEvent>, BridgeError>;

    /// Begin a live subscription for the given kind. The handler runs as an
    /// independent task per event, so one slow handler never delays the
    /// delivery of the next.
    async fn subscribe(
        &self,
        kind: EventKind,
        handler: Arc<dyn RequestHandler>,
    ) -> Result<(), BridgeError>;

    /// Release subscriptions and connections. In-flight handlers are not
    /// cancelled; they race the disconnect.
    async fn shutdown(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_serialization_omits_empty_fields() {
        let filter = EventFilter::kind(EventKind::ServiceAnnouncement);
        let json = serde_json::to_value(&filter).unwrap();
        assert_eq!(json["kinds"], serde_json::json!([31990]));
        assert!(json.get("authors").is_none());
        assert!(json.get("since").is_none());
    }

    #[test]
    fn test_filter_builder() {
        let author = Pubkey::new("aa");
        let filter = EventFilter::kind(EventKind::JobRequest)
            .author(&author)
            .since(1700000000);
        assert_eq!(filter.authors, vec!["aa".to_string()]);
        assert_eq!(filter.since, Some(1700000000));
    }
}
