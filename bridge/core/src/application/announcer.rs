// Copyright (c) 2026 dvmcp contributors
// SPDX-License-Identifier: AGPL-3.0

// Announcement Manager.
//
// Maintains the bridge's public presence on the relay network: relay-list
// metadata, the replaceable service/tool-catalog announcement, and explicit
// retraction. The announcement is re-derived from the live tool catalog on
// every update; the stable `d` tag makes republishing replace rather than
// duplicate.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::info;

use crate::domain::config::{BridgeConfig, McpConfig};
use crate::domain::error::BridgeError;
use crate::domain::event::{EventKind, EventSigner, EventTemplate, RelayEvent, Tag};
use crate::domain::relay::{EventFilter, RelayTransport};
use crate::domain::tool::ToolPool;

/// Protocol capability marker advertised on every service announcement.
const CAPABILITY_MARKER: &str = "mcp-1.0";

/// Fixed discoverability topic shared by all MCP bridge services.
const SERVICE_TOPIC: &str = "mcp";

pub struct Announcer {
    signer: Arc<dyn EventSigner>,
    relay: Arc<dyn RelayTransport>,
    pool: Arc<dyn ToolPool>,
    profile: McpConfig,
    relay_urls: Vec<String>,
}

impl Announcer {
    pub fn new(
        signer: Arc<dyn EventSigner>,
        relay: Arc<dyn RelayTransport>,
        pool: Arc<dyn ToolPool>,
        config: &BridgeConfig,
    ) -> Self {
        Self {
            signer,
            relay,
            pool,
            profile: config.mcp.clone(),
            relay_urls: config.nostr.relay_urls.clone(),
        }
    }

    /// Stable identifier binding all announcement revisions together.
    fn announcement_identifier(&self) -> String {
        format!("dvm-announcement-{}", self.profile.client_name)
    }

    /// Publish relay-list metadata: one `r` tag per configured relay.
    pub async fn announce_relay_list(&self) -> Result<(), BridgeError> {
        let template = EventTemplate::new(EventKind::RelayList)
            .tags(self.relay_urls.iter().map(Tag::relay));
        let event = self.signer.sign(template)?;
        self.relay.publish(event).await?;
        info!("announced relay list metadata");
        Ok(())
    }

    /// Query the tool pool and publish the service announcement. Returns
    /// the number of advertised tools.
    pub async fn announce_service(&self) -> Result<usize, BridgeError> {
        let tools = self.pool.list_tools().await?;

        let mut body = Map::new();
        body.insert("name".to_string(), Value::String(self.profile.name.clone()));
        body.insert("about".to_string(), Value::String(self.profile.about.clone()));
        for (field, value) in [
            ("picture", &self.profile.picture),
            ("website", &self.profile.website),
            ("banner", &self.profile.banner),
        ] {
            if let Some(value) = value {
                body.insert(field.to_string(), Value::String(value.clone()));
            }
        }
        body.insert(
            "tools".to_string(),
            serde_json::to_value(&tools)
                .map_err(|e| BridgeError::Signing(format!("failed to serialize catalog: {e}")))?,
        );

        let template = EventTemplate::new(EventKind::ServiceAnnouncement)
            .content(Value::Object(body).to_string())
            .tag(Tag::identifier(self.announcement_identifier()))
            .tag(Tag::kind(EventKind::JobRequest))
            .tag(Tag::capabilities(CAPABILITY_MARKER))
            .tag(Tag::topic(SERVICE_TOPIC))
            .tags(tools.iter().map(|tool| Tag::topic(tool.name.clone())));

        let event = self.signer.sign(template)?;
        self.relay.publish(event).await?;
        info!(tools = tools.len(), "announced service");
        Ok(tools.len())
    }

    /// Publish the service announcement and the relay list concurrently.
    ///
    /// A partial announcement is considered incomplete, so the first
    /// failure propagates even though both publishes are always attempted.
    pub async fn update_announcement(&self) -> Result<usize, BridgeError> {
        let (count, ()) = tokio::try_join!(self.announce_service(), self.announce_relay_list())?;
        Ok(count)
    }

    /// Retract previously published announcements (NIP-09).
    ///
    /// Queries the relays for announcements authored by this identity and
    /// publishes one deletion event referencing each found id. With zero
    /// prior announcements the retraction still publishes with an empty
    /// reference set; retraction is idempotent.
    pub async fn delete_announcement(&self, reason: &str) -> Result<RelayEvent, BridgeError> {
        let filter = EventFilter::kind(EventKind::ServiceAnnouncement)
            .author(&self.signer.public_key());
        let prior = self.relay.query(filter).await?;

        let template = EventTemplate::new(EventKind::Deletion)
            .content(reason)
            .tags(prior.iter().map(|event| Tag::event(&event.id)))
            .tag(Tag::kind(EventKind::ServiceAnnouncement));

        let event = self.signer.sign(template)?;
        self.relay.publish(event.clone()).await?;
        info!(retracted = prior.len(), "published announcement retraction");
        Ok(event)
    }
}
