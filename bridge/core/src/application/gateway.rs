// Copyright (c) 2026 dvmcp contributors
// SPDX-License-Identifier: AGPL-3.0

// Request Gateway.
//
// Drives every inbound job-request event through the lifecycle
// Received -> Authorized|Rejected -> (ListRequest|JobDispatch) ->
// Processing -> Terminal. Each event is handled on its own task with no
// ordering or mutual exclusion between requests; correlation back to the
// request is carried on every emitted event, never in server-side state.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, warn};

use crate::domain::error::BridgeError;
use crate::domain::event::{EventKind, EventSigner, EventTemplate, RelayEvent, Tag};
use crate::domain::job::{Command, JobRequestPayload, JobStatus};
use crate::domain::relay::{RelayTransport, RequestHandler};
use crate::domain::tool::ToolPool;
use crate::domain::whitelist::WhitelistPolicy;

const UNAUTHORIZED_MESSAGE: &str = "Unauthorized: Pubkey not in whitelist";

pub struct RequestGateway {
    signer: Arc<dyn EventSigner>,
    relay: Arc<dyn RelayTransport>,
    pool: Arc<dyn ToolPool>,
    whitelist: WhitelistPolicy,
}

impl RequestGateway {
    pub fn new(
        signer: Arc<dyn EventSigner>,
        relay: Arc<dyn RelayTransport>,
        pool: Arc<dyn ToolPool>,
        whitelist: WhitelistPolicy,
    ) -> Self {
        Self {
            signer,
            relay,
            pool,
            whitelist,
        }
    }

    async fn process(&self, event: &RelayEvent) -> Result<(), BridgeError> {
        if !self.whitelist.allows(&event.pubkey) {
            warn!(
                event_id = %event.id,
                requester = %event.pubkey,
                "rejected request from non-whitelisted pubkey"
            );
            return self
                .publish_status(event, &JobStatus::Error(String::new()), UNAUTHORIZED_MESSAGE)
                .await;
        }

        if let Some(Command::ListTools) = Command::from_tag(event.tag_value("c")) {
            return self.handle_list_tools(event).await;
        }

        // Job dispatch. A payload that does not parse is never recognized
        // as a job, so no processing acknowledgment precedes the error.
        let payload = match JobRequestPayload::parse(event) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(
                    event_id = %event.id,
                    requester = %event.pubkey,
                    reason = %err,
                    "malformed job request payload"
                );
                return self
                    .publish_status(event, &JobStatus::Error(err.status_message()), "")
                    .await;
            }
        };

        // Early acknowledgment: the processing status is published (and its
        // publish completes or fails) before the backend call begins.
        self.publish_status(event, &JobStatus::Processing, "").await?;

        match self.pool.call_tool(&payload.name, payload.parameters).await {
            Ok(result) => {
                self.publish_status(event, &JobStatus::Success, "").await?;
                let content = serde_json::to_string(&result).map_err(|e| {
                    BridgeError::Signing(format!("failed to serialize tool result: {e}"))
                })?;
                self.publish_response(event, content).await?;
                debug!(event_id = %event.id, tool = %payload.name, "job completed");
                Ok(())
            }
            Err(err) => {
                warn!(
                    event_id = %event.id,
                    requester = %event.pubkey,
                    tool = %payload.name,
                    reason = %err,
                    "tool call failed"
                );
                self.publish_status(event, &JobStatus::Error(err.status_message()), "")
                    .await
            }
        }
    }

    /// Listing is treated as immediate, not a job: a single terminal
    /// response carrying the current catalog, no intermediate status.
    async fn handle_list_tools(&self, event: &RelayEvent) -> Result<(), BridgeError> {
        let tools = self.pool.list_tools().await?;
        let content = serde_json::to_string(&serde_json::json!({ "tools": tools }))
            .map_err(|e| BridgeError::Signing(format!("failed to serialize catalog: {e}")))?;
        self.publish_response(event, content).await
    }

    /// Emit a kind-7000 status event correlated to the request.
    async fn publish_status(
        &self,
        request: &RelayEvent,
        status: &JobStatus,
        content: &str,
    ) -> Result<(), BridgeError> {
        let template = EventTemplate::new(EventKind::JobStatus)
            .content(content)
            .tag(Tag::status(status))
            .tag(Tag::event(&request.id))
            .tag(Tag::pubkey(&request.pubkey));
        let signed = self.signer.sign(template)?;
        self.relay.publish(signed).await
    }

    /// Emit a kind-6910 response event carrying the payload, the request
    /// back-reference, and the full re-serialized request for audit.
    async fn publish_response(
        &self,
        request: &RelayEvent,
        content: String,
    ) -> Result<(), BridgeError> {
        let template = EventTemplate::new(EventKind::JobResponse)
            .content(content)
            .tag(Tag::request(request)?)
            .tag(Tag::event(&request.id))
            .tag(Tag::pubkey(&request.pubkey));
        let signed = self.signer.sign(template)?;
        self.relay.publish(signed).await
    }
}

#[async_trait]
impl RequestHandler for RequestGateway {
    /// Per-event error boundary: failures in one handling task are logged
    /// and swallowed so a bad event can never abort the subscription or
    /// other in-flight handlers.
    async fn handle(&self, event: RelayEvent) {
        if event.event_kind() != Some(EventKind::JobRequest) {
            debug!(event_id = %event.id, kind = event.kind, "ignoring non-request event");
            return;
        }
        if let Err(err) = self.process(&event).await {
            error!(
                event_id = %event.id,
                requester = %event.pubkey,
                reason = %err,
                "error handling request"
            );
        }
    }
}
