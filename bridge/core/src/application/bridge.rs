// Copyright (c) 2026 dvmcp contributors
// SPDX-License-Identifier: AGPL-3.0

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::application::announcer::Announcer;
use crate::application::gateway::RequestGateway;
use crate::domain::event::EventKind;
use crate::domain::relay::RelayTransport;
use crate::domain::tool::ToolPool;

/// Thin orchestrator owning the bridge lifecycle: wires the tool pool,
/// announcement manager, and request gateway together and guards against
/// duplicate start/stop.
pub struct Bridge {
    pool: Arc<dyn ToolPool>,
    relay: Arc<dyn RelayTransport>,
    announcer: Arc<Announcer>,
    gateway: Arc<RequestGateway>,
    running: AtomicBool,
}

impl Bridge {
    pub fn new(
        pool: Arc<dyn ToolPool>,
        relay: Arc<dyn RelayTransport>,
        announcer: Arc<Announcer>,
        gateway: Arc<RequestGateway>,
    ) -> Self {
        Self {
            pool,
            relay,
            announcer,
            gateway,
            running: AtomicBool::new(false),
        }
    }

    /// Connect backends, publish announcements, and begin serving requests.
    ///
    /// Idempotent: a second start is a logged no-op. Any failure aborts
    /// startup and propagates; partial side effects (an announcement that
    /// already went out) are not rolled back.
    pub async fn start(&self) -> Result<()> {
        if self.running.load(Ordering::SeqCst) {
            info!("bridge is already running");
            return Ok(());
        }

        info!("connecting to MCP servers");
        self.pool
            .connect()
            .await
            .context("failed to connect to MCP servers")?;

        let tools = self
            .pool
            .list_tools()
            .await
            .context("failed to list MCP tools")?;
        info!(tools = tools.len(), "available MCP tools across all servers");

        info!("announcing service to the relay network");
        self.announcer
            .update_announcement()
            .await
            .context("failed to announce service")?;

        self.relay
            .subscribe(EventKind::JobRequest, self.gateway.clone())
            .await
            .context("failed to subscribe to job requests")?;

        self.running.store(true, Ordering::SeqCst);
        info!("bridge is running and ready to handle requests");
        Ok(())
    }

    /// Disconnect backends and release relay subscriptions.
    ///
    /// Idempotent: stopping a bridge that is not running is a no-op. The
    /// announcement is deliberately left in place; retraction is an
    /// explicit operation on [`Bridge::announcer`], never implicit here.
    pub async fn stop(&self) -> Result<()> {
        if !self.running.load(Ordering::SeqCst) {
            return Ok(());
        }

        info!("stopping bridge");
        self.pool
            .disconnect()
            .await
            .context("failed to disconnect MCP servers")?;
        self.relay.shutdown().await;
        self.running.store(false, Ordering::SeqCst);
        info!("bridge stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// The announcement manager, exposed for explicit retraction.
    pub fn announcer(&self) -> &Announcer {
        &self.announcer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::config::BridgeConfig;
    use crate::domain::whitelist::WhitelistPolicy;
    use crate::infrastructure::memory::{RecordingRelay, StaticToolPool};
    use crate::infrastructure::signer::KeyManager;

    fn test_config() -> BridgeConfig {
        serde_yaml::from_str(
            r#"
nostr:
  private_key: "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"
  relay_urls:
    - "wss://relay.example"
mcp:
  name: "Test DVM"
  about: "Test bridge"
  client_name: "test-bridge"
  servers:
    - name: "tools"
      command: "true"
"#,
        )
        .unwrap()
    }

    fn build(relay: Arc<RecordingRelay>, pool: Arc<StaticToolPool>) -> Bridge {
        let signer: Arc<KeyManager> = Arc::new(KeyManager::generate());
        let config = test_config();
        let announcer = Arc::new(Announcer::new(
            signer.clone(),
            relay.clone(),
            pool.clone(),
            &config,
        ));
        let gateway = Arc::new(RequestGateway::new(
            signer,
            relay.clone(),
            pool.clone(),
            WhitelistPolicy::Open,
        ));
        Bridge::new(pool, relay, announcer, gateway)
    }

    #[tokio::test]
    async fn test_start_announces_and_subscribes() {
        let relay = Arc::new(RecordingRelay::new());
        let pool = Arc::new(StaticToolPool::new(vec![]));
        let bridge = build(relay.clone(), pool.clone());

        bridge.start().await.unwrap();
        assert!(bridge.is_running());
        assert!(pool.is_connected());
        assert_eq!(relay.subscription_count(), 1);
        // Service announcement plus relay list.
        assert_eq!(relay.published().len(), 2);
    }

    #[tokio::test]
    async fn test_start_twice_is_noop() {
        let relay = Arc::new(RecordingRelay::new());
        let pool = Arc::new(StaticToolPool::new(vec![]));
        let bridge = build(relay.clone(), pool);

        bridge.start().await.unwrap();
        bridge.start().await.unwrap();
        assert_eq!(relay.subscription_count(), 1);
        assert_eq!(relay.published().len(), 2);
    }

    #[tokio::test]
    async fn test_start_failure_propagates_and_stays_stopped() {
        let relay = Arc::new(RecordingRelay::new());
        let pool = Arc::new(StaticToolPool::new(vec![]).failing_connect("spawn failed"));
        let bridge = build(relay.clone(), pool);

        let err = bridge.start().await.unwrap_err();
        assert!(err.to_string().contains("failed to connect"));
        assert!(!bridge.is_running());
        assert_eq!(relay.subscription_count(), 0);
    }

    #[tokio::test]
    async fn test_stop_before_start_is_noop() {
        let relay = Arc::new(RecordingRelay::new());
        let pool = Arc::new(StaticToolPool::new(vec![]));
        let bridge = build(relay, pool.clone());

        bridge.stop().await.unwrap();
        assert!(!pool.is_connected());
    }

    #[tokio::test]
    async fn test_stop_disconnects_without_retracting() {
        let relay = Arc::new(RecordingRelay::new());
        let pool = Arc::new(StaticToolPool::new(vec![]));
        let bridge = build(relay.clone(), pool.clone());

        bridge.start().await.unwrap();
        bridge.stop().await.unwrap();

        assert!(!bridge.is_running());
        assert!(!pool.is_connected());
        assert!(relay.is_shut_down());
        // No deletion event was published on stop.
        assert!(relay
            .published()
            .iter()
            .all(|e| e.event_kind() != Some(EventKind::Deletion)));
    }
}
