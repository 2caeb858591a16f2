// Copyright (c) 2026 dvmcp contributors
// SPDX-License-Identifier: AGPL-3.0

//! # dvmcp-bridge
//!
//! Runs the relay-to-MCP bridge: spawns the configured tool backends,
//! announces their aggregated catalog on the configured relays, and serves
//! job requests until interrupted.
//!
//! ## Commands
//!
//! - `dvmcp-bridge run` (default) - Start the bridge and serve requests
//! - `dvmcp-bridge retract` - Publish a retraction for prior announcements

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::info;

use dvmcp_bridge_core::application::{Announcer, Bridge, RequestGateway};
use dvmcp_bridge_core::domain::config::BridgeConfig;
use dvmcp_bridge_core::domain::relay::RelayTransport;
use dvmcp_bridge_core::domain::whitelist::WhitelistPolicy;
use dvmcp_bridge_core::infrastructure::mcp::McpPool;
use dvmcp_bridge_core::infrastructure::relay_pool::RelayPool;
use dvmcp_bridge_core::infrastructure::signer::KeyManager;

/// Bridge MCP tool servers onto relays
#[derive(Parser)]
#[command(name = "dvmcp-bridge")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (default: ./dvmcp.yml)
    #[arg(
        short,
        long,
        global = true,
        env = "DVMCP_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "DVMCP_LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the bridge and serve requests until interrupted
    #[command(name = "run")]
    Run,

    /// Publish a deletion request covering prior service announcements
    #[command(name = "retract")]
    Retract {
        /// Reason recorded in the deletion event
        #[arg(long, default_value = "Service offline")]
        reason: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level)?;

    let config = BridgeConfig::load_or_default(cli.config).context("failed to load config")?;

    match cli.command {
        Some(Commands::Retract { reason }) => retract(config, &reason).await,
        Some(Commands::Run) | None => run(config).await,
    }
}

/// Wire the production components from configuration. The relay pool is
/// returned separately because connecting it is the caller's first step.
fn build_bridge(config: &BridgeConfig) -> Result<(Arc<RelayPool>, Bridge)> {
    let signer = Arc::new(
        KeyManager::from_hex(&config.nostr.private_key).context("failed to load signing key")?,
    );
    let relay = Arc::new(RelayPool::new(config.nostr.relay_urls.clone()));
    let pool = Arc::new(McpPool::new(
        config.mcp.servers.clone(),
        config.mcp.client_name.clone(),
    ));
    let announcer = Arc::new(Announcer::new(
        signer.clone(),
        relay.clone(),
        pool.clone(),
        config,
    ));
    let whitelist = WhitelistPolicy::from_config(config.whitelist.allowed_pubkeys.as_deref());
    let gateway = Arc::new(RequestGateway::new(signer, relay.clone(), pool.clone(), whitelist));
    let bridge = Bridge::new(pool, relay.clone(), announcer, gateway);
    Ok((relay, bridge))
}

async fn run(config: BridgeConfig) -> Result<()> {
    let relay_urls = config.nostr.relay_urls.clone();
    let (relay, bridge) = build_bridge(&config)?;

    relay
        .connect()
        .await
        .context("failed to connect to relays")?;
    bridge.start().await?;
    info!(relays = relay_urls.len(), "bridge is running, press Ctrl+C to stop");

    shutdown_signal().await;

    info!("shutting down");
    bridge.stop().await?;
    Ok(())
}

async fn retract(config: BridgeConfig, reason: &str) -> Result<()> {
    let signer = Arc::new(
        KeyManager::from_hex(&config.nostr.private_key).context("failed to load signing key")?,
    );
    let relay = Arc::new(RelayPool::new(config.nostr.relay_urls.clone()));
    relay
        .connect()
        .await
        .context("failed to connect to relays")?;

    let pool = Arc::new(McpPool::new(
        config.mcp.servers.clone(),
        config.mcp.client_name.clone(),
    ));
    let announcer = Announcer::new(signer, relay.clone(), pool, &config);
    let deletion = announcer
        .delete_announcement(reason)
        .await
        .context("failed to publish retraction")?;
    info!(event_id = %deletion.id, "retraction published");

    relay.shutdown().await;
    Ok(())
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}
