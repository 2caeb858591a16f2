// Copyright (c) 2026 dvmcp contributors
// SPDX-License-Identifier: AGPL-3.0
//! Core crate for the dvmcp bridge.
//!
//! Bridges the Nostr DVM protocol (signed, typed relay events) and the MCP
//! tool-invocation protocol (a pool of callable tools on backend servers).
//! The bridge announces the aggregated tool catalog on the relay network,
//! accepts job-request events, dispatches them to backend tools, and
//! reports job progress and results back as relay events.
//!
//! # Architecture
//!
//! - **domain**: wire event model, job/tool types, ports, configuration
//! - **application**: announcement manager, request gateway, orchestrator
//! - **infrastructure**: relay pool, MCP stdio pool, signer, fakes

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use domain::*;
