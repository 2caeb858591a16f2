// Copyright (c) 2026 dvmcp contributors
// SPDX-License-Identifier: AGPL-3.0

use thiserror::Error;

/// Errors that can occur while bridging relay events to backend tools.
///
/// Transport and signing failures during startup are fatal to the process;
/// during request handling every variant is confined to the task handling
/// the one offending event.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("backend error: {0}")]
    Backend(String),

    #[error("malformed job request: {0}")]
    MalformedRequest(String),

    #[error("signing error: {0}")]
    Signing(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl BridgeError {
    /// Human-readable message carried in `error` status tags.
    pub fn status_message(&self) -> String {
        match self {
            Self::Backend(msg) | Self::MalformedRequest(msg) => msg.clone(),
            other => other.to_string(),
        }
    }
}
