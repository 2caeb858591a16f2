// Copyright (c) 2026 dvmcp contributors
// SPDX-License-Identifier: AGPL-3.0

pub mod config;
pub mod error;
pub mod event;
pub mod job;
pub mod relay;
pub mod tool;
pub mod whitelist;

pub use config::BridgeConfig;
pub use error::BridgeError;
pub use event::{EventId, EventKind, EventSigner, EventTemplate, Pubkey, RelayEvent, Tag};
pub use job::{Command, JobRequestPayload, JobStatus};
pub use relay::{EventFilter, RelayTransport, RequestHandler};
pub use tool::{ToolCatalog, ToolDescriptor, ToolPool};
pub use whitelist::WhitelistPolicy;
