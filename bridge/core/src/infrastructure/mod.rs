// Copyright (c) 2026 dvmcp contributors
// SPDX-License-Identifier: AGPL-3.0

pub mod mcp;
pub mod memory;
pub mod relay_pool;
pub mod signer;

pub use mcp::McpPool;
pub use relay_pool::RelayPool;
pub use signer::KeyManager;
