// Copyright (c) 2026 dvmcp contributors
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::error::BridgeError;

/// A single callable tool advertised by a backend server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "inputSchema", default)]
    pub input_schema: Value,
}

/// Ordered union of every backend server's tools.
pub type ToolCatalog = Vec<ToolDescriptor>;

/// The backend tool pool: one or more MCP servers aggregated into a flat
/// catalog of callable tools.
///
/// Implementations must support concurrent use by many in-flight requests;
/// the gateway applies no synchronization of its own.
#[async_trait]
pub trait ToolPool: Send + Sync {
    /// Establish connections to every configured backend server.
    async fn connect(&self) -> Result<(), BridgeError>;

    /// Tear down backend connections.
    async fn disconnect(&self) -> Result<(), BridgeError>;

    /// Aggregate the current tool catalogs of all connected servers.
    async fn list_tools(&self) -> Result<ToolCatalog, BridgeError>;

    /// Execute a named tool call, returning its structured result.
    async fn call_tool(&self, name: &str, params: Value) -> Result<Value, BridgeError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_descriptor_uses_mcp_field_names() {
        let raw = json!({
            "name": "echo",
            "description": "Echo a message",
            "inputSchema": {"type": "object"}
        });
        let tool: ToolDescriptor = serde_json::from_value(raw).unwrap();
        assert_eq!(tool.name, "echo");
        assert_eq!(tool.input_schema, json!({"type": "object"}));

        let back = serde_json::to_value(&tool).unwrap();
        assert!(back.get("inputSchema").is_some());
    }

    #[test]
    fn test_descriptor_tolerates_sparse_listings() {
        let tool: ToolDescriptor = serde_json::from_value(json!({"name": "bare"})).unwrap();
        assert_eq!(tool.description, "");
        assert_eq!(tool.input_schema, Value::Null);
    }
}
