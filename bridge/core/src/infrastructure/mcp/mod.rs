// Copyright (c) 2026 dvmcp contributors
// SPDX-License-Identifier: AGPL-3.0

//! Tool backend pool over stdio JSON-RPC.
//!
//! One child process per configured backend. Requests to a single backend
//! are serialized over its pipe; different backends run in parallel. Tool
//! names are routed to the first backend that advertises them.

mod stdio;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::domain::config::McpServerConfig;
use crate::domain::error::BridgeError;
use crate::domain::tool::{ToolCatalog, ToolPool};

use stdio::StdioClient;

pub struct McpPool {
    configs: Vec<McpServerConfig>,
    client_name: String,
    clients: Mutex<Vec<Arc<StdioClient>>>,
    /// Tool name to index into `clients`; first backend to advertise a
    /// name wins.
    routing: Mutex<HashMap<String, usize>>,
}

impl McpPool {
    pub fn new(configs: Vec<McpServerConfig>, client_name: impl Into<String>) -> Self {
        Self {
            configs,
            client_name: client_name.into(),
            clients: Mutex::new(Vec::new()),
            routing: Mutex::new(HashMap::new()),
        }
    }

    fn current_clients(&self) -> Vec<Arc<StdioClient>> {
        self.clients.lock().unwrap().clone()
    }
}

#[async_trait]
impl ToolPool for McpPool {
    async fn connect(&self) -> Result<(), BridgeError> {
        let mut clients = Vec::with_capacity(self.configs.len());
        for config in &self.configs {
            let client = StdioClient::spawn(config)?;
            client.initialize(&self.client_name).await?;
            info!(backend = %config.name, command = %config.command, "backend ready");
            clients.push(Arc::new(client));
        }
        *self.clients.lock().unwrap() = clients;
        // Prime routing so calls can be dispatched before any listing.
        self.list_tools().await?;
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), BridgeError> {
        let clients: Vec<Arc<StdioClient>> = self.clients.lock().unwrap().drain(..).collect();
        self.routing.lock().unwrap().clear();
        for client in clients {
            client.shutdown().await;
        }
        Ok(())
    }

    async fn list_tools(&self) -> Result<ToolCatalog, BridgeError> {
        let mut catalog = ToolCatalog::new();
        let mut routing = HashMap::new();
        for (index, client) in self.current_clients().iter().enumerate() {
            let tools = client.list_tools().await?;
            debug!(backend = %client.name(), tools = tools.len(), "listed tools");
            for tool in tools {
                if routing.contains_key(&tool.name) {
                    warn!(tool = %tool.name, backend = %client.name(), "duplicate tool name ignored");
                    continue;
                }
                routing.insert(tool.name.clone(), index);
                catalog.push(tool);
            }
        }
        *self.routing.lock().unwrap() = routing;
        Ok(catalog)
    }

    async fn call_tool(&self, name: &str, params: Value) -> Result<Value, BridgeError> {
        let index = self.routing.lock().unwrap().get(name).copied();
        let Some(index) = index else {
            return Err(BridgeError::Backend(format!(
                "no backend provides tool {name}"
            )));
        };
        let client = self
            .current_clients()
            .get(index)
            .cloned()
            .ok_or_else(|| BridgeError::Backend("backend pool not connected".to_string()))?;
        client.call_tool(name, params).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Shell stand-in for a tool backend: answers the fixed request
    /// sequence the pool issues (initialize, initialized notification,
    /// tools/list) plus one tools/call.
    const FAKE_BACKEND: &str = r#"
read init
echo '{"jsonrpc":"2.0","id":1,"result":{"protocolVersion":"2024-11-05","capabilities":{}}}'
read initialized
read list
echo '{"jsonrpc":"2.0","id":2,"result":{"tools":[{"name":"echo","description":"echoes input","inputSchema":{"type":"object"}}]}}'
read call
echo '{"jsonrpc":"2.0","id":3,"result":{"content":[{"type":"text","text":"hello"}]}}'
"#;

    fn backend_config(script: &str) -> McpServerConfig {
        McpServerConfig {
            name: "fake".to_string(),
            command: "sh".to_string(),
            args: vec!["-c".to_string(), script.to_string()],
            env: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn test_pool_lists_tools_over_stdio() {
        // Serves the connect-time listing plus one explicit listing.
        let script = r#"
read init
echo '{"jsonrpc":"2.0","id":1,"result":{"protocolVersion":"2024-11-05","capabilities":{}}}'
read initialized
read list
echo '{"jsonrpc":"2.0","id":2,"result":{"tools":[{"name":"echo","description":"echoes input","inputSchema":{"type":"object"}}]}}'
read list
echo '{"jsonrpc":"2.0","id":3,"result":{"tools":[{"name":"echo","description":"echoes input","inputSchema":{"type":"object"}}]}}'
"#;
        let pool = McpPool::new(vec![backend_config(script)], "dvmcp-test");
        pool.connect().await.unwrap();

        let catalog = pool.list_tools().await.unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog[0].name, "echo");
        assert_eq!(catalog[0].description, "echoes input");
        pool.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_call_routes_to_advertising_backend() {
        let pool = McpPool::new(vec![backend_config(FAKE_BACKEND)], "dvmcp-test");
        pool.connect().await.unwrap();

        let result = pool
            .call_tool("echo", serde_json::json!({"text": "hello"}))
            .await
            .unwrap();
        assert_eq!(result["content"][0]["text"], "hello");
        pool.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_unknown_tool_is_backend_error() {
        let pool = McpPool::new(vec![backend_config(FAKE_BACKEND)], "dvmcp-test");
        pool.connect().await.unwrap();

        let err = pool
            .call_tool("missing", serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::Backend(message) if message.contains("missing")));
        pool.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_tool_error_result_is_backend_error() {
        let script = r#"
read init
echo '{"jsonrpc":"2.0","id":1,"result":{"protocolVersion":"2024-11-05","capabilities":{}}}'
read initialized
read list
echo '{"jsonrpc":"2.0","id":2,"result":{"tools":[{"name":"boom","inputSchema":{"type":"object"}}]}}'
read call
echo '{"jsonrpc":"2.0","id":3,"result":{"isError":true,"content":[{"type":"text","text":"tool exploded"}]}}'
"#;
        let pool = McpPool::new(vec![backend_config(script)], "dvmcp-test");
        pool.connect().await.unwrap();

        let err = pool
            .call_tool("boom", serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::Backend(message) if message.contains("tool exploded")));
        pool.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_spawn_failure_is_backend_error() {
        let config = McpServerConfig {
            name: "broken".to_string(),
            command: "/nonexistent-backend-binary".to_string(),
            args: vec![],
            env: HashMap::new(),
        };
        let pool = McpPool::new(vec![config], "dvmcp-test");
        let err = pool.connect().await.unwrap_err();
        assert!(matches!(err, BridgeError::Backend(_)));
    }
}
