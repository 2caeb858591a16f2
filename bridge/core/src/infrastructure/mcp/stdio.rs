// Copyright (c) 2026 dvmcp contributors
// SPDX-License-Identifier: AGPL-3.0

// Newline-delimited JSON-RPC 2.0 client over a child process's stdio.

use std::process::Stdio;
use std::sync::atomic::{AtomicI64, Ordering};

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::domain::config::McpServerConfig;
use crate::domain::error::BridgeError;
use crate::domain::tool::ToolDescriptor;

const PROTOCOL_VERSION: &str = "2024-11-05";

struct Pipe {
    stdin: ChildStdin,
    lines: Lines<BufReader<ChildStdout>>,
}

pub struct StdioClient {
    name: String,
    child: Mutex<Child>,
    /// Guards the full request/response exchange; requests to one backend
    /// are strictly serialized.
    pipe: Mutex<Pipe>,
    next_id: AtomicI64,
}

impl StdioClient {
    pub fn spawn(config: &McpServerConfig) -> Result<Self, BridgeError> {
        let mut child = Command::new(&config.command)
            .args(&config.args)
            .envs(&config.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                BridgeError::Backend(format!(
                    "failed to spawn {} ({}): {e}",
                    config.name, config.command
                ))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| BridgeError::Backend(format!("{}: no stdin pipe", config.name)))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| BridgeError::Backend(format!("{}: no stdout pipe", config.name)))?;

        if let Some(stderr) = child.stderr.take() {
            let name = config.name.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    warn!(backend = %name, line = %line, "backend stderr");
                }
            });
        }

        Ok(Self {
            name: config.name.clone(),
            child: Mutex::new(child),
            pipe: Mutex::new(Pipe {
                stdin,
                lines: BufReader::new(stdout).lines(),
            }),
            next_id: AtomicI64::new(1),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Perform the MCP handshake: an `initialize` exchange followed by the
    /// `notifications/initialized` notification.
    pub async fn initialize(&self, client_name: &str) -> Result<(), BridgeError> {
        self.request(
            "initialize",
            serde_json::json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {},
                "clientInfo": {
                    "name": client_name,
                    "version": env!("CARGO_PKG_VERSION"),
                },
            }),
        )
        .await?;
        self.notify("notifications/initialized").await
    }

    pub async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, BridgeError> {
        let result = self.request("tools/list", serde_json::json!({})).await?;
        let tools = result.get("tools").cloned().unwrap_or(Value::Array(vec![]));
        serde_json::from_value(tools)
            .map_err(|e| BridgeError::Backend(format!("{}: malformed tool listing: {e}", self.name)))
    }

    /// Invoke a tool and return the raw result object. A result flagged
    /// `isError` is surfaced as a backend error carrying its text content.
    pub async fn call_tool(&self, name: &str, params: Value) -> Result<Value, BridgeError> {
        let result = self
            .request(
                "tools/call",
                serde_json::json!({"name": name, "arguments": params}),
            )
            .await?;
        if result
            .get("isError")
            .and_then(Value::as_bool)
            .unwrap_or(false)
        {
            return Err(BridgeError::Backend(error_text(&result)));
        }
        Ok(result)
    }

    pub async fn shutdown(&self) {
        if let Err(e) = self.child.lock().await.kill().await {
            debug!(backend = %self.name, reason = %e, "kill failed");
        }
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, BridgeError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let frame = serde_json::json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let mut pipe = self.pipe.lock().await;
        pipe.stdin
            .write_all(format!("{frame}\n").as_bytes())
            .await
            .map_err(|e| BridgeError::Backend(format!("{}: write failed: {e}", self.name)))?;
        pipe.stdin
            .flush()
            .await
            .map_err(|e| BridgeError::Backend(format!("{}: flush failed: {e}", self.name)))?;

        loop {
            let line = pipe
                .lines
                .next_line()
                .await
                .map_err(|e| BridgeError::Backend(format!("{}: read failed: {e}", self.name)))?
                .ok_or_else(|| {
                    BridgeError::Backend(format!("{}: backend closed its output", self.name))
                })?;
            if line.trim().is_empty() {
                continue;
            }
            let message: Value = match serde_json::from_str(&line) {
                Ok(message) => message,
                Err(e) => {
                    debug!(backend = %self.name, reason = %e, "skipping unparseable line");
                    continue;
                }
            };
            // Server-initiated notifications and stale responses are
            // skipped until our id comes back.
            if message.get("id").and_then(Value::as_i64) != Some(id) {
                continue;
            }
            if let Some(error) = message.get("error") {
                let detail = error
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown error");
                return Err(BridgeError::Backend(format!("{}: {detail}", self.name)));
            }
            return Ok(message.get("result").cloned().unwrap_or(Value::Null));
        }
    }

    async fn notify(&self, method: &str) -> Result<(), BridgeError> {
        let frame = serde_json::json!({"jsonrpc": "2.0", "method": method});
        let mut pipe = self.pipe.lock().await;
        pipe.stdin
            .write_all(format!("{frame}\n").as_bytes())
            .await
            .map_err(|e| BridgeError::Backend(format!("{}: write failed: {e}", self.name)))?;
        pipe.stdin
            .flush()
            .await
            .map_err(|e| BridgeError::Backend(format!("{}: flush failed: {e}", self.name)))
    }
}

fn error_text(result: &Value) -> String {
    let joined = result
        .get("content")
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| part.get("text").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join("\n")
        })
        .unwrap_or_default();
    if joined.is_empty() {
        "tool call failed".to_string()
    } else {
        joined
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_text_joins_content_parts() {
        let result = serde_json::json!({
            "isError": true,
            "content": [
                {"type": "text", "text": "first"},
                {"type": "text", "text": "second"},
            ],
        });
        assert_eq!(error_text(&result), "first\nsecond");
    }

    #[test]
    fn test_error_text_falls_back_without_content() {
        assert_eq!(error_text(&serde_json::json!({})), "tool call failed");
    }
}
