// Copyright (c) 2026 dvmcp contributors
// SPDX-License-Identifier: AGPL-3.0

// Bridge configuration schema.
//
// Loaded from a YAML file once at startup; every section is read-only at
// runtime. The whitelist is optional; leaving it out means open access.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::error::BridgeError;

/// Top-level bridge configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Relay identity and endpoints.
    pub nostr: NostrConfig,

    /// Backend MCP servers and the public service profile.
    pub mcp: McpConfig,

    /// Requester authorization.
    #[serde(default)]
    pub whitelist: WhitelistConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NostrConfig {
    /// 32-byte signing seed, hex encoded.
    pub private_key: String,

    /// Relay endpoints the bridge listens and publishes on.
    pub relay_urls: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpConfig {
    /// Human-readable service name.
    pub name: String,

    /// Service description shown in the announcement.
    pub about: String,

    /// Stable client identifier; drives the announcement's replaceable
    /// `d` tag.
    pub client_name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub banner: Option<String>,

    /// Backend servers whose tools are aggregated and advertised.
    pub servers: Vec<McpServerConfig>,
}

/// One backend MCP server reachable over stdio.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpServerConfig {
    pub name: String,

    /// Executable to spawn.
    pub command: String,

    #[serde(default)]
    pub args: Vec<String>,

    /// Extra environment for the child process.
    #[serde(default)]
    pub env: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WhitelistConfig {
    /// Authorized requester pubkeys. Absent means open access.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_pubkeys: Option<Vec<String>>,
}

impl BridgeConfig {
    /// Load and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self, BridgeError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| BridgeError::Config(format!("failed to read {}: {e}", path.display())))?;
        let config: Self = serde_yaml::from_str(&content)
            .map_err(|e| BridgeError::Config(format!("failed to parse {}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from an explicit path, or fall back to `dvmcp.yml` in the
    /// working directory.
    pub fn load_or_default(cli_path: Option<PathBuf>) -> Result<Self, BridgeError> {
        let path = cli_path.unwrap_or_else(|| PathBuf::from("dvmcp.yml"));
        Self::load(&path)
    }

    fn validate(&self) -> Result<(), BridgeError> {
        if self.nostr.relay_urls.is_empty() {
            return Err(BridgeError::Config(
                "nostr.relay_urls must list at least one relay".to_string(),
            ));
        }
        if self.nostr.private_key.len() != 64
            || !self.nostr.private_key.chars().all(|c| c.is_ascii_hexdigit())
        {
            return Err(BridgeError::Config(
                "nostr.private_key must be a 64-character hex string".to_string(),
            ));
        }
        if self.mcp.client_name.is_empty() {
            return Err(BridgeError::Config(
                "mcp.client_name must not be empty".to_string(),
            ));
        }
        if self.mcp.servers.is_empty() {
            return Err(BridgeError::Config(
                "mcp.servers must list at least one backend server".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const VALID: &str = r#"
nostr:
  private_key: "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"
  relay_urls:
    - "wss://relay.example.com"
mcp:
  name: "Example DVM"
  about: "Bridges MCP tools to Nostr"
  client_name: "example-bridge"
  servers:
    - name: "tools"
      command: "example-mcp-server"
      args: ["--stdio"]
"#;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_valid_config() {
        let file = write_config(VALID);
        let config = BridgeConfig::load(file.path()).unwrap();
        assert_eq!(config.mcp.servers.len(), 1);
        assert_eq!(config.mcp.servers[0].args, vec!["--stdio".to_string()]);
        assert!(config.whitelist.allowed_pubkeys.is_none());
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = BridgeConfig::load(Path::new("/nonexistent/dvmcp.yml")).unwrap_err();
        assert!(matches!(err, BridgeError::Config(_)));
    }

    #[test]
    fn test_rejects_empty_relay_list() {
        let broken = VALID.replace(
            "  relay_urls:\n    - \"wss://relay.example.com\"",
            "  relay_urls: []",
        );
        let file = write_config(&broken);
        let err = BridgeConfig::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("relay_urls"));
    }

    #[test]
    fn test_rejects_bad_private_key() {
        let broken = VALID.replace(
            "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa",
            "not-a-key",
        );
        let file = write_config(&broken);
        let err = BridgeConfig::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("private_key"));
    }

    #[test]
    fn test_whitelist_section_parses() {
        let with_whitelist = format!(
            "{VALID}whitelist:\n  allowed_pubkeys:\n    - \"abc123\"\n"
        );
        let file = write_config(&with_whitelist);
        let config = BridgeConfig::load(file.path()).unwrap();
        assert_eq!(
            config.whitelist.allowed_pubkeys,
            Some(vec!["abc123".to_string()])
        );
    }
}
