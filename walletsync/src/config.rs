// Copyright (c) WalletSync Contributors
// SPDX-License-Identifier: Apache-2.0

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{WalletError, WalletResult};

/// Complete node configuration, loaded from a YAML file with `${VAR}`
/// substitution and `WALLETSYNC_`-prefixed environment overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub chain: ChainConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub rpc_server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    #[serde(default = "default_chain_name")]
    pub chain_name: String,
    #[serde(default = "default_network")]
    pub network: String,
    pub account_rpc_url: String,
    #[serde(default)]
    pub starting_height: Option<u64>,
    #[serde(default = "default_confirmations")]
    pub confirmations: u64,
    #[serde(default = "default_blocks_step")]
    pub blocks_step: u64,
    #[serde(default = "default_interval_ms")]
    pub synchronizer_interval_ms: u64,
    #[serde(default = "default_interval_ms")]
    pub worker_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_rpc_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_rpc_port(),
        }
    }
}

fn default_chain_name() -> String {
    "Ethereum".to_string()
}

fn default_network() -> String {
    "mainnet".to_string()
}

fn default_confirmations() -> u64 {
    3
}

fn default_blocks_step() -> u64 {
    10
}

fn default_interval_ms() -> u64 {
    5_000
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_rpc_port() -> u16 {
    8189
}

impl ChainConfig {
    pub fn synchronizer_interval(&self) -> Duration {
        Duration::from_millis(self.synchronizer_interval_ms)
    }

    pub fn worker_interval(&self) -> Duration {
        Duration::from_millis(self.worker_interval_ms)
    }
}

impl Config {
    pub fn from_file(path: &Path) -> WalletResult<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| WalletError::Config(format!("failed to read config {path:?}: {e}")))?;
        Self::from_yaml(&contents)
    }

    pub fn from_yaml(contents: &str) -> WalletResult<Self> {
        let contents = substitute_env_vars(contents);
        let mut config: Config = serde_yaml::from_str(&contents)
            .map_err(|e| WalletError::Config(format!("failed to parse config: {e}")))?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("WALLETSYNC_DATABASE_URL") {
            self.database.url = url;
        }
        if let Ok(url) = std::env::var("WALLETSYNC_ACCOUNT_RPC_URL") {
            self.chain.account_rpc_url = url;
        }
        if let Ok(port) = std::env::var("WALLETSYNC_RPC_PORT") {
            match port.parse() {
                Ok(port) => self.rpc_server.port = port,
                Err(_) => warn!(%port, "ignoring unparseable WALLETSYNC_RPC_PORT"),
            }
        }
    }

    fn validate(&self) -> WalletResult<()> {
        if self.database.url.is_empty() {
            return Err(WalletError::Config("database.url is required".into()));
        }
        if self.chain.account_rpc_url.is_empty() {
            return Err(WalletError::Config("chain.account_rpc_url is required".into()));
        }
        if self.chain.blocks_step == 0 {
            return Err(WalletError::Config("chain.blocks_step must be positive".into()));
        }
        Ok(())
    }
}

/// Substitute `${VAR_NAME}` placeholders with environment values; unset
/// variables keep their placeholder.
fn substitute_env_vars(content: &str) -> String {
    let re = regex::Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap();
    let mut result = content.to_string();

    for cap in re.captures_iter(content) {
        let full_match = &cap[0];
        let var_name = &cap[1];
        if let Ok(value) = std::env::var(var_name) {
            result = result.replace(full_match, &value);
        } else {
            warn!(var_name, "environment variable not found, keeping placeholder");
        }
    }

    result
}
