// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Discovery server configuration.

use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;

/// Discovery server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to (default: 0.0.0.0)
    #[serde(default = "default_bind_address")]
    pub bind_address: IpAddr,

    /// UDP port to listen on (default: 8002, matching the reference beacon)
    #[serde(default = "default_port")]
    pub port: u16,

    /// How long a peer's last HEARTBEAT or DISCPEER may age before the
    /// reaper evicts it.
    #[serde(default = "default_peer_ttl_secs")]
    pub peer_ttl_secs: u64,

    /// Reaper sweep period.
    #[serde(default = "default_reaper_interval_secs")]
    pub reaper_interval_secs: u64,

    /// Maximum number of concurrently registered peers.
    #[serde(default = "default_max_registry_size")]
    pub max_registry_size: usize,

    /// Maximum LISTPEER datagram payload, in bytes, including the 2-byte
    /// header; bounds how many peer entries are packed per datagram.
    #[serde(default = "default_max_datagram_payload")]
    pub max_datagram_payload: usize,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_bind_address() -> IpAddr {
    "0.0.0.0".parse().unwrap()
}

fn default_port() -> u16 {
    8002
}

fn default_peer_ttl_secs() -> u64 {
    60
}

fn default_reaper_interval_secs() -> u64 {
    10
}

fn default_max_registry_size() -> usize {
    10_000
}

fn default_max_datagram_payload() -> usize {
    1100
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            peer_ttl_secs: default_peer_ttl_secs(),
            reaper_interval_secs: default_reaper_interval_secs(),
            max_registry_size: default_max_registry_size(),
            max_datagram_payload: default_max_datagram_payload(),
            log_level: default_log_level(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Save configuration to a JSON file.
    pub fn to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::Serialize(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| ConfigError::Io(e.to_string()))
    }

    pub fn peer_ttl(&self) -> Duration {
        Duration::from_secs(self.peer_ttl_secs)
    }

    pub fn reaper_interval(&self) -> Duration {
        Duration::from_secs(self.reaper_interval_secs)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::InvalidValue("port cannot be 0".into()));
        }
        if self.peer_ttl_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "peer_ttl_secs cannot be 0".into(),
            ));
        }
        if self.reaper_interval_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "reaper_interval_secs cannot be 0".into(),
            ));
        }
        if self.max_registry_size == 0 {
            return Err(ConfigError::InvalidValue(
                "max_registry_size cannot be 0".into(),
            ));
        }
        if self.max_datagram_payload < 2 + overlay_core::wire::PEER_ENTRY_LEN {
            return Err(ConfigError::InvalidValue(
                "max_datagram_payload must fit at least one peer entry".into(),
            ));
        }
        Ok(())
    }
}

/// Configuration error types.
#[derive(Debug, Clone)]
pub enum ConfigError {
    Io(String),
    Parse(String),
    Serialize(String),
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(s) => write!(f, "I/O error: {}", s),
            Self::Parse(s) => write!(f, "parse error: {}", s),
            Self::Serialize(s) => write!(f, "serialize error: {}", s),
            Self::InvalidValue(s) => write!(f, "invalid value: {}", s),
        }
    }
}

impl std::error::Error for ConfigError {}
