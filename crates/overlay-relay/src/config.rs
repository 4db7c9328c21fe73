// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Relay configuration.

use serde::{Deserialize, Serialize};
use std::net::SocketAddrV4;
use std::path::Path;
use std::time::Duration;

/// The reference's `{enable_cut_through, accept_unsol_conn, enable_relay}`
/// compile-time feature flags, carried as ordinary construction
/// configuration instead. None of the three alters the topology algorithm
/// in `controller`; they are recorded here so a binary built from this
/// config can resolve them once at startup the way the original resolves
/// them at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayFeatures {
    #[serde(default)]
    pub enable_cut_through: bool,
    #[serde(default)]
    pub accept_unsol_conn: bool,
    #[serde(default = "default_true")]
    pub enable_relay: bool,
}

impl Default for RelayFeatures {
    fn default() -> Self {
        Self {
            enable_cut_through: false,
            accept_unsol_conn: false,
            enable_relay: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Relay node configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// 32-bit protocol tag this node advertises (`MASTER`, `RELAY`, or a
    /// custom tag the capability table treats as inert).
    #[serde(default = "default_protocol_tag")]
    pub protocol_tag: u32,

    /// Local address the pub/sub node binds to.
    pub pubsub_bind_address: SocketAddrV4,

    /// Local address this node's own discovery-facing responder binds to
    /// (distinct from the rendezvous address; see `discovery_client`).
    pub discovery_bind_address: SocketAddrV4,

    /// Rendezvous (beacon) server address.
    pub rendezvous_address: SocketAddrV4,

    /// This node's long-lived public key, opaque to the relay (32 bytes).
    #[serde(default = "default_public_key")]
    pub public_key: Vec<u8>,

    /// This node's application-level address, opaque to the relay (20
    /// bytes).
    #[serde(default = "default_app_address")]
    pub app_address: Vec<u8>,

    /// HEARTBEAT period against the rendezvous, in seconds.
    #[serde(default = "default_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: u64,

    /// DISCPEER period against the rendezvous, in seconds.
    #[serde(default = "default_discpeer_interval_secs")]
    pub discpeer_interval_secs: u64,

    /// Channels subscribed/unsubscribed on promotion and churn, in order.
    #[serde(default = "default_channels")]
    pub channels: Vec<String>,

    #[serde(default)]
    pub features: RelayFeatures,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_protocol_tag() -> u32 {
    overlay_core::protocol::RELAY
}

fn default_heartbeat_interval_secs() -> u64 {
    15
}

fn default_discpeer_interval_secs() -> u64 {
    15
}

fn default_channels() -> Vec<String> {
    vec!["eth".to_string()]
}

fn default_public_key() -> Vec<u8> {
    vec![0u8; overlay_core::wire::PUBLIC_KEY_LEN]
}

fn default_app_address() -> Vec<u8> {
    vec![0u8; overlay_core::wire::APP_ADDRESS_LEN]
}

fn default_log_level() -> String {
    "info".to_string()
}

impl RelayConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Save configuration to a TOML file.
    pub fn to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| ConfigError::Io(e.to_string()))
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn discpeer_interval(&self) -> Duration {
        Duration::from_secs(self.discpeer_interval_secs)
    }

    /// Example configuration used by `gen-config`.
    pub fn example() -> Self {
        Self {
            protocol_tag: overlay_core::protocol::MASTER,
            pubsub_bind_address: "0.0.0.0:9003".parse().unwrap(),
            discovery_bind_address: "0.0.0.0:9004".parse().unwrap(),
            rendezvous_address: "127.0.0.1:8002".parse().unwrap(),
            public_key: default_public_key(),
            app_address: default_app_address(),
            heartbeat_interval_secs: default_heartbeat_interval_secs(),
            discpeer_interval_secs: default_discpeer_interval_secs(),
            channels: default_channels(),
            features: RelayFeatures::default(),
            log_level: default_log_level(),
        }
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.heartbeat_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "heartbeat_interval_secs cannot be 0".into(),
            ));
        }
        if self.discpeer_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "discpeer_interval_secs cannot be 0".into(),
            ));
        }
        if self.channels.is_empty() {
            return Err(ConfigError::Invalid(
                "channels must name at least one channel".into(),
            ));
        }
        if self.public_key.len() != overlay_core::wire::PUBLIC_KEY_LEN {
            return Err(ConfigError::Invalid(format!(
                "public_key must be {} bytes",
                overlay_core::wire::PUBLIC_KEY_LEN
            )));
        }
        if self.app_address.len() != overlay_core::wire::APP_ADDRESS_LEN {
            return Err(ConfigError::Invalid(format!(
                "app_address must be {} bytes",
                overlay_core::wire::APP_ADDRESS_LEN
            )));
        }
        Ok(())
    }
}

/// Configuration error types.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("serialize error: {0}")]
    Serialize(String),
    #[error("invalid value: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn example_config_is_valid() {
        assert!(RelayConfig::example().validate().is_ok());
    }

    #[test]
    fn round_trips_through_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relay.toml");
        let config = RelayConfig::example();
        config.to_file(&path).unwrap();
        let loaded = RelayConfig::from_file(&path).unwrap();
        assert_eq!(loaded.protocol_tag, config.protocol_tag);
        assert_eq!(loaded.channels, config.channels);
    }

    #[test]
    fn rejects_empty_channel_list() {
        let mut config = RelayConfig::example();
        config.channels.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn features_default_to_relay_enabled_only() {
        let features = RelayFeatures::default();
        assert!(!features.enable_cut_through);
        assert!(!features.accept_unsol_conn);
        assert!(features.enable_relay);
    }
}
