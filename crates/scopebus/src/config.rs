// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Bridge configuration.
//!
//! Supports both programmatic and file-based configuration.
//!
//! ```toml
//! realm = "realm1"
//! connect_timeout_ms = 4000
//! schema_root = "/proto"
//!
//! [origin]
//! kind = "network"
//! scheme = "https"
//! host = "robot.local:8181"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Loopback router address used when no address and no network origin exist.
pub const LOCAL_ADDRESS: &str = "127.0.0.1:8080";

/// Path of the WebSocket endpoint on the router.
pub const WS_PATH: &str = "/ws";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Where the application itself was loaded from.
///
/// Decides the router address when `connect` is called without one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Origin {
    /// Loaded from the local filesystem; the router is expected on loopback.
    #[default]
    Local,

    /// Served over the network; the router lives on the serving host.
    Network { scheme: String, host: String },
}

impl Origin {
    /// Network origin from a scheme (`http`, `https`, ...) and `host[:port]`.
    pub fn network(scheme: impl Into<String>, host: impl Into<String>) -> Self {
        Self::Network {
            scheme: scheme.into(),
            host: host.into(),
        }
    }
}

/// Bridge configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Realm handed to the transport.
    #[serde(default = "default_realm")]
    pub realm: String,

    /// Connect attempt budget (milliseconds).
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Root directory of the schema lookup.
    #[serde(default = "default_schema_root")]
    pub schema_root: PathBuf,

    /// Origin used to derive the router address.
    #[serde(default)]
    pub origin: Origin,
}

fn default_realm() -> String {
    "realm1".to_string()
}

fn default_connect_timeout_ms() -> u64 {
    4000
}

fn default_schema_root() -> PathBuf {
    PathBuf::from("/proto")
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            realm: default_realm(),
            connect_timeout_ms: default_connect_timeout_ms(),
            schema_root: default_schema_root(),
            origin: Origin::Local,
        }
    }
}

impl BridgeConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Set the origin.
    pub fn with_origin(mut self, origin: Origin) -> Self {
        self.origin = origin;
        self
    }

    /// Set the schema root.
    pub fn with_schema_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.schema_root = root.into();
        self
    }

    /// Set the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Connect attempt budget.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.realm.is_empty() {
            return Err(ConfigError::Invalid("realm must not be empty".into()));
        }

        if self.connect_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "connect_timeout_ms must be greater than zero".into(),
            ));
        }

        if let Origin::Network { scheme, host } = &self.origin {
            if scheme.is_empty() || host.is_empty() {
                return Err(ConfigError::Invalid(
                    "network origin needs both scheme and host".into(),
                ));
            }
        }

        Ok(())
    }

    /// Derive the transport URI for a connect attempt.
    ///
    /// An explicit address always wins; otherwise the origin decides.
    pub fn transport_uri(&self, address: Option<&str>) -> String {
        match (address, &self.origin) {
            (Some(address), _) => format!("ws://{}{}", address, WS_PATH),
            (None, Origin::Local) => format!("ws://{}{}", LOCAL_ADDRESS, WS_PATH),
            (None, Origin::Network { scheme, host }) => {
                let ws_scheme = if scheme.trim_end_matches(':') == "http" {
                    "ws"
                } else {
                    "wss"
                };
                format!("{}://{}{}", ws_scheme, host, WS_PATH)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::default();
        assert_eq!(config.realm, "realm1");
        assert_eq!(config.connect_timeout(), Duration::from_millis(4000));
        assert_eq!(config.schema_root, PathBuf::from("/proto"));
        assert_eq!(config.origin, Origin::Local);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_uri_explicit_address() {
        let config = BridgeConfig::default();
        assert_eq!(
            config.transport_uri(Some("localhost:8181")),
            "ws://localhost:8181/ws"
        );
    }

    #[test]
    fn test_uri_local_origin() {
        let config = BridgeConfig::default();
        assert_eq!(config.transport_uri(None), "ws://127.0.0.1:8080/ws");
    }

    #[test]
    fn test_uri_network_origin() {
        let config = BridgeConfig::default().with_origin(Origin::network("http:", "localhost"));
        assert_eq!(config.transport_uri(None), "ws://localhost/ws");

        let config = BridgeConfig::default().with_origin(Origin::network("https", "robot:443"));
        assert_eq!(config.transport_uri(None), "wss://robot:443/ws");

        // an explicit address still wins over the origin
        assert_eq!(config.transport_uri(Some("other")), "ws://other/ws");
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let config = BridgeConfig::default().with_connect_timeout(Duration::ZERO);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_partial_origin() {
        let config = BridgeConfig::default().with_origin(Origin::network("", "host"));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(
            file,
            r#"
realm = "robots"
connect_timeout_ms = 1500
schema_root = "/opt/schemas"

[origin]
kind = "network"
scheme = "https"
host = "robot.local"
"#
        )
        .expect("write config");

        let config = BridgeConfig::from_file(file.path()).expect("load config");
        assert_eq!(config.realm, "robots");
        assert_eq!(config.connect_timeout(), Duration::from_millis(1500));
        assert_eq!(config.schema_root, PathBuf::from("/opt/schemas"));
        assert_eq!(config.transport_uri(None), "wss://robot.local/ws");
    }

    #[test]
    fn test_from_file_partial_uses_defaults() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, r#"realm = "lab""#).expect("write config");

        let config = BridgeConfig::from_file(file.path()).expect("load config");
        assert_eq!(config.realm, "lab");
        assert_eq!(config.connect_timeout_ms, 4000);
        assert_eq!(config.origin, Origin::Local);
    }

    #[test]
    fn test_from_file_invalid() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, r#"realm = """#).expect("write config");

        assert!(matches!(
            BridgeConfig::from_file(file.path()),
            Err(ConfigError::Invalid(_))
        ));
    }
}
