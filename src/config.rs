//! Configuration management for Gateward.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Main configuration for the Gateward service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewardConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Admission control configuration
    #[serde(default)]
    pub admission: AdmissionConfig,
}

impl Default for GatewardConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            admission: AdmissionConfig::default(),
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server address
    #[serde(default = "default_http_addr")]
    pub http_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: default_http_addr(),
        }
    }
}

fn default_http_addr() -> SocketAddr {
    "127.0.0.1:8080".parse().unwrap()
}

/// Admission control configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdmissionConfig {
    /// Path to the endpoint policy file
    pub policy_path: Option<String>,

    /// Whether limits are enforced; the escape hatch for test environments
    #[serde(default = "default_enforce")]
    pub enforce: bool,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            policy_path: None,
            enforce: default_enforce(),
        }
    }
}

fn default_enforce() -> bool {
    true
}

impl GatewardConfig {
    /// Load configuration from a file path.
    pub fn from_file(path: &str) -> crate::error::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: GatewardConfig = serde_yaml::from_str(&contents)
            .map_err(|e| crate::error::GatewardError::Config(e.to_string()))?;
        Ok(config)
    }
}
