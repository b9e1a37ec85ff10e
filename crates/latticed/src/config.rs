//! latticed configuration (TOML).

use std::net::SocketAddr;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Top-level daemon configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LatticeConfig {
    pub exporter: ExporterConfig,
    pub ingress: IngressConfig,
    pub deployments: Vec<DeploymentConfig>,
}

impl Default for LatticeConfig {
    fn default() -> Self {
        Self {
            exporter: ExporterConfig::default(),
            ingress: IngressConfig::default(),
            deployments: vec![DeploymentConfig {
                name: "echo".to_string(),
                route: "/echo".to_string(),
                replicas: 2,
            }],
        }
    }
}

/// Exporter endpoint and report cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExporterConfig {
    /// Address the exposition endpoint binds to.
    pub bind: SocketAddr,
    /// Snapshot report interval in milliseconds.
    pub report_interval_ms: u64,
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:9464".parse().expect("static addr"),
            report_interval_ms: 1000,
        }
    }
}

/// HTTP ingress listener.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngressConfig {
    pub bind: SocketAddr,
}

impl Default for IngressConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8000".parse().expect("static addr"),
        }
    }
}

/// One simulated deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentConfig {
    pub name: String,
    pub route: String,
    #[serde(default = "default_replicas")]
    pub replicas: u32,
}

fn default_replicas() -> u32 {
    2
}

impl LatticeConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))
    }
}
