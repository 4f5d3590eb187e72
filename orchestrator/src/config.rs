//! Orchestrator configuration

use std::path::Path;

use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::errors::OrchestratorError;
use crate::logs::LogLevel;

/// Orchestrator settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Cluster adapter configuration
    #[serde(default)]
    pub cluster: ClusterSettings,

    /// Record store configuration
    #[serde(default)]
    pub store: StoreSettings,

    /// Rollout configuration
    #[serde(default)]
    pub rollout: RolloutSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            cluster: ClusterSettings::default(),
            store: StoreSettings::default(),
            rollout: RolloutSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings from a JSON file
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, OrchestratorError> {
        let contents = fs::read_to_string(path.as_ref()).await?;
        let settings = serde_json::from_str(&contents)?;
        Ok(settings)
    }
}

/// Cluster adapter variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClusterMode {
    /// HTTP control-plane client
    Api,

    /// In-memory fake, for environments without a live cluster
    Fake,
}

/// Cluster adapter settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterSettings {
    /// Which adapter variant to construct
    #[serde(default = "default_cluster_mode")]
    pub mode: ClusterMode,

    /// Control-plane base URL
    #[serde(default = "default_cluster_base_url")]
    pub base_url: String,

    /// Bearer token for control-plane calls
    #[serde(default)]
    pub token: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_cluster_mode() -> ClusterMode {
    ClusterMode::Api
}

fn default_cluster_base_url() -> String {
    "http://localhost:7700".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for ClusterSettings {
    fn default() -> Self {
        Self {
            mode: default_cluster_mode(),
            base_url: default_cluster_base_url(),
            token: None,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Record store variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreMode {
    /// JSON file snapshot
    File,

    /// Process memory only
    Memory,
}

/// Record store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSettings {
    /// Which store variant to construct
    #[serde(default = "default_store_mode")]
    pub mode: StoreMode,

    /// Snapshot path for the file store
    #[serde(default = "default_store_path")]
    pub path: String,
}

fn default_store_mode() -> StoreMode {
    StoreMode::File
}

fn default_store_path() -> String {
    "/var/lib/berth/deployments.json".to_string()
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            mode: default_store_mode(),
            path: default_store_path(),
        }
    }
}

/// Rollout settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RolloutSettings {
    /// Port exposed by created service endpoints
    #[serde(default = "default_service_port")]
    pub service_port: u16,
}

fn default_service_port() -> u16 {
    80
}

impl Default for RolloutSettings {
    fn default() -> Self {
        Self {
            service_port: default_service_port(),
        }
    }
}
