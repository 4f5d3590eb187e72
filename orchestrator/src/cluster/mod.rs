//! Cluster control-plane adapter

pub mod api;
pub mod fake;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{ClusterMode, ClusterSettings};
use crate::errors::OrchestratorError;

/// Cluster adapter error, a closed tag set the orchestrator branches on
#[derive(Error, Debug)]
pub enum ClusterError {
    /// The resource already exists
    #[error("already exists: {resource}")]
    Conflict { resource: String },

    /// The resource does not exist
    #[error("not found: {resource}")]
    NotFound { resource: String },

    /// The control plane rejected the call
    #[error("cluster API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The control plane could not be reached
    #[error("cluster transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Live workload status as reported by the cluster
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkloadStatus {
    /// Desired replica count
    pub replicas: u32,

    /// Replicas passing readiness checks
    pub ready_replicas: u32,

    /// Replicas available to serve traffic
    pub available_replicas: u32,

    /// Replicas running the latest workload revision
    pub updated_replicas: u32,
}

/// Capability interface over the cluster control plane.
///
/// All calls are awaited to completion; none are fire-and-forget. Creation
/// calls report an existing resource as `ClusterError::Conflict` rather than
/// succeeding silently, so callers decide whether to fold it into success.
#[async_trait]
pub trait ClusterAdapter: Send + Sync {
    /// Ensure a namespace for the tenant, returning its name
    async fn create_namespace(&self, tenant_slug: &str) -> Result<String, ClusterError>;

    /// Create a workload configured for zero-downtime rolling replacement
    async fn create_workload(
        &self,
        namespace: &str,
        service_name: &str,
        image: &str,
        replicas: u32,
    ) -> Result<(), ClusterError>;

    /// Replace a running workload's image and replica count in place
    async fn update_workload(
        &self,
        namespace: &str,
        service_name: &str,
        image: &str,
        replicas: u32,
    ) -> Result<(), ClusterError>;

    /// Expose a workload inside its namespace
    async fn create_service_endpoint(
        &self,
        namespace: &str,
        service_name: &str,
        port: u16,
    ) -> Result<(), ClusterError>;

    /// Read live workload status
    async fn workload_status(
        &self,
        namespace: &str,
        service_name: &str,
    ) -> Result<WorkloadStatus, ClusterError>;
}

/// Construct the adapter variant selected by configuration.
///
/// Called once at wiring time; the orchestrator itself only ever sees the
/// trait object it is handed.
pub fn from_settings(
    settings: &ClusterSettings,
) -> Result<Arc<dyn ClusterAdapter>, OrchestratorError> {
    match settings.mode {
        ClusterMode::Fake => Ok(Arc::new(fake::FakeCluster::new())),
        ClusterMode::Api => {
            let client = api::ControlPlaneClient::new(settings)?;
            Ok(Arc::new(client))
        }
    }
}
