//! Deployment models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Prefix for tenant namespaces
const NAMESPACE_PREFIX: &str = "tenant-";

/// Derive the cluster namespace for a tenant slug
pub fn namespace_for(tenant_slug: &str) -> String {
    format!("{}{}", NAMESPACE_PREFIX, tenant_slug)
}

/// Deployment status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeploymentStatus {
    /// Recorded, not yet started
    Pending,

    /// Cluster provisioning in progress
    InProgress,

    /// Rollout completed
    Succeeded,

    /// Rollout failed
    Failed,

    /// Superseded by a successful rollback
    RolledBack,
}

impl DeploymentStatus {
    /// Whether no further transition is defined from this status
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DeploymentStatus::Succeeded | DeploymentStatus::Failed | DeploymentStatus::RolledBack
        )
    }
}

impl std::fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DeploymentStatus::Pending => "PENDING",
            DeploymentStatus::InProgress => "IN_PROGRESS",
            DeploymentStatus::Succeeded => "SUCCEEDED",
            DeploymentStatus::Failed => "FAILED",
            DeploymentStatus::RolledBack => "ROLLED_BACK",
        };
        f.write_str(s)
    }
}

/// Kind of lifecycle action a record describes; set once at creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeploymentKind {
    Create,
    Update,
    Rollback,
}

/// One logical rollout action.
///
/// Updates and rollbacks never mutate the record they supersede; each one
/// appends a new record linked to its predecessor via `previous_image`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deployment {
    /// Unique deployment ID
    pub id: Uuid,

    /// Owning tenant ID
    pub tenant_id: Uuid,

    /// Owning tenant slug
    pub tenant_slug: String,

    /// Cluster namespace, derived from the tenant slug
    pub namespace: String,

    /// Logical workload name within the namespace
    pub service_name: String,

    /// Container image being deployed
    pub image: String,

    /// Artifact version label
    pub version: String,

    /// Desired instance count
    pub replicas: u32,

    /// Current status
    pub status: DeploymentStatus,

    /// Lifecycle action kind
    pub kind: DeploymentKind,

    /// Image this record supersedes, if any
    pub previous_image: Option<String>,

    /// Failure message, set only when status is FAILED
    pub error_message: Option<String>,

    /// Record creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last persisted change timestamp
    pub updated_at: DateTime<Utc>,

    /// Set on entering IN_PROGRESS
    pub started_at: Option<DateTime<Utc>>,

    /// Set on entering a terminal status
    pub completed_at: Option<DateTime<Utc>>,
}

impl Deployment {
    /// Create a new PENDING record
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        kind: DeploymentKind,
        tenant_id: Uuid,
        tenant_slug: String,
        service_name: String,
        image: String,
        version: String,
        replicas: u32,
        previous_image: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            namespace: namespace_for(&tenant_slug),
            tenant_slug,
            service_name,
            image,
            version,
            replicas,
            status: DeploymentStatus::Pending,
            kind,
            previous_image,
            error_message: None,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
        }
    }
}

/// Input for a create request
#[derive(Debug, Clone, Deserialize)]
pub struct NewDeployment {
    /// Owning tenant ID
    pub tenant_id: Uuid,

    /// Owning tenant slug
    pub tenant_slug: String,

    /// Logical workload name
    pub service_name: String,

    /// Container image to deploy
    pub image: String,

    /// Artifact version label
    pub version: String,

    /// Desired instance count, defaulted to 1
    pub replicas: Option<u32>,
}

/// Input for an update request
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateDeployment {
    /// New container image
    pub image: String,

    /// New version label
    pub version: String,

    /// Desired instance count, defaulted to the prior record's
    pub replicas: Option<u32>,
}
