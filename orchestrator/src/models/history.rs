//! Deployment history models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::deployment::DeploymentStatus;

/// One status transition of a deployment.
///
/// Entries are append-only: created once per transition, never updated or
/// deleted. Display order is `created_at` ascending.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Unique entry ID
    pub id: Uuid,

    /// Owning deployment ID
    pub deployment_id: Uuid,

    /// Status the deployment transitioned to
    pub status: DeploymentStatus,

    /// Optional transition message
    pub message: Option<String>,

    /// Transition timestamp
    pub created_at: DateTime<Utc>,
}

impl HistoryEntry {
    /// Create a new entry for a transition
    pub fn new(deployment_id: Uuid, status: DeploymentStatus, message: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            deployment_id,
            status,
            message,
            created_at: Utc::now(),
        }
    }
}
