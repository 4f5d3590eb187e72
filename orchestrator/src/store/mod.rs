//! Deployment record persistence

pub mod file;
pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::config::{StoreMode, StoreSettings};
use crate::errors::OrchestratorError;
use crate::models::deployment::{Deployment, DeploymentStatus};
use crate::models::history::HistoryEntry;

/// Filter and page bounds for deployment listings.
///
/// `limit` and `offset` arrive pre-clamped from the query surface.
#[derive(Debug, Clone, Default)]
pub struct DeploymentFilter {
    /// Restrict to a tenant ID
    pub tenant_id: Option<Uuid>,

    /// Restrict to a tenant slug
    pub tenant_slug: Option<String>,

    /// Restrict to a status
    pub status: Option<DeploymentStatus>,

    /// Page size
    pub limit: usize,

    /// Page start
    pub offset: usize,
}

impl DeploymentFilter {
    fn matches(&self, deployment: &Deployment) -> bool {
        if let Some(tenant_id) = self.tenant_id {
            if deployment.tenant_id != tenant_id {
                return false;
            }
        }
        if let Some(slug) = &self.tenant_slug {
            if &deployment.tenant_slug != slug {
                return false;
            }
        }
        if let Some(status) = self.status {
            if deployment.status != status {
                return false;
            }
        }
        true
    }
}

/// Persistence for deployment records and their history entries.
///
/// Listings are ordered newest first by creation time; history is ordered
/// oldest first.
#[async_trait]
pub trait DeploymentStore: Send + Sync {
    /// Persist a new record
    async fn insert(&self, deployment: &Deployment) -> Result<(), OrchestratorError>;

    /// Persist changes to an existing record
    async fn update(&self, deployment: &Deployment) -> Result<(), OrchestratorError>;

    /// Fetch a record by ID
    async fn get(&self, id: Uuid) -> Result<Option<Deployment>, OrchestratorError>;

    /// List records matching a filter, newest first
    async fn list(&self, filter: &DeploymentFilter) -> Result<Vec<Deployment>, OrchestratorError>;

    /// Append a history entry
    async fn append_history(&self, entry: &HistoryEntry) -> Result<(), OrchestratorError>;

    /// All history entries for a deployment, oldest first
    async fn history_for(&self, deployment_id: Uuid)
        -> Result<Vec<HistoryEntry>, OrchestratorError>;
}

/// Construct the store variant selected by configuration
pub async fn from_settings(
    settings: &StoreSettings,
) -> Result<Arc<dyn DeploymentStore>, OrchestratorError> {
    match settings.mode {
        StoreMode::Memory => Ok(Arc::new(memory::MemoryStore::new())),
        StoreMode::File => {
            let store = file::FileStore::open(&settings.path).await?;
            Ok(Arc::new(store))
        }
    }
}
