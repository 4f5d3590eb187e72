//! Read paths over deployment records

use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::cluster::{ClusterAdapter, ClusterError, WorkloadStatus};
use crate::errors::OrchestratorError;
use crate::models::deployment::{Deployment, DeploymentStatus};
use crate::models::history::HistoryEntry;
use crate::store::{DeploymentFilter, DeploymentStore};

/// Page size applied when a listing does not specify one
pub const DEFAULT_LIMIT: usize = 20;

/// Upper bound on requested page sizes
pub const MAX_LIMIT: usize = 100;

/// Listing parameters as received from the API layer
#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    /// Restrict to a tenant ID
    pub tenant_id: Option<Uuid>,

    /// Restrict to a tenant slug
    pub tenant_slug: Option<String>,

    /// Restrict to a status
    pub status: Option<DeploymentStatus>,

    /// Requested page size, clamped to 1..=MAX_LIMIT
    pub limit: Option<usize>,

    /// Page start
    pub offset: Option<usize>,
}

/// Persisted record paired with live cluster truth
#[derive(Debug, Clone, Serialize)]
pub struct DeploymentStatusView {
    /// The persisted record
    pub deployment: Deployment,

    /// Live workload status from the cluster
    pub workload: WorkloadStatus,
}

/// Query surface consumed by the API layer
pub struct DeploymentQueries {
    store: Arc<dyn DeploymentStore>,
    cluster: Arc<dyn ClusterAdapter>,
}

impl DeploymentQueries {
    /// Create the query surface over a store and cluster adapter
    pub fn new(store: Arc<dyn DeploymentStore>, cluster: Arc<dyn ClusterAdapter>) -> Self {
        Self { store, cluster }
    }

    /// Fetch a record by ID
    pub async fn get(&self, id: Uuid) -> Result<Option<Deployment>, OrchestratorError> {
        self.store.get(id).await
    }

    /// List records newest first, with bounded paging
    pub async fn list(&self, query: ListQuery) -> Result<Vec<Deployment>, OrchestratorError> {
        let filter = DeploymentFilter {
            tenant_id: query.tenant_id,
            tenant_slug: query.tenant_slug,
            status: query.status,
            limit: query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT),
            offset: query.offset.unwrap_or(0),
        };
        self.store.list(&filter).await
    }

    /// Persisted record plus live workload status.
    ///
    /// `Ok(None)` when either the record is absent or the cluster reports
    /// the workload as not found; any other adapter failure is an error.
    pub async fn status(
        &self,
        id: Uuid,
    ) -> Result<Option<DeploymentStatusView>, OrchestratorError> {
        let Some(deployment) = self.store.get(id).await? else {
            return Ok(None);
        };

        match self
            .cluster
            .workload_status(&deployment.namespace, &deployment.service_name)
            .await
        {
            Ok(workload) => Ok(Some(DeploymentStatusView {
                deployment,
                workload,
            })),
            Err(ClusterError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// All history entries for a deployment, oldest first.
    ///
    /// `Ok(None)` when the deployment does not exist.
    pub async fn history(
        &self,
        id: Uuid,
    ) -> Result<Option<Vec<HistoryEntry>>, OrchestratorError> {
        if self.store.get(id).await?.is_none() {
            return Ok(None);
        }
        Ok(Some(self.store.history_for(id).await?))
    }
}
