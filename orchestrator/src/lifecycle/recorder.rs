//! Transition history recorder

use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use crate::errors::OrchestratorError;
use crate::models::deployment::DeploymentStatus;
use crate::models::history::HistoryEntry;
use crate::store::DeploymentStore;

/// Appends an immutable history entry for every status change
pub struct HistoryRecorder {
    store: Arc<dyn DeploymentStore>,
}

impl HistoryRecorder {
    /// Create a recorder over the given store
    pub fn new(store: Arc<dyn DeploymentStore>) -> Self {
        Self { store }
    }

    /// Record a status transition
    pub async fn record(
        &self,
        deployment_id: Uuid,
        status: DeploymentStatus,
        message: Option<String>,
    ) -> Result<(), OrchestratorError> {
        debug!("Recording transition of {} to {}", deployment_id, status);

        let entry = HistoryEntry::new(deployment_id, status, message);
        self.store.append_history(&entry).await
    }
}
