//! Deployment lifecycle orchestrator

use std::sync::Arc;

use tracing::{error, info};
use uuid::Uuid;

use crate::cluster::{ClusterAdapter, ClusterError};
use crate::errors::OrchestratorError;
use crate::lifecycle::fsm;
use crate::lifecycle::recorder::HistoryRecorder;
use crate::models::deployment::{
    Deployment, DeploymentKind, DeploymentStatus, NewDeployment, UpdateDeployment,
};
use crate::store::DeploymentStore;

/// Sentinel persisted when a failure renders to an empty message
const UNKNOWN_ERROR: &str = "unknown error";

/// Orchestrator tuning
#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    /// Port exposed by created service endpoints
    pub service_port: u16,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self { service_port: 80 }
    }
}

/// Sequences cluster operations for create/update/rollback and persists
/// every status transition before it is observable by the caller.
///
/// Each call runs as one sequential async flow; concurrency across calls is
/// the host runtime's concern. There is no optimistic-concurrency check
/// between reading a prior record and inserting its successor, so two racing
/// updates against the same record both succeed and both land in the chain.
pub struct Orchestrator {
    store: Arc<dyn DeploymentStore>,
    cluster: Arc<dyn ClusterAdapter>,
    recorder: HistoryRecorder,
    options: OrchestratorOptions,
}

impl Orchestrator {
    /// Create an orchestrator with default options
    pub fn new(store: Arc<dyn DeploymentStore>, cluster: Arc<dyn ClusterAdapter>) -> Self {
        Self::with_options(store, cluster, OrchestratorOptions::default())
    }

    /// Create an orchestrator with explicit options
    pub fn with_options(
        store: Arc<dyn DeploymentStore>,
        cluster: Arc<dyn ClusterAdapter>,
        options: OrchestratorOptions,
    ) -> Self {
        Self {
            recorder: HistoryRecorder::new(store.clone()),
            store,
            cluster,
            options,
        }
    }

    /// Deploy a service for the first time.
    ///
    /// Provisions namespace, workload, and service endpoint in that order;
    /// "already exists" on namespace and endpoint creation is folded into
    /// success so retried creates stay idempotent.
    pub async fn create(&self, request: NewDeployment) -> Result<Deployment, OrchestratorError> {
        let replicas = request.replicas.unwrap_or(1);
        if replicas < 1 {
            return Err(OrchestratorError::ValidationError(
                "replicas must be at least 1".to_string(),
            ));
        }

        let record = Deployment::new(
            DeploymentKind::Create,
            request.tenant_id,
            request.tenant_slug,
            request.service_name,
            request.image,
            request.version,
            replicas,
            None,
        );

        info!(
            "Creating deployment {} ({}/{} image {} x{})",
            record.id, record.namespace, record.service_name, record.image, record.replicas
        );

        self.admit(&record).await?;
        let record = self.begin(record).await?;

        let result = self.provision(&record).await;
        self.finish(record, result).await
    }

    /// Roll a deployed service forward to a new image.
    ///
    /// Returns `Ok(None)` when no record exists for the id. The prior
    /// record's status is not touched; it is simply superseded in the chain.
    pub async fn update(
        &self,
        deployment_id: Uuid,
        request: UpdateDeployment,
    ) -> Result<Option<Deployment>, OrchestratorError> {
        let Some(prior) = self.store.get(deployment_id).await? else {
            return Ok(None);
        };

        let replicas = request.replicas.unwrap_or(prior.replicas);
        if replicas < 1 {
            return Err(OrchestratorError::ValidationError(
                "replicas must be at least 1".to_string(),
            ));
        }

        let record = Deployment::new(
            DeploymentKind::Update,
            prior.tenant_id,
            prior.tenant_slug.clone(),
            prior.service_name.clone(),
            request.image,
            request.version,
            replicas,
            Some(prior.image.clone()),
        );

        info!(
            "Updating deployment {} -> {} ({}/{} image {} x{})",
            prior.id, record.id, record.namespace, record.service_name, record.image, replicas
        );

        self.admit(&record).await?;
        let record = self.begin(record).await?;

        let result = self
            .cluster
            .update_workload(
                &record.namespace,
                &record.service_name,
                &record.image,
                record.replicas,
            )
            .await;
        self.finish(record, result).await.map(Some)
    }

    /// Restore the image a record superseded.
    ///
    /// Returns `Ok(None)` when no record exists for the id, and
    /// `NoRollbackTarget` before any persistence when the record carries no
    /// previous image. On success the rolled-back record moves to
    /// ROLLED_BACK; on failure it is left untouched.
    pub async fn rollback(
        &self,
        deployment_id: Uuid,
    ) -> Result<Option<Deployment>, OrchestratorError> {
        let Some(prior) = self.store.get(deployment_id).await? else {
            return Ok(None);
        };

        let Some(target_image) = prior.previous_image.clone() else {
            return Err(OrchestratorError::NoRollbackTarget(format!(
                "deployment {} has no previous image",
                deployment_id
            )));
        };

        let record = Deployment::new(
            DeploymentKind::Rollback,
            prior.tenant_id,
            prior.tenant_slug.clone(),
            prior.service_name.clone(),
            target_image,
            format!("rollback-from-{}", prior.version),
            prior.replicas,
            Some(prior.image.clone()),
        );

        info!(
            "Rolling back deployment {} -> {} ({}/{} restoring {})",
            prior.id, record.id, record.namespace, record.service_name, record.image
        );

        self.admit(&record).await?;
        let record = self.begin(record).await?;

        let result = self
            .cluster
            .update_workload(
                &record.namespace,
                &record.service_name,
                &record.image,
                record.replicas,
            )
            .await;
        let finished = self.finish(record, result).await?;

        // The restored image is live; mark the superseded record.
        let mut original = self.store.get(deployment_id).await?.ok_or_else(|| {
            OrchestratorError::Internal(format!(
                "deployment {} disappeared during rollback",
                deployment_id
            ))
        })?;
        if original.status != DeploymentStatus::RolledBack {
            let note = format!("rolled back by {}", finished.id);
            self.transition(&mut original, DeploymentStatus::RolledBack, Some(&note))
                .await?;
        }

        Ok(Some(finished))
    }

    /// Insert a PENDING record and its first history entry
    async fn admit(&self, record: &Deployment) -> Result<(), OrchestratorError> {
        self.store.insert(record).await?;
        self.recorder
            .record(record.id, DeploymentStatus::Pending, None)
            .await
    }

    /// Move a record to IN_PROGRESS
    async fn begin(&self, mut record: Deployment) -> Result<Deployment, OrchestratorError> {
        self.transition(&mut record, DeploymentStatus::InProgress, None)
            .await?;
        Ok(record)
    }

    /// Run the full first-rollout sequence against the cluster
    async fn provision(&self, record: &Deployment) -> Result<(), ClusterError> {
        match self.cluster.create_namespace(&record.tenant_slug).await {
            Ok(_) | Err(ClusterError::Conflict { .. }) => {}
            Err(e) => return Err(e),
        }

        self.cluster
            .create_workload(
                &record.namespace,
                &record.service_name,
                &record.image,
                record.replicas,
            )
            .await?;

        match self
            .cluster
            .create_service_endpoint(
                &record.namespace,
                &record.service_name,
                self.options.service_port,
            )
            .await
        {
            Ok(()) | Err(ClusterError::Conflict { .. }) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Persist the terminal status for a rollout result.
    ///
    /// A failure is written to the record before the error propagates; the
    /// orchestrator never swallows a cluster failure. On success the final
    /// record is re-read from the store.
    async fn finish(
        &self,
        mut record: Deployment,
        result: Result<(), ClusterError>,
    ) -> Result<Deployment, OrchestratorError> {
        match result {
            Ok(()) => {
                self.transition(&mut record, DeploymentStatus::Succeeded, None)
                    .await?;
                info!("Deployment {} succeeded", record.id);

                self.store.get(record.id).await?.ok_or_else(|| {
                    OrchestratorError::Internal(format!(
                        "deployment {} missing after terminal write",
                        record.id
                    ))
                })
            }
            Err(e) => {
                let mut message = e.to_string();
                if message.is_empty() {
                    message = UNKNOWN_ERROR.to_string();
                }

                error!("Deployment {} failed: {}", record.id, message);
                self.transition(&mut record, DeploymentStatus::Failed, Some(&message))
                    .await?;

                Err(e.into())
            }
        }
    }

    /// Apply, persist, and record one status transition
    async fn transition(
        &self,
        record: &mut Deployment,
        to: DeploymentStatus,
        message: Option<&str>,
    ) -> Result<(), OrchestratorError> {
        fsm::apply_transition(record, to, message)?;
        self.store.update(record).await?;
        self.recorder
            .record(record.id, to, message.map(String::from))
            .await
    }
}
