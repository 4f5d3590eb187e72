//! Lifecycle orchestrator tests

use std::sync::Arc;

use uuid::Uuid;

use berth_orchestrator::cluster::fake::FakeCluster;
use berth_orchestrator::cluster::{ClusterAdapter, ClusterError, WorkloadStatus};
use berth_orchestrator::errors::OrchestratorError;
use berth_orchestrator::lifecycle::orchestrator::Orchestrator;
use berth_orchestrator::models::deployment::{
    DeploymentKind, DeploymentStatus, NewDeployment, UpdateDeployment,
};
use berth_orchestrator::store::memory::MemoryStore;
use berth_orchestrator::store::{DeploymentFilter, DeploymentStore};

fn harness() -> (Arc<MemoryStore>, Orchestrator) {
    let store = Arc::new(MemoryStore::new());
    let cluster = Arc::new(FakeCluster::new());
    let orchestrator = Orchestrator::new(store.clone(), cluster);
    (store, orchestrator)
}

fn create_request(slug: &str, service: &str, image: &str, replicas: Option<u32>) -> NewDeployment {
    NewDeployment {
        tenant_id: Uuid::new_v4(),
        tenant_slug: slug.to_string(),
        service_name: service.to_string(),
        image: image.to_string(),
        version: "v1".to_string(),
        replicas,
    }
}

async fn all_records(store: &MemoryStore) -> usize {
    let filter = DeploymentFilter {
        limit: 1000,
        ..Default::default()
    };
    store.list(&filter).await.unwrap().len()
}

#[tokio::test]
async fn test_create_succeeds_and_records_history() {
    let (store, orchestrator) = harness();

    let request = create_request("acme", "app", "registry/app:v1", Some(2));
    let record = orchestrator.create(request).await.unwrap();

    assert_eq!(record.status, DeploymentStatus::Succeeded);
    assert_eq!(record.kind, DeploymentKind::Create);
    assert_eq!(record.namespace, "tenant-acme");
    assert_eq!(record.replicas, 2);
    assert!(record.previous_image.is_none());
    assert!(record.started_at.is_some());
    assert!(record.completed_at.is_some());

    let history = store.history_for(record.id).await.unwrap();
    let statuses: Vec<DeploymentStatus> = history.iter().map(|e| e.status).collect();
    assert_eq!(
        statuses,
        vec![
            DeploymentStatus::Pending,
            DeploymentStatus::InProgress,
            DeploymentStatus::Succeeded,
        ]
    );
}

#[tokio::test]
async fn test_create_defaults_to_one_replica() {
    let (_store, orchestrator) = harness();

    let record = orchestrator
        .create(create_request("acme", "app", "registry/app:v1", None))
        .await
        .unwrap();
    assert_eq!(record.replicas, 1);
}

#[tokio::test]
async fn test_create_rejects_zero_replicas() {
    let (store, orchestrator) = harness();

    let err = orchestrator
        .create(create_request("acme", "app", "registry/app:v1", Some(0)))
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::ValidationError(_)));
    assert_eq!(all_records(&store).await, 0);
}

#[tokio::test]
async fn test_second_create_in_existing_namespace_succeeds() {
    let (_store, orchestrator) = harness();

    orchestrator
        .create(create_request("acme", "app", "registry/app:v1", None))
        .await
        .unwrap();

    // The tenant namespace already exists; the conflict is folded away.
    let record = orchestrator
        .create(create_request("acme", "web", "registry/web:v1", None))
        .await
        .unwrap();
    assert_eq!(record.status, DeploymentStatus::Succeeded);
}

#[tokio::test]
async fn test_update_chains_and_defaults_replicas() {
    let (store, orchestrator) = harness();

    let first = orchestrator
        .create(create_request("acme", "app", "registry/app:v1", Some(2)))
        .await
        .unwrap();

    let second = orchestrator
        .update(
            first.id,
            UpdateDeployment {
                image: "registry/app:v2".to_string(),
                version: "v2".to_string(),
                replicas: None,
            },
        )
        .await
        .unwrap()
        .unwrap();

    assert_eq!(second.status, DeploymentStatus::Succeeded);
    assert_eq!(second.kind, DeploymentKind::Update);
    assert_eq!(second.replicas, 2);
    assert_eq!(second.previous_image.as_deref(), Some("registry/app:v1"));
    assert_eq!(second.namespace, first.namespace);
    assert_eq!(second.service_name, first.service_name);

    // An update supersedes the prior record without touching its status.
    let prior = store.get(first.id).await.unwrap().unwrap();
    assert_eq!(prior.status, DeploymentStatus::Succeeded);
    assert_eq!(prior.image, "registry/app:v1");

    assert_eq!(all_records(&store).await, 2);
}

#[tokio::test]
async fn test_update_of_unknown_id_creates_nothing() {
    let (store, orchestrator) = harness();

    let result = orchestrator
        .update(
            Uuid::new_v4(),
            UpdateDeployment {
                image: "registry/app:v2".to_string(),
                version: "v2".to_string(),
                replicas: None,
            },
        )
        .await
        .unwrap();
    assert!(result.is_none());
    assert_eq!(all_records(&store).await, 0);
}

#[tokio::test]
async fn test_rollback_restores_previous_image() {
    let (store, orchestrator) = harness();

    let first = orchestrator
        .create(create_request("acme", "app", "registry/app:v1", Some(2)))
        .await
        .unwrap();
    let second = orchestrator
        .update(
            first.id,
            UpdateDeployment {
                image: "registry/app:v2".to_string(),
                version: "v2".to_string(),
                replicas: None,
            },
        )
        .await
        .unwrap()
        .unwrap();

    let third = orchestrator.rollback(second.id).await.unwrap().unwrap();

    assert_eq!(third.status, DeploymentStatus::Succeeded);
    assert_eq!(third.kind, DeploymentKind::Rollback);
    assert_eq!(third.image, "registry/app:v1");
    assert_eq!(third.version, "rollback-from-v2");
    assert_eq!(third.replicas, 2);
    assert_eq!(third.previous_image.as_deref(), Some("registry/app:v2"));

    // The rolled-back record is marked; the original create is untouched.
    let rolled_back = store.get(second.id).await.unwrap().unwrap();
    assert_eq!(rolled_back.status, DeploymentStatus::RolledBack);
    assert_eq!(rolled_back.image, "registry/app:v2");

    let original = store.get(first.id).await.unwrap().unwrap();
    assert_eq!(original.status, DeploymentStatus::Succeeded);

    let history = store.history_for(second.id).await.unwrap();
    assert_eq!(
        history.last().unwrap().status,
        DeploymentStatus::RolledBack
    );
}

#[tokio::test]
async fn test_chain_links_records_by_previous_image() {
    let (store, orchestrator) = harness();

    let a = orchestrator
        .create(create_request("acme", "app", "registry/app:v1", Some(2)))
        .await
        .unwrap();
    let b = orchestrator
        .update(
            a.id,
            UpdateDeployment {
                image: "registry/app:v2".to_string(),
                version: "v2".to_string(),
                replicas: None,
            },
        )
        .await
        .unwrap()
        .unwrap();
    let c = orchestrator
        .update(
            b.id,
            UpdateDeployment {
                image: "registry/app:v3".to_string(),
                version: "v3".to_string(),
                replicas: Some(4),
            },
        )
        .await
        .unwrap()
        .unwrap();
    let d = orchestrator.rollback(c.id).await.unwrap().unwrap();

    // Three lifecycle actions after the create: four records in the chain.
    assert_eq!(all_records(&store).await, 4);
    assert_eq!(b.previous_image.as_deref(), Some("registry/app:v1"));
    assert_eq!(c.previous_image.as_deref(), Some("registry/app:v2"));
    assert_eq!(d.previous_image.as_deref(), Some("registry/app:v3"));
    assert_eq!(d.image, "registry/app:v2");
    assert_eq!(d.replicas, 4);

    // Exactly one record was superseded by the single rollback.
    let filter = DeploymentFilter {
        status: Some(DeploymentStatus::RolledBack),
        limit: 10,
        ..Default::default()
    };
    let rolled_back = store.list(&filter).await.unwrap();
    assert_eq!(rolled_back.len(), 1);
    assert_eq!(rolled_back[0].id, c.id);
}

#[tokio::test]
async fn test_rollback_without_target_is_a_domain_error() {
    let (store, orchestrator) = harness();

    let first = orchestrator
        .create(create_request("acme", "app", "registry/app:v1", None))
        .await
        .unwrap();
    let history_before = store.history_for(first.id).await.unwrap().len();

    let err = orchestrator.rollback(first.id).await.unwrap_err();
    assert!(matches!(err, OrchestratorError::NoRollbackTarget(_)));

    // Nothing was persisted: no new record, no new history.
    assert_eq!(all_records(&store).await, 1);
    assert_eq!(
        store.history_for(first.id).await.unwrap().len(),
        history_before
    );
    let unchanged = store.get(first.id).await.unwrap().unwrap();
    assert_eq!(unchanged.status, DeploymentStatus::Succeeded);
}

#[tokio::test]
async fn test_rollback_of_unknown_id_creates_nothing() {
    let (store, orchestrator) = harness();

    let result = orchestrator.rollback(Uuid::new_v4()).await.unwrap();
    assert!(result.is_none());
    assert_eq!(all_records(&store).await, 0);
}

/// Adapter whose workload creation always fails, after the namespace step
struct WorkloadRejectingCluster {
    inner: FakeCluster,
}

#[async_trait::async_trait]
impl ClusterAdapter for WorkloadRejectingCluster {
    async fn create_namespace(&self, tenant_slug: &str) -> Result<String, ClusterError> {
        self.inner.create_namespace(tenant_slug).await
    }

    async fn create_workload(
        &self,
        _namespace: &str,
        _service_name: &str,
        _image: &str,
        _replicas: u32,
    ) -> Result<(), ClusterError> {
        Err(ClusterError::Api {
            status: 500,
            message: "admission webhook rejected workload".to_string(),
        })
    }

    async fn update_workload(
        &self,
        namespace: &str,
        service_name: &str,
        image: &str,
        replicas: u32,
    ) -> Result<(), ClusterError> {
        self.inner
            .update_workload(namespace, service_name, image, replicas)
            .await
    }

    async fn create_service_endpoint(
        &self,
        namespace: &str,
        service_name: &str,
        port: u16,
    ) -> Result<(), ClusterError> {
        self.inner
            .create_service_endpoint(namespace, service_name, port)
            .await
    }

    async fn workload_status(
        &self,
        namespace: &str,
        service_name: &str,
    ) -> Result<WorkloadStatus, ClusterError> {
        self.inner.workload_status(namespace, service_name).await
    }
}

#[tokio::test]
async fn test_workload_failure_is_persisted_then_propagated() {
    let store = Arc::new(MemoryStore::new());
    let cluster = Arc::new(WorkloadRejectingCluster {
        inner: FakeCluster::new(),
    });
    let orchestrator = Orchestrator::new(store.clone(), cluster);

    let err = orchestrator
        .create(create_request("acme", "app", "registry/app:v1", None))
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::ClusterError(_)));

    // The caller saw the error, and the record still landed as FAILED.
    let filter = DeploymentFilter {
        limit: 10,
        ..Default::default()
    };
    let records = store.list(&filter).await.unwrap();
    assert_eq!(records.len(), 1);

    let failed = &records[0];
    assert_eq!(failed.status, DeploymentStatus::Failed);
    assert!(failed
        .error_message
        .as_deref()
        .unwrap_or_default()
        .contains("admission webhook"));
    assert!(failed.completed_at.is_some());

    let history = store.history_for(failed.id).await.unwrap();
    assert_eq!(history.last().unwrap().status, DeploymentStatus::Failed);
}

#[tokio::test]
async fn test_failed_update_leaves_original_untouched() {
    let store = Arc::new(MemoryStore::new());
    let orchestrator = Orchestrator::new(store.clone(), Arc::new(FakeCluster::new()));

    let first = orchestrator
        .create(create_request("acme", "app", "registry/app:v1", None))
        .await
        .unwrap();
    let second = orchestrator
        .update(
            first.id,
            UpdateDeployment {
                image: "registry/app:v2".to_string(),
                version: "v2".to_string(),
                replicas: None,
            },
        )
        .await
        .unwrap()
        .unwrap();

    // Roll back through an adapter that cannot reach the workload.
    struct UpdateRejectingCluster;

    #[async_trait::async_trait]
    impl ClusterAdapter for UpdateRejectingCluster {
        async fn create_namespace(&self, _tenant_slug: &str) -> Result<String, ClusterError> {
            unreachable!("rollback never creates namespaces")
        }

        async fn create_workload(
            &self,
            _namespace: &str,
            _service_name: &str,
            _image: &str,
            _replicas: u32,
        ) -> Result<(), ClusterError> {
            unreachable!("rollback never creates workloads")
        }

        async fn update_workload(
            &self,
            _namespace: &str,
            _service_name: &str,
            _image: &str,
            _replicas: u32,
        ) -> Result<(), ClusterError> {
            Err(ClusterError::Api {
                status: 503,
                message: "control plane unavailable".to_string(),
            })
        }

        async fn create_service_endpoint(
            &self,
            _namespace: &str,
            _service_name: &str,
            _port: u16,
        ) -> Result<(), ClusterError> {
            unreachable!("rollback never creates services")
        }

        async fn workload_status(
            &self,
            _namespace: &str,
            _service_name: &str,
        ) -> Result<WorkloadStatus, ClusterError> {
            unreachable!("rollback never reads status")
        }
    }

    let broken = Orchestrator::new(store.clone(), Arc::new(UpdateRejectingCluster));
    let err = broken.rollback(second.id).await.unwrap_err();
    assert!(matches!(err, OrchestratorError::ClusterError(_)));

    // The rollback record failed; the record it tried to undo is unchanged.
    let target = store.get(second.id).await.unwrap().unwrap();
    assert_eq!(target.status, DeploymentStatus::Succeeded);

    let filter = DeploymentFilter {
        limit: 10,
        ..Default::default()
    };
    let records = store.list(&filter).await.unwrap();
    let failed_rollback = records
        .iter()
        .find(|d| d.kind == DeploymentKind::Rollback)
        .unwrap();
    assert_eq!(failed_rollback.status, DeploymentStatus::Failed);
}
