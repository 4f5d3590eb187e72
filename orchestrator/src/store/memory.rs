//! In-memory deployment store

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use uuid::Uuid;

use crate::errors::OrchestratorError;
use crate::models::deployment::Deployment;
use crate::models::history::HistoryEntry;
use crate::store::{DeploymentFilter, DeploymentStore};

/// Deployment store backed by process memory
pub struct MemoryStore {
    deployments: RwLock<HashMap<Uuid, Deployment>>,
    history: RwLock<Vec<HistoryEntry>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            deployments: RwLock::new(HashMap::new()),
            history: RwLock::new(Vec::new()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeploymentStore for MemoryStore {
    async fn insert(&self, deployment: &Deployment) -> Result<(), OrchestratorError> {
        let mut deployments = self.deployments.write().unwrap_or_else(|e| e.into_inner());
        deployments.insert(deployment.id, deployment.clone());
        Ok(())
    }

    async fn update(&self, deployment: &Deployment) -> Result<(), OrchestratorError> {
        let mut deployments = self.deployments.write().unwrap_or_else(|e| e.into_inner());
        match deployments.get_mut(&deployment.id) {
            Some(existing) => {
                *existing = deployment.clone();
                Ok(())
            }
            None => Err(OrchestratorError::NotFound(format!(
                "deployment {}",
                deployment.id
            ))),
        }
    }

    async fn get(&self, id: Uuid) -> Result<Option<Deployment>, OrchestratorError> {
        let deployments = self.deployments.read().unwrap_or_else(|e| e.into_inner());
        Ok(deployments.get(&id).cloned())
    }

    async fn list(&self, filter: &DeploymentFilter) -> Result<Vec<Deployment>, OrchestratorError> {
        let deployments = self.deployments.read().unwrap_or_else(|e| e.into_inner());

        let mut matched: Vec<Deployment> = deployments
            .values()
            .filter(|d| filter.matches(d))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(matched
            .into_iter()
            .skip(filter.offset)
            .take(filter.limit)
            .collect())
    }

    async fn append_history(&self, entry: &HistoryEntry) -> Result<(), OrchestratorError> {
        let mut history = self.history.write().unwrap_or_else(|e| e.into_inner());
        history.push(entry.clone());
        Ok(())
    }

    async fn history_for(
        &self,
        deployment_id: Uuid,
    ) -> Result<Vec<HistoryEntry>, OrchestratorError> {
        let history = self.history.read().unwrap_or_else(|e| e.into_inner());

        let mut entries: Vec<HistoryEntry> = history
            .iter()
            .filter(|e| e.deployment_id == deployment_id)
            .cloned()
            .collect();
        entries.sort_by(|a, b| a.created_at.cmp(&b.created_at));

        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::deployment::{DeploymentKind, DeploymentStatus};

    fn deployment(slug: &str, service: &str) -> Deployment {
        Deployment::new(
            DeploymentKind::Create,
            Uuid::new_v4(),
            slug.to_string(),
            service.to_string(),
            format!("registry/{}:v1", service),
            "v1".to_string(),
            1,
            None,
        )
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let store = MemoryStore::new();
        let d = deployment("acme", "app");

        store.insert(&d).await.unwrap();
        let loaded = store.get(d.id).await.unwrap().unwrap();
        assert_eq!(loaded.service_name, "app");

        assert!(store.get(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_missing_record() {
        let store = MemoryStore::new();
        let d = deployment("acme", "app");

        let err = store.update(&d).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_list_orders_newest_first() {
        let store = MemoryStore::new();

        let older = deployment("acme", "app");
        store.insert(&older).await.unwrap();

        let mut newer = deployment("acme", "app");
        newer.created_at = older.created_at + chrono::Duration::seconds(1);
        store.insert(&newer).await.unwrap();

        let filter = DeploymentFilter {
            limit: 10,
            ..Default::default()
        };
        let listed = store.list(&filter).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, newer.id);
        assert_eq!(listed[1].id, older.id);
    }

    #[tokio::test]
    async fn test_list_filters_by_tenant_and_status() {
        let store = MemoryStore::new();

        let mut succeeded = deployment("acme", "app");
        succeeded.status = DeploymentStatus::Succeeded;
        store.insert(&succeeded).await.unwrap();

        let pending = deployment("globex", "web");
        store.insert(&pending).await.unwrap();

        let filter = DeploymentFilter {
            tenant_slug: Some("acme".to_string()),
            status: Some(DeploymentStatus::Succeeded),
            limit: 10,
            ..Default::default()
        };
        let listed = store.list(&filter).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, succeeded.id);
    }

    #[tokio::test]
    async fn test_history_oldest_first() {
        let store = MemoryStore::new();
        let d = deployment("acme", "app");

        let first = HistoryEntry::new(d.id, DeploymentStatus::Pending, None);
        let mut second = HistoryEntry::new(d.id, DeploymentStatus::InProgress, None);
        second.created_at = first.created_at + chrono::Duration::seconds(1);

        // Insert out of order; read side sorts.
        store.append_history(&second).await.unwrap();
        store.append_history(&first).await.unwrap();

        let entries = store.history_for(d.id).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].status, DeploymentStatus::Pending);
        assert_eq!(entries[1].status, DeploymentStatus::InProgress);
    }
}
