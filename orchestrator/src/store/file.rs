//! JSON-file-backed deployment store

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use crate::errors::OrchestratorError;
use crate::models::deployment::Deployment;
use crate::models::history::HistoryEntry;
use crate::store::{DeploymentFilter, DeploymentStore};

/// On-disk snapshot of the store
#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    deployments: Vec<Deployment>,
    history: Vec<HistoryEntry>,
}

/// Deployment store persisted as a single JSON file.
///
/// The full snapshot is held in memory behind a lock and rewritten
/// atomically (write to a temp file, then rename) after every mutation.
pub struct FileStore {
    path: PathBuf,
    snapshot: RwLock<Snapshot>,
}

impl FileStore {
    /// Open a store at the given path, loading any existing snapshot
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, OrchestratorError> {
        let path = path.as_ref().to_path_buf();

        let snapshot = if fs::metadata(&path).await.is_ok() {
            let contents = fs::read_to_string(&path).await?;
            serde_json::from_str(&contents)?
        } else {
            Snapshot::default()
        };

        info!(
            "Opened deployment store at {} ({} records)",
            path.display(),
            snapshot.deployments.len()
        );

        Ok(Self {
            path,
            snapshot: RwLock::new(snapshot),
        })
    }

    async fn flush(&self, snapshot: &Snapshot) -> Result<(), OrchestratorError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let contents = serde_json::to_string_pretty(snapshot)?;
        let temp_path = self.path.with_extension("tmp");

        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(contents.as_bytes()).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&temp_path, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl DeploymentStore for FileStore {
    async fn insert(&self, deployment: &Deployment) -> Result<(), OrchestratorError> {
        let mut snapshot = self.snapshot.write().await;
        snapshot.deployments.push(deployment.clone());
        self.flush(&snapshot).await
    }

    async fn update(&self, deployment: &Deployment) -> Result<(), OrchestratorError> {
        let mut snapshot = self.snapshot.write().await;

        match snapshot
            .deployments
            .iter_mut()
            .find(|d| d.id == deployment.id)
        {
            Some(existing) => *existing = deployment.clone(),
            None => {
                return Err(OrchestratorError::NotFound(format!(
                    "deployment {}",
                    deployment.id
                )))
            }
        }

        self.flush(&snapshot).await
    }

    async fn get(&self, id: Uuid) -> Result<Option<Deployment>, OrchestratorError> {
        let snapshot = self.snapshot.read().await;
        Ok(snapshot.deployments.iter().find(|d| d.id == id).cloned())
    }

    async fn list(&self, filter: &DeploymentFilter) -> Result<Vec<Deployment>, OrchestratorError> {
        let snapshot = self.snapshot.read().await;

        let mut matched: Vec<Deployment> = snapshot
            .deployments
            .iter()
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
        let mut snapshot = self.snapshot.write().await;
        snapshot.history.push(entry.clone());
        self.flush(&snapshot).await
    }

    async fn history_for(
        &self,
        deployment_id: Uuid,
    ) -> Result<Vec<HistoryEntry>, OrchestratorError> {
        let snapshot = self.snapshot.read().await;

        let mut entries: Vec<HistoryEntry> = snapshot
            .history
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
    use crate::models::deployment::DeploymentKind;

    fn temp_store_path() -> PathBuf {
        std::env::temp_dir().join(format!("berth-store-{}.json", Uuid::new_v4()))
    }

    fn deployment() -> Deployment {
        Deployment::new(
            DeploymentKind::Create,
            Uuid::new_v4(),
            "acme".to_string(),
            "app".to_string(),
            "registry/app:v1".to_string(),
            "v1".to_string(),
            1,
            None,
        )
    }

    #[tokio::test]
    async fn test_snapshot_survives_reopen() {
        let path = temp_store_path();

        let d = deployment();
        {
            let store = FileStore::open(&path).await.unwrap();
            store.insert(&d).await.unwrap();
            store
                .append_history(&HistoryEntry::new(
                    d.id,
                    crate::models::deployment::DeploymentStatus::Pending,
                    None,
                ))
                .await
                .unwrap();
        }

        let reopened = FileStore::open(&path).await.unwrap();
        let loaded = reopened.get(d.id).await.unwrap().unwrap();
        assert_eq!(loaded.image, "registry/app:v1");
        assert_eq!(reopened.history_for(d.id).await.unwrap().len(), 1);

        let _ = fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn test_update_rewrites_record() {
        let path = temp_store_path();
        let store = FileStore::open(&path).await.unwrap();

        let mut d = deployment();
        store.insert(&d).await.unwrap();

        d.status = crate::models::deployment::DeploymentStatus::InProgress;
        store.update(&d).await.unwrap();

        let loaded = store.get(d.id).await.unwrap().unwrap();
        assert_eq!(
            loaded.status,
            crate::models::deployment::DeploymentStatus::InProgress
        );

        let _ = fs::remove_file(&path).await;
    }
}
