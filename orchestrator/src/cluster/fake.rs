//! In-memory fake cluster for environments without a live control plane

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::cluster::{ClusterAdapter, ClusterError, WorkloadStatus};
use crate::models::deployment::namespace_for;

/// Time source for the fake cluster
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually advanced time for deterministic tests
pub struct ManualClock {
    now: RwLock<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(start),
        }
    }

    /// Advance the clock by a duration
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.write().unwrap_or_else(|e| e.into_inner());
        *now += chrono::Duration::from_std(by).unwrap_or_else(|_| chrono::Duration::zero());
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read().unwrap_or_else(|e| e.into_inner())
    }
}

#[derive(Debug, Clone)]
struct FakeWorkload {
    image: String,
    replicas: u32,
    rolled_out_at: DateTime<Utc>,
}

#[derive(Default)]
struct FakeState {
    namespaces: HashSet<String>,
    workloads: HashMap<(String, String), FakeWorkload>,
    services: HashSet<(String, String)>,
}

/// In-memory cluster adapter.
///
/// Rollouts settle after `settle_delay` as measured by the injected clock;
/// until then the workload reports zero ready replicas.
pub struct FakeCluster {
    clock: Arc<dyn Clock>,
    settle_delay: Duration,
    state: RwLock<FakeState>,
}

impl FakeCluster {
    /// Create a fake cluster on the system clock with instant rollouts
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock), Duration::ZERO)
    }

    /// Create a fake cluster with an explicit clock and settle delay
    pub fn with_clock(clock: Arc<dyn Clock>, settle_delay: Duration) -> Self {
        Self {
            clock,
            settle_delay,
            state: RwLock::new(FakeState::default()),
        }
    }

    fn settled(&self, rolled_out_at: DateTime<Utc>) -> bool {
        let settle = chrono::Duration::from_std(self.settle_delay)
            .unwrap_or_else(|_| chrono::Duration::zero());
        self.clock.now() >= rolled_out_at + settle
    }
}

impl Default for FakeCluster {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ClusterAdapter for FakeCluster {
    async fn create_namespace(&self, tenant_slug: &str) -> Result<String, ClusterError> {
        let name = namespace_for(tenant_slug);
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());

        if !state.namespaces.insert(name.clone()) {
            return Err(ClusterError::Conflict {
                resource: name.clone(),
            });
        }

        debug!("fake cluster: created namespace {}", name);
        Ok(name)
    }

    async fn create_workload(
        &self,
        namespace: &str,
        service_name: &str,
        image: &str,
        replicas: u32,
    ) -> Result<(), ClusterError> {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());

        if !state.namespaces.contains(namespace) {
            return Err(ClusterError::NotFound {
                resource: namespace.to_string(),
            });
        }

        let key = (namespace.to_string(), service_name.to_string());
        if state.workloads.contains_key(&key) {
            return Err(ClusterError::Conflict {
                resource: service_name.to_string(),
            });
        }

        state.workloads.insert(
            key,
            FakeWorkload {
                image: image.to_string(),
                replicas,
                rolled_out_at: self.clock.now(),
            },
        );

        debug!(
            "fake cluster: created workload {}/{} ({})",
            namespace, service_name, image
        );
        Ok(())
    }

    async fn update_workload(
        &self,
        namespace: &str,
        service_name: &str,
        image: &str,
        replicas: u32,
    ) -> Result<(), ClusterError> {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());

        let key = (namespace.to_string(), service_name.to_string());
        let rolled_out_at = self.clock.now();
        match state.workloads.get_mut(&key) {
            Some(workload) => {
                workload.image = image.to_string();
                workload.replicas = replicas;
                workload.rolled_out_at = rolled_out_at;
            }
            None => {
                return Err(ClusterError::NotFound {
                    resource: service_name.to_string(),
                })
            }
        }

        debug!(
            "fake cluster: updated workload {}/{} -> {}",
            namespace, service_name, image
        );
        Ok(())
    }

    async fn create_service_endpoint(
        &self,
        namespace: &str,
        service_name: &str,
        _port: u16,
    ) -> Result<(), ClusterError> {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());

        if !state.namespaces.contains(namespace) {
            return Err(ClusterError::NotFound {
                resource: namespace.to_string(),
            });
        }

        let key = (namespace.to_string(), service_name.to_string());
        if !state.services.insert(key) {
            return Err(ClusterError::Conflict {
                resource: service_name.to_string(),
            });
        }

        debug!(
            "fake cluster: created service {}/{}",
            namespace, service_name
        );
        Ok(())
    }

    async fn workload_status(
        &self,
        namespace: &str,
        service_name: &str,
    ) -> Result<WorkloadStatus, ClusterError> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());

        let key = (namespace.to_string(), service_name.to_string());
        let workload = state.workloads.get(&key).ok_or_else(|| ClusterError::NotFound {
            resource: service_name.to_string(),
        })?;

        let ready = if self.settled(workload.rolled_out_at) {
            workload.replicas
        } else {
            0
        };

        Ok(WorkloadStatus {
            replicas: workload.replicas,
            ready_replicas: ready,
            available_replicas: ready,
            updated_replicas: workload.replicas,
        })
    }
}
