//! HTTP control-plane client

use std::time::Duration;

use http::StatusCode;
use reqwest::{header, Client, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;
use url::Url;

use crate::cluster::{ClusterAdapter, ClusterError, WorkloadStatus};
use crate::config::ClusterSettings;
use crate::errors::OrchestratorError;

/// Cluster control-plane API client
pub struct ControlPlaneClient {
    client: Client,
    base_url: String,
    token: Option<SecretString>,
}

#[derive(Debug, Serialize)]
struct NamespaceSpec<'a> {
    name: &'a str,
}

/// Rolling-replacement bounds sent with every workload spec. The cluster
/// must never drop below the desired replica count during an update.
#[derive(Debug, Serialize)]
struct RolloutStrategy {
    max_unavailable: u32,
    max_surge: u32,
}

impl Default for RolloutStrategy {
    fn default() -> Self {
        Self {
            max_unavailable: 0,
            max_surge: 1,
        }
    }
}

#[derive(Debug, Serialize)]
struct WorkloadSpec<'a> {
    name: &'a str,
    image: &'a str,
    replicas: u32,
    strategy: RolloutStrategy,
}

#[derive(Debug, Serialize)]
struct ServiceSpec<'a> {
    name: &'a str,
    port: u16,
    selector: &'a str,
}

impl ControlPlaneClient {
    /// Create a client from cluster settings
    pub fn new(settings: &ClusterSettings) -> Result<Self, OrchestratorError> {
        Url::parse(&settings.base_url)
            .map_err(|e| OrchestratorError::ConfigError(format!("invalid cluster base URL: {}", e)))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .map_err(|e| OrchestratorError::ConfigError(e.to_string()))?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            token: settings.token.clone().map(SecretString::from),
        })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        debug!("{} {}", method, url);

        let mut request = self.client.request(method, &url);
        if let Some(token) = &self.token {
            request = request.header(
                header::AUTHORIZATION,
                format!("Bearer {}", token.expose_secret()),
            );
        }
        request
    }

    /// Map a non-success response onto the typed error set
    async fn check(response: Response, resource: &str) -> Result<Response, ClusterError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response.text().await.unwrap_or_default();
        match status {
            StatusCode::CONFLICT => Err(ClusterError::Conflict {
                resource: resource.to_string(),
            }),
            StatusCode::NOT_FOUND => Err(ClusterError::NotFound {
                resource: resource.to_string(),
            }),
            _ => Err(ClusterError::Api {
                status: status.as_u16(),
                message,
            }),
        }
    }

    async fn post<B: Serialize>(
        &self,
        path: &str,
        body: &B,
        resource: &str,
    ) -> Result<(), ClusterError> {
        let response = self
            .request(reqwest::Method::POST, path)
            .json(body)
            .send()
            .await?;
        Self::check(response, resource).await?;
        Ok(())
    }

    async fn put<B: Serialize>(
        &self,
        path: &str,
        body: &B,
        resource: &str,
    ) -> Result<(), ClusterError> {
        let response = self
            .request(reqwest::Method::PUT, path)
            .json(body)
            .send()
            .await?;
        Self::check(response, resource).await?;
        Ok(())
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, resource: &str) -> Result<T, ClusterError> {
        let response = self.request(reqwest::Method::GET, path).send().await?;
        let response = Self::check(response, resource).await?;
        Ok(response.json().await?)
    }
}

#[async_trait::async_trait]
impl ClusterAdapter for ControlPlaneClient {
    async fn create_namespace(&self, tenant_slug: &str) -> Result<String, ClusterError> {
        let name = crate::models::deployment::namespace_for(tenant_slug);
        self.post("/v1/namespaces", &NamespaceSpec { name: &name }, &name)
            .await?;
        Ok(name)
    }

    async fn create_workload(
        &self,
        namespace: &str,
        service_name: &str,
        image: &str,
        replicas: u32,
    ) -> Result<(), ClusterError> {
        let path = format!("/v1/namespaces/{}/workloads", namespace);
        let spec = WorkloadSpec {
            name: service_name,
            image,
            replicas,
            strategy: RolloutStrategy::default(),
        };
        self.post(&path, &spec, service_name).await
    }

    async fn update_workload(
        &self,
        namespace: &str,
        service_name: &str,
        image: &str,
        replicas: u32,
    ) -> Result<(), ClusterError> {
        let path = format!("/v1/namespaces/{}/workloads/{}", namespace, service_name);
        let spec = WorkloadSpec {
            name: service_name,
            image,
            replicas,
            strategy: RolloutStrategy::default(),
        };
        self.put(&path, &spec, service_name).await
    }

    async fn create_service_endpoint(
        &self,
        namespace: &str,
        service_name: &str,
        port: u16,
    ) -> Result<(), ClusterError> {
        let path = format!("/v1/namespaces/{}/services", namespace);
        let spec = ServiceSpec {
            name: service_name,
            port,
            selector: service_name,
        };
        self.post(&path, &spec, service_name).await
    }

    async fn workload_status(
        &self,
        namespace: &str,
        service_name: &str,
    ) -> Result<WorkloadStatus, ClusterError> {
        let path = format!(
            "/v1/namespaces/{}/workloads/{}/status",
            namespace, service_name
        );
        self.get(&path, service_name).await
    }
}
