// Container runtime seam and its Docker Engine API implementation
use super::scaling_error::ScalingError;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;

const MANAGED_BY_LABEL: &str = "managed-by";
const MANAGED_BY: &str = "conference-autoscaler";
// must outlive the 30s stop grace period
const RUNTIME_TIMEOUT: Duration = Duration::from_secs(60);

#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Running replicas named `{prefix}-<n>`.
    async fn list_running(&self, prefix: &str) -> Result<Vec<ContainerSummary>, ScalingError>;

    /// A stopped leftover with the same name is replaced; a running one is an error.
    async fn create_and_start(&self, name: &str) -> Result<(), ScalingError>;

    /// Stops with a graceful-shutdown window, then removes.
    async fn stop_and_remove(&self, name: &str, grace: Duration) -> Result<(), ScalingError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContainerSummary {
    pub id: String,
    pub name: String,
    pub replica: u32,
}

/// Replica number of `{prefix}-<digits>`; anything else is not a replica.
pub fn replica_index(prefix: &str, name: &str) -> Option<u32> {
    let digits = name.strip_prefix(prefix)?.strip_prefix('-')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Everything needed to create a new replica.
#[derive(Debug, Clone)]
pub struct ContainerTemplate {
    pub image: String,
    pub network: Option<String>,
}

#[derive(Clone)]
pub struct DockerRuntime {
    client: reqwest::Client,
    base_url: String,
    template: ContainerTemplate,
}

impl DockerRuntime {
    pub fn new(base_url: &str, template: ContainerTemplate) -> Result<Self, ScalingError> {
        let client = reqwest::ClientBuilder::new()
            .timeout(RUNTIME_TIMEOUT)
            .build()
            .map_err(|e| ScalingError::Config(format!("Unable to build Docker client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            template,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(
        &self,
        req: reqwest::RequestBuilder,
        accepted: &[StatusCode],
        context: &str,
    ) -> Result<String, ScalingError> {
        let resp = req
            .send()
            .await
            .map_err(|e| ScalingError::transport(context, e))?;
        let status = resp.status();
        let body = resp.text().await.map_err(|e| {
            ScalingError::HttpError(status, format!("Failed to read response: {}", e))
        })?;

        if accepted.contains(&status) {
            Ok(body)
        } else {
            Err(ScalingError::HttpError(status, format!("{} - {}", context, body)))
        }
    }

    async fn create(&self, name: &str) -> Result<String, ScalingError> {
        let replica = name.rsplit('-').next().unwrap_or_default();
        let mut host_config = serde_json::json!({
            "RestartPolicy": { "Name": "unless-stopped" }
        });
        if let Some(network) = &self.template.network {
            host_config["NetworkMode"] = serde_json::Value::String(network.clone());
        }
        let payload = serde_json::json!({
            "Image": self.template.image,
            "Env": [format!("REPLICA_ID={}", replica)],
            "Labels": { MANAGED_BY_LABEL: MANAGED_BY, "replica": replica },
            "HostConfig": host_config,
        });

        let req = self
            .client
            .post(self.url("/containers/create"))
            .query(&[("name", name)])
            .json(&payload);
        let body = self
            .send(req, &[StatusCode::CREATED], &format!("create {}", name))
            .await?;
        let created: CreatedContainer = serde_json::from_str(&body)?;
        if created.id.is_empty() {
            return Err(ScalingError::Runtime(format!("create {} returned no container id", name)));
        }
        for warning in created.warnings.iter().flatten() {
            log::warn!("Docker warning while creating {}: {}", name, warning);
        }
        Ok(created.id)
    }

    async fn start(&self, id: &str) -> Result<(), ScalingError> {
        let req = self.client.post(self.url(&format!("/containers/{}/start", id)));
        self.send(
            req,
            &[StatusCode::NO_CONTENT, StatusCode::NOT_MODIFIED],
            &format!("start {}", id),
        )
        .await
        .map(|_| ())
    }

    async fn remove(&self, name: &str) -> Result<(), ScalingError> {
        let req = self.client.delete(self.url(&format!("/containers/{}", name)));
        self.send(
            req,
            &[StatusCode::NO_CONTENT, StatusCode::NOT_FOUND],
            &format!("remove {}", name),
        )
        .await
        .map(|_| ())
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CreatedContainer {
    id: String,
    warnings: Option<Vec<String>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListedContainer {
    id: String,
    #[serde(default)]
    names: Vec<String>,
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn list_running(&self, prefix: &str) -> Result<Vec<ContainerSummary>, ScalingError> {
        let filters = serde_json::json!({
            "name": [prefix],
            "status": ["running"],
        });
        let req = self
            .client
            .get(self.url("/containers/json"))
            .query(&[("filters", filters.to_string())]);
        let body = self.send(req, &[StatusCode::OK], "list containers").await?;
        let listed: Vec<ListedContainer> = serde_json::from_str(&body)?;

        // Docker's name filter is a substring match
        Ok(listed
            .into_iter()
            .filter_map(|c| {
                let (name, replica) = c
                    .names
                    .iter()
                    .map(|n| n.trim_start_matches('/'))
                    .find_map(|n| replica_index(prefix, n).map(|r| (n.to_string(), r)))?;
                Some(ContainerSummary { id: c.id, name, replica })
            })
            .collect())
    }

    async fn create_and_start(&self, name: &str) -> Result<(), ScalingError> {
        let start = std::time::Instant::now();
        let id = match self.create(name).await {
            // a stopped leftover from an earlier partial scale-down; removal
            // fails with 409 as well if it is still running
            Err(ScalingError::HttpError(StatusCode::CONFLICT, body)) => {
                log::warn!("Container {} already exists, replacing it: {}", name, body);
                self.remove(name).await?;
                self.create(name).await?
            }
            other => other?,
        };
        if let Err(e) = self.start(&id).await {
            // do not leave a created-but-stopped replica behind
            if let Err(cleanup) = self.remove(name).await {
                log::warn!("Failed to remove unstarted container {}: {}", name, cleanup);
            }
            return Err(e);
        }
        log::info!(
            "Started container {} ({}) in {:.3}s",
            name,
            id,
            start.elapsed().as_secs_f64()
        );
        Ok(())
    }

    async fn stop_and_remove(&self, name: &str, grace: Duration) -> Result<(), ScalingError> {
        let start = std::time::Instant::now();
        let req = self
            .client
            .post(self.url(&format!("/containers/{}/stop", name)))
            .query(&[("t", grace.as_secs())]);
        self.send(
            req,
            &[StatusCode::NO_CONTENT, StatusCode::NOT_MODIFIED],
            &format!("stop {}", name),
        )
        .await?;
        self.remove(name).await?;
        log::info!(
            "Stopped and removed container {} in {:.3}s",
            name,
            start.elapsed().as_secs_f64()
        );
        Ok(())
    }
}
