//! HTTP access to the VM control plane.
//!
//! [`ControlPlaneClient`] resolves the server address from the
//! [`EndpointStore`] on every request, so a changed address takes effect on the
//! next call without rebuilding anything that holds the client.

#[cfg(test)]
pub(crate) mod scripted;

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::{debug, warn};

use crate::{
    constants::DEFAULT_REQUEST_TIMEOUT,
    error::TransportError,
    resources::{
        terminal::{RunCommandRequest, TerminalLine, TerminalOutput},
        vm::{HealthReport, ServerMessage, VmConfig, VmDefaults, VmStatus},
    },
    settings::EndpointStore,
};

pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// Operations the session, terminal and desktop components need from the server.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    async fn get_status(&self) -> TransportResult<VmStatus>;
    async fn get_defaults(&self) -> TransportResult<VmConfig>;
    async fn start_vm(&self, config: &VmConfig) -> TransportResult<ServerMessage>;
    async fn stop_vm(&self) -> TransportResult<ServerMessage>;
    async fn run_command(&self, command: &str) -> TransportResult<ServerMessage>;
    /// Lines produced since the previous call; the server tracks the cursor.
    async fn get_terminal_output(&self) -> TransportResult<Vec<TerminalLine>>;
    async fn get_qemu_logs(&self) -> TransportResult<Vec<String>>;
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum QemuLogs {
    Wrapped { logs: Vec<String> },
    Bare(Vec<String>),
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

pub struct ControlPlaneClient {
    client: Client,
    endpoint: Arc<EndpointStore>,
}

impl ControlPlaneClient {
    pub fn new(endpoint: Arc<EndpointStore>) -> Self {
        Self::with_timeout(endpoint, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(endpoint: Arc<EndpointStore>, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!("falling back to default http client: {}", e);
                Client::new()
            });

        Self { client, endpoint }
    }

    pub fn endpoint(&self) -> &Arc<EndpointStore> {
        &self.endpoint
    }

    /// `GET /health`
    pub async fn health(&self) -> TransportResult<HealthReport> {
        self.get("/health").await
    }

    /// Checks that `base_url` answers `GET /vm_status` without persisting it.
    pub async fn probe(&self, base_url: impl AsRef<str>) -> TransportResult<VmStatus> {
        let base_url = base_url.as_ref().trim().trim_end_matches('/');
        let url = format!("{}/vm_status", base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(TransportError::from)?;
        decode(response).await
    }

    async fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let base_url = self.endpoint.base_url().await;
        let url = format!("{}{}", base_url.trim_end_matches('/'), path);
        debug!("{} {}", method, url);
        self.client.request(method, url)
    }

    async fn get<R: DeserializeOwned>(&self, path: &str) -> TransportResult<R> {
        let response = self
            .request(Method::GET, path)
            .await
            .send()
            .await
            .map_err(TransportError::from)?;
        decode(response).await
    }

    async fn post<R: DeserializeOwned>(
        &self,
        path: &str,
        body: Option<&(impl Serialize + Sync)>,
    ) -> TransportResult<R> {
        let mut request = self.request(Method::POST, path).await;
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await.map_err(TransportError::from)?;
        decode(response).await
    }
}

async fn decode<R: DeserializeOwned>(response: Response) -> TransportResult<R> {
    let status = response.status();
    let bytes = response.bytes().await.map_err(TransportError::from)?;

    if !status.is_success() {
        let message = serde_json::from_slice::<ErrorBody>(&bytes)
            .map(|body| body.message)
            .unwrap_or_else(|_| {
                format!(
                    "HTTP {}: {}",
                    status.as_u16(),
                    status.canonical_reason().unwrap_or("request failed")
                )
            });
        return Err(TransportError::http(status.as_u16(), message));
    }

    serde_json::from_slice(&bytes).map_err(|e| {
        let body = String::from_utf8_lossy(&bytes);
        TransportError::network(format!("malformed response ({}): {}", e, body))
    })
}

#[async_trait]
impl ControlPlane for ControlPlaneClient {
    async fn get_status(&self) -> TransportResult<VmStatus> {
        self.get("/vm_status").await
    }

    async fn get_defaults(&self) -> TransportResult<VmConfig> {
        let defaults: VmDefaults = self.get("/get_defaults").await?;
        Ok(defaults.into())
    }

    async fn start_vm(&self, config: &VmConfig) -> TransportResult<ServerMessage> {
        self.post("/start_vm", Some(config)).await
    }

    async fn stop_vm(&self) -> TransportResult<ServerMessage> {
        self.post("/stop_vm", None::<&()>).await
    }

    async fn run_command(&self, command: &str) -> TransportResult<ServerMessage> {
        let body = RunCommandRequest {
            command: command.to_string(),
        };
        self.post("/run_terminal_command", Some(&body)).await
    }

    async fn get_terminal_output(&self) -> TransportResult<Vec<TerminalLine>> {
        let output: TerminalOutput = self.get("/get_terminal_output").await?;
        Ok(output.output)
    }

    async fn get_qemu_logs(&self) -> TransportResult<Vec<String>> {
        let logs = match self.get::<QemuLogs>("/qemu_logs").await? {
            QemuLogs::Wrapped { logs } => logs,
            QemuLogs::Bare(logs) => logs,
        };
        Ok(logs)
    }
}
