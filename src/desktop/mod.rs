use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::info;
use url::Url;

use crate::{
    error::{Error, Result, TransportError},
    resources::vm::RunState,
    session::VmSession,
    settings::EndpointStore,
};

/// Gate in front of the server-hosted remote-desktop viewer.
///
/// Connecting is a best-effort check against the session's last known state.
/// A connected viewer is never torn down here when the VM stops;
/// [`RemoteDesktop::is_stale`] exposes that condition to whoever decides.
pub struct RemoteDesktop {
    session: Arc<VmSession>,
    endpoint: Arc<EndpointStore>,
    viewer_path: String,
    connected: RwLock<Option<Url>>,
}

impl RemoteDesktop {
    pub fn new(
        session: Arc<VmSession>,
        endpoint: Arc<EndpointStore>,
        viewer_path: impl Into<String>,
    ) -> Self {
        Self {
            session,
            endpoint,
            viewer_path: viewer_path.into(),
            connected: RwLock::new(None),
        }
    }

    pub async fn can_connect(&self) -> bool {
        self.session.state().await == RunState::Running
    }

    /// Resolves the viewer address and marks the desktop connected.
    pub async fn connect(&self) -> Result<Url> {
        let state = self.session.state().await;
        if state != RunState::Running {
            return Err(Error::precondition(format!(
                "VM is not running ({}); start it before connecting to the desktop",
                state
            )));
        }

        let url = self.viewer_url().await?;
        info!("connecting remote desktop at {}", url);
        *self.connected.write().await = Some(url.clone());

        Ok(url)
    }

    pub async fn disconnect(&self) -> bool {
        self.connected.write().await.take().is_some()
    }

    pub async fn connection(&self) -> Option<Url> {
        self.connected.read().await.clone()
    }

    /// Connected, but the session no longer believes the VM is running.
    pub async fn is_stale(&self) -> bool {
        self.connected.read().await.is_some() && !self.can_connect().await
    }

    /// `<base url>/<viewer path>`, keeping any path prefix of the base url.
    pub async fn viewer_url(&self) -> Result<Url> {
        let base = self.endpoint.base_url().await;
        let url = format!(
            "{}/{}",
            base.trim_end_matches('/'),
            self.viewer_path.trim_start_matches('/')
        );
        Url::parse(&url).map_err(|e| Error::from(TransportError::from(e)))
    }
}
