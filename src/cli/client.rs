use std::sync::Arc;

use anyhow::Result;
use phoenix::{
    client::ControlPlaneClient,
    config::Config,
    desktop::RemoteDesktop,
    machinery::store::{KvStore, MemoryStore, Store},
    session::VmSession,
    settings::EndpointStore,
    terminal::TerminalChannel,
};
use tracing::debug;

/// Everything a command needs, built once per invocation.
pub struct Context {
    pub config: Config,
    pub endpoint: Arc<EndpointStore>,
    pub client: Arc<ControlPlaneClient>,
}

pub async fn get_context(ephemeral: bool) -> Result<Context> {
    let config = Config::load().await?;

    let store: Arc<dyn KvStore> = if ephemeral {
        debug!("using in-memory settings store");
        Arc::new(MemoryStore::new())
    } else {
        debug!("opening settings store at {}", config.store_path.display());
        Arc::new(Store::new(&config.store_path).await?)
    };

    let endpoint = Arc::new(EndpointStore::new(store));
    let client = Arc::new(ControlPlaneClient::with_timeout(
        endpoint.clone(),
        config.request_timeout,
    ));

    Ok(Context {
        config,
        endpoint,
        client,
    })
}

impl Context {
    pub fn session(&self) -> Arc<VmSession> {
        VmSession::new(self.client.clone(), self.config.session())
    }

    pub fn terminal(&self) -> Arc<TerminalChannel> {
        TerminalChannel::new(self.client.clone(), self.config.terminal_poll_interval)
    }

    pub fn desktop(&self, session: Arc<VmSession>) -> RemoteDesktop {
        RemoteDesktop::new(session, self.endpoint.clone(), &self.config.viewer_path)
    }
}
