use std::sync::Arc;
use tokio::sync::RwLock;
use toolmesh_provider::{ProviderServer, ToolProvider};

/// Shared bridge state: the provider currently attached, if any
#[derive(Clone, Default)]
pub struct BridgeState {
    provider: Arc<RwLock<Option<Arc<ProviderServer>>>>,
}

impl BridgeState {
    pub fn new(provider: Arc<dyn ToolProvider>) -> Self {
        Self {
            provider: Arc::new(RwLock::new(Some(Arc::new(ProviderServer::new(provider))))),
        }
    }

    /// A bridge with nothing attached; `/mcp` answers 503 until [`attach`](Self::attach)
    pub fn empty() -> Self {
        Self::default()
    }

    pub async fn attach(&self, provider: Arc<dyn ToolProvider>) {
        *self.provider.write().await = Some(Arc::new(ProviderServer::new(provider)));
    }

    pub async fn detach(&self) {
        self.provider.write().await.take();
    }

    pub async fn current(&self) -> Option<Arc<ProviderServer>> {
        self.provider.read().await.clone()
    }
}
