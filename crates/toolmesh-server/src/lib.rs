//! Toolmesh HTTP bridge
//!
//! Re-exposes an in-process [`ToolProvider`] over HTTP: `POST /mcp` takes one
//! JSON-RPC message per request and `GET /health` reports the attached provider.

pub mod error;
pub mod handlers;
pub mod state;

pub use error::{ServerError, ServerResult};
pub use state::BridgeState;

use axum::{
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use toolmesh_provider::ToolProvider;
use tower_http::trace::TraceLayer;
use tracing::info;

pub fn create_router(state: BridgeState) -> Router {
    Router::new()
        .route("/mcp", post(handlers::mcp::handle_mcp))
        .route("/health", get(handlers::health::health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve on an already-bound listener until `shutdown` resolves
pub async fn serve_listener<F>(
    listener: TcpListener,
    state: BridgeState,
    shutdown: F,
) -> ServerResult<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!("HTTP bridge listening on {}", addr);
    }
    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

/// Bind `addr` and serve `provider` until Ctrl-C
pub async fn serve_http(provider: Arc<dyn ToolProvider>, addr: &str) -> ServerResult<()> {
    let info = provider.server_info();
    info!("Starting {} v{} (HTTP mode) on {}", info.name, info.version, addr);

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind {
            addr: addr.to_string(),
            source,
        })?;

    serve_listener(listener, BridgeState::new(provider), async {
        let _ = tokio::signal::ctrl_c().await;
        info!("Shutdown signal received");
    })
    .await
}
