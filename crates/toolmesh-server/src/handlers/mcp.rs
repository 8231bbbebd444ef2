use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::{error::ServerError, state::BridgeState};
use toolmesh_core::{jsonrpc::extract_id, mcp::LATEST_PROTOCOL_VERSION};

pub const PROTOCOL_VERSION_HEADER: &str = "mcp-protocol-version";

/// POST /mcp
///
/// Protocol-level outcomes (including JSON-RPC errors) are HTTP 200. HTTP error
/// statuses are reserved for the bridge itself: 503 without a provider, 500 for
/// an unreadable body or a failure while dispatching.
pub async fn handle_mcp(State(state): State<BridgeState>, body: Bytes) -> Response {
    let parsed = serde_json::from_slice::<Value>(&body);
    let id = parsed.as_ref().map(extract_id).unwrap_or(Value::Null);

    let Some(server) = state.current().await else {
        warn!("Rejecting MCP request: no provider attached");
        return ServerError::NotInitialized.into_jsonrpc_response(id);
    };

    if let Err(e) = parsed {
        warn!("Malformed MCP request body: {}", e);
        return ServerError::MalformedBody(e.to_string()).into_jsonrpc_response(Value::Null);
    }

    // Separate task: a provider panic surfaces as a 500
    let dispatched = tokio::spawn(async move { server.process_message(&body).await }).await;
    let version = [(PROTOCOL_VERSION_HEADER, LATEST_PROTOCOL_VERSION)];
    match dispatched {
        Ok(Some(response)) => {
            debug!("MCP response for id {}", response.id);
            (StatusCode::OK, version, Json(response)).into_response()
        }
        Ok(None) => (StatusCode::ACCEPTED, version).into_response(),
        Err(e) => {
            error!("MCP dispatch failed: {}", e);
            ServerError::Internal(e.to_string()).into_jsonrpc_response(id)
        }
    }
}
