use axum::{extract::State, http::StatusCode, response::Json};
use serde_json::{json, Value};

use crate::state::BridgeState;

pub const PROTOCOL_LABEL: &str = "MCP over HTTP";

/// GET /health
pub async fn health(State(state): State<BridgeState>) -> (StatusCode, Json<Value>) {
    match state.current().await {
        Some(server) => (
            StatusCode::OK,
            Json(json!({
                "status": "healthy",
                "service": server.provider().server_info().name,
                "protocol": PROTOCOL_LABEL,
                "initialized": server.is_initialized(),
            })),
        ),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "unavailable",
                "service": Value::Null,
                "protocol": PROTOCOL_LABEL,
                "initialized": false,
            })),
        ),
    }
}
