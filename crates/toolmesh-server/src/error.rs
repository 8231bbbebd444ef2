//! Bridge error types

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::Value;
use toolmesh_core::jsonrpc::{error_response, JsonRpcError};

pub type ServerResult<T> = Result<T, ServerError>;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// No provider is attached to the bridge
    #[error("Bridge not initialized: no tool provider attached")]
    NotInitialized,

    #[error("Malformed request body: {0}")]
    MalformedBody(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    #[error("HTTP server error: {0}")]
    Serve(#[from] std::io::Error),
}

impl ServerError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServerError::NotInitialized => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// HTTP error status with a JSON-RPC error body echoing `id`
    pub fn into_jsonrpc_response(self, id: Value) -> Response {
        let error = match &self {
            ServerError::MalformedBody(msg) => JsonRpcError::parse_error().with_detail(msg.clone()),
            other => JsonRpcError::internal_error().with_detail(other.to_string()),
        };
        (self.status_code(), Json(error_response(id, error))).into_response()
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        self.into_jsonrpc_response(Value::Null)
    }
}
