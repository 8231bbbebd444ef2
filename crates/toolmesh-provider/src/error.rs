//! Error handling for tool providers

use thiserror::Error;
use toolmesh_core::jsonrpc::JsonRpcError;

/// Result type for a single tool execution
pub type ToolResult<T> = Result<T, ToolError>;

/// Failures a provider reports about one tool call
#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    /// The tool ran and failed; reported as an `isError` result rather than a protocol error
    #[error("Tool execution failed: {0}")]
    Execution(String),
}

impl ToolError {
    /// Convert to JSON-RPC error
    pub fn to_jsonrpc_error(&self) -> JsonRpcError {
        match self {
            ToolError::UnknownTool(name) => {
                JsonRpcError::method_not_found().with_detail(format!("Unknown tool: {}", name))
            }
            ToolError::InvalidArguments(msg) => {
                JsonRpcError::invalid_params().with_detail(msg.clone())
            }
            ToolError::Execution(msg) => JsonRpcError::internal_error().with_detail(msg.clone()),
        }
    }
}

/// Result type for the serving loops
pub type ProviderResult<T> = Result<T, ProviderError>;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
