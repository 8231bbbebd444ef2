//! Error taxonomy for agent connections and the coordinator

use thiserror::Error;
use toolmesh_core::JsonRpcError;

/// Failures surfaced by agent connections and the coordinator
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AgentError {
    /// The transport could not be established
    #[error("Connection error: {0}")]
    Connection(String),

    /// Handshake or response was malformed
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Agent '{0}' is not connected")]
    NotConnected(String),

    #[error("Unknown agent: {0}")]
    UnknownAgent(String),

    /// The provider ran (or refused) the tool and reported failure
    #[error("Tool execution failed: {message}")]
    ToolExecution { code: Option<i32>, message: String },

    /// Mid-call transport loss or timeout
    #[error("Transport error: {0}")]
    Transport(String),
}

impl AgentError {
    /// Stable short name, used in JSON output
    pub fn kind(&self) -> &'static str {
        match self {
            AgentError::Connection(_) => "connection_error",
            AgentError::Protocol(_) => "protocol_error",
            AgentError::NotConnected(_) => "not_connected",
            AgentError::UnknownAgent(_) => "unknown_agent",
            AgentError::ToolExecution { .. } => "tool_execution_error",
            AgentError::Transport(_) => "transport_error",
        }
    }

    /// Whether the tool could not be reached at all, as opposed to having run and failed
    pub fn is_unreachable(&self) -> bool {
        matches!(
            self,
            AgentError::Connection(_) | AgentError::NotConnected(_) | AgentError::Transport(_)
        )
    }

    pub(crate) fn from_tool_error(error: &JsonRpcError) -> Self {
        AgentError::ToolExecution {
            code: Some(error.code),
            message: error_detail(error),
        }
    }
}

/// The most specific human-readable text carried by a JSON-RPC error
pub(crate) fn error_detail(error: &JsonRpcError) -> String {
    error
        .data
        .as_ref()
        .and_then(|d| d.get("message"))
        .and_then(|m| m.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| error.message.clone())
}

/// Result type for agent operations
pub type AgentResult<T> = Result<T, AgentError>;
