//! Toolmesh core types
//!
//! Wire-level vocabulary shared by the provider, the client and the HTTP bridge:
//! the JSON-RPC 2.0 envelope, the MCP method set and tool shapes, and the agent
//! configuration consumed by the coordinator.

pub mod agent;
pub mod jsonrpc;
pub mod mcp;

// Re-export commonly used types
pub use agent::{AgentSpec, TransportConfig, DEFAULT_MAX_CONCURRENCY, DEFAULT_TIMEOUT_SECS};
pub use jsonrpc::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, JSONRPC_VERSION};
pub use mcp::{
    CallToolParams, CallToolResult, ContentBlock, Implementation, InitializeParams,
    InitializeResult, ListToolsResult, ToolDescriptor,
};
