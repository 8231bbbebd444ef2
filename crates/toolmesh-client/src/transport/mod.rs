//! Byte-level conduits carrying JSON-RPC messages to an agent

mod http;
mod stdio;

pub use http::HttpTransport;
pub use stdio::StdioTransport;

use crate::error::AgentResult;
use async_trait::async_trait;
use serde_json::Value;
use toolmesh_core::JsonRpcResponse;

/// A request/response channel to one agent.
///
/// Implementations own their handle exclusively and use interior mutability so a
/// connection can share one transport between concurrent callers.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Human-readable target, e.g. the command line or base URL
    fn describe(&self) -> String;

    /// Establish the underlying channel. Calling it on an open transport is a no-op.
    async fn open(&self) -> AgentResult<()>;

    /// Send a request and wait for the response carrying the same id
    async fn request(&self, method: &str, params: Option<Value>) -> AgentResult<JsonRpcResponse>;

    /// Send a notification; no response is expected
    async fn notify(&self, method: &str, params: Option<Value>) -> AgentResult<()>;

    /// Release the channel. Best-effort and idempotent.
    async fn close(&self);

    fn is_open(&self) -> bool;

    /// OS process id of the local agent process, if this transport spawned one
    async fn process_id(&self) -> Option<u32> {
        None
    }
}
