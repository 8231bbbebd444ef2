//! HTTP transport: one JSON-RPC message per `POST {base}/mcp`

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info};

use super::Transport;
use crate::error::{error_detail, AgentError, AgentResult};
use toolmesh_core::{
    JsonRpcRequest, JsonRpcResponse, DEFAULT_MAX_CONCURRENCY, DEFAULT_TIMEOUT_SECS,
};

pub struct HttpTransport {
    base_url: String,
    client: reqwest::Client,
    permits: Arc<Semaphore>,
    open: AtomicBool,
    next_id: AtomicU64,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>) -> AgentResult<Self> {
        Self::with_limits(
            base_url,
            Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            DEFAULT_MAX_CONCURRENCY,
        )
    }

    /// `timeout` bounds every HTTP request; `max_concurrency` bounds requests in flight
    pub fn with_limits(
        base_url: impl Into<String>,
        timeout: Duration,
        max_concurrency: usize,
    ) -> AgentResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AgentError::Connection(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            permits: Arc::new(Semaphore::new(max_concurrency.max(1))),
            open: AtomicBool::new(false),
            next_id: AtomicU64::new(1),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/mcp", self.base_url)
    }

    async fn post(&self, message: &JsonRpcRequest) -> AgentResult<reqwest::Response> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| AgentError::Transport("request limiter closed".to_string()))?;

        self.client
            .post(self.endpoint())
            .json(message)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AgentError::Transport(format!(
                        "'{}' to {} timed out",
                        message.method, self.base_url
                    ))
                } else {
                    AgentError::Transport(format!(
                        "'{}' to {} failed: {}",
                        message.method, self.base_url, e
                    ))
                }
            })
    }
}

/// Any non-2xx answer from the bridge means the tool could not be reached
fn unreachable_status(base_url: &str, status: StatusCode, body: &[u8]) -> AgentError {
    if status == StatusCode::SERVICE_UNAVAILABLE {
        return AgentError::Transport(format!("{} has no provider attached", base_url));
    }
    match serde_json::from_slice::<JsonRpcResponse>(body) {
        Ok(JsonRpcResponse {
            error: Some(error),
            ..
        }) => AgentError::Transport(format!(
            "{} answered {}: {}",
            base_url,
            status,
            error_detail(&error)
        )),
        _ => AgentError::Transport(format!("{} answered {}", base_url, status)),
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn describe(&self) -> String {
        self.base_url.clone()
    }

    async fn open(&self) -> AgentResult<()> {
        let url = format!("{}/health", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AgentError::Connection(format!("{} is unreachable: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(AgentError::Connection(format!(
                "{} answered {}",
                url,
                response.status()
            )));
        }

        let health: Value = response.json().await.unwrap_or(Value::Null);
        info!(url = %self.base_url, service = ?health.get("service"), "Agent endpoint is healthy");
        self.open.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn request(&self, method: &str, params: Option<Value>) -> AgentResult<JsonRpcResponse> {
        if !self.is_open() {
            return Err(AgentError::Transport(format!(
                "transport to {} is closed",
                self.base_url
            )));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let response = self.post(&JsonRpcRequest::new(id, method, params)).await?;
        let status = response.status();
        debug!(url = %self.base_url, method, %status, "Bridge responded");

        let body = response
            .bytes()
            .await
            .map_err(|e| AgentError::Transport(format!("failed to read response body: {}", e)))?;

        if !status.is_success() {
            return Err(unreachable_status(&self.base_url, status, &body));
        }

        let parsed = serde_json::from_slice::<JsonRpcResponse>(&body)
            .map_err(|e| AgentError::Protocol(format!("malformed response body: {}", e)))?;

        if parsed.id != Value::from(id) {
            return Err(AgentError::Protocol(format!(
                "response id {} does not match request id {}",
                parsed.id, id
            )));
        }
        Ok(parsed)
    }

    async fn notify(&self, method: &str, params: Option<Value>) -> AgentResult<()> {
        let response = self.post(&JsonRpcRequest::notification(method, params)).await?;
        if !response.status().is_success() {
            return Err(AgentError::Transport(format!(
                "notification '{}' rejected with {}",
                method,
                response.status()
            )));
        }
        Ok(())
    }

    async fn close(&self) {
        if self.open.swap(false, Ordering::SeqCst) {
            debug!(url = %self.base_url, "HTTP transport closed");
        }
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}
