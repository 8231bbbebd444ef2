//! JSON-RPC dispatcher for a tool provider, plus the stdio serving loop

use serde_json::{json, Map, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

use crate::{error::ToolError, ProviderResult, ToolProvider};
use toolmesh_core::{
    jsonrpc::{
        error_response, extract_id, success_response, JsonRpcError, JsonRpcRequest,
        JsonRpcResponse,
    },
    mcp::{
        negotiate_version, InitializeParams, InitializeResult, ListToolsResult,
        LATEST_PROTOCOL_VERSION, METHOD_INITIALIZE, METHOD_PING, METHOD_TOOLS_CALL,
        METHOD_TOOLS_LIST,
    },
    JSONRPC_VERSION,
};

/// Answers `initialize`, `ping`, `tools/list` and `tools/call` for one provider
pub struct ProviderServer {
    provider: Arc<dyn ToolProvider>,
    initialized: AtomicBool,
}

impl ProviderServer {
    pub fn new(provider: Arc<dyn ToolProvider>) -> Self {
        Self {
            provider,
            initialized: AtomicBool::new(false),
        }
    }

    pub fn provider(&self) -> &Arc<dyn ToolProvider> {
        &self.provider
    }

    /// Whether an `initialize` request has been answered
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// Process one raw message. Returns `None` for notifications.
    pub async fn process_message(&self, body: &[u8]) -> Option<JsonRpcResponse> {
        let raw: Value = match serde_json::from_slice(body) {
            Ok(v) => v,
            Err(e) => {
                warn!("Failed to parse JSON-RPC message: {}", e);
                return Some(error_response(
                    Value::Null,
                    JsonRpcError::parse_error().with_detail(e.to_string()),
                ));
            }
        };

        // MCP doesn't support batch
        if raw.is_array() {
            return Some(error_response(
                Value::Null,
                JsonRpcError::invalid_request().with_detail("Batch requests are not supported"),
            ));
        }

        let id = extract_id(&raw);
        match serde_json::from_value::<JsonRpcRequest>(raw) {
            Ok(request) => self.handle_request(request).await,
            Err(e) => Some(error_response(
                id,
                JsonRpcError::invalid_request().with_detail(e.to_string()),
            )),
        }
    }

    /// Dispatch a parsed request
    pub async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        debug!("Processing method: {}", request.method);

        if request.is_notification() {
            // Currently no notifications are processed
            debug!("Received notification '{}', ignoring", request.method);
            return None;
        }

        let id = request.response_id();
        if request.jsonrpc != JSONRPC_VERSION {
            return Some(error_response(
                id,
                JsonRpcError::invalid_request().with_detail("Invalid JSON-RPC version"),
            ));
        }

        let outcome = match request.method.as_str() {
            METHOD_INITIALIZE => self.handle_initialize(request.params.as_ref()),
            METHOD_PING => Ok(json!({})),
            METHOD_TOOLS_LIST => self.handle_tools_list().await,
            METHOD_TOOLS_CALL => self.handle_tools_call(request.params.as_ref()).await,
            other => Err(JsonRpcError::method_not_found().with_data(json!({ "method": other }))),
        };

        Some(match outcome {
            Ok(result) => success_response(id, result),
            Err(error) => error_response(id, error),
        })
    }

    fn handle_initialize(&self, params: Option<&Value>) -> Result<Value, JsonRpcError> {
        let requested = match params {
            Some(p) => serde_json::from_value::<InitializeParams>(p.clone())
                .map_err(|e| JsonRpcError::invalid_params().with_detail(e.to_string()))?
                .protocol_version,
            None => LATEST_PROTOCOL_VERSION.to_string(),
        };

        let response = InitializeResult {
            protocol_version: negotiate_version(&requested).to_string(),
            capabilities: json!({ "tools": {} }),
            server_info: self.provider.server_info(),
            instructions: self.provider.instructions(),
        };

        self.initialized.store(true, Ordering::SeqCst);
        info!("Client initialized (protocol {})", response.protocol_version);
        serialize(&response)
    }

    async fn handle_tools_list(&self) -> Result<Value, JsonRpcError> {
        let tools = self.provider.list_tools().await;
        debug!("Listed {} tools", tools.len());
        serialize(&ListToolsResult { tools })
    }

    async fn handle_tools_call(&self, params: Option<&Value>) -> Result<Value, JsonRpcError> {
        let name = params
            .and_then(|p| p.get("name"))
            .and_then(Value::as_str)
            .ok_or_else(|| {
                ToolError::UnknownTool("<missing name>".to_string()).to_jsonrpc_error()
            })?;

        let arguments = match params.and_then(|p| p.get("arguments")) {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(map)) => map.clone(),
            Some(_) => {
                return Err(ToolError::InvalidArguments("'arguments' must be an object".to_string())
                    .to_jsonrpc_error())
            }
        };

        debug!("Calling tool: {}", name);
        match self.provider.call_tool(name, arguments).await {
            Ok(result) => serialize(&result),
            Err(ToolError::Execution(msg)) => {
                warn!("Tool '{}' reported failure: {}", name, msg);
                serialize(&toolmesh_core::CallToolResult::error(msg))
            }
            Err(e) => {
                warn!("Tool '{}' rejected: {}", name, e);
                Err(e.to_jsonrpc_error())
            }
        }
    }
}

fn serialize<T: serde::Serialize>(value: &T) -> Result<Value, JsonRpcError> {
    serde_json::to_value(value)
        .map_err(|e| JsonRpcError::internal_error().with_detail(e.to_string()))
}

/// Serve newline-delimited JSON-RPC over arbitrary byte streams, one message at a time
pub async fn serve_lines<R, W>(
    server: &ProviderServer,
    reader: R,
    mut writer: W,
) -> ProviderResult<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    while let Some(line) = lines.next_line().await? {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        debug!("Processing line: {}", trimmed);
        if let Some(response) = server.process_message(trimmed.as_bytes()).await {
            let mut frame = serde_json::to_vec(&response)?;
            frame.push(b'\n');
            writer.write_all(&frame).await?;
            writer.flush().await?;
        }
    }
    Ok(())
}

/// Serve a provider over this process's stdin/stdout until stdin closes
pub async fn serve_stdio(provider: Arc<dyn ToolProvider>) -> ProviderResult<()> {
    let info = provider.server_info();
    info!("Starting {} v{} (stdio mode)", info.name, info.version);

    let server = ProviderServer::new(provider);
    serve_lines(&server, tokio::io::stdin(), tokio::io::stdout()).await?;

    info!("{} stopped: stdin closed", info.name);
    Ok(())
}
