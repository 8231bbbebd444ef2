//! Agent connection: lifecycle, handshake and tool dispatch over one transport

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::error::{error_detail, AgentError, AgentResult};
use crate::transport::{HttpTransport, StdioTransport, Transport};
use toolmesh_core::{
    mcp::{
        is_supported_version, LATEST_PROTOCOL_VERSION, METHOD_INITIALIZE, METHOD_INITIALIZED,
        METHOD_TOOLS_CALL, METHOD_TOOLS_LIST,
    },
    AgentSpec, CallToolResult, Implementation, JsonRpcResponse, ListToolsResult, ToolDescriptor,
    TransportConfig,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Disconnected,
    Connected,
    Failed,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the coordinator needs from a connection, independent of transport
#[async_trait]
pub trait AgentClient: Send + Sync {
    fn name(&self) -> &str;

    /// Open the transport, handshake and cache the tool list
    async fn connect(&self) -> AgentResult<()>;

    /// Cached descriptors from the last discovery
    async fn list_tools(&self) -> AgentResult<Vec<ToolDescriptor>>;

    /// Live `tools/list` round trip that replaces the cache
    async fn refresh_tools(&self) -> AgentResult<Vec<ToolDescriptor>>;

    async fn call_tool(
        &self,
        tool: &str,
        arguments: Map<String, Value>,
    ) -> AgentResult<CallToolResult>;

    /// Release the transport. Never fails; repeated calls are no-ops.
    async fn disconnect(&self);

    async fn status(&self) -> ConnectionStatus;

    fn is_transport_open(&self) -> bool;
}

#[derive(Debug)]
struct ConnectionState {
    status: ConnectionStatus,
    tools: Vec<ToolDescriptor>,
    server_info: Option<Implementation>,
    protocol_version: Option<String>,
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self {
            status: ConnectionStatus::Disconnected,
            tools: Vec::new(),
            server_info: None,
            protocol_version: None,
        }
    }
}

/// A named connection to one agent over an exclusively owned transport
pub struct AgentConnection {
    name: String,
    transport: Box<dyn Transport>,
    state: RwLock<ConnectionState>,
}

impl AgentConnection {
    pub fn new(name: impl Into<String>, transport: Box<dyn Transport>) -> Self {
        Self {
            name: name.into(),
            transport,
            state: RwLock::new(ConnectionState::default()),
        }
    }

    /// Build an unconnected connection for a configured agent
    pub fn from_spec(spec: &AgentSpec) -> AgentResult<Self> {
        let transport: Box<dyn Transport> = match &spec.transport {
            TransportConfig::Stdio {
                command,
                args,
                env,
                cwd,
            } => Box::new(
                StdioTransport::new(command.clone(), args.clone())
                    .with_env(env.clone())
                    .with_cwd(cwd.clone())
                    .with_timeout(spec.timeout()),
            ),
            TransportConfig::Http { url } => Box::new(HttpTransport::with_limits(
                url.clone(),
                spec.timeout(),
                spec.concurrency(),
            )?),
        };
        Ok(Self::new(spec.name.clone(), transport))
    }

    /// Server name and version reported during the handshake
    pub async fn server_info(&self) -> Option<Implementation> {
        self.state.read().await.server_info.clone()
    }

    pub async fn protocol_version(&self) -> Option<String> {
        self.state.read().await.protocol_version.clone()
    }

    /// OS process id of the agent, for pipe-backed connections with a live child
    pub async fn process_id(&self) -> Option<u32> {
        self.transport.process_id().await
    }

    async fn handshake(&self) -> AgentResult<(String, Implementation, Vec<ToolDescriptor>)> {
        self.transport.open().await?;

        let params = json!({
            "protocolVersion": LATEST_PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": { "name": "toolmesh", "version": env!("CARGO_PKG_VERSION") }
        });
        let response = self
            .transport
            .request(METHOD_INITIALIZE, Some(params))
            .await
            .map_err(establishment)?;
        let (version, server_info) =
            parse_initialize(protocol_result(response, METHOD_INITIALIZE)?)?;

        self.transport
            .notify(METHOD_INITIALIZED, None)
            .await
            .map_err(establishment)?;

        let response = self
            .transport
            .request(METHOD_TOOLS_LIST, None)
            .await
            .map_err(establishment)?;
        let tools = parse_tools(protocol_result(response, METHOD_TOOLS_LIST)?)?;
        Ok((version, server_info, tools))
    }

    async fn ensure_connected(&self) -> AgentResult<()> {
        match self.state.read().await.status {
            ConnectionStatus::Connected => Ok(()),
            _ => Err(AgentError::NotConnected(self.name.clone())),
        }
    }

    /// Move to `Failed` when a transport error left the channel unusable
    async fn observe(&self, err: AgentError) -> AgentError {
        if matches!(err, AgentError::Transport(_)) && !self.transport.is_open() {
            let mut state = self.state.write().await;
            if state.status == ConnectionStatus::Connected {
                error!(agent = %self.name, "Transport lost: {}", err);
                state.status = ConnectionStatus::Failed;
            }
        }
        err
    }
}

#[async_trait]
impl AgentClient for AgentConnection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn connect(&self) -> AgentResult<()> {
        let mut state = self.state.write().await;
        if state.status == ConnectionStatus::Connected {
            debug!(agent = %self.name, "Already connected");
            return Ok(());
        }

        info!(agent = %self.name, target = %self.transport.describe(), "Connecting to agent");
        match self.handshake().await {
            Ok((version, server_info, tools)) => {
                info!(
                    agent = %self.name,
                    server = %server_info.name,
                    protocol = %version,
                    tools = tools.len(),
                    "Agent connected"
                );
                *state = ConnectionState {
                    status: ConnectionStatus::Connected,
                    tools,
                    server_info: Some(server_info),
                    protocol_version: Some(version),
                };
                Ok(())
            }
            Err(e) => {
                error!(agent = %self.name, "Failed to connect: {}", e);
                self.transport.close().await;
                *state = ConnectionState {
                    status: ConnectionStatus::Failed,
                    ..ConnectionState::default()
                };
                Err(e)
            }
        }
    }

    async fn list_tools(&self) -> AgentResult<Vec<ToolDescriptor>> {
        let state = self.state.read().await;
        match state.status {
            ConnectionStatus::Connected => Ok(state.tools.clone()),
            _ => Err(AgentError::NotConnected(self.name.clone())),
        }
    }

    async fn refresh_tools(&self) -> AgentResult<Vec<ToolDescriptor>> {
        self.ensure_connected().await?;

        let response = match self.transport.request(METHOD_TOOLS_LIST, None).await {
            Ok(response) => response,
            Err(e) => return Err(self.observe(e).await),
        };
        let tools = parse_tools(protocol_result(response, METHOD_TOOLS_LIST)?)?;

        let mut state = self.state.write().await;
        if state.status != ConnectionStatus::Connected {
            return Err(AgentError::NotConnected(self.name.clone()));
        }
        debug!(agent = %self.name, tools = tools.len(), "Refreshed tool list");
        state.tools = tools.clone();
        Ok(tools)
    }

    async fn call_tool(
        &self,
        tool: &str,
        arguments: Map<String, Value>,
    ) -> AgentResult<CallToolResult> {
        self.ensure_connected().await?;
        debug!(agent = %self.name, tool, "Calling tool");

        let params = json!({ "name": tool, "arguments": arguments });
        let response = match self.transport.request(METHOD_TOOLS_CALL, Some(params)).await {
            Ok(response) => response,
            Err(e) => return Err(self.observe(e).await),
        };

        if let Some(err) = response.error {
            warn!(
                agent = %self.name,
                tool,
                code = err.code,
                "Tool call rejected: {}",
                error_detail(&err)
            );
            return Err(AgentError::from_tool_error(&err));
        }
        let result = response.result.ok_or_else(|| {
            AgentError::Protocol("tools/call response carried neither result nor error".into())
        })?;
        let result: CallToolResult = serde_json::from_value(result)
            .map_err(|e| AgentError::Protocol(format!("malformed tools/call result: {}", e)))?;

        if result.is_error {
            let message = result.joined_text();
            warn!(agent = %self.name, tool, "Tool reported failure: {}", message);
            return Err(AgentError::ToolExecution {
                code: None,
                message,
            });
        }
        Ok(result)
    }

    async fn disconnect(&self) {
        let mut state = self.state.write().await;
        if state.status == ConnectionStatus::Disconnected && !self.transport.is_open() {
            debug!(agent = %self.name, "Already disconnected");
            return;
        }

        self.transport.close().await;
        *state = ConnectionState::default();
        info!(agent = %self.name, "Agent disconnected");
    }

    async fn status(&self) -> ConnectionStatus {
        self.state.read().await.status
    }

    fn is_transport_open(&self) -> bool {
        self.transport.is_open()
    }
}

/// Transport failures while establishing a connection are connection failures
fn establishment(err: AgentError) -> AgentError {
    match err {
        AgentError::Transport(msg) => AgentError::Connection(msg),
        other => other,
    }
}

fn protocol_result(response: JsonRpcResponse, method: &str) -> AgentResult<Value> {
    if let Some(err) = response.error {
        return Err(AgentError::Protocol(format!("'{}' failed: {}", method, err)));
    }
    response
        .result
        .ok_or_else(|| AgentError::Protocol(format!("'{}' response carried no result", method)))
}

fn parse_initialize(result: Value) -> AgentResult<(String, Implementation)> {
    let version = match result.get("protocolVersion") {
        Some(Value::String(v)) if is_supported_version(v) => v.clone(),
        Some(Value::String(v)) => {
            return Err(AgentError::Protocol(format!(
                "unsupported protocol version '{}'",
                v
            )));
        }
        _ => {
            return Err(AgentError::Protocol(
                "initialize result lacks a protocolVersion string".into(),
            ))
        }
    };
    if !result.get("capabilities").map(Value::is_object).unwrap_or(false) {
        return Err(AgentError::Protocol(
            "initialize result lacks a capabilities object".into(),
        ));
    }

    let server_info = result
        .get("serverInfo")
        .cloned()
        .and_then(|v| serde_json::from_value::<Implementation>(v).ok())
        .unwrap_or_else(|| Implementation {
            name: "unknown".to_string(),
            version: "unknown".to_string(),
        });
    Ok((version, server_info))
}

fn parse_tools(result: Value) -> AgentResult<Vec<ToolDescriptor>> {
    serde_json::from_value::<ListToolsResult>(result)
        .map(|list| list.tools)
        .map_err(|e| AgentError::Protocol(format!("malformed tools/list result: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initialize_result_validation() {
        let ok = json!({
            "protocolVersion": "2025-03-26",
            "capabilities": {},
            "serverInfo": {"name": "currency-exchange-agent", "version": "1.0"}
        });
        let (version, info) = parse_initialize(ok).unwrap();
        assert_eq!(version, "2025-03-26");
        assert_eq!(info.name, "currency-exchange-agent");

        let bad_version = json!({"protocolVersion": "0.1", "capabilities": {}});
        assert!(matches!(parse_initialize(bad_version), Err(AgentError::Protocol(_))));

        let numeric_version = json!({"protocolVersion": 20250618, "capabilities": {}});
        assert!(matches!(parse_initialize(numeric_version), Err(AgentError::Protocol(_))));

        let no_caps = json!({"protocolVersion": "2025-06-18", "capabilities": []});
        assert!(matches!(parse_initialize(no_caps), Err(AgentError::Protocol(_))));
    }

    #[test]
    fn tools_list_validation() {
        let tools = parse_tools(json!({"tools": [{"name": "a"}]})).unwrap();
        assert_eq!(tools[0].name, "a");
        assert_eq!(tools[0].input_schema, json!({"type": "object"}));

        assert!(matches!(
            parse_tools(json!({"tools": "nope"})),
            Err(AgentError::Protocol(_))
        ));
    }

    #[test]
    fn establishment_maps_transport_failures() {
        assert_eq!(
            establishment(AgentError::Transport("eof".into())),
            AgentError::Connection("eof".into())
        );
        assert_eq!(
            establishment(AgentError::Protocol("x".into())),
            AgentError::Protocol("x".into())
        );
    }

    #[tokio::test]
    async fn operations_before_connect_fail() {
        let conn = AgentConnection::new(
            "idle",
            Box::new(StdioTransport::new("does-not-matter", vec![])),
        );
        assert_eq!(conn.status().await, ConnectionStatus::Disconnected);
        assert_eq!(
            conn.list_tools().await,
            Err(AgentError::NotConnected("idle".into()))
        );
        assert!(matches!(
            conn.call_tool("x", Map::new()).await,
            Err(AgentError::NotConnected(_))
        ));
        assert!(matches!(
            conn.refresh_tools().await,
            Err(AgentError::NotConnected(_))
        ));
        assert_eq!(conn.process_id().await, None);
    }

    #[tokio::test]
    async fn spawn_failure_is_connection_error() {
        let conn = AgentConnection::new(
            "ghost",
            Box::new(StdioTransport::new("/nonexistent/toolmesh-agent-binary", vec![])),
        );
        assert!(matches!(conn.connect().await, Err(AgentError::Connection(_))));
        assert_eq!(conn.status().await, ConnectionStatus::Failed);
        assert!(!conn.is_transport_open());

        conn.disconnect().await;
        assert_eq!(conn.status().await, ConnectionStatus::Disconnected);
    }
}
