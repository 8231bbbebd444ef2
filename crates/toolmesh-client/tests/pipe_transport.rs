use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};
use tokio::sync::Mutex;
use toolmesh_client::{
    AgentClient, AgentConnection, AgentError, ConnectionStatus, StdioTransport, Transport,
};
use toolmesh_provider::{serve_lines, CurrencyProvider, ProviderServer, ToolProvider};

fn args(v: Value) -> Map<String, Value> {
    v.as_object().cloned().unwrap()
}

fn pipe_transport(io: DuplexStream, timeout: Duration) -> StdioTransport {
    let (read, write) = tokio::io::split(io);
    StdioTransport::from_streams(read, write, timeout)
}

/// Agent that answers every request on its own task, after `arguments.delay_ms`,
/// echoing `arguments.tag`. Responses may therefore come back in any order.
fn spawn_echo_agent(io: DuplexStream) {
    tokio::spawn(async move {
        let (read, write) = tokio::io::split(io);
        let write = Arc::new(Mutex::new(write));
        let mut lines = BufReader::new(read).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let msg: Value = match serde_json::from_str(&line) {
                Ok(v) => v,
                Err(_) => continue,
            };
            let Some(id) = msg.get("id").cloned() else { continue };
            let arguments = &msg["params"]["arguments"];
            let delay = arguments["delay_ms"].as_u64().unwrap_or(0);
            let tag = arguments["tag"].to_string();
            let write = write.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(delay)).await;
                let resp = json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "result": {"content": [{"type": "text", "text": tag}]}
                });
                let mut w = write.lock().await;
                let _ = w.write_all(format!("{}\n", resp).as_bytes()).await;
                let _ = w.flush().await;
            });
        }
    });
}

/// Agent that completes the handshake with `version`, advertises no tools, and
/// hangs up on the first `tools/call`
fn spawn_fragile_agent(io: DuplexStream, version: &'static str) {
    tokio::spawn(async move {
        let (read, mut write) = tokio::io::split(io);
        let mut lines = BufReader::new(read).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let msg: Value = serde_json::from_str(&line).unwrap();
            let Some(id) = msg.get("id").cloned() else { continue };
            let result = match msg["method"].as_str() {
                Some("initialize") => json!({
                    "protocolVersion": version,
                    "capabilities": {},
                    "serverInfo": {"name": "fragile", "version": "0"}
                }),
                Some("tools/list") => json!({"tools": []}),
                _ => return,
            };
            // Noise the client must skip
            write.write_all(b"starting up...\n").await.unwrap();
            let resp = json!({"jsonrpc": "2.0", "id": id, "result": result});
            write.write_all(format!("{}\n", resp).as_bytes()).await.unwrap();
        }
    });
}

fn currency_connection() -> AgentConnection {
    let (client, server_io) = tokio::io::duplex(64 * 1024);
    tokio::spawn(async move {
        let (read, write) = tokio::io::split(server_io);
        let provider: Arc<dyn ToolProvider> = Arc::new(CurrencyProvider::new());
        let server = ProviderServer::new(provider);
        let _ = serve_lines(&server, read, write).await;
    });
    AgentConnection::new("currency", Box::new(pipe_transport(client, Duration::from_secs(5))))
}

#[tokio::test]
async fn concurrent_calls_complete_in_submission_order() {
    let (client, agent) = tokio::io::duplex(64 * 1024);
    spawn_echo_agent(agent);
    let transport = pipe_transport(client, Duration::from_secs(5));
    let order = Arc::new(std::sync::Mutex::new(Vec::new()));

    // Earlier calls take longer, so any pipelining would reverse the order
    let calls = (0..5usize).map(|i| {
        let transport = &transport;
        let order = order.clone();
        async move {
            let params = json!({"name": "echo", "arguments": {"tag": i, "delay_ms": (5 - i) * 30}});
            let response = transport.request("tools/call", Some(params)).await.unwrap();
            order.lock().unwrap().push(i);
            response
        }
    });
    let responses = futures::future::join_all(calls).await;

    assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    for (i, response) in responses.iter().enumerate() {
        let text = &response.result.as_ref().unwrap()["content"][0]["text"];
        assert_eq!(text, &json!(i.to_string()));
    }
}

#[tokio::test]
async fn late_response_after_timeout_is_discarded() {
    let (client, agent) = tokio::io::duplex(64 * 1024);
    spawn_echo_agent(agent);
    let transport = pipe_transport(client, Duration::from_millis(150));

    let slow = json!({"name": "echo", "arguments": {"tag": 1, "delay_ms": 300}});
    let err = transport.request("tools/call", Some(slow)).await.unwrap_err();
    assert!(matches!(err, AgentError::Transport(_)));
    assert!(transport.is_open());

    let fast = json!({"name": "echo", "arguments": {"tag": 2}});
    let response = transport.request("tools/call", Some(fast)).await.unwrap();
    assert_eq!(response.result.unwrap()["content"][0]["text"], json!("2"));

    // Let the stale answer land in the pipe before the next request reads it
    tokio::time::sleep(Duration::from_millis(250)).await;
    let fast = json!({"name": "echo", "arguments": {"tag": 3}});
    let response = transport.request("tools/call", Some(fast)).await.unwrap();
    assert_eq!(response.result.unwrap()["content"][0]["text"], json!("3"));
}

#[tokio::test]
async fn currency_round_trip_and_tool_failures() {
    let conn = currency_connection();
    conn.connect().await.unwrap();
    assert_eq!(conn.status().await, ConnectionStatus::Connected);
    assert_eq!(conn.server_info().await.unwrap().name, "currency-exchange-agent");
    assert_eq!(conn.protocol_version().await.as_deref(), Some("2025-06-18"));

    let tools = conn.list_tools().await.unwrap();
    let names: Vec<_> = tools.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["get_exchange_rate", "convert_amount"]);
    assert_eq!(conn.refresh_tools().await.unwrap(), tools);

    let result = conn
        .call_tool(
            "convert_amount",
            args(json!({"amount": 100, "currency_from": "USD", "currency_to": "KRW"})),
        )
        .await
        .unwrap();
    assert_eq!(result.content.len(), 1);
    let text = result.joined_text();
    assert!(text.contains("USD") && text.contains("KRW"));
    assert!(text.contains("136111.11"));

    let err = conn
        .call_tool("convert_amount", args(json!({"currency_from": "USD", "currency_to": "KRW"})))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AgentError::ToolExecution {
            code: Some(-32602),
            ..
        }
    ));

    let err = conn.call_tool("missing_tool", Map::new()).await.unwrap_err();
    assert!(matches!(
        err,
        AgentError::ToolExecution {
            code: Some(-32601),
            ..
        }
    ));

    let err = conn
        .call_tool("get_exchange_rate", args(json!({"currency_from": "USD", "currency_to": "XYZ"})))
        .await
        .unwrap_err();
    assert!(matches!(
        &err,
        AgentError::ToolExecution {
            code: None,
            message
        } if message.contains("XYZ")
    ));

    // Tool failures leave the connection usable
    assert_eq!(conn.status().await, ConnectionStatus::Connected);
}

#[tokio::test]
async fn disconnect_twice_is_a_no_op() {
    let conn = currency_connection();
    conn.connect().await.unwrap();

    conn.disconnect().await;
    assert_eq!(conn.status().await, ConnectionStatus::Disconnected);
    assert!(!conn.is_transport_open());

    conn.disconnect().await;
    assert_eq!(conn.status().await, ConnectionStatus::Disconnected);

    let err = conn.call_tool("convert_amount", Map::new()).await.unwrap_err();
    assert_eq!(err, AgentError::NotConnected("currency".into()));
}

#[tokio::test]
async fn agent_hanging_up_fails_the_connection() {
    let (client, agent) = tokio::io::duplex(64 * 1024);
    spawn_fragile_agent(agent, "2024-11-05");
    let transport = pipe_transport(client, Duration::from_secs(5));
    let conn = AgentConnection::new("fragile", Box::new(transport));

    conn.connect().await.unwrap();
    assert!(conn.list_tools().await.unwrap().is_empty());
    assert_eq!(conn.protocol_version().await.as_deref(), Some("2024-11-05"));

    let err = conn.call_tool("anything", Map::new()).await.unwrap_err();
    assert!(matches!(err, AgentError::Transport(_)));
    assert_eq!(conn.status().await, ConnectionStatus::Failed);

    assert!(matches!(
        conn.call_tool("anything", Map::new()).await,
        Err(AgentError::NotConnected(_))
    ));
    assert!(matches!(conn.list_tools().await, Err(AgentError::NotConnected(_))));
}

#[tokio::test]
async fn unsupported_version_is_protocol_error() {
    let (client, agent) = tokio::io::duplex(64 * 1024);
    spawn_fragile_agent(agent, "2023-01-01");
    let transport = pipe_transport(client, Duration::from_secs(5));
    let conn = AgentConnection::new("old", Box::new(transport));

    let err = conn.connect().await.unwrap_err();
    assert!(matches!(err, AgentError::Protocol(_)));
    assert_eq!(conn.status().await, ConnectionStatus::Failed);
    assert!(!conn.is_transport_open());
}
