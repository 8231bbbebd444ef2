use serde_json::{json, Map, Value};
use std::io::Write;
use std::path::Path;
use std::process::{Command, Output};
use std::sync::Arc;
use toolmesh_client::{
    AgentClient, AgentConnection, AgentError, Coordinator, StdioTransport, Transport,
};
use toolmesh_core::{AgentSpec, TransportConfig};

const BIN: &str = env!("CARGO_BIN_EXE_toolmesh");

fn serve_args(provider: &str) -> Vec<String> {
    vec!["serve-stdio".into(), "--provider".into(), provider.into()]
}

fn provider_spec(name: &str, provider: &str) -> AgentSpec {
    AgentSpec::new(name, TransportConfig::stdio(BIN, serve_args(provider))).with_timeout_secs(10)
}

fn process_alive(pid: u32) -> bool {
    Path::new(&format!("/proc/{}", pid)).exists()
}

fn args(v: Value) -> Map<String, Value> {
    v.as_object().cloned().unwrap()
}

fn write_config(yaml: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    file.write_all(yaml.as_bytes()).unwrap();
    file
}

fn currency_config(extra: &str) -> tempfile::NamedTempFile {
    write_config(&format!(
        r#"
defaults:
  timeout_secs: 10
agents:
  - name: currency
    transport:
      kind: stdio
      command: "{}"
      args: [serve-stdio, --provider, currency]
{}"#,
        BIN, extra
    ))
}

fn toolmesh(args: &[&str]) -> Output {
    Command::new(BIN)
        .arg("--no-color")
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

#[tokio::test]
async fn coordinator_drives_stdio_subprocess() {
    let coordinator = Coordinator::new();
    coordinator
        .register_agent(provider_spec("currency", "currency"))
        .await
        .unwrap();
    coordinator
        .register_agent(provider_spec("activity", "activity"))
        .await
        .unwrap();

    let discovered = coordinator.discover_tools().await;
    assert_eq!(discovered["currency"].as_ref().unwrap().len(), 2);
    assert_eq!(discovered["activity"].as_ref().unwrap().len(), 3);

    let result = coordinator
        .call_tool(
            "currency",
            "convert_amount",
            args(json!({"amount": 100, "currency_from": "USD", "currency_to": "KRW"})),
        )
        .await
        .unwrap();
    let text = result.joined_text();
    assert!(text.contains("USD") && text.contains("KRW") && text.contains("136111.11"));

    let err = coordinator
        .call_tool(
            "currency",
            "convert_amount",
            args(json!({"currency_from": "USD", "currency_to": "KRW"})),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AgentError::ToolExecution {
            code: Some(-32602),
            ..
        }
    ));

    let text = coordinator
        .call_tool(
            "activity",
            "suggest_restaurants",
            args(json!({"location": "Busan", "budget": "luxury"})),
        )
        .await
        .unwrap()
        .joined_text();
    assert!(text.contains("Busan"));

    coordinator.shutdown().await;
    assert!(coordinator.is_empty().await);
}

#[tokio::test]
async fn disconnect_closes_the_subprocess() {
    let conn = AgentConnection::from_spec(&provider_spec("currency", "currency")).unwrap();
    conn.connect().await.unwrap();
    assert!(conn.is_transport_open());
    assert_eq!(
        conn.server_info().await.map(|i| i.name),
        Some("currency-exchange-agent".to_string())
    );

    conn.disconnect().await;
    assert!(!conn.is_transport_open());
    let err = conn.list_tools().await.unwrap_err();
    assert!(matches!(err, AgentError::NotConnected(_)));
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn closed_transport_leaves_no_process_behind() {
    let transport = StdioTransport::new(BIN, serve_args("activity"));
    transport.open().await.unwrap();
    let pid = transport.process_id().await.unwrap();
    assert!(process_alive(pid));

    let response = transport.request("ping", None).await.unwrap();
    assert_eq!(response.result, Some(json!({})));

    transport.close().await;
    assert!(!transport.is_open());
    assert!(!process_alive(pid));
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn coordinator_shutdown_closes_agent_process() {
    let coordinator = Coordinator::new();
    let spec = provider_spec("currency", "currency");
    let conn = Arc::new(AgentConnection::from_spec(&spec).unwrap());
    coordinator.register_client(conn.clone()).await.unwrap();

    let pid = conn.process_id().await.unwrap();
    assert!(conn.is_transport_open());
    assert!(process_alive(pid));

    coordinator.shutdown().await;
    assert!(coordinator.is_empty().await);
    assert!(!conn.is_transport_open());
    assert_eq!(conn.process_id().await, None);
    assert!(!process_alive(pid));
}

#[test]
fn call_command_prints_tool_text() {
    let config = currency_config("");
    let output = toolmesh(&[
        "call",
        "--config",
        config.path().to_str().unwrap(),
        "currency",
        "convert_amount",
        "--args",
        r#"{"amount": 100, "currency_from": "USD", "currency_to": "KRW"}"#,
    ]);

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "100 USD = 136111.11 KRW");
}

#[test]
fn call_command_reports_unknown_agent() {
    let config = currency_config("");
    let output = toolmesh(&[
        "call",
        "--config",
        config.path().to_str().unwrap(),
        "weather",
        "forecast",
    ]);

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Unknown agent: weather"));
    assert!(output.stdout.is_empty());
}

#[test]
fn call_command_rejects_non_object_args() {
    let config = currency_config("");
    let output = toolmesh(&[
        "call",
        "--config",
        config.path().to_str().unwrap(),
        "currency",
        "convert_amount",
        "--args",
        "[1, 2]",
    ]);

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("--args must be a JSON object"));
}

#[test]
fn discover_reports_broken_agents_inline() {
    let config = currency_config(
        r#"  - name: broken
    transport:
      kind: stdio
      command: /nonexistent/toolmesh-agent
"#,
    );
    let output = toolmesh(&[
        "discover",
        "--config",
        config.path().to_str().unwrap(),
        "--format",
        "json",
    ]);

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let catalog: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(catalog["currency"]["tools"].as_array().unwrap().len(), 2);
    assert_eq!(catalog["broken"]["error"]["kind"], json!("connection_error"));
}

#[test]
fn status_command_summarises_agents() {
    let config = currency_config("");
    let output = toolmesh(&[
        "status",
        "--config",
        config.path().to_str().unwrap(),
        "--format",
        "json",
    ]);

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let status: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(status, json!({"currency": {"status": "connected", "tools": 2}}));
}

#[test]
fn missing_config_file_fails() {
    let output = toolmesh(&["discover", "--config", "/nonexistent/agents.yaml"]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Failed to load agent config from /nonexistent/agents.yaml"));
}
