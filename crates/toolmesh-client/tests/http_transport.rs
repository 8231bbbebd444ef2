use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use toolmesh_client::{AgentClient, AgentConnection, AgentError, ConnectionStatus, Coordinator};
use toolmesh_core::{AgentSpec, CallToolResult, Implementation, ToolDescriptor, TransportConfig};
use toolmesh_provider::{ActivityProvider, CurrencyProvider, ToolProvider, ToolResult};
use toolmesh_server::{serve_listener, BridgeState};

struct Bridge {
    url: String,
    state: BridgeState,
    stop: Option<oneshot::Sender<()>>,
}

impl Drop for Bridge {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }
}

/// Provider whose every call panics inside the bridge
struct ExplodingProvider;

#[async_trait]
impl ToolProvider for ExplodingProvider {
    fn server_info(&self) -> Implementation {
        Implementation {
            name: "exploding".into(),
            version: "0".into(),
        }
    }

    async fn list_tools(&self) -> Vec<ToolDescriptor> {
        vec![ToolDescriptor::new(
            "explode",
            "Always panics",
            json!({"type": "object"}),
        )]
    }

    async fn call_tool(
        &self,
        name: &str,
        _arguments: Map<String, Value>,
    ) -> ToolResult<CallToolResult> {
        panic!("{} went off", name)
    }
}

async fn start_bridge(provider: Option<Arc<dyn ToolProvider>>) -> Bridge {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    let state = match provider {
        Some(provider) => BridgeState::new(provider),
        None => BridgeState::empty(),
    };

    let (stop, stopped) = oneshot::channel::<()>();
    let serve_state = state.clone();
    tokio::spawn(async move {
        let _ = serve_listener(listener, serve_state, async {
            let _ = stopped.await;
        })
        .await;
    });

    Bridge {
        url: format!("http://{}", addr),
        state,
        stop: Some(stop),
    }
}

fn http_spec(name: &str, url: &str) -> AgentSpec {
    AgentSpec::new(name, TransportConfig::http(url))
        .with_timeout_secs(5)
        .with_max_concurrency(4)
}

fn args(v: Value) -> Map<String, Value> {
    v.as_object().cloned().unwrap()
}

#[tokio::test]
async fn coordinator_over_http_bridges() {
    let currency = start_bridge(Some(Arc::new(CurrencyProvider::new()))).await;
    let activity = start_bridge(Some(Arc::new(ActivityProvider::new()))).await;

    let coordinator = Coordinator::new();
    coordinator
        .register_agent(http_spec("currency", &currency.url))
        .await
        .unwrap();
    coordinator
        .register_agent(http_spec("activity", &activity.url))
        .await
        .unwrap();
    assert_eq!(
        coordinator.agent_names().await,
        vec!["activity".to_string(), "currency".to_string()]
    );

    let discovered = coordinator.discover_tools().await;
    assert_eq!(discovered["currency"].as_ref().unwrap().len(), 2);
    assert_eq!(discovered["activity"].as_ref().unwrap().len(), 3);
    assert_eq!(
        coordinator.refresh_tools("activity").await.unwrap(),
        *discovered["activity"].as_ref().unwrap()
    );

    let result = coordinator
        .call_tool(
            "currency",
            "convert_amount",
            args(json!({"amount": 100, "currency_from": "USD", "currency_to": "KRW"})),
        )
        .await
        .unwrap();
    assert_eq!(result.joined_text(), "100 USD = 136111.11 KRW");

    let err = coordinator
        .call_tool("currency", "missing_tool", Map::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AgentError::ToolExecution {
            code: Some(-32601),
            ..
        }
    ));

    let err = coordinator
        .call_tool("weather", "forecast", Map::new())
        .await
        .unwrap_err();
    assert_eq!(err, AgentError::UnknownAgent("weather".into()));

    // The handshake marked the bridge initialized
    let health: Value = reqwest_health(&currency.url).await;
    assert_eq!(health["initialized"], json!(true));

    coordinator.shutdown().await;
    assert!(coordinator.is_empty().await);
}

#[tokio::test]
async fn concurrent_http_calls() {
    let bridge = start_bridge(Some(Arc::new(ActivityProvider::new()))).await;
    let coordinator = Arc::new(Coordinator::new());
    coordinator
        .register_agent(http_spec("activity", &bridge.url))
        .await
        .unwrap();

    let mut handles = Vec::new();
    for day in 1..=8u64 {
        let coordinator = coordinator.clone();
        handles.push(tokio::spawn(async move {
            coordinator
                .call_tool(
                    "activity",
                    "plan_activities",
                    args(json!({"location": "Seoul", "duration_days": day})),
                )
                .await
        }));
    }
    for (i, handle) in handles.into_iter().enumerate() {
        let text = handle.await.unwrap().unwrap().joined_text();
        assert!(text.contains(&format!("({} days)", i + 1)));
    }
    coordinator.shutdown().await;
}

#[tokio::test]
async fn bridge_without_provider_refuses_connection() {
    let bridge = start_bridge(None).await;
    let coordinator = Coordinator::new();

    let err = coordinator
        .register_agent(http_spec("empty", &bridge.url))
        .await
        .unwrap_err();
    assert!(matches!(err, AgentError::Connection(_)));
    assert!(coordinator.is_empty().await);
}

#[tokio::test]
async fn detached_provider_is_a_transport_error() {
    let bridge = start_bridge(Some(Arc::new(CurrencyProvider::new()))).await;
    let conn = AgentConnection::from_spec(&http_spec("currency", &bridge.url)).unwrap();
    conn.connect().await.unwrap();

    bridge.state.detach().await;
    let err = conn
        .call_tool(
            "get_exchange_rate",
            args(json!({"currency_from": "USD", "currency_to": "EUR"})),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AgentError::Transport(_)));
    // The HTTP channel itself is still usable
    assert_eq!(conn.status().await, ConnectionStatus::Connected);

    conn.disconnect().await;
    conn.disconnect().await;
    assert_eq!(conn.status().await, ConnectionStatus::Disconnected);
}

#[tokio::test]
async fn bridge_internal_failure_is_unreachable_not_tool_failure() {
    let bridge = start_bridge(Some(Arc::new(ExplodingProvider))).await;
    let conn = AgentConnection::from_spec(&http_spec("exploding", &bridge.url)).unwrap();
    conn.connect().await.unwrap();
    assert_eq!(conn.list_tools().await.unwrap().len(), 1);

    let err = conn.call_tool("explode", Map::new()).await.unwrap_err();
    assert!(err.is_unreachable(), "unexpected error: {:?}", err);
    assert!(matches!(&err, AgentError::Transport(m) if m.contains("500")));
    assert_eq!(conn.status().await, ConnectionStatus::Connected);

    conn.disconnect().await;
}

#[tokio::test]
async fn unreachable_endpoint_is_connection_error() {
    // Bind then drop to get a port nothing listens on
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let coordinator = Coordinator::new();
    let spec = http_spec("gone", &format!("http://{}", addr)).with_timeout_secs(1);
    let err = coordinator.register_agent(spec).await.unwrap_err();
    assert!(matches!(err, AgentError::Connection(_)));
    assert!(coordinator.is_empty().await);
}

async fn reqwest_health(base: &str) -> Value {
    reqwest::get(format!("{}/health", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}
