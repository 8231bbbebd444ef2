//! Coordinator: named agent connections, fan-out discovery and dispatch

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::connection::{AgentClient, AgentConnection, ConnectionStatus};
use crate::error::{AgentError, AgentResult};
use toolmesh_core::{AgentSpec, CallToolResult, ToolDescriptor};

/// Per-agent summary returned by [`Coordinator::check_health`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentHealth {
    pub status: ConnectionStatus,
    pub tools: usize,
}

/// Registry of agent connections keyed by agent name
#[derive(Default)]
pub struct Coordinator {
    agents: RwLock<HashMap<String, Arc<dyn AgentClient>>>,
}

impl Coordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build, connect and register every agent, stopping at the first failure
    pub async fn from_specs(specs: impl IntoIterator<Item = AgentSpec>) -> AgentResult<Self> {
        let coordinator = Self::new();
        for spec in specs {
            if let Err(e) = coordinator.register_agent(spec).await {
                coordinator.shutdown().await;
                return Err(e);
            }
        }
        Ok(coordinator)
    }

    /// Connect to a configured agent and register it under its name
    pub async fn register_agent(&self, spec: AgentSpec) -> AgentResult<()> {
        let connection = AgentConnection::from_spec(&spec)?;
        self.register_client(Arc::new(connection)).await
    }

    /// Connect `client` and register it, replacing (and tearing down) any agent with the
    /// same name. Nothing is inserted if the connection fails.
    pub async fn register_client(&self, client: Arc<dyn AgentClient>) -> AgentResult<()> {
        client.connect().await?;

        let name = client.name().to_string();
        let mut agents = self.agents.write().await;
        if let Some(previous) = agents.remove(&name) {
            info!(agent = %name, "Replacing registered agent");
            previous.disconnect().await;
        }
        agents.insert(name.clone(), client);
        info!(agent = %name, "Agent registered");
        Ok(())
    }

    /// Disconnect and remove one agent
    pub async fn unregister_agent(&self, name: &str) -> AgentResult<()> {
        let removed = self.agents.write().await.remove(name);
        match removed {
            Some(client) => {
                client.disconnect().await;
                info!(agent = %name, "Agent unregistered");
                Ok(())
            }
            None => Err(AgentError::UnknownAgent(name.to_string())),
        }
    }

    /// Tools of every registered agent. A failed agent yields its error in place of a list.
    pub async fn discover_tools(&self) -> BTreeMap<String, AgentResult<Vec<ToolDescriptor>>> {
        let mut discovered = BTreeMap::new();
        for (name, client) in self.snapshot().await {
            let tools = client.list_tools().await;
            if let Err(e) = &tools {
                warn!(agent = %name, "Discovery failed: {}", e);
            }
            discovered.insert(name, tools);
        }
        discovered
    }

    /// Invoke `tool` on the named agent
    pub async fn call_tool(
        &self,
        agent: &str,
        tool: &str,
        arguments: Map<String, Value>,
    ) -> AgentResult<CallToolResult> {
        let client = self.get(agent).await?;
        debug!(agent, tool, "Dispatching tool call");
        client.call_tool(tool, arguments).await
    }

    /// Live `tools/list` on one agent, refreshing its cache
    pub async fn refresh_tools(&self, agent: &str) -> AgentResult<Vec<ToolDescriptor>> {
        self.get(agent).await?.refresh_tools().await
    }

    /// Disconnect every agent and clear the registry. Idempotent.
    pub async fn shutdown(&self) {
        let drained: Vec<_> = self.agents.write().await.drain().collect();
        if drained.is_empty() {
            return;
        }

        info!("Shutting down {} agent connection(s)", drained.len());
        for (_, client) in drained {
            client.disconnect().await;
        }
    }

    pub async fn agent_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.agents.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn len(&self) -> usize {
        self.agents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.agents.read().await.is_empty()
    }

    pub async fn agent_status(&self) -> BTreeMap<String, ConnectionStatus> {
        let mut statuses = BTreeMap::new();
        for (name, client) in self.snapshot().await {
            statuses.insert(name, client.status().await);
        }
        statuses
    }

    pub async fn check_health(&self) -> BTreeMap<String, AgentHealth> {
        let mut health = BTreeMap::new();
        for (name, client) in self.snapshot().await {
            let status = client.status().await;
            let tools = client.list_tools().await.map(|t| t.len()).unwrap_or(0);
            health.insert(name, AgentHealth { status, tools });
        }
        health
    }

    async fn get(&self, agent: &str) -> AgentResult<Arc<dyn AgentClient>> {
        self.agents
            .read()
            .await
            .get(agent)
            .cloned()
            .ok_or_else(|| AgentError::UnknownAgent(agent.to_string()))
    }

    async fn snapshot(&self) -> Vec<(String, Arc<dyn AgentClient>)> {
        self.agents
            .read()
            .await
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}
