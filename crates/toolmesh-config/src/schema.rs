use crate::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use toolmesh_core::{AgentSpec, TransportConfig, DEFAULT_MAX_CONCURRENCY, DEFAULT_TIMEOUT_SECS};

/// Values applied to every agent that does not override them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Defaults {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_max_concurrency() -> usize {
    DEFAULT_MAX_CONCURRENCY
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }
}

/// Root of a coordinator configuration file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    #[serde(default)]
    pub defaults: Defaults,
    #[serde(default)]
    pub agents: Vec<AgentSpec>,
}

impl CoordinatorConfig {
    /// Agent specs with the file-level defaults filled in
    pub fn resolved_agents(&self) -> Vec<AgentSpec> {
        self.agents
            .iter()
            .cloned()
            .map(|mut agent| {
                agent.timeout_secs.get_or_insert(self.defaults.timeout_secs);
                agent.max_concurrency.get_or_insert(self.defaults.max_concurrency);
                agent
            })
            .collect()
    }

    pub fn agent(&self, name: &str) -> Option<&AgentSpec> {
        self.agents.iter().find(|a| a.name == name)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.defaults.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "defaults.timeout_secs must be greater than 0".into(),
            ));
        }
        if self.defaults.max_concurrency == 0 {
            return Err(ConfigError::Validation(
                "defaults.max_concurrency must be greater than 0".into(),
            ));
        }

        let mut seen = HashSet::new();
        for agent in &self.agents {
            if agent.name.trim().is_empty() {
                return Err(ConfigError::MissingField("agents[].name".into()));
            }
            if !seen.insert(agent.name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "Duplicate agent name '{}'",
                    agent.name
                )));
            }
            if agent.timeout_secs == Some(0) {
                return Err(ConfigError::Validation(format!(
                    "Agent '{}': timeout_secs must be greater than 0",
                    agent.name
                )));
            }
            if agent.max_concurrency == Some(0) {
                return Err(ConfigError::Validation(format!(
                    "Agent '{}': max_concurrency must be greater than 0",
                    agent.name
                )));
            }
            match &agent.transport {
                TransportConfig::Stdio { command, .. } if command.trim().is_empty() => {
                    return Err(ConfigError::MissingField(format!(
                        "agents[{}].transport.command",
                        agent.name
                    )));
                }
                TransportConfig::Http { url }
                    if !(url.starts_with("http://") || url.starts_with("https://")) =>
                {
                    return Err(ConfigError::Validation(format!(
                        "Agent '{}': url '{}' must start with http:// or https://",
                        agent.name, url
                    )));
                }
                _ => {}
            }
        }
        Ok(())
    }
}
