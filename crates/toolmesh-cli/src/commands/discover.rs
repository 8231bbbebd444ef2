//! Discover command: list the tools of every configured agent

use super::{connect_each, load_agents};
use crate::{
    cli::OutputFormat,
    error::CliResult,
    utils::{truncate_text, ColoredOutput},
};
use serde_json::{json, Map, Value as JsonValue};
use std::collections::BTreeMap;
use std::path::Path;
use toolmesh_client::{AgentError, AgentResult, Coordinator};
use toolmesh_core::ToolDescriptor;

pub struct DiscoverCommand;

impl DiscoverCommand {
    pub async fn run(config: &Path, format: OutputFormat) -> CliResult<()> {
        let agents = load_agents(config)?;
        let coordinator = Coordinator::new();
        let failures = connect_each(&coordinator, agents).await;

        let mut catalog = coordinator.discover_tools().await;
        for (name, error) in failures {
            catalog.insert(name, Err(error));
        }
        coordinator.shutdown().await;

        if format.is_json() {
            println!("{}", format.format_json(&Self::to_json(&catalog))?);
        } else {
            Self::display(&catalog);
        }
        Ok(())
    }

    fn to_json(catalog: &BTreeMap<String, AgentResult<Vec<ToolDescriptor>>>) -> JsonValue {
        let mut out = Map::new();
        for (agent, outcome) in catalog {
            let entry = match outcome {
                Ok(tools) => json!({ "tools": tools }),
                Err(e) => error_json(e),
            };
            out.insert(agent.clone(), entry);
        }
        JsonValue::Object(out)
    }

    fn display(catalog: &BTreeMap<String, AgentResult<Vec<ToolDescriptor>>>) {
        if catalog.is_empty() {
            println!("{}", ColoredOutput::dim("No agents configured."));
            return;
        }

        for (agent, outcome) in catalog {
            match outcome {
                Ok(tools) => {
                    println!("{} ({} tools)", ColoredOutput::highlight(agent), tools.len());
                    for tool in tools {
                        println!(
                            "  {:<24} {}",
                            tool.name,
                            ColoredOutput::dim(&truncate_text(&tool.description, 60))
                        );
                    }
                }
                Err(e) => {
                    println!(
                        "{} {}",
                        ColoredOutput::highlight(agent),
                        ColoredOutput::error("unavailable")
                    );
                    println!("  {}", e);
                }
            }
        }
    }
}

pub(crate) fn error_json(error: &AgentError) -> JsonValue {
    json!({ "error": { "kind": error.kind(), "message": error.to_string() } })
}
