//! Call command: invoke one tool on one configured agent

use super::load_agents;
use crate::{
    cli::OutputFormat,
    error::CliResult,
    utils::{parse_arguments, ColoredOutput},
};
use serde_json::json;
use std::path::Path;
use toolmesh_client::Coordinator;
use tracing::debug;

pub struct CallCommand;

impl CallCommand {
    pub async fn run(
        config: &Path,
        agent: &str,
        tool: &str,
        raw_args: &str,
        format: OutputFormat,
    ) -> CliResult<()> {
        let arguments = parse_arguments(raw_args)?;
        let agents = load_agents(config)?;

        let coordinator = Coordinator::new();
        // Only the target agent is started; other entries stay untouched
        if let Some(spec) = agents.into_iter().find(|a| a.name == agent) {
            coordinator.register_agent(spec).await?;
        }

        debug!(agent, tool, "Calling tool");
        let outcome = coordinator.call_tool(agent, tool, arguments).await;
        coordinator.shutdown().await;
        let result = outcome?;

        if format.is_json() {
            println!("{}", format.format_json(&json!(result))?);
            return Ok(());
        }

        println!("{}", result.joined_text());
        eprintln!("{}", ColoredOutput::success(&format!("✓ {}.{}", agent, tool)));
        Ok(())
    }
}
