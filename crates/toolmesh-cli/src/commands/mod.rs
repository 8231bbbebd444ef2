//! Command implementations

pub mod call;
pub mod discover;
pub mod serve;
pub mod status;

pub use call::CallCommand;
pub use discover::DiscoverCommand;
pub use serve::ServeCommand;
pub use status::StatusCommand;

use crate::error::CliResult;
use anyhow::Context;
use std::path::Path;
use toolmesh_client::{AgentError, Coordinator};
use toolmesh_config::ConfigLoader;
use toolmesh_core::AgentSpec;
use tracing::{debug, warn};

/// Load the agent list with file-level defaults applied
pub(crate) fn load_agents(path: &Path) -> CliResult<Vec<AgentSpec>> {
    let config = ConfigLoader::new()
        .load_from_file(path)
        .with_context(|| format!("Failed to load agent config from {}", path.display()))?;
    let agents = config.resolved_agents();
    debug!("Loaded {} agents from {}", agents.len(), path.display());
    Ok(agents)
}

/// Register every agent, keeping going past the ones that fail to connect
pub(crate) async fn connect_each(
    coordinator: &Coordinator,
    agents: Vec<AgentSpec>,
) -> Vec<(String, AgentError)> {
    let mut failures = Vec::new();
    for spec in agents {
        let name = spec.name.clone();
        if let Err(e) = coordinator.register_agent(spec).await {
            warn!(agent = %name, "Agent unavailable: {}", e);
            failures.push((name, e));
        }
    }
    failures
}
