//! Status command: connect to every configured agent and summarise its health

use super::{connect_each, discover::error_json, load_agents};
use crate::{cli::OutputFormat, error::CliResult, utils::ColoredOutput};
use serde_json::{json, Map, Value as JsonValue};
use std::path::Path;
use toolmesh_client::{AgentError, AgentHealth, ConnectionStatus, Coordinator};

/// Health of one agent, or why it could not be reached
enum AgentReport {
    Reachable(AgentHealth),
    Unreachable(AgentError),
}

pub struct StatusCommand;

impl StatusCommand {
    pub async fn run(config: &Path, format: OutputFormat) -> CliResult<()> {
        let agents = load_agents(config)?;
        let coordinator = Coordinator::new();
        let failures = connect_each(&coordinator, agents).await;

        let mut reports: Vec<(String, AgentReport)> = coordinator
            .check_health()
            .await
            .into_iter()
            .map(|(name, health)| (name, AgentReport::Reachable(health)))
            .collect();
        reports.extend(failures.into_iter().map(|(name, e)| (name, AgentReport::Unreachable(e))));
        reports.sort_by(|a, b| a.0.cmp(&b.0));
        coordinator.shutdown().await;

        if format.is_json() {
            println!("{}", format.format_json(&Self::to_json(&reports))?);
        } else {
            Self::display(&reports);
        }
        Ok(())
    }

    fn to_json(reports: &[(String, AgentReport)]) -> JsonValue {
        let mut out = Map::new();
        for (name, report) in reports {
            let entry = match report {
                AgentReport::Reachable(health) => json!(health),
                AgentReport::Unreachable(e) => {
                    let mut entry = error_json(e);
                    entry["status"] = json!(ConnectionStatus::Failed);
                    entry
                }
            };
            out.insert(name.clone(), entry);
        }
        JsonValue::Object(out)
    }

    fn display(reports: &[(String, AgentReport)]) {
        if reports.is_empty() {
            println!("{}", ColoredOutput::dim("No agents configured."));
            return;
        }

        println!("{:<20} {:<14} {}", "AGENT", "STATUS", "TOOLS");
        println!("{}", "-".repeat(44));
        for (name, report) in reports {
            match report {
                AgentReport::Reachable(health) => {
                    let status = match health.status {
                        ConnectionStatus::Connected => {
                            ColoredOutput::success(health.status.as_str())
                        }
                        _ => ColoredOutput::warning(health.status.as_str()),
                    };
                    println!("{:<20} {:<14} {}", name, status, health.tools);
                }
                AgentReport::Unreachable(e) => {
                    println!(
                        "{:<20} {:<14} -",
                        name,
                        ColoredOutput::error(ConnectionStatus::Failed.as_str())
                    );
                    println!("  {}", ColoredOutput::dim(&e.to_string()));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_json() {
        let reports = vec![
            (
                "currency".to_string(),
                AgentReport::Reachable(AgentHealth {
                    status: ConnectionStatus::Connected,
                    tools: 2,
                }),
            ),
            (
                "weather".to_string(),
                AgentReport::Unreachable(AgentError::Connection("refused".into())),
            ),
        ];

        let value = StatusCommand::to_json(&reports);
        assert_eq!(value["currency"], json!({"status": "connected", "tools": 2}));
        assert_eq!(value["weather"]["status"], json!("failed"));
        assert_eq!(value["weather"]["error"]["kind"], json!("connection_error"));
    }
}
