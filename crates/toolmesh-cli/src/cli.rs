//! CLI argument definitions using clap

use clap::{Args, Parser, Subcommand};
use serde_json::Value as JsonValue;
use std::path::PathBuf;
use toolmesh_provider::ProviderKind;

#[derive(Parser)]
#[command(
    name = "toolmesh",
    about = "Toolmesh - discover and invoke agent tools over stdio and HTTP",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, help = "Disable colored output")]
    pub no_color: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a built-in tool provider over stdin/stdout
    ServeStdio {
        #[arg(long, value_enum, env = "TOOLMESH_PROVIDER")]
        provider: ProviderArg,
    },

    /// Run a built-in tool provider behind the HTTP bridge
    ServeHttp {
        #[arg(long, value_enum, env = "TOOLMESH_PROVIDER")]
        provider: ProviderArg,

        /// Address to bind
        #[arg(long, env = "TOOLMESH_ADDR", default_value = "0.0.0.0:8001")]
        addr: String,
    },

    /// Connect to every configured agent and list its tools
    Discover {
        #[command(flatten)]
        target: ConfigArgs,

        #[arg(long, value_enum, default_value = "pretty")]
        format: OutputFormat,
    },

    /// Invoke one tool on one configured agent
    Call {
        #[command(flatten)]
        target: ConfigArgs,

        /// Agent name from the config file
        agent: String,

        /// Tool name
        tool: String,

        /// Tool arguments as a JSON object
        #[arg(long, default_value = "{}")]
        args: String,

        #[arg(long, value_enum, default_value = "pretty")]
        format: OutputFormat,
    },

    /// Connect to every configured agent and report its health
    Status {
        #[command(flatten)]
        target: ConfigArgs,

        #[arg(long, value_enum, default_value = "pretty")]
        format: OutputFormat,
    },
}

#[derive(Args, Clone, Debug)]
pub struct ConfigArgs {
    /// Agent list (YAML or JSON)
    #[arg(short, long, env = "TOOLMESH_CONFIG", default_value = "agents.yaml")]
    pub config: PathBuf,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq)]
pub enum ProviderArg {
    Currency,
    Activity,
}

impl From<ProviderArg> for ProviderKind {
    fn from(arg: ProviderArg) -> Self {
        match arg {
            ProviderArg::Currency => ProviderKind::Currency,
            ProviderArg::Activity => ProviderKind::Activity,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq)]
pub enum OutputFormat {
    /// Human-readable output
    Pretty,
    /// Pretty-printed JSON
    Json,
}

impl OutputFormat {
    pub fn is_json(&self) -> bool {
        matches!(self, Self::Json)
    }

    pub fn format_json(&self, value: &JsonValue) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(value)
    }
}
