//! Toolmesh CLI main entry point

use clap::Parser;
use toolmesh_cli::{
    cli::{Cli, Commands},
    commands::{CallCommand, DiscoverCommand, ServeCommand, StatusCommand},
    error::CliResult,
    utils::{init_tracing, ColoredOutput},
};
use tracing::debug;

#[tokio::main]
async fn main() {
    let exit_code = match run().await {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("{} {}", ColoredOutput::error("Error:"), e);
            1
        }
    };

    std::process::exit(exit_code);
}

async fn run() -> CliResult<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose)?;

    if cli.no_color {
        colored::control::set_override(false);
    }

    debug!("Toolmesh CLI v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::ServeStdio { provider } => ServeCommand::stdio(provider.into())
            .await
            .map_err(|e| e.into()),

        Commands::ServeHttp { provider, addr } => ServeCommand::http(provider.into(), &addr)
            .await
            .map_err(|e| e.into()),

        Commands::Discover { target, format } => {
            DiscoverCommand::run(&target.config, format).await
        }

        Commands::Call {
            target,
            agent,
            tool,
            args,
            format,
        } => CallCommand::run(&target.config, &agent, &tool, &args, format).await,

        Commands::Status { target, format } => StatusCommand::run(&target.config, format).await,
    }
}
