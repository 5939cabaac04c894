use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use engram::config::EngramConfig;

#[derive(Parser)]
#[command(name = "engram", version, about = "Persistent semantic memory engine for AI coding sessions")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the memory engine HTTP server
    Serve,
    /// Run a lifecycle hook (reads the tool payload from stdin, fail-open)
    Hook {
        #[command(subcommand)]
        event: HookCommand,
    },
}

#[derive(Subcommand)]
enum HookCommand {
    /// Surface relevant past work when a session begins
    SessionStart,
    /// Check memory before a file operation
    PreAction,
    /// Learn from an action's outcome
    PostAction,
    /// Store a session summary and drop the live context
    SessionEnd,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = EngramConfig::load()?;

    // Log to stderr so stdout stays clean for hook advisory output.
    let filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Serve => {
            engram::api::serve(config).await?;
        }
        Command::Hook { event } => match event {
            HookCommand::SessionStart => engram::hooks::session_start::run(&config).await?,
            HookCommand::PreAction => engram::hooks::pre_action::run(&config).await?,
            HookCommand::PostAction => engram::hooks::post_action::run(&config).await?,
            HookCommand::SessionEnd => engram::hooks::session_end::run(&config).await?,
        },
    }

    Ok(())
}
