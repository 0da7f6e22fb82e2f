//! forgehand CLI — the main entry point.
//!
//! Commands:
//! - `onboard` — Initialize the config file
//! - `agent`   — Interactive chat or single-message mode
//! - `mcp`     — Inspect external tool providers

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "forgehand",
    about = "forgehand — a terminal coding assistant with tool calling",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the configuration file
    Onboard,

    /// Chat with the assistant
    Agent {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Inspect external tool providers
    Mcp {
        #[command(subcommand)]
        action: McpAction,
    },
}

#[derive(Subcommand)]
enum McpAction {
    /// List configured providers
    Status,

    /// Start a provider and list the tools it declares
    Tools {
        /// The provider name from the config file
        name: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Onboard => commands::onboard::run().await?,
        Commands::Agent { message } => commands::agent::run(message).await?,
        Commands::Mcp { action } => match action {
            McpAction::Status => commands::mcp::status().await?,
            McpAction::Tools { name } => commands::mcp::tools(&name).await?,
        },
    }

    Ok(())
}
