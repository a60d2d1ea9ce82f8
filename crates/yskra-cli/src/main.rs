//! Yskra CLI - PlayerJS frame protocol tooling
//!
//! Features:
//! - Replay recorded peer traffic through the adapter
//! - Wire encoding of commands
//! - Embed provider support catalogue

use clap::{Parser, Subcommand};
use commands::OutputFormat;
use std::path::PathBuf;

mod commands;

/// Yskra CLI - PlayerJS frame toolkit
#[derive(Parser)]
#[command(name = "yskra-cli")]
#[command(author = "Yskra Plugins Contributors")]
#[command(version)]
#[command(about = "PlayerJS frame protocol tooling", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Adapter configuration file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a JSON-lines trace of peer traffic and local writes
    Replay {
        /// Path to the trace file
        trace: PathBuf,

        /// Source URL loaded into the frame
        #[arg(short, long, default_value = "https://player.example/embed")]
        source: String,
    },

    /// Print the wire message for a command
    Encode {
        /// Command name (play, seek, quality, ...)
        command: String,

        /// Argument, parsed as JSON when possible
        arg: Option<String>,
    },

    /// Show which embed providers can be driven
    Support {
        /// Provider to show (all if omitted)
        provider: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(level)
        .with_writer(std::io::stderr)
        .init();

    yskra_core::init();

    match cli.command {
        Commands::Replay { trace, source } => {
            let config = commands::load_config(cli.config.as_deref())?;
            commands::replay(&trace, &source, config, cli.format).await?;
        }
        Commands::Encode { command, arg } => {
            commands::encode(&command, arg.as_deref(), cli.format)?;
        }
        Commands::Support { provider } => {
            commands::support(provider.as_deref(), cli.format)?;
        }
    }

    Ok(())
}
