//! docq CLI — the main entry point.
//!
//! Commands:
//! - `serve`  — Start the HTTP gateway
//! - `ask`    — One-shot documentation question
//! - `doctor` — Diagnose configuration and upstream health

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "docq",
    about = "docq — documentation Q&A chat service",
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
    /// Start the HTTP gateway server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Ask a single documentation question
    Ask {
        /// The question to answer
        question: String,

        /// Which documentation set to answer from
        #[arg(long)]
        variant: Option<String>,

        /// Wait for the full answer instead of streaming
        #[arg(long)]
        no_stream: bool,
    },

    /// Diagnose configuration and upstream health
    Doctor,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Serve { port } => commands::serve::run(port).await?,
        Commands::Ask {
            question,
            variant,
            no_stream,
        } => commands::ask::run(&question, variant.as_deref(), no_stream).await?,
        Commands::Doctor => commands::doctor::run().await?,
    }

    Ok(())
}
