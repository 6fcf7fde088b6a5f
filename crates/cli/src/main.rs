//! ChatPTK CLI — the main entry point.
//!
//! Commands:
//! - `gateway` — Start the HTTP server
//! - `ask`     — Talk to the tutor from the terminal
//! - `doctor`  — Diagnose configuration and data files

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "chatptk",
    about = "ChatPTK — English tutor chatbot backend",
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
    Gateway {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Ask the tutor from the terminal
    Ask {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,

        /// Tutor mode: grammar, vocabulary, sentence, conversation, menu
        #[arg(long)]
        mode: Option<String>,

        /// Student id used for record lookups
        #[arg(long)]
        student_id: Option<String>,

        /// Print the reply as it is generated
        #[arg(long)]
        stream: bool,
    },

    /// Diagnose configuration, secrets and data files
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
        Commands::Gateway { port } => commands::gateway::run(port).await?,
        Commands::Ask {
            message,
            mode,
            student_id,
            stream,
        } => {
            commands::ask::run(commands::ask::AskOptions {
                message,
                mode,
                student_id,
                stream,
            })
            .await?
        }
        Commands::Doctor => commands::doctor::run().await?,
    }

    Ok(())
}
