//! Parley CLI: the main entry point.
//!
//! Commands:
//! - `chat`: Interactive conversation
//! - `ask`: One-shot question
//! - `status`: Show configuration summary
//! - `init`: Write a starter config file

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "parley",
    about = "Parley — a conversational assistant with Gemini/Groq fallback",
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
    /// Start an interactive conversation
    Chat {
        /// How the assistant should address you
        #[arg(short, long, env = "USER", default_value = "friend")]
        user: String,

        /// Conversation to join
        #[arg(short, long, default_value = "cli")]
        conversation: String,
    },

    /// Ask a single question and print the reply
    Ask {
        /// The message to send
        #[arg(short, long)]
        message: String,

        /// How the assistant should address you
        #[arg(short, long, env = "USER", default_value = "friend")]
        user: String,
    },

    /// Show configuration summary
    Status,

    /// Write a starter config file
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Chat { user, conversation } => commands::chat::run(user, conversation).await?,
        Commands::Ask { message, user } => commands::ask::run(message, user).await?,
        Commands::Status => commands::status::run().await?,
        Commands::Init { force } => commands::init::run(force).await?,
    }

    Ok(())
}
