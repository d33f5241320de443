//! skipper - terminal AI agent
//!
//! Drives an OpenAI-compatible chat-completion service with function
//! calling: shell and file tools, checkpointed editing with rollback, and
//! experimental subagent batches. The interactive REPL is deliberately
//! plain; all the machinery lives in skipper-core.

use anyhow::Result;
use clap::{Parser, Subcommand};

use skipper_core::{paths, Config, RunContext};

mod repl;

#[derive(Parser)]
#[command(name = "skipper")]
#[command(about = "Terminal AI agent with checkpointed editing and subagent batches", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Working directory (defaults to current)
    #[arg(short, long)]
    directory: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive chat session (default)
    Chat,

    /// List models available at the configured endpoint
    Models,

    /// Run a single prompt non-interactively and print the result
    Ask {
        /// The prompt to run
        prompt: String,
    },
}

fn init_logging() {
    // Log to a file so stdout stays clean for the REPL.
    let log_dir = paths::logs_dir();
    std::fs::create_dir_all(&log_dir).ok();

    #[cfg(unix)]
    let null_device = "/dev/null";
    #[cfg(windows)]
    let null_device = "NUL";

    let log_file = std::fs::File::create(log_dir.join("skipper.log"))
        .unwrap_or_else(|_| std::fs::File::create(null_device).expect("open null device"));

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::sync::Mutex::new(log_file))
        .with_ansi(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let cli = Cli::parse();
    if let Some(dir) = &cli.directory {
        std::env::set_current_dir(dir)?;
    }

    let config = Config::load();

    match cli.command {
        Some(Commands::Models) => {
            let client = skipper_core::CompletionClient::new(&config)?;
            let models = client.models(&RunContext::new()).await?;
            if models.is_empty() {
                println!("No models reported by {}", client.base_url());
            } else {
                for model in models {
                    match model.owned_by.as_deref() {
                        Some(owner) => println!("{}  ({})", model.id, owner),
                        None => println!("{}", model.id),
                    }
                }
            }
        }
        Some(Commands::Ask { prompt }) => {
            repl::run_single_prompt(&config, &prompt).await?;
        }
        Some(Commands::Chat) | None => {
            repl::run(config).await?;
        }
    }

    Ok(())
}
