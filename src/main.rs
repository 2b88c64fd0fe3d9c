mod app;
mod config;
mod conversation;
mod error;
mod exchange;
mod llm;
mod ui;

use clap::{Parser, Subcommand};

use crate::config::Config;
use crate::llm::{ChatMessage, LlmClient, LlmRequest};

#[derive(Parser)]
#[command(name = "confab")]
#[command(version)]
#[command(about = "Streaming terminal chat for OpenRouter-hosted models", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask a single question and print the reply (non-streaming)
    Ask {
        /// The question to send
        prompt: Vec<String>,
    },
    /// Write a default config file to ~/.confab/config.toml
    InitConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("confab=debug")
            .init();
    }

    let config = Config::load()?;

    match cli.command {
        None => app::run(config).await,
        Some(Commands::Ask { prompt }) => ask(config, prompt.join(" ")).await,
        Some(Commands::InitConfig) => init_config(),
    }
}

async fn ask(config: Config, prompt: String) -> anyhow::Result<()> {
    if prompt.trim().is_empty() {
        eprintln!("Nothing to ask. Usage: confab ask <question>");
        std::process::exit(2);
    }

    let client = LlmClient::new(config.clone());
    let request = LlmRequest::new(vec![ChatMessage::user(prompt.trim())])
        .with_temperature(config.temperature)
        .with_max_tokens(config.max_tokens);

    match client.send_chat_message(request).await {
        Ok(reply) => {
            println!("{}", reply);
            Ok(())
        }
        Err(err) => {
            eprintln!("{}", err.user_message());
            std::process::exit(1);
        }
    }
}

fn init_config() -> anyhow::Result<()> {
    let config = Config::default();
    config.save()?;
    println!("Config file created at: {}", Config::path()?.display());
    println!("Set your key there or export OPENROUTER_API_KEY.");
    Ok(())
}
