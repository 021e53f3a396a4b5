//! # MarketSnipe (`marketsnipe`)
//!
//! Server and command-line entry point.
//!
//! ```bash
//! # Run the functions and the Reddit proxy on one port
//! marketsnipe --config ./config/marketsnipe.toml serve --bind 0.0.0.0:3001
//!
//! # Run a single Yellowcake extraction and print what came back
//! YELLOWCAKE_API_KEY=... marketsnipe extract \
//!     --url https://old.reddit.com/r/smallbusiness/ \
//!     --prompt "Extract posts about payment processors"
//! ```
//!
//! API keys are read from `GEMINI_API_KEY`, `OPENROUTER_API_KEY` and
//! `YELLOWCAKE_API_KEY`. Logging follows `RUST_LOG`.

use anyhow::Context;
use clap::{Parser, Subcommand};
use marketsnipe_core::AppConfig;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use yellowcake_client::{ExtractRequest, YellowcakeClient};

const DEFAULT_LOG_FILTER: &str = "marketsnipe=info,api_server=info,reddit_client=info,llm_interface=info,yellowcake_client=info,database=info,tower_http=info";

/// Reddit market research backend: keyword prompts, scraping relays and a
/// paced Reddit metadata proxy.
#[derive(Parser)]
#[command(name = "marketsnipe", version)]
struct Cli {
    /// Path to a TOML configuration file. Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server.
    Serve {
        /// Address to listen on, overriding `server.bind`.
        #[arg(long)]
        bind: Option<String>,
    },

    /// Run one Yellowcake extraction and print a summary.
    Extract {
        /// Page to extract from.
        #[arg(long)]
        url: String,

        /// Extraction prompt.
        #[arg(long)]
        prompt: String,

        /// Print every extracted item as JSON.
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let mut config = AppConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Commands::Serve { bind } => {
            if let Some(bind) = bind {
                config.server.bind = bind;
            }
            tracing::info!("Starting MarketSnipe on {}", config.server.bind);
            api_server::run_server(config).await
        }
        Commands::Extract { url, prompt, json } => run_extract(config, url, prompt, json).await,
    }
}

async fn run_extract(
    config: AppConfig,
    url: String,
    prompt: String,
    json: bool,
) -> anyhow::Result<()> {
    let client = YellowcakeClient::new(&config.yellowcake, config.secrets.yellowcake_api_key.clone())?;
    if !client.has_api_key() {
        anyhow::bail!("YELLOWCAKE_API_KEY is not set");
    }

    let request = ExtractRequest::new(url, prompt);
    println!("Extracting from {}", request.url);

    let outcome = client.extract(&request).await?;

    println!("Stages:    {}", outcome.stages.join(" -> "));
    println!("Chunks:    {}", outcome.chunks.len());
    println!("Items:     {}", outcome.items.len());
    println!("Errors:    {}", outcome.errors.len());
    println!("Completed: {}", outcome.completed);

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome.items)?);
    } else {
        for (i, item) in outcome.items.iter().take(5).enumerate() {
            println!("  {}. {}", i + 1, item);
        }
    }

    for error in &outcome.errors {
        tracing::warn!("Stream reported an error: {}", error);
    }
    Ok(())
}
