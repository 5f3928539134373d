//! ossindex CLI - Vector Index Lifecycle Controller
//!
//! This binary provides the command-line interface for the ossindex
//! controller: single invocations, a local driver loop that plays the
//! deployment engine's re-invoke role, and offline property validation.

#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use ossindex_backend::create_admin_client;
use ossindex_core::config::Config;
use ossindex_core::provision::IndexProperties;
use ossindex_handler::{InvocationAdapter, ProvisioningEvent, ResponseStatus};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

#[derive(Parser)]
#[command(name = "ossindex")]
#[command(about = "Vector index lifecycle controller for managed search collections")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Handle a single provisioning event and print the response
    Invoke {
        /// Path to the event JSON ('-' for stdin)
        event: PathBuf,
    },
    /// Drive an event to completion, re-invoking while in progress
    Run {
        /// Path to the event JSON ('-' for stdin)
        event: PathBuf,
    },
    /// Validate index properties offline and print the physical id
    Validate {
        #[arg(long)]
        collection_id: String,
        #[arg(long, default_value = "bedrock-knowledge-base-default")]
        index_name: String,
        #[arg(long, default_value = "bedrock-knowledge-base-default-vector")]
        vector_field: String,
        #[arg(long, default_value = "AMAZON_BEDROCK_TEXT_CHUNK")]
        text_field: String,
        #[arg(long, default_value = "AMAZON_BEDROCK_METADATA")]
        metadata_field: String,
        #[arg(long, default_value_t = 1024)]
        dimension: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose)?;

    match cli.command {
        Commands::Invoke { event } => invoke(cli.config.as_deref(), &event).await,
        Commands::Run { event } => run(cli.config.as_deref(), &event).await,
        Commands::Validate {
            collection_id,
            index_name,
            vector_field,
            text_field,
            metadata_field,
            dimension,
        } => validate(IndexProperties {
            collection_id,
            index_name,
            vector_field,
            text_field,
            metadata_field,
            dimension,
            service_timeout_secs: 180,
        }),
    }
}

/// Initialize logging system
fn init_logging(verbose: bool) -> Result<()> {
    let level = if verbose { "debug" } else { "info" };

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "ossindex={level},ossindex_core={level},ossindex_backend={level},\
             ossindex_reconciler={level},ossindex_handler={level}"
        ))
        .init();

    Ok(())
}

fn build_adapter(config_path: Option<&Path>) -> Result<InvocationAdapter> {
    let config = Config::load(config_path)?;
    config.validate()?;
    let backend = create_admin_client(&config.backend)?;
    Ok(InvocationAdapter::new(backend, &config.reconciler))
}

fn read_event(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut payload = String::new();
        std::io::stdin()
            .read_to_string(&mut payload)
            .context("Failed to read event from stdin")?;
        Ok(payload)
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read event file {}", path.display()))
    }
}

/// Handle one provisioning event and print the raw response envelope
async fn invoke(config_path: Option<&Path>, event_path: &Path) -> Result<()> {
    let adapter = build_adapter(config_path)?;
    let payload = read_event(event_path)?;
    let response = adapter.handle_json(&payload).await?;
    println!("{response}");
    Ok(())
}

/// Stand in for the deployment engine: re-invoke with the returned
/// continuation token until the saga reaches a terminal status
async fn run(config_path: Option<&Path>, event_path: &Path) -> Result<()> {
    let adapter = build_adapter(config_path)?;
    let payload = read_event(event_path)?;
    let mut event: ProvisioningEvent =
        serde_json::from_str(&payload).context("Failed to parse provisioning event")?;

    loop {
        let response = adapter.handle(event.clone()).await;
        match response.status {
            ResponseStatus::InProgress => {
                let delay = response.retry_after_seconds.unwrap_or(5);
                info!(delay_secs = delay, "In progress; re-invoking after delay");
                event.continuation_token = response.continuation_token;
                tokio::time::sleep(Duration::from_secs(delay)).await;
            }
            ResponseStatus::Success => {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&response)
                        .context("Failed to serialize response")?
                );
                return Ok(());
            }
            ResponseStatus::Failed => {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&response)
                        .context("Failed to serialize response")?
                );
                bail!(
                    "provisioning failed: {}",
                    response.reason.unwrap_or_else(|| "unknown reason".to_string())
                );
            }
        }
    }
}

/// Validate properties offline without touching any backend
fn validate(properties: IndexProperties) -> Result<()> {
    properties.validate()?;
    println!("valid; physical id: {}", properties.physical_id());
    Ok(())
}
