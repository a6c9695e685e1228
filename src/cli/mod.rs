//! Command-line interface for yessir.
//!
//! Provides commands for serving the intake endpoint, replaying a single
//! gateway event, inspecting configuration, and managing keywords.

use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::config::{self, Config};
use crate::core::Dispatcher;
use crate::ingest::GatewayRequest;
use crate::server;
use crate::store::{MemoryStore, RecordStore, SqliteStore};

pub mod keyword;

/// yessir - voice-command intake endpoint
#[derive(Parser, Debug)]
#[command(name = "yessir")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Database file (overrides configuration)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Keep records in memory instead of SQLite
    #[arg(long, global = true, conflicts_with = "db")]
    pub memory: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP intake server
    Serve {
        /// Address to bind to (overrides configuration)
        #[arg(short, long)]
        address: Option<String>,
    },

    /// Handle one gateway event and print the gateway response
    Invoke {
        /// Event file (reads from stdin if not provided)
        #[arg(short, long)]
        event: Option<PathBuf>,
    },

    /// Show resolved configuration (API keys masked)
    Config,

    /// Manage keyword substitutions
    Keyword {
        #[command(subcommand)]
        command: keyword::KeywordCommands,
    },
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        let Cli {
            db,
            memory,
            command,
        } = self;
        let config = config::load()?;

        match command {
            Commands::Serve { address } => {
                let store = open_store(&config, db, memory)?;
                let dispatcher = Arc::new(Dispatcher::from_config(&config, store)?);
                let address = address.unwrap_or_else(|| config.server.address.clone());
                server::serve(dispatcher, &address, config.server.max_body_bytes).await
            }
            Commands::Invoke { event } => {
                let store = open_store(&config, db, memory)?;
                invoke(&config, store, event).await
            }
            Commands::Config => show_config(&config),
            Commands::Keyword { command } => {
                let store = open_store(&config, db, memory)?;
                keyword::execute(command, store, config.storage.timeout()).await
            }
        }
    }
}

/// Open the record store selected by flags and configuration
fn open_store(
    config: &Config,
    db_override: Option<PathBuf>,
    memory: bool,
) -> Result<Arc<dyn RecordStore>> {
    if memory {
        tracing::info!("Using in-memory record store");
        return Ok(Arc::new(MemoryStore::new()));
    }

    let path = db_override.unwrap_or_else(|| config.storage.db_path.clone());
    let store = SqliteStore::open(&path)
        .with_context(|| format!("Failed to open database: {}", path.display()))?;
    Ok(Arc::new(store))
}

/// Run one gateway event through the dispatcher
async fn invoke(config: &Config, store: Arc<dyn RecordStore>, event: Option<PathBuf>) -> Result<()> {
    let raw = match event {
        Some(path) => tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read event file: {}", path.display()))?,
        None => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read event from stdin")?;
            buffer
        }
    };

    let request: GatewayRequest =
        serde_json::from_str(&raw).context("Event is not a valid gateway request")?;

    let dispatcher = Dispatcher::from_config(config, store)?;
    let response = dispatcher.handle(&request).await;

    println!(
        "{}",
        serde_json::to_string_pretty(&response).context("Failed to render response")?
    );
    Ok(())
}

/// Show resolved configuration
fn show_config(config: &Config) -> Result<()> {
    println!("yessir configuration");
    println!(
        "Config file: {}",
        config
            .config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    print!("{}", config.to_masked_yaml()?);
    Ok(())
}
