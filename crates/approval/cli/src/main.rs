//! approvalctl - offline evaluation of approval workflow documents
//!
//! Reads documents and directories as JSON and prints what the workflow
//! engine makes of them. Nothing is written back anywhere.

use anyhow::{Context, Result};
use approval_engine::EngineConfig;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

/// approvalctl CLI
#[derive(Parser)]
#[command(name = "approvalctl")]
#[command(about = "Evaluate approval workflow documents offline", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "APPROVAL_CONFIG", global = true)]
    config: Option<String>,

    /// Log level (overrides the configured level)
    #[arg(long, env = "APPROVAL_LOG_LEVEL", global = true)]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long, env = "APPROVAL_LOG_JSON", global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Derive the workflow state a document presents to one identity
    State {
        /// Document JSON
        #[arg(short, long)]
        document: PathBuf,

        /// Org directory JSON
        #[arg(long)]
        directory: PathBuf,

        /// Authenticated principal
        #[arg(short, long)]
        identity: String,

        /// Impersonated identity
        #[arg(long)]
        scope: Option<String>,

        /// Evaluation instant (RFC 3339, defaults to now)
        #[arg(long)]
        at: Option<String>,
    },

    /// Check whether an edit would send the whole chain back to NO_ACTION
    ResetCheck {
        /// Document JSON
        #[arg(short, long)]
        document: PathBuf,

        /// Proposed edit JSON
        #[arg(short, long)]
        edit: PathBuf,
    },

    /// Print the BLAKE3 content hash recorded for an attachment
    Hash {
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Print the effective configuration
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = EngineConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    init_tracing(
        cli.log_level.as_deref().unwrap_or(&config.logging.level),
        cli.json || config.logging.json,
    );

    let output = match cli.command {
        Commands::State {
            document,
            directory,
            identity,
            scope,
            at,
        } => {
            let now = commands::parse_instant(at.as_deref())?;
            let state = commands::state(&config, &document, &directory, &identity, scope.as_deref(), now)?;
            serde_json::to_string_pretty(&state)?
        }
        Commands::ResetCheck { document, edit } => {
            let report = commands::reset_check(&document, &edit)?;
            serde_json::to_string_pretty(&report)?
        }
        Commands::Hash { file } => commands::hash(&file)?,
        Commands::Config => serde_json::to_string_pretty(&config)?,
    };

    println!("{}", output);
    Ok(())
}

fn init_tracing(level: &str, json: bool) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| level.to_string().into());

    // Logs go to stderr so stdout stays machine-readable
    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
