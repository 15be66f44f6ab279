use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ledgerlens_core::AppConfig;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Debug, Parser)]
#[command(
    name = "ledgerlens",
    version,
    about = "Turn receipt photos into Firefly III withdrawals",
    long_about = "Reads a receipt image with a vision model, lets you review the \
                  extracted fields, and records the purchase as a withdrawal in \
                  a Firefly III ledger."
)]
struct Cli {
    /// Config file (defaults to ledgerlens.toml in the platform config directory)
    #[arg(short, long, env = "LEDGERLENS_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List the ledger's asset accounts
    Accounts,

    /// Print the categories, budgets and asset accounts a review can choose from
    Metadata,

    /// Read a receipt image and print the extracted fields as JSON
    Extract {
        /// Path to the receipt image
        image: PathBuf,
        /// Asset account the purchase was paid from
        #[arg(short, long)]
        account: String,
        /// Write the JSON here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Submit a reviewed draft (JSON) as a withdrawal
    Submit {
        /// Path to the reviewed draft
        draft: PathBuf,
        /// Asset account the purchase was paid from
        #[arg(short, long)]
        account: String,
    },
}

/// `ledgerlens.toml` under the platform config directory.
fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("com", "ledgerlens", "LedgerLens")
        .map(|dirs| dirs.config_dir().join("ledgerlens.toml"))
}

fn init_logging() {
    // stdout carries command output; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let path = cli.config.or_else(default_config_path);
    let config = AppConfig::load(path.as_deref()).context("Invalid configuration")?;

    match cli.command {
        Command::Accounts => {
            for name in commands::accounts(&config).await? {
                println!("{name}");
            }
        }
        Command::Metadata => {
            let metadata = commands::metadata(&config).await?;
            println!("{}", serde_json::to_string_pretty(&metadata)?);
        }
        Command::Extract { image, account, output } => {
            let receipt = commands::extract(&config, &image, &account, output.as_deref()).await?;
            if output.is_none() {
                println!("{}", serde_json::to_string_pretty(&receipt)?);
            }
            if receipt.amount.is_none() {
                tracing::warn!("No amount was read; fill it in before submitting");
            }
        }
        Command::Submit { draft, account } => {
            let outcome = commands::submit(&config, &draft, &account).await?;
            println!("{outcome}");
            if !outcome.is_success() {
                return Ok(ExitCode::FAILURE);
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();

    match run(Cli::parse()).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
