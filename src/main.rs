//! SQL Server Backup/Restore Tool
//!
//! Provides CLI interface for database backup and restore operations

// sqldatabasetool/src/main.rs
mod archive;
mod backup;
mod config;
mod db;
mod errors;
mod logging;
mod restore;
mod toolkit;
mod utils;

use anyhow::{Context, Result};
use config::ToolkitOptions;
use errors::ToolkitError;
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;

const CONFIG_PATH_ENV: &str = "SQLTOOLKIT_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config.json";
// 128 + SIGINT
const EXIT_CANCELLED: u8 = 130;

/// Main entry point for the backup/restore tool
#[tokio::main]
async fn main() -> ExitCode {
    logging::init();

    match run_app().await {
        Ok(_) => {
            println!("✅ Operation completed successfully.");
            ExitCode::SUCCESS
        }
        Err(e) if was_cancelled(&e) => {
            eprintln!("⚠️ Operation cancelled: {:?}", e);
            ExitCode::from(EXIT_CANCELLED)
        }
        Err(e) => {
            eprintln!("❌ Error: {:?}", e);
            ExitCode::FAILURE
        }
    }
}

/// True when any error in the chain is a cancellation.
fn was_cancelled(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<ToolkitError>()
            .is_some_and(ToolkitError::is_cancelled)
    })
}

async fn run_app() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    let choice = if args.len() > 1 {
        args[1].trim().to_lowercase()
    } else {
        prompt_choice()?
    };

    let config_path = args
        .get(2)
        .map(PathBuf::from)
        .or_else(|| env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    let options = ToolkitOptions::load(&config_path).with_context(|| {
        format!("Failed to load configuration from {}", config_path.display())
    })?;

    let token = CancellationToken::new();
    let ctrl_c_token = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, cancelling the current operation");
            ctrl_c_token.cancel();
        }
    });

    match choice.as_str() {
        "1" | "backup" => {
            println!("🚀 Starting Backup Process...");
            backup::run_backup_flow(&options, &token)
                .await
                .context("Backup process failed")?;
        }
        "2" | "restore" => {
            println!("🔄 Starting Restore Process...");
            println!(
                "Restore target: {} database(s) into {}",
                options.databases.len(),
                options.restore_directory.display()
            );
            restore::run_restore_flow(&options, &token)
                .await
                .context("Restore process failed")?;
        }
        _ => {
            println!("❌ Invalid choice. Please enter '1' (backup) or '2' (restore).");
            anyhow::bail!("Invalid operation choice");
        }
    }
    Ok(())
}

/// Prompts user to select backup or restore operation
///
/// Returns the user's choice as String
fn prompt_choice() -> Result<String> {
    use std::io::{Write, stdin, stdout};

    println!("Select an operation:");
    println!("1. Take Backup (or type 'backup')");
    println!("2. Restore Backup (or type 'restore')");
    print!("Enter your choice: ");
    stdout().flush().context("Failed to flush stdout")?;

    let mut input = String::new();
    stdin().read_line(&mut input).context("Failed to read user input")?;
    Ok(input.trim().to_lowercase())
}
