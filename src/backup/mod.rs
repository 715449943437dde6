// sqldatabasetool/src/backup/mod.rs
mod logic;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime};
use tokio_util::sync::CancellationToken;

use crate::archive::ArchiveFileStore;
use crate::config::ToolkitOptions;
use crate::db::{MssqlExecutor, SqlExecutor};
use crate::toolkit::DatabaseToolkit;

/// Public entry point for the backup process.
///
/// Backs up every configured database, then bundles the `.bak` files into
/// the archive directory.
pub async fn run_backup_flow(options: &ToolkitOptions, token: &CancellationToken) -> Result<()> {
    let started_at = Local::now().naive_local();
    let executor = MssqlExecutor::from_connection_string(&options.connection_string)?;
    let toolkit = DatabaseToolkit::new(options.clone(), executor);
    let store = ArchiveFileStore::new(options.clone());
    perform_backup_orchestration(&toolkit, &store, started_at, token).await
}

/// The bundle is named after `started_at` and is only produced when every
/// database backed up successfully.
pub async fn perform_backup_orchestration<E: SqlExecutor>(
    toolkit: &DatabaseToolkit<E>,
    store: &ArchiveFileStore,
    started_at: NaiveDateTime,
    token: &CancellationToken,
) -> Result<()> {
    let written = toolkit
        .backup(token)
        .await
        .context("Database backup failed")?;
    tracing::info!(databases = written.len(), "All databases backed up");

    match store
        .upload(started_at, token)
        .await
        .context("Archiving backup files failed")?
    {
        Some(bundle) => println!("📦 Backup bundle archived at {}", bundle.display()),
        None => println!("📂 Backups kept in {}", toolkit.options().backup_directory.display()),
    }
    Ok(())
}
