// sqldatabasetool/src/restore/mod.rs
pub mod file_list;
pub mod logic;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

use crate::archive::ArchiveFileStore;
use crate::config::ToolkitOptions;
use crate::db::{MssqlExecutor, SqlExecutor};
use crate::toolkit::DatabaseToolkit;

/// Public entry point for the restore process.
///
/// Pulls the newest bundle out of the archive directory, then restores every
/// configured database from its `.bak` file.
pub async fn run_restore_flow(options: &ToolkitOptions, token: &CancellationToken) -> Result<()> {
    let executor = MssqlExecutor::from_connection_string(&options.connection_string)?;
    let toolkit = DatabaseToolkit::new(options.clone(), executor);
    let store = ArchiveFileStore::new(options.clone());
    perform_restore_orchestration(&toolkit, &store, token).await
}

pub async fn perform_restore_orchestration<E: SqlExecutor>(
    toolkit: &DatabaseToolkit<E>,
    store: &ArchiveFileStore,
    token: &CancellationToken,
) -> Result<()> {
    if let Some(extracted) = store
        .download(token)
        .await
        .context("Fetching the latest backup bundle failed")?
    {
        println!("📥 Extracted {} backup file(s) from the archive", extracted.len());
    }

    let outcomes = toolkit
        .restore(token)
        .await
        .context("Database restore failed")?;
    for outcome in &outcomes {
        println!(
            "✅ Restored {} ({} file(s)) from {}",
            outcome.database,
            outcome.file_pairs.len(),
            outcome.backup_file_path.display()
        );
    }
    Ok(())
}
