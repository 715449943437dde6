// sqldatabasetool/src/backup/logic.rs
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::DatabaseSpec;
use crate::db::SqlExecutor;
use crate::db::commands;
use crate::errors::{Result, ToolkitError};
use crate::toolkit::DatabaseToolkit;
use crate::utils::prepare_directory;

impl<E: SqlExecutor> DatabaseToolkit<E> {
    /// Takes a full backup of every configured database into
    /// `<BackupDirectory>/<name>.bak`, one database at a time.
    ///
    /// The first failure aborts the remaining databases and is returned.
    /// Returns the backup file paths in configuration order.
    pub async fn backup(&self, token: &CancellationToken) -> Result<Vec<PathBuf>> {
        prepare_directory(&self.options.backup_directory)?;

        let mut written = Vec::with_capacity(self.options.databases.len());
        for database in &self.options.databases {
            let backup_file_path =
                database.resolve_backup_file_path(&self.options.backup_directory);
            self.backup_core(database, &backup_file_path, token).await?;
            written.push(backup_file_path);
        }
        Ok(written)
    }

    async fn backup_core(
        &self,
        database: &DatabaseSpec,
        backup_file_path: &Path,
        token: &CancellationToken,
    ) -> Result<()> {
        let statement = commands::backup_database(database, backup_file_path)?;
        tracing::debug!(
            database = %database.name,
            path = %backup_file_path.display(),
            "Starting full backup"
        );
        let started = Instant::now();

        match self.execute_bounded(&statement, token).await {
            Ok(_) => {
                tracing::info!(
                    database = %database.name,
                    path = %backup_file_path.display(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "✓ Full backup completed"
                );
                Ok(())
            }
            Err(e) => {
                tracing::error!(
                    database = %database.name,
                    path = %backup_file_path.display(),
                    error = %e,
                    "Full backup failed"
                );
                Err(ToolkitError::Sql {
                    database: database.name.clone(),
                    path: backup_file_path.to_path_buf(),
                    source: Box::new(e),
                })
            }
        }
    }
}
