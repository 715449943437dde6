// sqldatabasetool/src/restore/logic.rs
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio_util::sync::CancellationToken;

use super::file_list::{self, FilePair};
use crate::config::DatabaseSpec;
use crate::db::SqlExecutor;
use crate::db::commands::{self, Statement};
use crate::errors::{Result, ToolkitError};
use crate::toolkit::DatabaseToolkit;
use crate::utils::prepare_directory;

/// Where a database stands in the OFFLINE -> RESTORE -> ONLINE sequence.
///
/// `Offline` and `Restoring` are hazard states: if a later step fails the
/// database stays there and nothing brings it back online automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreState {
    Online,
    Offline,
    /// RESTORE issued or completed, SET ONLINE not yet confirmed.
    Restoring,
}

impl RestoreState {
    pub fn is_hazard(self) -> bool {
        !matches!(self, RestoreState::Online)
    }
}

impl fmt::Display for RestoreState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RestoreState::Online => "ONLINE",
            RestoreState::Offline => "OFFLINE",
            RestoreState::Restoring => "RESTORING",
        })
    }
}

/// Result of one database's restore.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreOutcome {
    pub database: String,
    pub backup_file_path: PathBuf,
    pub file_pairs: Vec<FilePair>,
}

impl<E: SqlExecutor> DatabaseToolkit<E> {
    /// Restores every configured database from `<BackupDirectory>/<name>.bak`,
    /// relocating all of its files into `RestoreDirectory`.
    ///
    /// Databases are processed strictly one after another and the first
    /// failure is returned.
    pub async fn restore(&self, token: &CancellationToken) -> Result<Vec<RestoreOutcome>> {
        prepare_directory(&self.options.restore_directory)?;

        let mut outcomes = Vec::with_capacity(self.options.databases.len());
        for database in &self.options.databases {
            let backup_file_path =
                database.resolve_backup_file_path(&self.options.backup_directory);
            let outcome = self
                .restore_core(database, &backup_file_path, token)
                .await?;
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    async fn restore_core(
        &self,
        database: &DatabaseSpec,
        backup_file_path: &Path,
        token: &CancellationToken,
    ) -> Result<RestoreOutcome> {
        let restore_directory = &self.options.restore_directory;
        tracing::debug!(
            database = %database.name,
            backup = %backup_file_path.display(),
            restore = %restore_directory.display(),
            "Starting restore"
        );
        let started = Instant::now();

        let result = self
            .restore_sequence(database, backup_file_path, token)
            .await;
        match result {
            Ok(file_pairs) => {
                tracing::info!(
                    database = %database.name,
                    backup = %backup_file_path.display(),
                    restore = %restore_directory.display(),
                    files = file_pairs.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "✓ Restore completed"
                );
                Ok(RestoreOutcome {
                    database: database.name.clone(),
                    backup_file_path: backup_file_path.to_path_buf(),
                    file_pairs,
                })
            }
            Err((state, e)) => {
                tracing::error!(
                    database = %database.name,
                    backup = %backup_file_path.display(),
                    restore = %restore_directory.display(),
                    state = %state,
                    error = %e,
                    "Restore failed"
                );
                if state.is_hazard() {
                    tracing::error!(
                        database = %database.name,
                        "Database was left {} and needs manual intervention (ALTER DATABASE [{}] SET ONLINE)",
                        state,
                        database.name
                    );
                    Err(ToolkitError::RestoreHazard {
                        database: database.name.clone(),
                        state,
                        source: Box::new(e),
                    })
                } else {
                    Err(ToolkitError::Sql {
                        database: database.name.clone(),
                        path: backup_file_path.to_path_buf(),
                        source: Box::new(e),
                    })
                }
            }
        }
    }

    /// FILELISTONLY, then OFFLINE -> RESTORE ... MOVE -> ONLINE. On failure
    /// returns the state the database was left in.
    async fn restore_sequence(
        &self,
        database: &DatabaseSpec,
        backup_file_path: &Path,
        token: &CancellationToken,
    ) -> std::result::Result<Vec<FilePair>, (RestoreState, ToolkitError)> {
        let mut state = RestoreState::Online;

        let file_pairs = self
            .read_file_pairs(backup_file_path, token)
            .await
            .map_err(|e| (state, e))?;

        // Everything is built before the database is touched.
        let statements = build_sequence(database, backup_file_path, &file_pairs)
            .map_err(|e| (state, e))?;

        for statement in &statements {
            let next = match statement.kind {
                commands::StatementKind::SetOffline => RestoreState::Offline,
                commands::StatementKind::Restore => RestoreState::Restoring,
                _ => RestoreState::Online,
            };
            self.execute_bounded(statement, token)
                .await
                .map_err(|e| (state, e))?;
            tracing::debug!(database = %database.name, from = %state, to = %next, "Restore state changed");
            state = next;
        }
        Ok(file_pairs)
    }

    async fn read_file_pairs(
        &self,
        backup_file_path: &Path,
        token: &CancellationToken,
    ) -> Result<Vec<FilePair>> {
        let statement = commands::file_list_only(backup_file_path)?;
        let rows = self.query_bounded(&statement, token).await?;
        let pairs = file_list::file_pairs(&rows, &self.options.restore_directory)?;
        if pairs.is_empty() {
            return Err(ToolkitError::Driver(format!(
                "RESTORE FILELISTONLY returned no files for {}",
                backup_file_path.display()
            )));
        }
        Ok(pairs)
    }
}

fn build_sequence(
    database: &DatabaseSpec,
    backup_file_path: &Path,
    file_pairs: &[FilePair],
) -> Result<[Statement; 3]> {
    Ok([
        commands::set_offline(database)?,
        commands::restore_database(database, backup_file_path, file_pairs)?,
        commands::set_online(database)?,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqlRow;
    use crate::db::commands::StatementKind;
    use crate::db::testing::RecordingExecutor;
    use crate::toolkit::test_support::options_in;
    use tempfile::TempDir;

    fn sales_file_list() -> Vec<SqlRow> {
        vec![
            SqlRow::from_pairs([("LogicalName", "Sales"), ("PhysicalName", "C:\\Data\\Sales.mdf")]),
            SqlRow::from_pairs([("LogicalName", "Sales_2"), ("PhysicalName", "C:\\Data\\Sales_2.ndf")]),
            SqlRow::from_pairs([("LogicalName", "Sales_log"), ("PhysicalName", "C:\\Logs\\Sales_log.ldf")]),
        ]
    }

    #[tokio::test]
    async fn test_restore_runs_filelist_offline_restore_online_in_order() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let options = options_in(temp.path(), &["Sales"], false);
        let restore_dir = options.restore_directory.clone();
        let executor = RecordingExecutor::new().with_file_list(sales_file_list());
        let toolkit = DatabaseToolkit::new(options, executor);

        let outcomes = toolkit.restore(&CancellationToken::new()).await?;

        assert!(restore_dir.is_dir());
        assert_eq!(
            toolkit.executor.kinds(),
            vec![
                StatementKind::FileListOnly,
                StatementKind::SetOffline,
                StatementKind::Restore,
                StatementKind::SetOnline,
            ]
        );
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].file_pairs.len(), 3);

        let restore_stmt = &toolkit.executor.recorded()[2];
        assert_eq!(restore_stmt.text.matches("MOVE N'").count(), 3);
        for name in ["Sales.mdf", "Sales_2.ndf", "Sales_log.ldf"] {
            let expected = restore_dir.join(name);
            assert!(
                restore_stmt.text.contains(&format!("TO N'{}'", expected.display())),
                "missing move target {name}"
            );
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_restore_leaves_database_offline_without_set_online() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let options = options_in(temp.path(), &["Sales", "Hr"], false);
        let executor = RecordingExecutor::new()
            .with_file_list(sales_file_list())
            .failing_on(StatementKind::Restore, Some("Sales"));
        let toolkit = DatabaseToolkit::new(options, executor);

        let err = toolkit.restore(&CancellationToken::new()).await.unwrap_err();

        match err {
            ToolkitError::RestoreHazard { database, state, .. } => {
                assert_eq!(database, "Sales");
                assert_eq!(state, RestoreState::Offline);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        // no compensating SET ONLINE, and Hr is never touched
        assert_eq!(
            toolkit.executor.kinds(),
            vec![StatementKind::FileListOnly, StatementKind::SetOffline, StatementKind::Restore]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_set_online_reports_restoring_state() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let options = options_in(temp.path(), &["Sales"], false);
        let executor = RecordingExecutor::new()
            .with_file_list(sales_file_list())
            .failing_on(StatementKind::SetOnline, None);
        let toolkit = DatabaseToolkit::new(options, executor);

        let err = toolkit.restore(&CancellationToken::new()).await.unwrap_err();

        assert!(matches!(
            err,
            ToolkitError::RestoreHazard { state: RestoreState::Restoring, .. }
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_file_list_failure_never_takes_database_offline() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let options = options_in(temp.path(), &["Sales"], false);
        let executor = RecordingExecutor::new().failing_on(StatementKind::FileListOnly, None);
        let toolkit = DatabaseToolkit::new(options, executor);

        let err = toolkit.restore(&CancellationToken::new()).await.unwrap_err();

        assert!(matches!(err, ToolkitError::Sql { .. }));
        assert_eq!(toolkit.executor.kinds(), vec![StatementKind::FileListOnly]);
        Ok(())
    }

    #[tokio::test]
    async fn test_empty_file_list_is_rejected_before_offline() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let options = options_in(temp.path(), &["Sales"], false);
        let toolkit = DatabaseToolkit::new(options, RecordingExecutor::new());

        assert!(toolkit.restore(&CancellationToken::new()).await.is_err());
        assert_eq!(toolkit.executor.kinds(), vec![StatementKind::FileListOnly]);
        Ok(())
    }

    #[test]
    fn test_only_online_is_safe() {
        assert!(!RestoreState::Online.is_hazard());
        assert!(RestoreState::Offline.is_hazard());
        assert!(RestoreState::Restoring.is_hazard());
    }
}
