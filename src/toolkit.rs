// sqldatabasetool/src/toolkit.rs
use tokio_util::sync::CancellationToken;

use crate::config::ToolkitOptions;
use crate::db::commands::Statement;
use crate::db::executor::{SqlExecutor, SqlRow, run_bounded};
use crate::errors::Result;

/// Backup/restore orchestrator for the configured databases.
///
/// Backup lives in `backup::logic`, restore in `restore::logic`. Every
/// statement goes through [`DatabaseToolkit::execute_bounded`] or
/// [`DatabaseToolkit::query_bounded`] so the configured command timeout and
/// the run's cancellation token apply uniformly.
pub struct DatabaseToolkit<E> {
    pub(crate) options: ToolkitOptions,
    pub(crate) executor: E,
}

impl<E: SqlExecutor> DatabaseToolkit<E> {
    pub fn new(options: ToolkitOptions, executor: E) -> Self {
        DatabaseToolkit { options, executor }
    }

    pub fn options(&self) -> &ToolkitOptions {
        &self.options
    }

    pub(crate) async fn execute_bounded(
        &self,
        statement: &Statement,
        token: &CancellationToken,
    ) -> Result<u64> {
        let what = statement.kind.to_string();
        run_bounded(
            self.options.command_timeout(),
            token,
            &what,
            self.executor.execute(statement),
        )
        .await
    }

    pub(crate) async fn query_bounded(
        &self,
        statement: &Statement,
        token: &CancellationToken,
    ) -> Result<Vec<SqlRow>> {
        let what = statement.kind.to_string();
        run_bounded(
            self.options.command_timeout(),
            token,
            &what,
            self.executor.query(statement),
        )
        .await
    }
}
