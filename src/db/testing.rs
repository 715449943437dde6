//! Recording executor used by the orchestrator and flow tests.

use async_trait::async_trait;
use std::path::Path;
use std::sync::Mutex;

use super::commands::{PARAM_BACKUP_FILE_PATH, PARAM_DATABASE_NAME, Statement, StatementKind};
use super::executor::{SqlExecutor, SqlRow};
use crate::errors::{Result, ToolkitError};

pub(crate) const SIMULATED_FAILURE: &str = "simulated engine failure";

#[derive(Default)]
pub(crate) struct RecordingExecutor {
    statements: Mutex<Vec<Statement>>,
    file_list: Vec<SqlRow>,
    fail_on: Option<(StatementKind, Option<String>)>,
    write_backups: bool,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file_list(mut self, rows: Vec<SqlRow>) -> Self {
        self.file_list = rows;
        self
    }

    /// Fails every statement of `kind`, or only the ones aimed at `database`.
    pub fn failing_on(mut self, kind: StatementKind, database: Option<&str>) -> Self {
        self.fail_on = Some((kind, database.map(str::to_string)));
        self
    }

    /// BACKUP statements write a small file at the bound device path.
    pub fn writing_backups(mut self) -> Self {
        self.write_backups = true;
        self
    }

    pub fn recorded(&self) -> Vec<Statement> {
        self.statements.lock().unwrap().clone()
    }

    pub fn kinds(&self) -> Vec<StatementKind> {
        self.recorded().iter().map(|s| s.kind).collect()
    }

    fn record(&self, statement: &Statement) -> Result<()> {
        self.statements.lock().unwrap().push(statement.clone());
        if let Some((kind, database)) = &self.fail_on {
            let aimed = database
                .as_deref()
                .map_or(true, |name| targets(statement, name));
            if statement.kind == *kind && aimed {
                return Err(ToolkitError::Driver(SIMULATED_FAILURE.to_string()));
            }
        }
        Ok(())
    }
}

fn targets(statement: &Statement, name: &str) -> bool {
    statement.param(PARAM_DATABASE_NAME) == Some(name)
        || statement.text.contains(&format!("[{}]", name))
}

#[async_trait]
impl SqlExecutor for RecordingExecutor {
    async fn execute(&self, statement: &Statement) -> Result<u64> {
        self.record(statement)?;
        if self.write_backups && statement.kind == StatementKind::Backup {
            if let (Some(path), Some(name)) = (
                statement.param(PARAM_BACKUP_FILE_PATH),
                statement.param(PARAM_DATABASE_NAME),
            ) {
                std::fs::write(Path::new(path), format!("backup of {}", name))
                    .map_err(|e| ToolkitError::io("writing simulated backup", e))?;
            }
        }
        Ok(0)
    }

    async fn query(&self, statement: &Statement) -> Result<Vec<SqlRow>> {
        self.record(statement)?;
        Ok(self.file_list.clone())
    }
}
