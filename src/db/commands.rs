//! Builds the T-SQL statements the toolkit issues. Pure, no I/O.
//!
//! Values that SQL Server accepts as variables (database name in BACKUP and
//! RESTORE, the backup device path, the backup set description) are bound as
//! parameters. `ALTER DATABASE` and the `MOVE` clauses do not accept
//! variables, so those are rendered as escaped literals.

use std::fmt;
use std::path::Path;

use crate::config::DatabaseSpec;
use crate::errors::{Result, ToolkitError};
use crate::restore::file_list::FilePair;

pub const PARAM_DATABASE_NAME: &str = "databaseName";
pub const PARAM_BACKUP_FILE_PATH: &str = "backupFilePath";
pub const PARAM_DESCRIPTION: &str = "description";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Backup,
    FileListOnly,
    SetOffline,
    Restore,
    SetOnline,
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            StatementKind::Backup => "BACKUP DATABASE",
            StatementKind::FileListOnly => "RESTORE FILELISTONLY",
            StatementKind::SetOffline => "SET OFFLINE",
            StatementKind::Restore => "RESTORE DATABASE",
            StatementKind::SetOnline => "SET ONLINE",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlParam {
    pub name: &'static str,
    pub value: String,
}

impl SqlParam {
    fn new(name: &'static str, value: impl Into<String>) -> Self {
        SqlParam {
            name,
            value: value.into(),
        }
    }
}

/// A statement plus the fixed parameter set its kind requires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub kind: StatementKind,
    pub text: String,
    pub params: Vec<SqlParam>,
}

#[cfg(test)]
impl Statement {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.value.as_str())
    }
}

/// `BACKUP DATABASE ... WITH NOFORMAT, NAME = ..., NOINIT, SKIP, NOREWIND, NOUNLOAD, STATS = 10`
pub fn backup_database(database: &DatabaseSpec, backup_file_path: &Path) -> Result<Statement> {
    let name = checked_name(database)?;
    let path = path_text(backup_file_path)?;
    let text = [
        "BACKUP DATABASE @databaseName",
        " TO DISK = @backupFilePath WITH NOFORMAT",
        ", NAME = @description",
        ", NOINIT",
        ", SKIP",
        ", NOREWIND",
        ", NOUNLOAD",
        ", STATS = 10",
    ]
    .concat();

    Ok(Statement {
        kind: StatementKind::Backup,
        text,
        params: vec![
            SqlParam::new(PARAM_DATABASE_NAME, name),
            SqlParam::new(PARAM_BACKUP_FILE_PATH, path),
            SqlParam::new(PARAM_DESCRIPTION, format!("{} - full backup", name)),
        ],
    })
}

pub fn file_list_only(backup_file_path: &Path) -> Result<Statement> {
    let path = path_text(backup_file_path)?;
    Ok(Statement {
        kind: StatementKind::FileListOnly,
        text: "RESTORE FILELISTONLY FROM DISK = @backupFilePath".to_string(),
        params: vec![SqlParam::new(PARAM_BACKUP_FILE_PATH, path)],
    })
}

/// Forcibly rolls back open transactions so the restore gets exclusive access.
pub fn set_offline(database: &DatabaseSpec) -> Result<Statement> {
    let name = checked_name(database)?;
    Ok(Statement {
        kind: StatementKind::SetOffline,
        text: format!("ALTER DATABASE [{}] SET OFFLINE WITH ROLLBACK IMMEDIATE", name),
        params: Vec::new(),
    })
}

/// `RESTORE DATABASE ... WITH REPLACE, NOUNLOAD, STATS = 5` plus one MOVE per file pair.
pub fn restore_database(
    database: &DatabaseSpec,
    backup_file_path: &Path,
    file_pairs: &[FilePair],
) -> Result<Statement> {
    let name = checked_name(database)?;
    let path = path_text(backup_file_path)?;

    let mut text = String::from("RESTORE DATABASE @databaseName");
    text.push_str(" FROM DISK = @backupFilePath WITH REPLACE");
    text.push_str(", NOUNLOAD");
    text.push_str(", STATS = 5");
    for pair in file_pairs {
        text.push_str(&format!(
            ", MOVE N'{}' TO N'{}'",
            escape_literal(&pair.logical_name),
            escape_literal(&pair.move_to_path)
        ));
    }

    Ok(Statement {
        kind: StatementKind::Restore,
        text,
        params: vec![
            SqlParam::new(PARAM_DATABASE_NAME, name),
            SqlParam::new(PARAM_BACKUP_FILE_PATH, path),
        ],
    })
}

pub fn set_online(database: &DatabaseSpec) -> Result<Statement> {
    let name = checked_name(database)?;
    Ok(Statement {
        kind: StatementKind::SetOnline,
        text: format!("ALTER DATABASE [{}] SET ONLINE", name),
        params: Vec::new(),
    })
}

fn checked_name(database: &DatabaseSpec) -> Result<&str> {
    let name = database.name.as_str();
    if name.trim().is_empty() || name.contains(']') || name.chars().any(char::is_control) {
        return Err(ToolkitError::InvalidStatement(format!(
            "database name {:?} cannot be used as an identifier",
            name
        )));
    }
    Ok(name)
}

fn path_text(path: &Path) -> Result<&str> {
    path.to_str().ok_or_else(|| {
        ToolkitError::InvalidStatement(format!(
            "path {} is not valid UTF-8",
            path.display()
        ))
    })
}

fn escape_literal(value: &str) -> String {
    value.replace('\'', "''")
}
