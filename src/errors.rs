use std::path::PathBuf;
use thiserror::Error;

use crate::restore::logic::RestoreState;

#[derive(Error, Debug)]
pub enum ToolkitError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error while {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("SQL execution failed for database '{database}' ({path}): {source}")]
    Sql {
        database: String,
        path: PathBuf,
        #[source]
        source: Box<ToolkitError>,
    },

    #[error("SQL driver error: {0}")]
    Driver(String),

    #[error("Command timed out after {seconds} seconds")]
    Timeout { seconds: u64 },

    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("Invalid statement: {0}")]
    InvalidStatement(String),

    #[error("Database '{database}' left {state} after a failed restore: {source}")]
    RestoreHazard {
        database: String,
        state: RestoreState,
        #[source]
        source: Box<ToolkitError>,
    },
}

impl ToolkitError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        ToolkitError::Io {
            context: context.into(),
            source,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        match self {
            ToolkitError::Cancelled(_) => true,
            ToolkitError::Sql { source, .. } | ToolkitError::RestoreHazard { source, .. } => {
                source.is_cancelled()
            }
            _ => false,
        }
    }
}

impl From<tiberius::error::Error> for ToolkitError {
    fn from(err: tiberius::error::Error) -> Self {
        ToolkitError::Driver(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ToolkitError>;
