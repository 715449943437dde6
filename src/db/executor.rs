use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::commands::Statement;
use crate::errors::{Result, ToolkitError};

/// One result row, reduced to its textual columns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SqlRow {
    columns: HashMap<String, String>,
}

impl SqlRow {
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        SqlRow {
            columns: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.columns.get(column).map(String::as_str)
    }
}

/// Executes statements against the target server. Implementations own
/// the connection lifecycle of each call.
#[async_trait]
pub trait SqlExecutor: Send + Sync {
    /// Returns the affected-row count.
    async fn execute(&self, statement: &Statement) -> Result<u64>;

    async fn query(&self, statement: &Statement) -> Result<Vec<SqlRow>>;
}

/// Races `fut` against the command timeout and the run's cancellation token.
/// Dropping the future on either outcome aborts the in-flight statement.
pub async fn run_bounded<T, F>(
    timeout: Duration,
    token: &CancellationToken,
    what: &str,
    fut: F,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    if token.is_cancelled() {
        return Err(ToolkitError::Cancelled(format!("{} was not started", what)));
    }
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(ToolkitError::Cancelled(format!("{} was aborted", what))),
        outcome = tokio::time::timeout(timeout, fut) => match outcome {
            Ok(result) => result,
            Err(_) => Err(ToolkitError::Timeout { seconds: timeout.as_secs() }),
        },
    }
}
