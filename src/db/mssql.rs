// sqldatabasetool/src/db/mssql.rs
use async_trait::async_trait;
use tiberius::{Client, Config, Row, ToSql};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};

use super::commands::Statement;
use super::executor::{SqlExecutor, SqlRow};
use crate::errors::{Result, ToolkitError};

/// SQL Server executor. Opens a fresh connection for every call and closes
/// it before returning.
pub struct MssqlExecutor {
    config: Config,
}

impl MssqlExecutor {
    /// Accepts an ADO.NET style connection string
    /// (`Server=tcp:host,1433;User Id=..;Password=..;TrustServerCertificate=true`).
    pub fn from_connection_string(connection_string: &str) -> Result<Self> {
        let config = Config::from_ado_string(connection_string)
            .map_err(|e| ToolkitError::Config(format!("Invalid ConnectionString: {}", e)))?;
        Ok(MssqlExecutor { config })
    }

    async fn connect(&self) -> Result<Client<Compat<TcpStream>>> {
        let addr = self.config.get_addr();
        let tcp = TcpStream::connect(addr.as_str())
            .await
            .map_err(|e| ToolkitError::io(format!("connecting to SQL Server at {}", addr), e))?;
        tcp.set_nodelay(true)
            .map_err(|e| ToolkitError::io("configuring SQL Server socket", e))?;

        let client = Client::connect(self.config.clone(), tcp.compat_write()).await?;
        Ok(client)
    }
}

#[async_trait]
impl SqlExecutor for MssqlExecutor {
    async fn execute(&self, statement: &Statement) -> Result<u64> {
        let mut client = self.connect().await?;
        let params = bound_params(statement);
        let result = client.execute(bound_text(statement), &params).await?;
        let affected = result.rows_affected().iter().sum();
        client.close().await?;
        Ok(affected)
    }

    async fn query(&self, statement: &Statement) -> Result<Vec<SqlRow>> {
        let mut client = self.connect().await?;
        let params = bound_params(statement);
        let rows = client
            .query(bound_text(statement), &params)
            .await?
            .into_first_result()
            .await?;
        let converted = rows.iter().map(to_sql_row).collect();
        client.close().await?;
        Ok(converted)
    }
}

/// tiberius binds positionally as `@P1..@Pn`; declaring the named variables
/// up front keeps statement text in its `@databaseName` form.
fn bound_text(statement: &Statement) -> String {
    let mut text = String::new();
    for (idx, param) in statement.params.iter().enumerate() {
        text.push_str(&format!(
            "DECLARE @{} NVARCHAR(4000) = @P{};\n",
            param.name,
            idx + 1
        ));
    }
    text.push_str(&statement.text);
    text
}

fn bound_params(statement: &Statement) -> Vec<&dyn ToSql> {
    statement
        .params
        .iter()
        .map(|p| &p.value as &dyn ToSql)
        .collect()
}

/// Non-text columns (sizes, LSNs, GUIDs) are dropped.
fn to_sql_row(row: &Row) -> SqlRow {
    SqlRow::from_pairs(
        row.columns()
            .iter()
            .enumerate()
            .filter_map(|(idx, column)| match row.try_get::<&str, _>(idx) {
                Ok(Some(value)) => Some((column.name(), value)),
                _ => None,
            }),
    )
}
