pub mod commands;
pub mod executor;
pub mod mssql;
#[cfg(test)]
pub(crate) mod testing;

pub use executor::{SqlExecutor, SqlRow};
pub use mssql::MssqlExecutor;
