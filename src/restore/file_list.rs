// sqldatabasetool/src/restore/file_list.rs
use std::path::Path;

use crate::db::SqlRow;
use crate::errors::{Result, ToolkitError};

pub const COLUMN_LOGICAL_NAME: &str = "LogicalName";
pub const COLUMN_PHYSICAL_NAME: &str = "PhysicalName";

/// One row of a backup's file list and where it will be restored to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePair {
    pub logical_name: String,
    pub physical_name: String,
    pub move_to_path: String,
}

impl FilePair {
    pub fn from_row(row: &SqlRow, restore_directory: &Path) -> Result<Self> {
        let logical_name = required_column(row, COLUMN_LOGICAL_NAME)?;
        let physical_name = required_column(row, COLUMN_PHYSICAL_NAME)?;
        let move_to_path = relocate(physical_name, restore_directory)?;
        Ok(FilePair {
            logical_name: logical_name.to_string(),
            physical_name: physical_name.to_string(),
            move_to_path,
        })
    }
}

pub fn file_pairs(rows: &[SqlRow], restore_directory: &Path) -> Result<Vec<FilePair>> {
    rows.iter()
        .map(|row| FilePair::from_row(row, restore_directory))
        .collect()
}

/// `<restore_directory>/<file name of physical_name>`.
///
/// The physical name comes from the server that took the backup and may use
/// either separator, so both are stripped regardless of the local platform.
pub fn relocate(physical_name: &str, restore_directory: &Path) -> Result<String> {
    let file_name = physical_name
        .rsplit(['/', '\\'])
        .next()
        .filter(|name| !name.is_empty())
        .ok_or_else(|| {
            ToolkitError::Driver(format!(
                "physical file name {:?} has no file component",
                physical_name
            ))
        })?;
    let target = restore_directory.join(file_name);
    target.to_str().map(str::to_string).ok_or_else(|| {
        ToolkitError::InvalidStatement(format!("path {} is not valid UTF-8", target.display()))
    })
}

fn required_column<'a>(row: &'a SqlRow, column: &str) -> Result<&'a str> {
    row.get(column).ok_or_else(|| {
        ToolkitError::Driver(format!("RESTORE FILELISTONLY row is missing column {}", column))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relocate_strips_windows_and_unix_directories() -> anyhow::Result<()> {
        let restore = Path::new("/var/opt/mssql/restore");
        assert_eq!(
            relocate("C:\\Program Files\\MSSQL\\DATA\\Sales.mdf", restore)?,
            "/var/opt/mssql/restore/Sales.mdf"
        );
        assert_eq!(
            relocate("/var/opt/mssql/data/Sales_log.ldf", restore)?,
            "/var/opt/mssql/restore/Sales_log.ldf"
        );
        assert_eq!(relocate("Sales.ndf", restore)?, "/var/opt/mssql/restore/Sales.ndf");
        Ok(())
    }

    #[test]
    fn test_relocate_rejects_directory_only_names() {
        assert!(relocate("D:\\Data\\", Path::new("/restore")).is_err());
    }

    #[test]
    fn test_file_pairs_from_rows() -> anyhow::Result<()> {
        let rows = vec![
            SqlRow::from_pairs([("LogicalName", "Sales"), ("PhysicalName", "D:\\Data\\Sales.mdf"), ("Type", "D")]),
            SqlRow::from_pairs([("LogicalName", "Sales_log"), ("PhysicalName", "E:\\Logs\\Sales_log.ldf"), ("Type", "L")]),
        ];
        let pairs = file_pairs(&rows, Path::new("/restore"))?;

        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].logical_name, "Sales");
        assert_eq!(pairs[0].physical_name, "D:\\Data\\Sales.mdf");
        assert_eq!(pairs[1].move_to_path, "/restore/Sales_log.ldf");
        Ok(())
    }

    #[test]
    fn test_missing_column_is_an_error() {
        let rows = vec![SqlRow::from_pairs([("LogicalName", "Sales")])];
        assert!(file_pairs(&rows, Path::new("/restore")).is_err());
    }
}
