// sqldatabasetool/src/config/mod.rs
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::ToolkitError;

/// Section name the options may be nested under in config.json.
pub const OPTIONS_SECTION: &str = "SqlDatabaseOptions";
pub const DEFAULT_COMMAND_TIMEOUT_SECONDS: u64 = 60;

pub const ENV_CONNECTION_STRING: &str = "SQLTOOLKIT_CONNECTION_STRING";
pub const ENV_BACKUP_DIRECTORY: &str = "SQLTOOLKIT_BACKUP_DIRECTORY";
pub const ENV_RESTORE_DIRECTORY: &str = "SQLTOOLKIT_RESTORE_DIRECTORY";
pub const ENV_ARCHIVE_DIRECTORY: &str = "SQLTOOLKIT_ARCHIVE_DIRECTORY";
pub const ENV_COMMAND_TIMEOUT_SECONDS: &str = "SQLTOOLKIT_COMMAND_TIMEOUT_SECONDS";

// Structs for deserializing config.json
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum JsonDatabaseEntry {
    Named {
        #[serde(rename = "Name")]
        name: String,
    },
    Plain(String),
}

impl JsonDatabaseEntry {
    fn into_name(self) -> String {
        match self {
            JsonDatabaseEntry::Named { name } => name,
            JsonDatabaseEntry::Plain(name) => name,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RawJsonConfig {
    pub connection_string: Option<String>,
    pub backup_directory: Option<String>,
    pub restore_directory: Option<String>,
    pub archive_directory: Option<String>,
    pub command_timeout_seconds: Option<u64>,
    pub databases: Option<Vec<JsonDatabaseEntry>>,
}

/// One configured database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseSpec {
    pub name: String,
}

impl DatabaseSpec {
    pub fn new(name: impl Into<String>) -> Self {
        DatabaseSpec { name: name.into() }
    }

    /// `<name>.bak`
    pub fn backup_file_name(&self) -> String {
        format!("{}.bak", self.name)
    }

    pub fn resolve_backup_file_path(&self, directory: &Path) -> PathBuf {
        directory.join(self.backup_file_name())
    }
}

/// Resolved, validated options for one backup or restore run.
#[derive(Debug, Clone)]
pub struct ToolkitOptions {
    pub connection_string: String,
    pub backup_directory: PathBuf,
    pub restore_directory: PathBuf,
    /// `None` keeps backups local only.
    pub archive_directory: Option<PathBuf>,
    pub command_timeout_seconds: u64,
    pub databases: Vec<DatabaseSpec>,
}

impl ToolkitOptions {
    /// Reads config.json, layers `.env` and `SQLTOOLKIT_*` environment
    /// variables on top, then validates.
    pub fn load(config_path: &Path) -> Result<Self> {
        // A missing .env is not an error.
        let _ = dotenv::dotenv();

        let mut raw = if config_path.exists() {
            load_raw_from_json(config_path)?
        } else {
            tracing::warn!(
                path = %config_path.display(),
                "Config file not found, relying on environment variables only"
            );
            RawJsonConfig::default()
        };
        apply_env_overrides(&mut raw, |key| std::env::var(key).ok())?;

        let options = ToolkitOptions::from_raw(raw)
            .with_context(|| format!("Invalid configuration in {}", config_path.display()))?;
        tracing::debug!(
            databases = options.databases.len(),
            backup_directory = %options.backup_directory.display(),
            archive_enabled = options.archive_directory.is_some(),
            "Configuration loaded"
        );
        Ok(options)
    }

    /// Validates raw options. Fails before any SQL or file operation runs.
    pub fn from_raw(raw: RawJsonConfig) -> std::result::Result<Self, ToolkitError> {
        let connection_string = raw
            .connection_string
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| ToolkitError::Config("ConnectionString must be set".to_string()))?;

        let backup_directory = required_directory(raw.backup_directory, "BackupDirectory")?;
        let restore_directory = required_directory(raw.restore_directory, "RestoreDirectory")?;
        let archive_directory = match raw.archive_directory {
            Some(dir) if !dir.trim().is_empty() => Some(resolve_directory(&dir, "ArchiveDirectory")?),
            _ => None,
        };

        let command_timeout_seconds = raw
            .command_timeout_seconds
            .unwrap_or(DEFAULT_COMMAND_TIMEOUT_SECONDS);
        if command_timeout_seconds == 0 {
            return Err(ToolkitError::Config(
                "CommandTimeoutSeconds must be greater than zero".to_string(),
            ));
        }

        let names: Vec<String> = raw
            .databases
            .unwrap_or_default()
            .into_iter()
            .map(JsonDatabaseEntry::into_name)
            .collect();
        if names.is_empty() {
            return Err(ToolkitError::Config(
                "Databases must list at least one database".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        let mut databases = Vec::with_capacity(names.len());
        for name in names {
            validate_database_name(&name)?;
            if !seen.insert(name.to_lowercase()) {
                return Err(ToolkitError::Config(format!(
                    "Database '{}' is listed more than once",
                    name
                )));
            }
            databases.push(DatabaseSpec::new(name));
        }

        Ok(ToolkitOptions {
            connection_string,
            backup_directory,
            restore_directory,
            archive_directory,
            command_timeout_seconds,
            databases,
        })
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_seconds)
    }
}

/// Parses config.json. The options may sit at top level or under a
/// `SqlDatabaseOptions` section.
pub fn load_raw_from_json(config_path: &Path) -> Result<RawJsonConfig> {
    let config_content = fs::read_to_string(config_path)
        .with_context(|| format!("Failed to read config file at {}", config_path.display()))?;
    parse_raw_config(&config_content).with_context(|| {
        format!(
            "Failed to parse JSON from config file at {}",
            config_path.display()
        )
    })
}

fn parse_raw_config(content: &str) -> Result<RawJsonConfig> {
    let mut value: serde_json::Value = serde_json::from_str(content)?;
    if let Some(section) = value.get_mut(OPTIONS_SECTION) {
        value = section.take();
    }
    if !value.is_object() {
        anyhow::bail!("configuration must be a JSON object");
    }
    let raw: RawJsonConfig = serde_json::from_value(value)
        .context("Failed to map configuration onto the recognised options")?;
    Ok(raw)
}

/// Environment variables win over values read from config.json.
pub fn apply_env_overrides<F>(raw: &mut RawJsonConfig, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = lookup(ENV_CONNECTION_STRING) {
        raw.connection_string = Some(value);
    }
    if let Some(value) = lookup(ENV_BACKUP_DIRECTORY) {
        raw.backup_directory = Some(value);
    }
    if let Some(value) = lookup(ENV_RESTORE_DIRECTORY) {
        raw.restore_directory = Some(value);
    }
    if let Some(value) = lookup(ENV_ARCHIVE_DIRECTORY) {
        raw.archive_directory = Some(value);
    }
    if let Some(value) = lookup(ENV_COMMAND_TIMEOUT_SECONDS) {
        let seconds = value.trim().parse::<u64>().with_context(|| {
            format!("{} must be a whole number of seconds, got '{}'", ENV_COMMAND_TIMEOUT_SECONDS, value)
        })?;
        raw.command_timeout_seconds = Some(seconds);
    }
    Ok(())
}

fn required_directory(value: Option<String>, key: &str) -> std::result::Result<PathBuf, ToolkitError> {
    match value {
        Some(dir) if !dir.trim().is_empty() => resolve_directory(&dir, key),
        _ => Err(ToolkitError::Config(format!("{} must be set", key))),
    }
}

fn resolve_directory(dir: &str, key: &str) -> std::result::Result<PathBuf, ToolkitError> {
    std::path::absolute(dir.trim())
        .map_err(|e| ToolkitError::Config(format!("{} '{}' cannot be resolved: {}", key, dir, e)))
}

/// Names end up inside `[...]` identifiers and `<name>.bak` file names.
fn validate_database_name(name: &str) -> std::result::Result<(), ToolkitError> {
    if name.trim().is_empty() {
        return Err(ToolkitError::Config("Database name cannot be empty".to_string()));
    }
    if name
        .chars()
        .any(|c| c == ']' || c == '\'' || c == '/' || c == '\\' || c.is_control())
    {
        return Err(ToolkitError::Config(format!(
            "Invalid character in database name: {:?}",
            name
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw_from(value: serde_json::Value) -> anyhow::Result<RawJsonConfig> {
        parse_raw_config(&value.to_string())
    }

    #[test]
    fn test_parse_top_level_options() -> anyhow::Result<()> {
        let raw = raw_from(json!({
            "ConnectionString": "Server=tcp:localhost,1433;User Id=sa;Password=x",
            "BackupDirectory": "/var/backups/sql",
            "RestoreDirectory": "/var/lib/mssql/data",
            "ArchiveDirectory": "/mnt/archive",
            "CommandTimeoutSeconds": 300,
            "Databases": [{ "Name": "Sales" }, { "Name": "Inventory" }]
        }))?;
        let options = ToolkitOptions::from_raw(raw)?;

        assert_eq!(options.command_timeout_seconds, 300);
        assert_eq!(options.archive_directory, Some(PathBuf::from("/mnt/archive")));
        assert_eq!(
            options.databases,
            vec![DatabaseSpec::new("Sales"), DatabaseSpec::new("Inventory")]
        );
        Ok(())
    }

    #[test]
    fn test_parse_nested_section_and_plain_names() -> anyhow::Result<()> {
        let raw = raw_from(json!({
            "Logging": { "LogLevel": { "Default": "Information" } },
            "SqlDatabaseOptions": {
                "ConnectionString": "Server=db;User Id=sa;Password=x",
                "BackupDirectory": "/backups",
                "RestoreDirectory": "/data",
                "Databases": ["Sales", { "Name": "Hr" }]
            }
        }))?;
        let options = ToolkitOptions::from_raw(raw)?;

        assert_eq!(options.command_timeout_seconds, DEFAULT_COMMAND_TIMEOUT_SECONDS);
        assert_eq!(options.archive_directory, None);
        assert_eq!(options.databases[0].name, "Sales");
        assert_eq!(options.databases[1].name, "Hr");
        Ok(())
    }

    #[test]
    fn test_empty_archive_directory_disables_archive() -> anyhow::Result<()> {
        let raw = raw_from(json!({
            "ConnectionString": "Server=db",
            "BackupDirectory": "/backups",
            "RestoreDirectory": "/data",
            "ArchiveDirectory": "",
            "Databases": ["Sales"]
        }))?;
        assert!(ToolkitOptions::from_raw(raw)?.archive_directory.is_none());
        Ok(())
    }

    #[test]
    fn test_empty_database_list_is_rejected() -> anyhow::Result<()> {
        let raw = raw_from(json!({
            "ConnectionString": "Server=db",
            "BackupDirectory": "/backups",
            "RestoreDirectory": "/data",
            "Databases": []
        }))?;
        let err = ToolkitOptions::from_raw(raw).unwrap_err();
        assert!(matches!(err, ToolkitError::Config(_)));
        Ok(())
    }

    #[test]
    fn test_missing_directories_and_zero_timeout_are_rejected() -> anyhow::Result<()> {
        let no_backup_dir = raw_from(json!({
            "ConnectionString": "Server=db",
            "RestoreDirectory": "/data",
            "Databases": ["Sales"]
        }))?;
        assert!(ToolkitOptions::from_raw(no_backup_dir).is_err());

        let zero_timeout = raw_from(json!({
            "ConnectionString": "Server=db",
            "BackupDirectory": "/backups",
            "RestoreDirectory": "/data",
            "CommandTimeoutSeconds": 0,
            "Databases": ["Sales"]
        }))?;
        assert!(ToolkitOptions::from_raw(zero_timeout).is_err());
        Ok(())
    }

    #[test]
    fn test_invalid_and_duplicate_database_names() -> anyhow::Result<()> {
        for databases in [json!(["Sales]"]), json!(["O'Brien"]), json!(["a/b"]), json!(["Sales", "sales"])] {
            let raw = raw_from(json!({
                "ConnectionString": "Server=db",
                "BackupDirectory": "/backups",
                "RestoreDirectory": "/data",
                "Databases": databases.clone()
            }))?;
            assert!(ToolkitOptions::from_raw(raw).is_err(), "{databases} should be rejected");
        }
        Ok(())
    }

    #[test]
    fn test_env_overrides_win_over_file_values() -> anyhow::Result<()> {
        let mut raw = raw_from(json!({
            "ConnectionString": "Server=file",
            "BackupDirectory": "/backups",
            "RestoreDirectory": "/data",
            "Databases": ["Sales"]
        }))?;
        apply_env_overrides(&mut raw, |key| match key {
            ENV_CONNECTION_STRING => Some("Server=env".to_string()),
            ENV_COMMAND_TIMEOUT_SECONDS => Some("15".to_string()),
            _ => None,
        })?;
        let options = ToolkitOptions::from_raw(raw)?;

        assert_eq!(options.connection_string, "Server=env");
        assert_eq!(options.command_timeout(), Duration::from_secs(15));
        Ok(())
    }

    #[test]
    fn test_env_timeout_must_be_numeric() {
        let mut raw = RawJsonConfig::default();
        let result = apply_env_overrides(&mut raw, |key| {
            (key == ENV_COMMAND_TIMEOUT_SECONDS).then(|| "soon".to_string())
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_backup_file_path_resolution() {
        let db = DatabaseSpec::new("Sales");
        assert_eq!(db.backup_file_name(), "Sales.bak");
        assert_eq!(
            db.resolve_backup_file_path(Path::new("/backups")),
            PathBuf::from("/backups/Sales.bak")
        );
    }
}
