use std::path::Path;

use crate::errors::{Result, ToolkitError};

/// Creates `directory` (and any missing parents) if it does not exist yet.
pub fn prepare_directory(directory: &Path) -> Result<()> {
    if directory.is_dir() {
        return Ok(());
    }
    std::fs::create_dir_all(directory).map_err(|e| {
        ToolkitError::io(format!("creating directory {}", directory.display()), e)
    })?;
    tracing::debug!(path = %directory.display(), "Created directory");
    Ok(())
}

/// Best-effort delete of an obsolete file. Failures are logged and swallowed.
pub fn delete_safely(path: &Path) {
    if !path.exists() {
        return;
    }
    if let Err(e) = std::fs::remove_file(path) {
        tracing::debug!(path = %path.display(), error = %e, "Could not delete file, ignoring");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_prepare_directory_creates_nested_path() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let nested = temp.path().join("a").join("b");
        prepare_directory(&nested)?;
        assert!(nested.is_dir());
        // second call is a no-op
        prepare_directory(&nested)?;
        Ok(())
    }

    #[test]
    fn test_delete_safely_ignores_missing_files() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let file = temp.path().join("stale.zip");
        delete_safely(&file);
        std::fs::write(&file, b"x")?;
        delete_safely(&file);
        assert!(!file.exists());
        Ok(())
    }
}
