// sqldatabasetool/src/archive/store.rs
use chrono::NaiveDateTime;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;

use super::bundle::{create_zip_bundle, extract_zip_bundle};
use super::generation::Generation;
use crate::config::ToolkitOptions;
use crate::errors::{Result, ToolkitError};
use crate::utils::{delete_safely, prepare_directory};

/// Bundles kept in the archive directory after every upload.
pub const RETENTION_COUNT: usize = 3;

/// Moves backup files between the backup directory and the archive
/// directory as dated zip bundles.
///
/// Only this store creates or deletes bundles in the archive directory.
pub struct ArchiveFileStore {
    options: ToolkitOptions,
}

impl ArchiveFileStore {
    pub fn new(options: ToolkitOptions) -> Self {
        ArchiveFileStore { options }
    }

    /// Zips the configured databases' `.bak` files into
    /// `Backup_<timestamp>.zip`, copies it to the archive directory and purges
    /// old generations. Returns the archived bundle path, or `None` when no
    /// archive directory is configured.
    pub async fn upload(
        &self,
        timestamp: NaiveDateTime,
        token: &CancellationToken,
    ) -> Result<Option<PathBuf>> {
        let Some(archive_directory) = self.options.archive_directory.as_deref() else {
            tracing::info!("No archive directory configured, backups stay local");
            return Ok(None);
        };

        let generation = Generation::from_timestamp(timestamp);
        let bundle_name = generation.file_name();
        let local_bundle = self.options.backup_directory.join(&bundle_name);
        let sources = self.existing_backup_files();
        tracing::debug!(
            bundle = %bundle_name,
            files = sources.len(),
            "Compressing backup files"
        );
        let started = Instant::now();

        bail_if_cancelled(token, &bundle_name)?;
        delete_safely(&local_bundle);
        let compress_path = local_bundle.clone();
        let compress_token = token.clone();
        tokio::task::spawn_blocking(move || {
            create_zip_bundle(&compress_path, &sources, &compress_token)
        })
        .await
        .map_err(|e| ToolkitError::io("compressing backup files", io::Error::other(e)))??;

        let archived = archive_directory.join(&bundle_name);
        let copied = match bail_if_cancelled(token, &bundle_name) {
            Ok(()) => self.copy_to_archive(&local_bundle, archive_directory, &archived).await,
            Err(e) => Err(e),
        };
        delete_safely(&local_bundle);
        copied?;

        tracing::info!(
            bundle = %archived.display(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "✓ Bundle uploaded"
        );

        // the new bundle is complete, but nothing is deleted once the run is cancelled
        bail_if_cancelled(token, &bundle_name)?;
        purge(archive_directory, generation)?;
        Ok(Some(archived))
    }

    /// Extracts the newest bundle in the archive directory into the backup
    /// directory. Returns the extracted files, or `None` when there is no
    /// archive directory or no bundle in it.
    pub async fn download(&self, token: &CancellationToken) -> Result<Option<Vec<PathBuf>>> {
        let Some(archive_directory) = self.options.archive_directory.as_deref() else {
            tracing::info!("No archive directory configured, restoring from local backups");
            return Ok(None);
        };
        let backup_directory = &self.options.backup_directory;
        prepare_directory(archive_directory)?;
        prepare_directory(backup_directory)?;

        let Some((generation, bundle)) = list_generations(archive_directory)?.into_iter().next() else {
            tracing::info!(
                archive = %archive_directory.display(),
                "No bundle found in archive directory, nothing to download"
            );
            return Ok(None);
        };
        if token.is_cancelled() {
            return Err(ToolkitError::Cancelled(format!("download of {}", bundle.display())));
        }

        tracing::debug!(bundle = %bundle.display(), generation = %generation, "Extracting latest bundle");
        let started = Instant::now();
        let extract_to = backup_directory.clone();
        let extracted = tokio::task::spawn_blocking(move || extract_zip_bundle(&bundle, &extract_to))
            .await
            .map_err(|e| ToolkitError::io("extracting bundle", io::Error::other(e)))??;

        tracing::info!(
            generation = %generation,
            files = extracted.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "✓ Latest bundle extracted"
        );
        Ok(Some(extracted))
    }

    // Missing files belong to databases that produced no backup and are skipped.
    fn existing_backup_files(&self) -> Vec<PathBuf> {
        self.options
            .databases
            .iter()
            .map(|db| db.resolve_backup_file_path(&self.options.backup_directory))
            .filter(|path| path.is_file())
            .collect()
    }

    async fn copy_to_archive(
        &self,
        local_bundle: &Path,
        archive_directory: &Path,
        archived: &Path,
    ) -> Result<()> {
        prepare_directory(archive_directory)?;
        delete_safely(archived);
        tokio::fs::copy(local_bundle, archived).await.map_err(|e| {
            ToolkitError::io(
                format!("copying {} to {}", local_bundle.display(), archived.display()),
                e,
            )
        })?;
        Ok(())
    }
}

fn bail_if_cancelled(token: &CancellationToken, bundle_name: &str) -> Result<()> {
    if token.is_cancelled() {
        return Err(ToolkitError::Cancelled(format!("upload of {}", bundle_name)));
    }
    Ok(())
}

/// Bundles in `archive_directory`, newest generation first. Files whose
/// names do not parse as a generation are ignored.
pub fn list_generations(archive_directory: &Path) -> Result<Vec<(Generation, PathBuf)>> {
    let mut found = Vec::new();
    for entry in WalkDir::new(archive_directory).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| {
            let context = format!("listing {}", archive_directory.display());
            ToolkitError::io(context, io::Error::other(e))
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        if let Some(generation) = entry.file_name().to_str().and_then(Generation::parse) {
            found.push((generation, entry.into_path()));
        }
    }
    found.sort_by(|a, b| b.0.cmp(&a.0));
    Ok(found)
}

/// Keeps `current` plus the newest `RETENTION_COUNT - 1` other generations
/// and deletes everything older. Delete failures are returned.
pub fn purge(archive_directory: &Path, current: Generation) -> Result<Vec<PathBuf>> {
    purge_with(archive_directory, current, |path| std::fs::remove_file(path))
}

fn purge_with<F>(archive_directory: &Path, current: Generation, mut remove: F) -> Result<Vec<PathBuf>>
where
    F: FnMut(&Path) -> io::Result<()>,
{
    let mut kept = 1;
    let mut deleted = Vec::new();
    for (generation, path) in list_generations(archive_directory)? {
        if generation == current {
            continue;
        }
        if kept < RETENTION_COUNT {
            kept += 1;
            continue;
        }
        remove(&path)
            .map_err(|e| ToolkitError::io(format!("purging {}", path.display()), e))?;
        tracing::info!(bundle = %path.display(), generation = %generation, "Purged old bundle");
        deleted.push(path);
    }
    Ok(deleted)
}
