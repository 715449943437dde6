// sqldatabasetool/src/archive/bundle.rs
use chrono::{DateTime, Datelike, Local, TimeZone, Timelike};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Instant, SystemTime};
use tokio_util::sync::CancellationToken;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::errors::{Result, ToolkitError};
use crate::utils::delete_safely;

// Above this size an entry needs ZIP64 headers.
const ZIP64_THRESHOLD: u64 = u32::MAX as u64;
const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// Writes every file in `sources` into a new zip at `bundle_path`, one entry
/// per file named after the file, keeping its last-write time.
///
/// Any failure deletes the partially written bundle before returning.
pub fn create_zip_bundle(
    bundle_path: &Path,
    sources: &[PathBuf],
    token: &CancellationToken,
) -> Result<()> {
    let result = write_bundle(bundle_path, sources, token);
    if let Err(e) = &result {
        tracing::error!(
            bundle = %bundle_path.display(),
            error = %e,
            "Failed to write bundle, removing partial file"
        );
        delete_safely(bundle_path);
    }
    result
}

fn write_bundle(bundle_path: &Path, sources: &[PathBuf], token: &CancellationToken) -> Result<()> {
    let bundle_file = File::create(bundle_path).map_err(|e| {
        ToolkitError::io(format!("creating bundle {}", bundle_path.display()), e)
    })?;
    let mut zip = ZipWriter::new(BufWriter::new(bundle_file));

    for source in sources {
        if token.is_cancelled() {
            return Err(ToolkitError::Cancelled(format!(
                "compression of {} was aborted",
                bundle_path.display()
            )));
        }
        let started = Instant::now();
        let entry_name = source
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                ToolkitError::Archive(format!("{} has no usable file name", source.display()))
            })?;
        tracing::debug!(file = entry_name, "Compressing backup file");

        let source_file = File::open(source)
            .map_err(|e| ToolkitError::io(format!("opening {}", source.display()), e))?;
        let metadata = source_file
            .metadata()
            .map_err(|e| ToolkitError::io(format!("reading metadata of {}", source.display()), e))?;
        let last_write = metadata
            .modified()
            .map(zip_timestamp)
            .unwrap_or_default();

        let options = FileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .last_modified_time(last_write)
            .large_file(metadata.len() >= ZIP64_THRESHOLD);
        zip.start_file(entry_name, options)?;

        let mut reader = BufReader::new(source_file);
        copy_until_cancelled(&mut reader, &mut zip, token, source)?;

        tracing::info!(
            file = entry_name,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "✓ Backup file compressed"
        );
    }

    let mut writer = zip.finish()?;
    writer
        .flush()
        .map_err(|e| ToolkitError::io(format!("flushing bundle {}", bundle_path.display()), e))?;
    Ok(())
}

/// Streams `reader` into `writer` one buffer at a time, giving up as soon as
/// `token` is cancelled.
fn copy_until_cancelled<R: Read, W: Write>(
    reader: &mut R,
    writer: &mut W,
    token: &CancellationToken,
    source: &Path,
) -> Result<u64> {
    let mut buffer = vec![0u8; COPY_BUFFER_SIZE];
    let mut copied = 0u64;
    loop {
        if token.is_cancelled() {
            return Err(ToolkitError::Cancelled(format!(
                "compression of {} was aborted after {} bytes",
                source.display(),
                copied
            )));
        }
        let read = match reader.read(&mut buffer) {
            Ok(0) => return Ok(copied),
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                return Err(ToolkitError::io(format!("reading {}", source.display()), e));
            }
        };
        writer
            .write_all(&buffer[..read])
            .map_err(|e| ToolkitError::io(format!("compressing {}", source.display()), e))?;
        copied += read as u64;
    }
}

/// Extracts every file entry of `bundle_path` into `extract_to_dir`,
/// overwriting files of the same name. Returns the written paths.
pub fn extract_zip_bundle(bundle_path: &Path, extract_to_dir: &Path) -> Result<Vec<PathBuf>> {
    let bundle_file = File::open(bundle_path)
        .map_err(|e| ToolkitError::io(format!("opening bundle {}", bundle_path.display()), e))?;
    let mut archive = ZipArchive::new(BufReader::new(bundle_file))?;

    let mut extracted = Vec::with_capacity(archive.len());
    for idx in 0..archive.len() {
        let mut entry = archive.by_index(idx)?;
        if entry.is_dir() {
            continue;
        }
        // enclosed_name rejects absolute paths and `..` components
        let relative = entry.enclosed_name().map(Path::to_path_buf).ok_or_else(|| {
            ToolkitError::Archive(format!(
                "entry {:?} in {} escapes the extraction directory",
                entry.name(),
                bundle_path.display()
            ))
        })?;
        let target = extract_to_dir.join(&relative);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ToolkitError::io(format!("creating {}", parent.display()), e))?;
        }

        let out = File::create(&target)
            .map_err(|e| ToolkitError::io(format!("creating {}", target.display()), e))?;
        let mut writer = BufWriter::new(out);
        io::copy(&mut entry, &mut writer)
            .map_err(|e| ToolkitError::io(format!("extracting {}", target.display()), e))?;
        let out = writer
            .into_inner()
            .map_err(|e| ToolkitError::io(format!("flushing {}", target.display()), e.into_error()))?;
        if let Some(modified) = system_time(entry.last_modified()) {
            // cosmetic, the bytes are what matter
            let _ = out.set_modified(modified);
        }

        tracing::debug!(file = %target.display(), "Extracted backup file");
        extracted.push(target);
    }
    Ok(extracted)
}

fn zip_timestamp(modified: SystemTime) -> zip::DateTime {
    let local: DateTime<Local> = modified.into();
    zip::DateTime::from_date_and_time(
        u16::try_from(local.year()).unwrap_or(1980),
        local.month() as u8,
        local.day() as u8,
        local.hour() as u8,
        local.minute() as u8,
        local.second() as u8,
    )
    .unwrap_or_default()
}

fn system_time(stamp: zip::DateTime) -> Option<SystemTime> {
    Local
        .with_ymd_and_hms(
            i32::from(stamp.year()),
            u32::from(stamp.month()),
            u32::from(stamp.day()),
            u32::from(stamp.hour()),
            u32::from(stamp.minute()),
            u32::from(stamp.second()),
        )
        .single()
        .map(SystemTime::from)
}
