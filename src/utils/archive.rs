//! Zip archiving of directory artifacts

use anyhow::{Context, Result};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Archive path used for a directory: a sibling `<dir>.zip`
pub fn archive_path_for(source_dir: &Path) -> PathBuf {
    let mut name = source_dir
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".zip");
    source_dir.with_file_name(name)
}

/// Create a zip archive of `source_dir` at `archive_dest_path`
///
/// Entry names are relative to `source_dir` and added in sorted order, so the
/// same tree always produces the same entry list. Returns the number of files
/// written.
pub fn create_zip_archive(source_dir: &Path, archive_dest_path: &Path) -> Result<usize> {
    if !source_dir.is_dir() {
        anyhow::bail!(
            "Source for archival is not a directory: {}",
            source_dir.display()
        );
    }

    debug!(
        "Creating zip archive from {} to {}",
        source_dir.display(),
        archive_dest_path.display()
    );

    let archive_file = File::create(archive_dest_path)
        .with_context(|| format!("Failed to create archive file: {}", archive_dest_path.display()))?;
    let mut writer = ZipWriter::new(archive_file);
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o644);

    let mut files = 0;
    for entry in WalkDir::new(source_dir).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Failed to walk directory: {}", source_dir.display()))?;
        let path = entry.path();
        let name = path
            .strip_prefix(source_dir)
            .with_context(|| format!("Failed to strip prefix from {}", path.display()))?;

        if name.as_os_str().is_empty() {
            continue;
        }

        let entry_name = name
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        if entry.file_type().is_dir() {
            writer
                .add_directory(entry_name, options)
                .with_context(|| format!("Failed to add directory {} to archive", path.display()))?;
        } else {
            writer
                .start_file(entry_name, options)
                .with_context(|| format!("Failed to add file {} to archive", path.display()))?;
            let mut file = File::open(path)
                .with_context(|| format!("Failed to open {}", path.display()))?;
            io::copy(&mut file, &mut writer)
                .with_context(|| format!("Failed to write {} to archive", path.display()))?;
            files += 1;
        }
    }

    writer.finish().context("Failed to finalize zip archive")?;
    Ok(files)
}
