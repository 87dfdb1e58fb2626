//! Artifact upload to object storage
//!
//! [`ArtifactUploader`] turns a finished [`BackupArtifact`] into one object and
//! hands it to an [`ObjectStore`]. Directory artifacts are zipped into a
//! sibling `<dir>.zip` first, and that archive is what gets uploaded; the
//! directory itself is left untouched.

pub mod local;
pub mod s3;

pub use local::LocalObjectStore;
pub use s3::{S3ObjectStore, S3Settings};

use crate::engines::{ArtifactLocation, BackupArtifact};
use crate::error::{BackupError, Result};
use crate::utils::archive::{archive_path_for, create_zip_archive};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Transport that stores a local file under a bucket and key
pub trait ObjectStore: Send + Sync {
    fn put_object(&self, bucket: &str, key: &str, file_path: &Path) -> anyhow::Result<()>;
}

/// Bucket and object key for an upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageTarget {
    pub bucket: String,
    pub key: String,
}

impl StorageTarget {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// Derive `{prefix/}{engine}/{basename}` for an artifact
    ///
    /// Directory artifacts are uploaded as archives, so their key ends in `.zip`.
    pub fn for_artifact(bucket: &str, prefix: Option<&str>, artifact: &BackupArtifact) -> Self {
        let basename = artifact
            .path()
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| artifact.database.clone());

        let object_name = match artifact.location {
            ArtifactLocation::SingleFile(_) => basename,
            ArtifactLocation::Directory(_) => format!("{}.zip", basename),
        };

        let key = match prefix.map(|p| p.trim_matches('/')).filter(|p| !p.is_empty()) {
            Some(prefix) => format!("{}/{}/{}", prefix, artifact.engine, object_name),
            None => format!("{}/{}", artifact.engine, object_name),
        };

        Self::new(bucket, key)
    }
}

/// Where uploads go: a bucket and an optional key prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadDestination {
    pub bucket: String,
    pub prefix: Option<String>,
}

impl UploadDestination {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            prefix: None,
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn target_for(&self, artifact: &BackupArtifact) -> StorageTarget {
        StorageTarget::for_artifact(&self.bucket, self.prefix.as_deref(), artifact)
    }
}

/// Record of a completed upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    pub target: StorageTarget,
    /// File that was sent (the archive for directory artifacts)
    pub source: PathBuf,
    pub bytes: u64,
}

/// Hands artifacts to an object store
#[derive(Clone)]
pub struct ArtifactUploader {
    store: Arc<dyn ObjectStore>,
}

impl ArtifactUploader {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Upload an artifact as a single object
    pub fn upload(&self, artifact: &BackupArtifact, target: &StorageTarget) -> Result<UploadReceipt> {
        artifact.ensure_present()?;

        let source = match artifact.location {
            ArtifactLocation::SingleFile(ref path) => path.clone(),
            ArtifactLocation::Directory(ref dir) => Self::archive(dir)?,
        };

        let bytes = Self::byte_length(&source)?;

        info!(
            "Uploading {} ({} bytes) to bucket '{}' as '{}'",
            source.display(),
            bytes,
            target.bucket,
            target.key
        );
        let start = Instant::now();

        self.store
            .put_object(&target.bucket, &target.key, &source)
            .map_err(|cause| BackupError::UploadFailed {
                bucket: target.bucket.clone(),
                key: target.key.clone(),
                cause,
            })?;

        info!(
            "Upload of '{}' completed in {:.2}s",
            target.key,
            start.elapsed().as_secs_f64()
        );

        Ok(UploadReceipt {
            target: target.clone(),
            source,
            bytes,
        })
    }

    fn archive(dir: &Path) -> Result<PathBuf> {
        let archive = archive_path_for(dir);
        let files = create_zip_archive(dir, &archive).map_err(|source| BackupError::ArchiveFailed {
            path: dir.to_path_buf(),
            source,
        })?;
        debug!("Archived {} file(s) from {} into {}", files, dir.display(), archive.display());
        Ok(archive)
    }

    fn byte_length(path: &Path) -> Result<u64> {
        let open_failed = |source| BackupError::ArtifactOpenFailed {
            path: path.to_path_buf(),
            source,
        };
        let file = File::open(path).map_err(open_failed)?;
        let bytes = file.metadata().map_err(open_failed)?.len();

        if bytes == 0 {
            return Err(BackupError::EmptyArtifact {
                path: path.to_path_buf(),
            });
        }
        Ok(bytes)
    }
}
