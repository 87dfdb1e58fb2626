//! File-based locking to prevent two operations writing the same artifact

use crate::error::{BackupError, Result};
use fd_lock::{RwLock, RwLockWriteGuard};
use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const LOCK_DIR: &str = "db-backup-tool-locks";
/// Hex characters per path component, well under common file name limits
const KEY_CHUNK: usize = 200;

/// Exclusive lock keyed by an artifact path
pub struct ArtifactLock {
    // Declared before the lock it borrows from so it is released first
    guard: Option<RwLockWriteGuard<'static, File>>,
    _lock: Box<RwLock<File>>,
    artifact: PathBuf,
    lock_path: PathBuf,
}

impl ArtifactLock {
    /// Acquire an exclusive lock for an artifact
    /// Returns `ArtifactLocked` if another operation holds it
    pub fn acquire(artifact: &Path) -> Result<Self> {
        let lock_path = Self::lock_path(artifact);

        debug!("Attempting to acquire lock: {:?}", lock_path);

        if let Some(parent) = lock_path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| BackupError::ArtifactOpenFailed {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|source| BackupError::ArtifactOpenFailed {
                path: lock_path.clone(),
                source,
            })?;

        let mut lock = Box::new(RwLock::new(file));

        // SAFETY: the guard borrows the RwLock on the heap. The Box is never
        // moved out of or replaced while the guard lives, and Drop releases the
        // guard before the Box is freed.
        let lock_ptr = &mut *lock as *mut RwLock<File>;
        let guard = match unsafe { (*lock_ptr).try_write() } {
            Ok(guard) => guard,
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                return Err(BackupError::ArtifactLocked {
                    path: artifact.to_path_buf(),
                })
            }
            Err(source) => {
                return Err(BackupError::ArtifactOpenFailed {
                    path: lock_path,
                    source,
                })
            }
        };
        let static_guard: RwLockWriteGuard<'static, File> = unsafe { std::mem::transmute(guard) };

        info!("Acquired lock for artifact: {:?}", artifact);

        Ok(Self {
            guard: Some(static_guard),
            _lock: lock,
            artifact: artifact.to_path_buf(),
            lock_path,
        })
    }

    /// Lock file location for an artifact path
    ///
    /// The key is the hex encoding of the absolute path, so distinct artifacts
    /// never share a lock. Keys longer than one file name are split into
    /// nested directories.
    fn lock_path(artifact: &Path) -> PathBuf {
        let absolute = if artifact.is_relative() {
            std::env::current_dir()
                .map(|cwd| cwd.join(artifact))
                .unwrap_or_else(|_| artifact.to_path_buf())
        } else {
            artifact.to_path_buf()
        };

        let key: String = absolute
            .as_os_str()
            .as_encoded_bytes()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect();

        let mut path = std::env::temp_dir().join(LOCK_DIR);
        let chunks: Vec<&str> = key
            .as_bytes()
            .chunks(KEY_CHUNK)
            .filter_map(|chunk| std::str::from_utf8(chunk).ok())
            .collect();
        if let Some((last, parents)) = chunks.split_last() {
            for chunk in parents {
                path.push(chunk);
            }
            path.push(format!("{}.lock", last));
        }
        path
    }

    /// Get the lock file path (for cleanup or inspection)
    pub fn path(&self) -> &Path {
        &self.lock_path
    }
}

impl Drop for ArtifactLock {
    fn drop(&mut self) {
        self.guard.take();
        info!("Released lock for artifact: {:?}", self.artifact);

        if let Err(e) = std::fs::remove_file(&self.lock_path) {
            debug!("Failed to remove lock file: {}", e);
        }
    }
}
