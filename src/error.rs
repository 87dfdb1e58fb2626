//! Error taxonomy for backup, restore and upload operations
//!
//! Every failure the core can produce has its own variant so callers can
//! tell a caller-fixable misconfiguration from a tool failure or a transport
//! failure, and map each to a distinct process exit code.

use crate::engines::EngineKind;
use crate::utils::executor::ExitInfo;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum BackupError {
    #[error("unsupported database type: {0}")]
    UnsupportedEngine(String),

    #[error("missing required parameter: {0}")]
    MissingParameter(String),

    #[error("invalid value for parameter '{key}': {reason}")]
    InvalidParameter { key: String, reason: String },

    #[error("failed to create directory {path:?}: {source}")]
    DirectoryCreationFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to open artifact {path:?}: {source}")]
    ArtifactOpenFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("artifact is empty: {path:?}")]
    EmptyArtifact { path: PathBuf },

    #[error("artifact {path:?} is locked by another operation")]
    ArtifactLocked { path: PathBuf },

    #[error("failed to archive directory {path:?}: {source}")]
    ArchiveFailed {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("{engine} backup failed ({status}): {stderr}")]
    BackupExecutionFailed {
        engine: EngineKind,
        status: ExitInfo,
        stderr: String,
    },

    #[error("{engine} restore failed ({status}): {stderr}")]
    RestoreExecutionFailed {
        engine: EngineKind,
        status: ExitInfo,
        stderr: String,
    },

    #[error("failed to upload to bucket '{bucket}' with key '{key}': {cause:#}")]
    UploadFailed {
        bucket: String,
        key: String,
        #[source]
        cause: anyhow::Error,
    },
}

pub type Result<T> = std::result::Result<T, BackupError>;

impl BackupError {
    /// Process exit code for this failure class
    pub fn exit_code(&self) -> u8 {
        match self {
            BackupError::UnsupportedEngine(_)
            | BackupError::MissingParameter(_)
            | BackupError::InvalidParameter { .. } => 2,
            BackupError::DirectoryCreationFailed { .. }
            | BackupError::ArtifactOpenFailed { .. }
            | BackupError::EmptyArtifact { .. }
            | BackupError::ArchiveFailed { .. } => 3,
            BackupError::BackupExecutionFailed { .. }
            | BackupError::RestoreExecutionFailed { .. } => 4,
            BackupError::UploadFailed { .. } => 5,
            BackupError::ArtifactLocked { .. } => 6,
        }
    }

    /// Whether the error is a caller-fixable configuration problem
    pub fn is_validation(&self) -> bool {
        self.exit_code() == 2
    }
}
