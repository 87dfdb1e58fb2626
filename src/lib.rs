//! db-backup-tool library
//!
//! Full backups and restores of MySQL, PostgreSQL and MongoDB through each
//! engine's native command-line tools, with optional upload of the resulting
//! artifact to object storage.

pub mod config;
pub mod engines;
pub mod error;
pub mod managers;
pub mod storage;
pub mod utils;

// Re-export commonly used types
pub use config::{load_config, Config};
pub use engines::{
    ArtifactLocation, ArtifactPolicy, BackendContext, BackendRegistry, BackupArtifact,
    BackupConfig, EngineBackend, EngineKind,
};
pub use error::{BackupError, Result};
pub use managers::logging::{init_console_logging, init_logging, LogGuard, LoggingConfig};
pub use managers::notification::NotificationManager;
pub use managers::orchestrator::Orchestrator;
pub use storage::{ArtifactUploader, ObjectStore, StorageTarget, UploadDestination, UploadReceipt};
