//! Orchestrator - runs backups, restores and uploads end to end

use crate::engines::{keys, BackendRegistry, BackupArtifact, BackupConfig, EngineBackend};
use crate::error::{BackupError, Result};
use crate::managers::notification::NotificationManager;
use crate::storage::{ArtifactUploader, UploadDestination, UploadReceipt};
use crate::utils::locker::ArtifactLock;
use std::time::Instant;
use tracing::{error, info, warn};

pub struct Orchestrator {
    registry: BackendRegistry,
    uploader: Option<ArtifactUploader>,
    notification_manager: Option<NotificationManager>,
}

impl Orchestrator {
    pub fn new(registry: BackendRegistry) -> Self {
        Self {
            registry,
            uploader: None,
            notification_manager: None,
        }
    }

    pub fn with_uploader(mut self, uploader: ArtifactUploader) -> Self {
        self.uploader = Some(uploader);
        self
    }

    pub fn with_notification_manager(mut self, manager: NotificationManager) -> Self {
        self.notification_manager = Some(manager);
        self
    }

    pub fn registry(&self) -> &BackendRegistry {
        &self.registry
    }

    fn notify_failure(&self, operation: &str, engine: &str, database: &str, error: &str, duration_secs: u64) {
        if let Some(ref manager) = self.notification_manager {
            if let Err(e) = manager.send_failure(operation, engine, database, error, Some(duration_secs)) {
                warn!("Failed to send failure notification: {}", e);
            }
        }
    }

    fn notify_success(&self, operation: &str, engine: &str, database: &str, duration_secs: u64) {
        if let Some(ref manager) = self.notification_manager {
            if let Err(e) = manager.send_success(operation, engine, database, duration_secs) {
                warn!("Failed to send success notification: {}", e);
            }
        }
    }

    /// Check a config against the engine's contract without running anything
    pub fn validate(&self, engine: &str, config: &BackupConfig) -> Result<()> {
        self.registry.resolve(engine)?.validate(config)
    }

    /// Run a full backup and return the artifact
    pub fn run_backup(&self, engine: &str, config: &BackupConfig) -> Result<BackupArtifact> {
        let backend = self.registry.resolve(engine)?;
        let location = backend.artifact_location(config)?;
        let _lock = ArtifactLock::acquire(location.path())?;

        self.backup_locked(backend.as_ref(), config)
    }

    /// Restore a previously produced artifact
    pub fn run_restore(&self, engine: &str, config: &BackupConfig) -> Result<()> {
        let backend = self.registry.resolve(engine)?;
        let location = backend.artifact_location(config)?;
        let _lock = ArtifactLock::acquire(location.path())?;

        let engine_name = backend.engine().to_string();
        let database = database_name(config);
        let start_time = Instant::now();

        info!("Starting restore of {} database '{}'", engine_name, database);

        match backend.restore_backup(config) {
            Ok(()) => {
                let duration_secs = start_time.elapsed().as_secs();
                info!(
                    "Restore of '{}' completed in {:.2}s",
                    database,
                    start_time.elapsed().as_secs_f64()
                );
                self.notify_success("restore", &engine_name, database, duration_secs);
                Ok(())
            }
            Err(e) => {
                error!("Restore of '{}' failed: {}", database, e);
                self.notify_failure("restore", &engine_name, database, &e.to_string(), start_time.elapsed().as_secs());
                Err(e)
            }
        }
    }

    /// Back up, then upload the artifact
    ///
    /// Nothing is uploaded when the backup fails. A failed upload leaves the
    /// local artifact in place and is reported as `UploadFailed`.
    pub fn run_backup_and_upload(
        &self,
        engine: &str,
        config: &BackupConfig,
        destination: &UploadDestination,
    ) -> Result<UploadReceipt> {
        let uploader = self.require_uploader(destination)?;
        let backend = self.registry.resolve(engine)?;
        let location = backend.artifact_location(config)?;
        let _lock = ArtifactLock::acquire(location.path())?;

        let artifact = self.backup_locked(backend.as_ref(), config)?;
        self.upload_locked(uploader, &artifact, destination)
    }

    /// Upload an artifact that is already on disk
    pub fn upload_existing(
        &self,
        artifact: &BackupArtifact,
        destination: &UploadDestination,
    ) -> Result<UploadReceipt> {
        let uploader = self.require_uploader(destination)?;
        let _lock = ArtifactLock::acquire(artifact.path())?;

        self.upload_locked(uploader, artifact, destination)
    }

    fn require_uploader(&self, destination: &UploadDestination) -> Result<&ArtifactUploader> {
        self.uploader.as_ref().ok_or_else(|| BackupError::UploadFailed {
            bucket: destination.bucket.clone(),
            key: String::new(),
            cause: anyhow::anyhow!("no object store configured"),
        })
    }

    fn backup_locked(&self, backend: &dyn EngineBackend, config: &BackupConfig) -> Result<BackupArtifact> {
        let engine_name = backend.engine().to_string();
        let database = database_name(config);
        let start_time = Instant::now();

        info!("Starting backup of {} database '{}'", engine_name, database);

        match backend.perform_full_backup(config) {
            Ok(artifact) => {
                let duration_secs = start_time.elapsed().as_secs();
                info!(
                    "Backup of '{}' completed in {:.2}s: {}",
                    database,
                    start_time.elapsed().as_secs_f64(),
                    artifact.path().display()
                );
                self.notify_success("backup", &engine_name, database, duration_secs);
                Ok(artifact)
            }
            Err(e) => {
                error!("Backup of '{}' failed: {}", database, e);
                self.notify_failure("backup", &engine_name, database, &e.to_string(), start_time.elapsed().as_secs());
                Err(e)
            }
        }
    }

    fn upload_locked(
        &self,
        uploader: &ArtifactUploader,
        artifact: &BackupArtifact,
        destination: &UploadDestination,
    ) -> Result<UploadReceipt> {
        let engine_name = artifact.engine.to_string();
        let target = destination.target_for(artifact);
        let start_time = Instant::now();

        match uploader.upload(artifact, &target) {
            Ok(receipt) => {
                self.notify_success("upload", &engine_name, &artifact.database, start_time.elapsed().as_secs());
                Ok(receipt)
            }
            Err(e) => {
                error!(
                    "Upload of {} failed, local artifact kept: {}",
                    artifact.path().display(),
                    e
                );
                self.notify_failure("upload", &engine_name, &artifact.database, &e.to_string(), start_time.elapsed().as_secs());
                Err(e)
            }
        }
    }
}

fn database_name(config: &BackupConfig) -> &str {
    config.get(keys::DBNAME).unwrap_or("unknown")
}
