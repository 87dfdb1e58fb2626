//! PostgreSQL backend: `pg_dump -f` and `psql -f`
//!
//! The password travels in `PGPASSWORD` on the child's own environment, so
//! concurrent operations never see each other's credentials.

use super::contract::keys;
use super::{
    ensure_exists, ensure_parent_dir, run_backup_tool, run_restore_tool, staging_path,
    ArtifactLocation, BackendContext, BackupArtifact, BackupConfig, EngineBackend, EngineKind,
    ParameterContract,
};
use crate::error::Result;
use crate::utils::executor::Invocation;
use std::path::PathBuf;
use tracing::info;

pub struct PostgreSqlBackend {
    context: BackendContext,
    contract: ParameterContract,
}

impl PostgreSqlBackend {
    pub fn new(context: &BackendContext) -> Self {
        Self {
            context: context.clone(),
            contract: ParameterContract::for_engine(EngineKind::PostgreSql),
        }
    }

    fn connection(&self, program: &str, config: &BackupConfig) -> Result<Invocation> {
        Ok(Invocation::new(program)
            .args(["-U", config.require(keys::USERNAME)?])
            .args(["-h", config.require(keys::HOST)?])
            .args(["-p", config.require(keys::PORT)?.trim()])
            .args(["-d", config.require(keys::DBNAME)?])
            .env("PGPASSWORD", config.require(keys::PASSWORD)?)
            .timeout(self.context.timeout))
    }
}

impl EngineBackend for PostgreSqlBackend {
    fn engine(&self) -> EngineKind {
        EngineKind::PostgreSql
    }

    fn contract(&self) -> &ParameterContract {
        &self.contract
    }

    fn context(&self) -> &BackendContext {
        &self.context
    }

    fn artifact_location(&self, config: &BackupConfig) -> Result<ArtifactLocation> {
        let config = self.prepare(config)?;
        Ok(ArtifactLocation::SingleFile(PathBuf::from(
            config.require(keys::BACKUP_FILE)?,
        )))
    }

    fn perform_full_backup(&self, config: &BackupConfig) -> Result<BackupArtifact> {
        let config = self.prepare(config)?;
        let dbname = config.require(keys::DBNAME)?;
        let backup_file = PathBuf::from(config.require(keys::BACKUP_FILE)?);

        info!("Starting full PostgreSQL backup of '{}'", dbname);
        ensure_parent_dir(&backup_file)?;

        let invocation = self
            .connection(&self.context.tools.pg_dump, &config)?
            .arg("-f")
            .arg(staging_path(&backup_file).to_string_lossy());
        run_backup_tool(&self.context, self.engine(), &invocation, Some(&backup_file))?;

        info!("PostgreSQL backup completed: {}", backup_file.display());
        Ok(BackupArtifact::new(
            self.engine(),
            dbname,
            ArtifactLocation::SingleFile(backup_file),
        ))
    }

    fn restore_backup(&self, config: &BackupConfig) -> Result<()> {
        let config = self.prepare(config)?;
        let dbname = config.require(keys::DBNAME)?;
        let backup_file = PathBuf::from(config.require(keys::BACKUP_FILE)?);

        info!(
            "Starting PostgreSQL restore of '{}' from {}",
            dbname,
            backup_file.display()
        );
        ensure_exists(&backup_file)?;

        // Without ON_ERROR_STOP psql exits 0 even when statements fail
        let invocation = self
            .connection(&self.context.tools.psql, &config)?
            .args(["-v", "ON_ERROR_STOP=1"])
            .arg("-f")
            .arg(backup_file.to_string_lossy());
        run_restore_tool(&self.context, self.engine(), &invocation)?;

        info!("PostgreSQL restore completed for '{}'", dbname);
        Ok(())
    }
}
