//! MySQL backend: `mysqldump` to a file, `mysql` fed from it

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

pub struct MySqlBackend {
    context: BackendContext,
    contract: ParameterContract,
}

impl MySqlBackend {
    pub fn new(context: &BackendContext) -> Self {
        Self {
            context: context.clone(),
            contract: ParameterContract::for_engine(EngineKind::MySql),
        }
    }

    /// Connection arguments shared by dump and restore
    fn connection(&self, program: &str, config: &BackupConfig) -> Result<Invocation> {
        Ok(Invocation::new(program)
            .arg(format!("--user={}", config.require(keys::USERNAME)?))
            .secret_arg(format!("--password={}", config.require(keys::PASSWORD)?))
            .arg(format!("--host={}", config.require(keys::HOST)?))
            .arg(format!("--port={}", config.require(keys::PORT)?.trim()))
            .timeout(self.context.timeout))
    }
}

impl EngineBackend for MySqlBackend {
    fn engine(&self) -> EngineKind {
        EngineKind::MySql
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

        info!("Starting full MySQL backup of '{}'", dbname);
        ensure_parent_dir(&backup_file)?;

        let invocation = self
            .connection(&self.context.tools.mysqldump, &config)?
            .arg(dbname)
            .stdout_to(staging_path(&backup_file));
        run_backup_tool(&self.context, self.engine(), &invocation, Some(&backup_file))?;

        info!("MySQL backup completed: {}", backup_file.display());
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

        info!("Starting MySQL restore of '{}' from {}", dbname, backup_file.display());
        ensure_exists(&backup_file)?;

        let invocation = self
            .connection(&self.context.tools.mysql, &config)?
            .arg(dbname)
            .stdin_from(&backup_file);
        run_restore_tool(&self.context, self.engine(), &invocation)?;

        info!("MySQL restore completed for '{}'", dbname);
        Ok(())
    }
}
