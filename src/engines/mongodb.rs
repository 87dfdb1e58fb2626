//! MongoDB backend: `mongodump --out <dir>` and `mongorestore <dir>/<dbname>`
//!
//! The dump directory comes from `backup-path`, or the parent of
//! `backup-file` when only that is given. `mongodump` writes the database into
//! a `<dbname>` subdirectory, which is the artifact.

use super::contract::keys;
use super::{
    ensure_dir, ensure_exists, run_backup_tool, run_restore_tool, ArtifactLocation,
    BackendContext, BackupArtifact, BackupConfig, EngineBackend, EngineKind, ParameterContract,
};
use crate::error::Result;
use crate::utils::executor::Invocation;
use std::path::PathBuf;
use tracing::{info, warn};

const DEFAULT_AUTH_DB: &str = "admin";

pub struct MongoDbBackend {
    context: BackendContext,
    contract: ParameterContract,
}

impl MongoDbBackend {
    pub fn new(context: &BackendContext) -> Self {
        Self {
            context: context.clone(),
            contract: ParameterContract::for_engine(EngineKind::MongoDb),
        }
    }

    fn dump_dir(config: &BackupConfig) -> Result<PathBuf> {
        if let Some(path) = config.get(keys::BACKUP_PATH) {
            return Ok(PathBuf::from(path));
        }

        let file = PathBuf::from(config.require(keys::BACKUP_FILE)?);
        Ok(match file.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        })
    }

    fn connection(&self, program: &str, config: &BackupConfig) -> Result<Invocation> {
        let invocation = Invocation::new(program)
            .args(["--host", config.require(keys::HOST)?])
            .args(["--port", config.require(keys::PORT)?.trim()])
            .timeout(self.context.timeout);

        Ok(match (config.get(keys::USERNAME), config.get(keys::PASSWORD)) {
            (Some(username), Some(password)) => invocation
                .args(["--username", username])
                .arg("--password")
                .secret_arg(password)
                .args([
                    "--authenticationDatabase",
                    config.get(keys::AUTH_DB).unwrap_or(DEFAULT_AUTH_DB),
                ]),
            (None, None) => invocation,
            _ => {
                warn!("Ignoring MongoDB credentials: both username and password are required");
                invocation
            }
        })
    }
}

impl EngineBackend for MongoDbBackend {
    fn engine(&self) -> EngineKind {
        EngineKind::MongoDb
    }

    fn contract(&self) -> &ParameterContract {
        &self.contract
    }

    fn context(&self) -> &BackendContext {
        &self.context
    }

    fn artifact_location(&self, config: &BackupConfig) -> Result<ArtifactLocation> {
        let config = self.prepare(config)?;
        let dbname = config.require(keys::DBNAME)?;
        Ok(ArtifactLocation::Directory(Self::dump_dir(&config)?.join(dbname)))
    }

    fn perform_full_backup(&self, config: &BackupConfig) -> Result<BackupArtifact> {
        let config = self.prepare(config)?;
        let dbname = config.require(keys::DBNAME)?;
        let dump_dir = Self::dump_dir(&config)?;

        info!("Starting full MongoDB backup of '{}'", dbname);
        ensure_dir(&dump_dir)?;

        let invocation = self
            .connection(&self.context.tools.mongodump, &config)?
            .args(["--db", dbname])
            .arg("--out")
            .arg(dump_dir.to_string_lossy());
        run_backup_tool(&self.context, self.engine(), &invocation, None)?;

        // mongodump exits 0 without writing anything for an unknown database
        let artifact = BackupArtifact::new(
            self.engine(),
            dbname,
            ArtifactLocation::Directory(dump_dir.join(dbname)),
        );
        artifact.ensure_present()?;

        info!("MongoDB backup completed: {}", artifact.path().display());
        Ok(artifact)
    }

    fn restore_backup(&self, config: &BackupConfig) -> Result<()> {
        let config = self.prepare(config)?;
        let dbname = config.require(keys::DBNAME)?;
        let source = Self::dump_dir(&config)?.join(dbname);

        info!("Starting MongoDB restore of '{}' from {}", dbname, source.display());
        ensure_exists(&source)?;

        let invocation = self
            .connection(&self.context.tools.mongorestore, &config)?
            .arg(source.to_string_lossy());
        run_restore_tool(&self.context, self.engine(), &invocation)?;

        info!("MongoDB restore completed for '{}'", dbname);
        Ok(())
    }
}
