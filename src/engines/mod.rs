//! Database engine backends
//!
//! Each supported engine implements [`EngineBackend`] over its native dump and
//! restore tools. Backends are obtained through the
//! [`BackendRegistry`](registry::BackendRegistry), never constructed by callers
//! directly.
//!
//! ## Example Usage
//!
//! ```no_run
//! use db_backup_tool::engines::{BackendContext, BackupConfig, BackendRegistry};
//!
//! let registry = BackendRegistry::new(BackendContext::default());
//! let backend = registry.resolve("postgresql")?;
//! let config = BackupConfig::new()
//!     .with("host", "localhost")
//!     .with("port", "5432")
//!     .with("username", "postgres")
//!     .with("password", "secret")
//!     .with("dbname", "shop")
//!     .with("backup-file", "/var/backups/shop.sql");
//! let artifact = backend.perform_full_backup(&config)?;
//! println!("Backup written to {}", artifact.path().display());
//! # Ok::<(), db_backup_tool::BackupError>(())
//! ```

pub mod contract;
pub mod mongodb;
pub mod mysql;
pub mod postgresql;
pub mod registry;

pub use contract::{keys, ParameterContract, Rule};
pub use registry::{BackendFactory, BackendRegistry};

use crate::error::{BackupError, Result};
use crate::utils::executor::{CommandExecutor, Invocation, RealExecutor};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Default limit for a single dump or restore invocation
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3600);

/// Supported database engines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EngineKind {
    #[serde(rename = "mysql")]
    MySql,
    #[serde(rename = "postgresql")]
    PostgreSql,
    #[serde(rename = "mongodb")]
    MongoDb,
}

impl EngineKind {
    pub const ALL: [EngineKind; 3] = [EngineKind::MySql, EngineKind::PostgreSql, EngineKind::MongoDb];

    pub fn as_str(&self) -> &'static str {
        match self {
            EngineKind::MySql => "mysql",
            EngineKind::PostgreSql => "postgresql",
            EngineKind::MongoDb => "mongodb",
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EngineKind {
    type Err = BackupError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mysql" => Ok(EngineKind::MySql),
            "postgresql" => Ok(EngineKind::PostgreSql),
            "mongodb" => Ok(EngineKind::MongoDb),
            _ => Err(BackupError::UnsupportedEngine(s.to_string())),
        }
    }
}

/// String parameters for one backup or restore operation
///
/// Unknown keys are carried but ignored by backends. Empty values count as
/// absent.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct BackupConfig {
    values: BTreeMap<String, String>,
}

impl BackupConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Copy of this config without `key`
    pub fn without(mut self, key: &str) -> Self {
        self.values.remove(key);
        self
    }

    /// Value for `key`, if present and non-empty
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Value for `key` or `MissingParameter`
    pub fn require(&self, key: &str) -> Result<&str> {
        self.get(key)
            .ok_or_else(|| BackupError::MissingParameter(key.to_string()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

impl fmt::Debug for BackupConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (key, value) in &self.values {
            if key == keys::PASSWORD {
                map.entry(key, &"****");
            } else {
                map.entry(key, value);
            }
        }
        map.finish()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for BackupConfig {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Where a backup artifact lives on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactLocation {
    SingleFile(PathBuf),
    Directory(PathBuf),
}

impl ArtifactLocation {
    pub fn path(&self) -> &Path {
        match self {
            ArtifactLocation::SingleFile(path) | ArtifactLocation::Directory(path) => path,
        }
    }

    pub fn is_directory(&self) -> bool {
        matches!(self, ArtifactLocation::Directory(_))
    }
}

/// Durable output of a successful backup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupArtifact {
    pub engine: EngineKind,
    pub database: String,
    pub location: ArtifactLocation,
}

impl BackupArtifact {
    pub fn new(engine: EngineKind, database: impl Into<String>, location: ArtifactLocation) -> Self {
        Self {
            engine,
            database: database.into(),
            location,
        }
    }

    pub fn path(&self) -> &Path {
        self.location.path()
    }

    /// Check the artifact exists and holds data
    pub fn ensure_present(&self) -> Result<()> {
        let path = self.path();
        let metadata = std::fs::metadata(path).map_err(|source| BackupError::ArtifactOpenFailed {
            path: path.to_path_buf(),
            source,
        })?;

        let empty = match self.location {
            ArtifactLocation::SingleFile(_) => !metadata.is_file() || metadata.len() == 0,
            ArtifactLocation::Directory(_) => {
                !metadata.is_dir()
                    || std::fs::read_dir(path)
                        .map_err(|source| BackupError::ArtifactOpenFailed {
                            path: path.to_path_buf(),
                            source,
                        })?
                        .next()
                        .is_none()
            }
        };

        if empty {
            return Err(BackupError::EmptyArtifact {
                path: path.to_path_buf(),
            });
        }
        Ok(())
    }
}

/// What a backend does when the artifact location is not configured
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ArtifactPolicy {
    /// The location key is required
    #[default]
    Strict,
    /// Fall back to a fixed layout under this root
    DefaultRoot(PathBuf),
}

impl ArtifactPolicy {
    /// Fallback location for a database, stable for a given root
    ///
    /// Single-file engines use `<root>/<engine>/<dbname>.sql`; MongoDB dumps
    /// into `<root>/mongodb`.
    pub fn fallback_for(root: &Path, engine: EngineKind, dbname: &str) -> (&'static str, PathBuf) {
        match engine {
            EngineKind::MongoDb => (keys::BACKUP_PATH, root.join(engine.as_str())),
            _ => (
                keys::BACKUP_FILE,
                root.join(engine.as_str()).join(format!("{}.sql", dbname)),
            ),
        }
    }

    /// Fill in the fallback location when neither location key is set
    pub fn apply(&self, engine: EngineKind, config: &BackupConfig) -> BackupConfig {
        let root = match self {
            ArtifactPolicy::Strict => return config.clone(),
            ArtifactPolicy::DefaultRoot(root) => root,
        };

        if config.contains(keys::BACKUP_FILE) || config.contains(keys::BACKUP_PATH) {
            return config.clone();
        }

        match config.get(keys::DBNAME) {
            Some(dbname) => {
                let (key, path) = Self::fallback_for(root, engine, dbname);
                debug!("Using default {} for {}: {}", key, engine, path.display());
                config.clone().with(key, path.to_string_lossy())
            }
            None => config.clone(),
        }
    }
}

/// Program names (or paths) of the external tools
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolPaths {
    pub mysqldump: String,
    pub mysql: String,
    pub pg_dump: String,
    pub psql: String,
    pub mongodump: String,
    pub mongorestore: String,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            mysqldump: "mysqldump".to_string(),
            mysql: "mysql".to_string(),
            pg_dump: "pg_dump".to_string(),
            psql: "psql".to_string(),
            mongodump: "mongodump".to_string(),
            mongorestore: "mongorestore".to_string(),
        }
    }
}

impl ToolPaths {
    /// (backup tool, restore tool) for an engine
    pub fn for_engine(&self, engine: EngineKind) -> (&str, &str) {
        match engine {
            EngineKind::MySql => (&self.mysqldump, &self.mysql),
            EngineKind::PostgreSql => (&self.pg_dump, &self.psql),
            EngineKind::MongoDb => (&self.mongodump, &self.mongorestore),
        }
    }
}

/// Shared dependencies handed to every backend the registry builds
#[derive(Clone)]
pub struct BackendContext {
    pub executor: Arc<dyn CommandExecutor>,
    pub timeout: Option<Duration>,
    pub tools: ToolPaths,
    pub policy: ArtifactPolicy,
}

impl BackendContext {
    pub fn new(executor: Arc<dyn CommandExecutor>) -> Self {
        Self {
            executor,
            timeout: Some(DEFAULT_TIMEOUT),
            tools: ToolPaths::default(),
            policy: ArtifactPolicy::Strict,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_tools(mut self, tools: ToolPaths) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_policy(mut self, policy: ArtifactPolicy) -> Self {
        self.policy = policy;
        self
    }
}

impl Default for BackendContext {
    fn default() -> Self {
        Self::new(Arc::new(RealExecutor::new()))
    }
}

impl fmt::Debug for BackendContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendContext")
            .field("timeout", &self.timeout)
            .field("tools", &self.tools)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

/// Backup and restore for one database engine
pub trait EngineBackend: Send + Sync {
    /// The engine this backend handles
    fn engine(&self) -> EngineKind;

    /// Declared parameters, checked before anything runs
    fn contract(&self) -> &ParameterContract;

    fn context(&self) -> &BackendContext;

    /// Apply the artifact policy and check the contract
    fn prepare(&self, config: &BackupConfig) -> Result<BackupConfig> {
        let resolved = self.context().policy.apply(self.engine(), config);
        self.contract().check(&resolved)?;
        Ok(resolved)
    }

    /// Fails with the first missing or invalid parameter
    fn validate(&self, config: &BackupConfig) -> Result<()> {
        self.prepare(config).map(|_| ())
    }

    /// Where a backup with this config is written
    fn artifact_location(&self, config: &BackupConfig) -> Result<ArtifactLocation>;

    /// Dump the database and return the produced artifact
    fn perform_full_backup(&self, config: &BackupConfig) -> Result<BackupArtifact>;

    /// Load a previously produced artifact into the database
    fn restore_backup(&self, config: &BackupConfig) -> Result<()>;
}

/// Create a directory and its ancestors (owner rwx)
pub(crate) fn ensure_dir(path: &Path) -> Result<()> {
    let mut builder = std::fs::DirBuilder::new();
    builder.recursive(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o755);
    }

    builder
        .create(path)
        .map_err(|source| BackupError::DirectoryCreationFailed {
            path: path.to_path_buf(),
            source,
        })
}

/// Create the directory that will hold `file`
pub(crate) fn ensure_parent_dir(file: &Path) -> Result<()> {
    match file.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => ensure_dir(parent),
        _ => Ok(()),
    }
}

/// Fail with `ArtifactOpenFailed` unless `path` exists
pub(crate) fn ensure_exists(path: &Path) -> Result<()> {
    std::fs::metadata(path)
        .map(|_| ())
        .map_err(|source| BackupError::ArtifactOpenFailed {
            path: path.to_path_buf(),
            source,
        })
}

/// Sibling that a single-file dump is written to until the tool succeeds
pub(crate) fn staging_path(file: &Path) -> PathBuf {
    let mut name = file.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".partial");
    file.with_file_name(name)
}

/// Run a dump tool
///
/// With `output`, the invocation must write to [`staging_path`] of it. The
/// staged file replaces `output` only on success, so a failed run leaves any
/// earlier artifact at `output` untouched.
pub(crate) fn run_backup_tool(
    context: &BackendContext,
    engine: EngineKind,
    invocation: &Invocation,
    output: Option<&Path>,
) -> Result<()> {
    debug!("Executing {} backup: {}", engine, invocation.display_command());

    let staged = output.map(staging_path);
    let result = context.executor.execute(invocation);

    match result {
        Ok(ref result) if result.success() => {}
        _ => {
            if let Some(ref path) = staged {
                if path.is_file() {
                    if let Err(e) = std::fs::remove_file(path) {
                        warn!("Failed to remove partial backup {:?}: {}", path, e);
                    }
                }
            }
        }
    }

    let result = result?;
    if !result.success() {
        return Err(BackupError::BackupExecutionFailed {
            engine,
            status: result.status,
            stderr: result.stderr,
        });
    }

    if let (Some(staged), Some(output)) = (staged, output) {
        std::fs::rename(&staged, output)
            .map_err(|source| BackupError::ArtifactOpenFailed { path: staged, source })?;
    }
    Ok(())
}

/// Run a restore tool
pub(crate) fn run_restore_tool(
    context: &BackendContext,
    engine: EngineKind,
    invocation: &Invocation,
) -> Result<()> {
    debug!("Executing {} restore: {}", engine, invocation.display_command());

    let result = context.executor.execute(invocation)?;
    if result.success() {
        return Ok(());
    }

    Err(BackupError::RestoreExecutionFailed {
        engine,
        status: result.status,
        stderr: result.stderr,
    })
}
