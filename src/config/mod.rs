//! Configuration module for db-backup-tool
//!
//! Settings come from a TOML file. Any field can then be overridden with a
//! `BACKUP_TOOL_<SECTION>_<FIELD>` environment variable, and the result is
//! validated before use.
//!
//! ## Example Usage
//!
//! ```no_run
//! use db_backup_tool::config;
//!
//! let config = config::load_config("backup-config.toml")?;
//! if let Some(engine) = config.engine() {
//!     println!("Backing up {} on {}", config.database.dbname, engine);
//! }
//! # Ok::<(), config::ConfigError>(())
//! ```

mod loader;
mod types;

pub use loader::{
    apply_env_overrides, load_config, parse_config, validate_config, ConfigError, Result,
    ENV_PREFIX,
};
pub use types::*;

use crate::engines::ArtifactPolicy;
use std::path::{Path, PathBuf};

/// Expand tilde (~) in path
pub fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    path.to_path_buf()
}

/// Root for default artifact paths: `storage.local_path` or `~/backups`
pub fn backup_root(storage: &StorageConfig) -> PathBuf {
    match storage.local_path {
        Some(ref path) => expand_tilde(path),
        None => dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("backups"),
    }
}

/// Artifact policy used by the command line: fall back to the backup root
pub fn artifact_policy(config: &Config) -> ArtifactPolicy {
    ArtifactPolicy::DefaultRoot(backup_root(&config.storage))
}
