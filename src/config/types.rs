use crate::engines::{BackupConfig, EngineKind, ToolPaths};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingSettings,
    #[serde(default)]
    pub notification: NotificationConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
}

/// Database connection settings
#[derive(Clone, Default, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Engine identifier: mysql, postgresql or mongodb
    #[serde(rename = "type", default)]
    pub db_type: String,
    #[serde(default)]
    pub host: String,
    /// Defaults to the engine's standard port
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub dbname: String,
    /// MongoDB authentication database
    #[serde(default)]
    pub auth_db: String,
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("db_type", &self.db_type)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &if self.password.is_empty() { "" } else { "****" })
            .field("dbname", &self.dbname)
            .field("auth_db", &self.auth_db)
            .finish()
    }
}

impl DatabaseConfig {
    /// Configured port, or the engine default
    pub fn effective_port(&self, engine: EngineKind) -> u16 {
        self.port.unwrap_or(match engine {
            EngineKind::MySql => 3306,
            EngineKind::PostgreSql => 5432,
            EngineKind::MongoDb => 27017,
        })
    }
}

/// Local and remote storage settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Root for default artifact paths (defaults to ~/backups)
    #[serde(default)]
    pub local_path: Option<PathBuf>,
    /// Upload target; no uploads when unset
    #[serde(default)]
    pub cloud_type: Option<CloudType>,
    #[serde(default)]
    pub bucket: String,
    /// Key prefix prepended to `{engine}/{file}`
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub endpoint_url: Option<String>,
    /// Root directory for the local object store
    #[serde(default)]
    pub local_store_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CloudType {
    S3,
    Local,
}

impl FromStr for CloudType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "s3" => Ok(CloudType::S3),
            "local" => Ok(CloudType::Local),
            other => Err(format!("unsupported cloud type: {}", other)),
        }
    }
}

/// Logging output settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log file; daily rotated files are written next to it
    #[serde(default)]
    pub file: Option<PathBuf>,
    #[serde(default)]
    pub format: LogFormat,
    #[serde(default = "default_log_max_files")]
    pub max_files: u32,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
            format: LogFormat::default(),
            max_files: default_log_max_files(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unsupported log format: {}", other)),
        }
    }
}

/// Notification configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NotificationConfig {
    #[serde(default)]
    pub slack_webhook_url: String,

    #[serde(default = "default_notify_on")]
    pub notify_on: Vec<NotifyEvent>,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            slack_webhook_url: String::new(),
            notify_on: default_notify_on(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NotifyEvent {
    Failure,
    Success,
}

/// External tool settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ToolsConfig {
    /// Limit per dump/restore invocation; 0 disables the limit
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
    #[serde(default)]
    pub mysqldump: Option<String>,
    #[serde(default)]
    pub mysql: Option<String>,
    #[serde(default)]
    pub pg_dump: Option<String>,
    #[serde(default)]
    pub psql: Option<String>,
    #[serde(default)]
    pub mongodump: Option<String>,
    #[serde(default)]
    pub mongorestore: Option<String>,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout(),
            mysqldump: None,
            mysql: None,
            pg_dump: None,
            psql: None,
            mongodump: None,
            mongorestore: None,
        }
    }
}

impl ToolsConfig {
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_seconds > 0).then(|| Duration::from_secs(self.timeout_seconds))
    }

    /// Program names with configured overrides applied
    pub fn tool_paths(&self) -> ToolPaths {
        let defaults = ToolPaths::default();
        let pick = |value: &Option<String>, default: String| {
            value.clone().filter(|v| !v.trim().is_empty()).unwrap_or(default)
        };
        ToolPaths {
            mysqldump: pick(&self.mysqldump, defaults.mysqldump),
            mysql: pick(&self.mysql, defaults.mysql),
            pg_dump: pick(&self.pg_dump, defaults.pg_dump),
            psql: pick(&self.psql, defaults.psql),
            mongodump: pick(&self.mongodump, defaults.mongodump),
            mongorestore: pick(&self.mongorestore, defaults.mongorestore),
        }
    }
}

impl Config {
    /// Engine named by `database.type`, if valid
    pub fn engine(&self) -> Option<EngineKind> {
        self.database.db_type.parse().ok()
    }

    /// Operation parameters from the database section
    ///
    /// Artifact locations are not part of the file; callers add them.
    pub fn backup_config(&self, engine: EngineKind) -> BackupConfig {
        let db = &self.database;
        BackupConfig::new()
            .with("host", db.host.clone())
            .with("port", db.effective_port(engine).to_string())
            .with("username", db.username.clone())
            .with("password", db.password.clone())
            .with("dbname", db.dbname.clone())
            .with("auth-db", db.auth_db.clone())
    }
}

// Default value functions

fn default_log_level() -> String { "info".to_string() }
fn default_log_max_files() -> u32 { 10 }
fn default_timeout() -> u64 { 3600 }
fn default_notify_on() -> Vec<NotifyEvent> {
    vec![NotifyEvent::Failure]
}
