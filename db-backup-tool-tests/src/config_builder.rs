//! Fluent API for building test configurations
//!
//! Provides a builder pattern for creating test configurations with sensible defaults.

use db_backup_tool::config::{CloudType, Config, LogFormat, NotifyEvent};
use db_backup_tool::engines::{EngineKind, ToolPaths};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Builder for creating test configurations
pub struct ConfigBuilder {
    temp_dir: TempDir,
    config: Config,
}

impl ConfigBuilder {
    /// Create a builder for an engine with local defaults
    pub fn new(engine: EngineKind) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");

        let mut config = Config::default();
        config.database.db_type = engine.to_string();
        config.database.host = "127.0.0.1".to_string();
        config.database.username = "backup".to_string();
        config.database.password = "test-password-123".to_string();
        config.database.dbname = "shop".to_string();
        config.storage.local_path = Some(temp_dir.path().join("backups"));

        Self { temp_dir, config }
    }

    pub fn mysql() -> Self {
        Self::new(EngineKind::MySql)
    }

    pub fn postgresql() -> Self {
        Self::new(EngineKind::PostgreSql)
    }

    pub fn mongodb() -> Self {
        Self::new(EngineKind::MongoDb)
    }

    pub fn with_database(mut self, dbname: &str) -> Self {
        self.config.database.dbname = dbname.to_string();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.config.database.port = Some(port);
        self
    }

    pub fn with_credentials(mut self, username: &str, password: &str) -> Self {
        self.config.database.username = username.to_string();
        self.config.database.password = password.to_string();
        self
    }

    /// Use these programs instead of the real dump and restore tools
    pub fn with_tools(mut self, tools: &ToolPaths) -> Self {
        self.config.tools.mysqldump = Some(tools.mysqldump.clone());
        self.config.tools.mysql = Some(tools.mysql.clone());
        self.config.tools.pg_dump = Some(tools.pg_dump.clone());
        self.config.tools.psql = Some(tools.psql.clone());
        self.config.tools.mongodump = Some(tools.mongodump.clone());
        self.config.tools.mongorestore = Some(tools.mongorestore.clone());
        self
    }

    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.config.tools.timeout_seconds = seconds;
        self
    }

    /// Upload to a local object store inside the temp dir
    pub fn with_local_store(mut self, bucket: &str) -> Self {
        self.config.storage.cloud_type = Some(CloudType::Local);
        self.config.storage.bucket = bucket.to_string();
        self.config.storage.local_store_path = Some(self.temp_dir.path().join("store"));
        self
    }

    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.config.storage.prefix = prefix.to_string();
        self
    }

    pub fn with_log_file(mut self, format: LogFormat) -> Self {
        self.config.logging.file = Some(self.temp_dir.path().join("logs").join("backup.log"));
        self.config.logging.format = format;
        self
    }

    pub fn with_notifications(mut self, url: &str, events: Vec<NotifyEvent>) -> Self {
        self.config.notification.slack_webhook_url = url.to_string();
        self.config.notification.notify_on = events;
        self
    }

    /// Get the temp directory path
    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Build the configuration (temp dir is dropped)
    pub fn build(self) -> Config {
        self.config
    }

    /// Serialize the configuration to TOML
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(&self.config).expect("Failed to serialize config")
    }

    /// Write `config.toml` into the temp dir, keeping the temp dir alive
    pub fn persist(self) -> (PathBuf, TempDir) {
        let path = self.temp_dir.path().join("config.toml");
        fs::write(&path, self.to_toml()).expect("Failed to write config file");
        (path, self.temp_dir)
    }
}
