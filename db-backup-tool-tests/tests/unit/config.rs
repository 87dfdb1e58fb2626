//! Configuration file loading with environment overrides

use db_backup_tool::config::{load_config, ConfigError};
use serial_test::serial;
use test_utils::{CloudType, ConfigBuilder, EngineKind, LogFormat, ResultAssertions, TestContext};

/// Sets environment variables for the lifetime of the guard
struct EnvGuard {
    keys: Vec<&'static str>,
}

impl EnvGuard {
    fn set(vars: &[(&'static str, &str)]) -> Self {
        for (key, value) in vars {
            std::env::set_var(key, value);
        }
        Self {
            keys: vars.iter().map(|(k, _)| *k).collect(),
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for key in &self.keys {
            std::env::remove_var(key);
        }
    }
}

#[test]
#[serial]
fn test_load_builder_config() {
    let (path, _temp) = ConfigBuilder::mysql().with_port(3307).persist();

    let config = load_config(&path).assert_ok();
    assert_eq!(config.engine(), Some(EngineKind::MySql));
    assert_eq!(config.database.effective_port(EngineKind::MySql), 3307);
}

#[test]
#[serial]
fn test_environment_overrides_file() {
    let (path, _temp) = ConfigBuilder::postgresql().persist();
    let _env = EnvGuard::set(&[
        ("BACKUP_TOOL_DATABASE_HOST", "pg.internal"),
        ("BACKUP_TOOL_DATABASE_PASSWORD", "from-env"),
        ("BACKUP_TOOL_STORAGE_CLOUD_TYPE", "local"),
        ("BACKUP_TOOL_STORAGE_BUCKET", "nightly"),
        ("BACKUP_TOOL_LOGGING_FORMAT", "json"),
    ]);

    let config = load_config(&path).assert_ok();
    assert_eq!(config.database.host, "pg.internal");
    assert_eq!(config.database.password, "from-env");
    assert_eq!(config.storage.cloud_type, Some(CloudType::Local));
    assert_eq!(config.storage.bucket, "nightly");
    assert_eq!(config.logging.format, LogFormat::Json);
}

#[test]
#[serial]
fn test_environment_can_switch_engine() {
    let (path, _temp) = ConfigBuilder::mysql().persist();
    let _env = EnvGuard::set(&[("BACKUP_TOOL_DATABASE_TYPE", "mongodb")]);

    let config = load_config(&path).assert_ok();
    assert_eq!(config.engine(), Some(EngineKind::MongoDb));
    assert_eq!(
        config.backup_config(EngineKind::MongoDb).get("port"),
        Some("27017")
    );
}

#[test]
#[serial]
fn test_invalid_environment_value() {
    let (path, _temp) = ConfigBuilder::mysql().persist();
    let _env = EnvGuard::set(&[("BACKUP_TOOL_TOOLS_TIMEOUT_SECONDS", "soon")]);

    load_config(&path).assert_err_contains("BACKUP_TOOL_TOOLS_TIMEOUT_SECONDS");
}

#[test]
#[serial]
fn test_environment_cannot_blank_required_field() {
    let (path, _temp) = ConfigBuilder::mysql().persist();
    let _env = EnvGuard::set(&[("BACKUP_TOOL_DATABASE_DBNAME", "")]);

    assert!(matches!(
        load_config(&path),
        Err(ConfigError::ValidationError(ref msg)) if msg.contains("database.dbname")
    ));
}

#[test]
#[serial]
fn test_missing_file_is_read_error() {
    let ctx = TestContext::new();
    assert!(matches!(
        load_config(ctx.path("absent.toml")),
        Err(ConfigError::ReadError(_))
    ));
}

#[test]
#[serial]
fn test_invalid_toml_is_parse_error() {
    let ctx = TestContext::new();
    let path = ctx.create_file("config.toml", "[database\ntype = ");
    assert!(matches!(load_config(&path), Err(ConfigError::ParseError(_))));
}
