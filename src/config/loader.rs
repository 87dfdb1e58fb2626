use super::types::*;
use crate::engines::EngineKind;
use std::fs;
use std::path::{Path, PathBuf};

/// Prefix for environment overrides, e.g. `BACKUP_TOOL_DATABASE_HOST`
pub const ENV_PREFIX: &str = "BACKUP_TOOL_";

const LOG_LEVELS: [&str; 4] = ["info", "debug", "warn", "error"];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Load configuration from a TOML file, apply environment overrides and validate
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let contents = fs::read_to_string(path)?;
    let mut config = parse_config(&contents)?;
    apply_env_overrides(&mut config, std::env::vars())?;
    validate_config(&config)?;
    Ok(config)
}

/// Parse TOML without overrides or validation
pub fn parse_config(contents: &str) -> Result<Config> {
    Ok(toml::from_str(contents)?)
}

/// Overlay `BACKUP_TOOL_<SECTION>_<FIELD>` variables onto the config
///
/// Variables without the prefix are ignored; unknown fields under the prefix
/// are ignored too. Values that do not parse are validation errors.
pub fn apply_env_overrides<I>(config: &mut Config, vars: I) -> Result<()>
where
    I: IntoIterator<Item = (String, String)>,
{
    for (name, value) in vars {
        let Some(field) = name.strip_prefix(ENV_PREFIX) else {
            continue;
        };
        apply_override(config, &field.to_ascii_uppercase(), value, &name)?;
    }
    Ok(())
}

fn apply_override(config: &mut Config, field: &str, value: String, name: &str) -> Result<()> {
    let invalid = |reason: String| ConfigError::ValidationError(format!("{}: {}", name, reason));

    match field {
        "DATABASE_TYPE" => config.database.db_type = value,
        "DATABASE_HOST" => config.database.host = value,
        "DATABASE_PORT" => {
            let port = value
                .trim()
                .parse::<u16>()
                .map_err(|e| invalid(format!("invalid port '{}': {}", value, e)))?;
            config.database.port = Some(port);
        }
        "DATABASE_USERNAME" => config.database.username = value,
        "DATABASE_PASSWORD" => config.database.password = value,
        "DATABASE_DBNAME" => config.database.dbname = value,
        "DATABASE_AUTH_DB" => config.database.auth_db = value,

        "STORAGE_LOCAL_PATH" => config.storage.local_path = Some(PathBuf::from(value)),
        "STORAGE_CLOUD_TYPE" => {
            config.storage.cloud_type = if value.trim().is_empty() {
                None
            } else {
                Some(value.parse().map_err(invalid)?)
            };
        }
        "STORAGE_BUCKET" => config.storage.bucket = value,
        "STORAGE_PREFIX" => config.storage.prefix = value,
        "STORAGE_REGION" => config.storage.region = Some(value),
        "STORAGE_ENDPOINT_URL" => config.storage.endpoint_url = Some(value),
        "STORAGE_LOCAL_STORE_PATH" => config.storage.local_store_path = Some(PathBuf::from(value)),

        "LOGGING_LEVEL" => config.logging.level = value,
        "LOGGING_FILE" => config.logging.file = Some(PathBuf::from(value)),
        "LOGGING_FORMAT" => config.logging.format = value.parse().map_err(invalid)?,

        "NOTIFICATION_SLACK_WEBHOOK_URL" => config.notification.slack_webhook_url = value,

        "TOOLS_TIMEOUT_SECONDS" => {
            config.tools.timeout_seconds = value
                .trim()
                .parse()
                .map_err(|e| invalid(format!("invalid timeout '{}': {}", value, e)))?;
        }

        _ => {}
    }
    Ok(())
}

/// Validate the configuration
pub fn validate_config(config: &Config) -> Result<()> {
    let db = &config.database;

    if db.db_type.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "database.type is required".to_string(),
        ));
    }
    db.db_type
        .parse::<EngineKind>()
        .map_err(|e| ConfigError::ValidationError(e.to_string()))?;

    if db.host.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "database.host is required".to_string(),
        ));
    }

    if db.dbname.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "database.dbname is required".to_string(),
        ));
    }

    if db.port == Some(0) {
        return Err(ConfigError::ValidationError(
            "database.port must be between 1 and 65535".to_string(),
        ));
    }

    let level = config.logging.level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        return Err(ConfigError::ValidationError(format!(
            "logging.level must be one of {}: {}",
            LOG_LEVELS.join(", "),
            config.logging.level
        )));
    }

    if config.storage.cloud_type.is_some() && config.storage.bucket.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "storage.bucket is required when storage.cloud_type is set".to_string(),
        ));
    }

    Ok(())
}
