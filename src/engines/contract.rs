//! Declarative per-engine parameter contracts
//!
//! A contract lists the parameters an engine reads, in the order they are
//! checked. One routine ([`ParameterContract::check`]) validates every engine,
//! so the first missing key reported is always the first one declared.

use super::{BackupConfig, EngineKind};
use crate::error::{BackupError, Result};

/// Parameter names understood by the backends
pub mod keys {
    pub const HOST: &str = "host";
    pub const PORT: &str = "port";
    pub const USERNAME: &str = "username";
    pub const PASSWORD: &str = "password";
    pub const DBNAME: &str = "dbname";
    pub const BACKUP_FILE: &str = "backup-file";
    pub const BACKUP_PATH: &str = "backup-path";
    pub const AUTH_DB: &str = "auth-db";
}

/// Value check applied to a present parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    /// Any non-empty value
    Any,
    /// TCP port, 1-65535
    Port,
    /// Name used as a path component: no separators, not `.` or `..`
    Identifier,
}

impl Rule {
    fn check(&self, value: &str) -> std::result::Result<(), String> {
        match self {
            Rule::Any => Ok(()),
            Rule::Port => match value.trim().parse::<u16>() {
                Ok(port) if port > 0 => Ok(()),
                _ => Err(format!("expected a TCP port between 1 and 65535, got '{}'", value)),
            },
            Rule::Identifier => {
                if value.contains('/') || value.contains('\\') || value == "." || value == ".." {
                    Err(format!("'{}' must not contain path separators", value))
                } else {
                    Ok(())
                }
            }
        }
    }
}

/// One declared parameter
///
/// `keys` holds accepted spellings; the first one is reported when all are
/// missing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSpec {
    pub keys: Vec<&'static str>,
    pub required: bool,
    pub rule: Rule,
}

impl ParamSpec {
    pub fn name(&self) -> &'static str {
        self.keys[0]
    }
}

/// Ordered parameter declaration for one engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterContract {
    engine: EngineKind,
    params: Vec<ParamSpec>,
}

impl ParameterContract {
    pub fn new(engine: EngineKind) -> Self {
        Self {
            engine,
            params: Vec::new(),
        }
    }

    pub fn required(self, key: &'static str, rule: Rule) -> Self {
        self.required_one_of(&[key], rule)
    }

    /// Required parameter that may be given under any of `keys`
    pub fn required_one_of(mut self, keys: &[&'static str], rule: Rule) -> Self {
        assert!(!keys.is_empty(), "a parameter needs at least one key");
        self.params.push(ParamSpec {
            keys: keys.to_vec(),
            required: true,
            rule,
        });
        self
    }

    pub fn optional(mut self, key: &'static str, rule: Rule) -> Self {
        self.params.push(ParamSpec {
            keys: vec![key],
            required: false,
            rule,
        });
        self
    }

    /// Built-in contract for an engine
    pub fn for_engine(engine: EngineKind) -> Self {
        match engine {
            EngineKind::MySql | EngineKind::PostgreSql => Self::new(engine)
                .required(keys::HOST, Rule::Any)
                .required(keys::PORT, Rule::Port)
                .required(keys::USERNAME, Rule::Any)
                .required(keys::PASSWORD, Rule::Any)
                .required(keys::DBNAME, Rule::Identifier)
                .required(keys::BACKUP_FILE, Rule::Any),
            EngineKind::MongoDb => Self::new(engine)
                .required(keys::HOST, Rule::Any)
                .required(keys::PORT, Rule::Port)
                .required(keys::DBNAME, Rule::Identifier)
                .required_one_of(&[keys::BACKUP_PATH, keys::BACKUP_FILE], Rule::Any)
                .optional(keys::USERNAME, Rule::Any)
                .optional(keys::PASSWORD, Rule::Any)
                .optional(keys::AUTH_DB, Rule::Any),
        }
    }

    pub fn engine(&self) -> EngineKind {
        self.engine
    }

    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    /// Names of required parameters, in check order
    pub fn required_keys(&self) -> Vec<&'static str> {
        self.params
            .iter()
            .filter(|p| p.required)
            .map(ParamSpec::name)
            .collect()
    }

    /// Check `config` against the contract, top to bottom
    pub fn check(&self, config: &BackupConfig) -> Result<()> {
        for param in &self.params {
            let present = param.keys.iter().find_map(|k| config.get(k).map(|v| (*k, v)));

            match present {
                Some((key, value)) => {
                    param
                        .rule
                        .check(value)
                        .map_err(|reason| BackupError::InvalidParameter {
                            key: key.to_string(),
                            reason,
                        })?;
                }
                None if param.required => {
                    return Err(BackupError::MissingParameter(param.name().to_string()));
                }
                None => {}
            }
        }
        Ok(())
    }
}
