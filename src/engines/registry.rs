//! Engine identifier to backend dispatch

use super::mongodb::MongoDbBackend;
use super::mysql::MySqlBackend;
use super::postgresql::PostgreSqlBackend;
use super::{BackendContext, EngineBackend, EngineKind};
use crate::error::{BackupError, Result};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Builds a backend from the shared context
pub type BackendFactory = Box<dyn Fn(&BackendContext) -> Arc<dyn EngineBackend> + Send + Sync>;

/// Maps engines to backend constructors
pub struct BackendRegistry {
    context: BackendContext,
    factories: BTreeMap<EngineKind, BackendFactory>,
}

impl BackendRegistry {
    /// Registry with the built-in MySQL, PostgreSQL and MongoDB backends
    pub fn new(context: BackendContext) -> Self {
        let mut registry = Self::empty(context);
        registry.register(EngineKind::MySql, |ctx| Arc::new(MySqlBackend::new(ctx)));
        registry.register(EngineKind::PostgreSql, |ctx| Arc::new(PostgreSqlBackend::new(ctx)));
        registry.register(EngineKind::MongoDb, |ctx| Arc::new(MongoDbBackend::new(ctx)));
        registry
    }

    /// Registry with nothing registered
    pub fn empty(context: BackendContext) -> Self {
        Self {
            context,
            factories: BTreeMap::new(),
        }
    }

    /// Add or replace the constructor for an engine
    pub fn register<F>(&mut self, engine: EngineKind, factory: F)
    where
        F: Fn(&BackendContext) -> Arc<dyn EngineBackend> + Send + Sync + 'static,
    {
        self.factories.insert(engine, Box::new(factory));
    }

    /// Backend for an engine identifier such as `"postgresql"`
    pub fn resolve(&self, identifier: &str) -> Result<Arc<dyn EngineBackend>> {
        let engine: EngineKind = identifier.parse()?;
        self.factories
            .get(&engine)
            .map(|factory| factory(&self.context))
            .ok_or_else(|| BackupError::UnsupportedEngine(identifier.to_string()))
    }

    pub fn resolve_kind(&self, engine: EngineKind) -> Result<Arc<dyn EngineBackend>> {
        self.resolve(engine.as_str())
    }

    /// Registered engines, in a stable order
    pub fn engines(&self) -> Vec<EngineKind> {
        self.factories.keys().copied().collect()
    }

    pub fn context(&self) -> &BackendContext {
        &self.context
    }
}
