//! Test utilities for db-backup-tool
//!
//! Shared helpers for the unit, command and integration suites: a fluent
//! config builder, fake dump/restore tools written as shell scripts, and a
//! temp-dir based test context.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use test_utils::{fake_tools, ConfigBuilder, TestContext};
//!
//! #[test]
//! fn my_test() {
//!     let ctx = TestContext::new();
//!     let tools = fake_tools(&ctx.bin_dir());
//!     let orchestrator = ctx.orchestrator(tools);
//!     // ... test code
//! }
//! ```

pub mod config_builder;
pub mod fixtures;
pub mod test_context;

pub use config_builder::ConfigBuilder;
pub use fixtures::*;
pub use test_context::{ResultAssertions, TestContext};

// Main crate types used across the suites
pub use db_backup_tool::config::{CloudType, Config, LogFormat, NotifyEvent};
pub use db_backup_tool::engines::{
    ArtifactLocation, ArtifactPolicy, BackendContext, BackendRegistry, BackupArtifact,
    BackupConfig, EngineKind, ToolPaths,
};
pub use db_backup_tool::error::BackupError;
pub use db_backup_tool::managers::orchestrator::Orchestrator;
pub use db_backup_tool::storage::{LocalObjectStore, ObjectStore, UploadDestination};

pub use db_backup_tool::utils::executor::mock::{MockExecutor, MockResponse};
pub use db_backup_tool::utils::executor::CommandExecutor;
