//! Per-test scratch space wired to real backends
//!
//! Each `TestContext` owns a temp dir holding fake tools, dumps and upload
//! stores; everything is removed when the context drops.

use db_backup_tool::engines::{ArtifactPolicy, BackendContext, BackendRegistry, ToolPaths};
use db_backup_tool::managers::orchestrator::Orchestrator;
use db_backup_tool::utils::RealExecutor;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Generous enough for fake tools, short enough that a hung test fails
const TOOL_TIMEOUT: Duration = Duration::from_secs(30);

pub struct TestContext {
    root: TempDir,
}

impl TestContext {
    pub fn new() -> Self {
        Self {
            root: TempDir::new().expect("Failed to create temp dir"),
        }
    }

    /// `<temp>/<name>`, not created
    pub fn path(&self, name: &str) -> PathBuf {
        self.root.path().join(name)
    }

    /// `<temp>/bin`, where fixtures drop fake tool scripts
    pub fn bin_dir(&self) -> PathBuf {
        let bin = self.path("bin");
        fs::create_dir_all(&bin).expect("Failed to create bin dir");
        bin
    }

    /// Write `content` to `<temp>/<name>`, creating parent directories
    pub fn create_file(&self, name: &str, content: &str) -> PathBuf {
        let path = self.path(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent dir");
        }
        fs::write(&path, content).expect("Failed to write file");
        path
    }

    /// Real executor with `tools` and a 30 s timeout; artifact keys are required
    pub fn backend_context(&self, tools: ToolPaths) -> BackendContext {
        BackendContext::new(Arc::new(RealExecutor::new()))
            .with_tools(tools)
            .with_timeout(Some(TOOL_TIMEOUT))
    }

    /// Like `backend_context`, but missing artifact keys fall back under `<temp>/backups`
    pub fn backend_context_with_defaults(&self, tools: ToolPaths) -> BackendContext {
        self.backend_context(tools)
            .with_policy(ArtifactPolicy::DefaultRoot(self.path("backups")))
    }

    pub fn orchestrator(&self, tools: ToolPaths) -> Orchestrator {
        Orchestrator::new(BackendRegistry::new(self.backend_context(tools)))
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Panicking shortcuts for `Result`s in tests
pub trait ResultAssertions<T> {
    /// Unwrap, printing the error with `Display` on failure
    fn assert_ok(self) -> T;

    /// Expect an error whose message mentions `needle`
    fn assert_err_contains(self, needle: &str);
}

impl<T: std::fmt::Debug, E: std::fmt::Display> ResultAssertions<T> for Result<T, E> {
    fn assert_ok(self) -> T {
        self.unwrap_or_else(|e| panic!("expected Ok, got error: {}", e))
    }

    fn assert_err_contains(self, needle: &str) {
        match self {
            Ok(value) => panic!("expected an error mentioning '{}', got Ok({:?})", needle, value),
            Err(e) => {
                let message = e.to_string();
                assert!(message.contains(needle), "'{}' not found in error: {}", needle, message);
            }
        }
    }
}
