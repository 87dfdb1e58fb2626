//! External process execution behind a trait
//!
//! Engine backends describe the external tool they need as an [`Invocation`]
//! and hand it to a [`CommandExecutor`]. The real executor spawns the process;
//! the mock records the call and returns a configured response.

use crate::error::Result;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// How an external process ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitInfo {
    /// Process exited on its own with this code
    Exited(i32),
    /// Process was terminated by a signal
    Signaled(Option<i32>),
    /// Process was killed after exceeding the time limit
    TimedOut(Duration),
    /// Process could not be started at all
    SpawnFailed(String),
}

impl ExitInfo {
    pub fn success(&self) -> bool {
        matches!(self, ExitInfo::Exited(0))
    }
}

impl fmt::Display for ExitInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitInfo::Exited(code) => write!(f, "exit code {}", code),
            ExitInfo::Signaled(Some(signal)) => write!(f, "terminated by signal {}", signal),
            ExitInfo::Signaled(None) => write!(f, "terminated by signal"),
            ExitInfo::TimedOut(limit) => write!(f, "timed out after {}s", limit.as_secs()),
            ExitInfo::SpawnFailed(reason) => write!(f, "failed to start: {}", reason),
        }
    }
}

/// Outcome of one external process invocation
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub status: ExitInfo,
    /// Captured standard error (tail, bounded)
    pub stderr: String,
}

impl ExecutionResult {
    pub fn success(&self) -> bool {
        self.status.success()
    }
}

/// A single external process invocation
///
/// Environment entries apply to the child only. Arguments registered through
/// [`Invocation::secret_arg`] are masked in [`Invocation::display_command`].
#[derive(Debug, Clone, Default)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    secret_args: BTreeSet<usize>,
    pub env: BTreeMap<String, String>,
    /// File fed to the child's standard input
    pub stdin: Option<PathBuf>,
    /// File receiving the child's standard output (created or truncated)
    pub stdout: Option<PathBuf>,
    pub timeout: Option<Duration>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Add an argument that must never appear in logs
    pub fn secret_arg(mut self, arg: impl Into<String>) -> Self {
        self.secret_args.insert(self.args.len());
        self.args.push(arg.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn stdin_from(mut self, path: impl Into<PathBuf>) -> Self {
        self.stdin = Some(path.into());
        self
    }

    pub fn stdout_to(mut self, path: impl Into<PathBuf>) -> Self {
        self.stdout = Some(path.into());
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Command line suitable for logging, with secrets masked
    pub fn display_command(&self) -> String {
        let mut parts = vec![self.program.clone()];
        for (index, arg) in self.args.iter().enumerate() {
            if self.secret_args.contains(&index) {
                parts.push(mask_secret(arg));
            } else {
                parts.push(arg.clone());
            }
        }
        if let Some(ref path) = self.stdin {
            parts.push(format!("< {}", path.display()));
        }
        if let Some(ref path) = self.stdout {
            parts.push(format!("> {}", path.display()));
        }
        parts.join(" ")
    }
}

fn mask_secret(arg: &str) -> String {
    match arg.split_once('=') {
        Some((flag, _)) if flag.starts_with('-') => format!("{}=****", flag),
        _ => "****".to_string(),
    }
}

/// Runs external tools; backends never spawn processes directly
pub trait CommandExecutor: Send + Sync {
    /// Run the invocation to completion
    ///
    /// A process that fails, times out or cannot be spawned is reported through
    /// [`ExecutionResult::status`]. `Err` is reserved for redirect files that
    /// cannot be opened before the process starts.
    fn execute(&self, invocation: &Invocation) -> Result<ExecutionResult>;
}

/// Spawns the real program through `utils::command`
#[derive(Debug, Clone, Default)]
pub struct RealExecutor;

impl RealExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl CommandExecutor for RealExecutor {
    fn execute(&self, invocation: &Invocation) -> Result<ExecutionResult> {
        super::command::run_invocation(invocation)
    }
}

pub(crate) fn redirect_open_failed(path: &Path, source: std::io::Error) -> crate::error::BackupError {
    crate::error::BackupError::ArtifactOpenFailed {
        path: path.to_path_buf(),
        source,
    }
}

/// In-memory executor for tests here and in `db-backup-tool-tests`
#[allow(dead_code)]
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    /// What a backend asked to run
    #[derive(Clone, Debug)]
    pub struct CommandCall {
        pub program: String,
        pub args: Vec<String>,
        /// Masked command line as it would be logged
        pub display: String,
        pub env: BTreeMap<String, String>,
        pub stdin: Option<PathBuf>,
        /// Content read from the stdin file at call time
        pub stdin_content: Option<String>,
        pub stdout: Option<PathBuf>,
        pub timeout: Option<Duration>,
    }

    /// Canned outcome for a program
    #[derive(Clone, Debug)]
    pub enum MockResponse {
        Success { stdout: String, stderr: String },
        Failure { stderr: String, exit_code: i32 },
        Timeout,
    }

    impl Default for MockResponse {
        fn default() -> Self {
            MockResponse::Success {
                stdout: String::new(),
                stderr: String::new(),
            }
        }
    }

    type Effect = Arc<dyn Fn(&Invocation) + Send + Sync>;

    #[derive(Clone, Default)]
    pub struct MockExecutor {
        /// Every invocation, in order
        pub calls: Arc<Mutex<Vec<CommandCall>>>,
        /// Keyed by program
        responses: Arc<Mutex<HashMap<String, MockResponse>>>,
        default_response: Arc<Mutex<MockResponse>>,
        /// Side effects run before the response, e.g. a dump tool writing its output file
        effects: Arc<Mutex<HashMap<String, Effect>>>,
    }

    impl MockExecutor {
        pub fn new() -> Self {
            Self::default()
        }

        /// Answer calls to `program` with `response`
        pub fn expect(self, program: &str, response: MockResponse) -> Self {
            self.responses
                .lock()
                .unwrap()
                .insert(program.to_string(), response);
            self
        }

        /// Fallback for programs without an expectation
        pub fn with_default_response(self, response: MockResponse) -> Self {
            *self.default_response.lock().unwrap() = response;
            self
        }

        /// Run `effect` whenever `program` is invoked
        pub fn with_effect<F>(self, program: &str, effect: F) -> Self
        where
            F: Fn(&Invocation) + Send + Sync + 'static,
        {
            self.effects
                .lock()
                .unwrap()
                .insert(program.to_string(), Arc::new(effect));
            self
        }

        pub fn get_calls(&self) -> Vec<CommandCall> {
            self.calls.lock().unwrap().clone()
        }

        /// Last recorded call to a program
        pub fn last_call(&self, program: &str) -> Option<CommandCall> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .rev()
                .find(|c| c.program == program)
                .cloned()
        }

        pub fn was_called(&self, program: &str) -> bool {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .any(|c| c.program == program)
        }

        pub fn call_count(&self, program: &str) -> usize {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|c| c.program == program)
                .count()
        }

        fn get_response(&self, program: &str) -> MockResponse {
            self.responses
                .lock()
                .unwrap()
                .get(program)
                .cloned()
                .unwrap_or_else(|| self.default_response.lock().unwrap().clone())
        }
    }

    impl CommandExecutor for MockExecutor {
        fn execute(&self, invocation: &Invocation) -> Result<ExecutionResult> {
            let stdin_content = match invocation.stdin {
                Some(ref path) => Some(
                    std::fs::read_to_string(path).map_err(|e| redirect_open_failed(path, e))?,
                ),
                None => None,
            };

            self.calls.lock().unwrap().push(CommandCall {
                program: invocation.program.clone(),
                args: invocation.args.clone(),
                display: invocation.display_command(),
                env: invocation.env.clone(),
                stdin: invocation.stdin.clone(),
                stdin_content,
                stdout: invocation.stdout.clone(),
                timeout: invocation.timeout,
            });

            let effect = self.effects.lock().unwrap().get(&invocation.program).cloned();
            if let Some(effect) = effect {
                effect(invocation);
            }

            let response = self.get_response(&invocation.program);
            let stdout_content = match response {
                MockResponse::Success { ref stdout, .. } => stdout.as_str(),
                _ => "",
            };
            if let Some(ref path) = invocation.stdout {
                std::fs::write(path, stdout_content).map_err(|e| redirect_open_failed(path, e))?;
            }

            Ok(match response {
                MockResponse::Success { stderr, .. } => ExecutionResult {
                    status: ExitInfo::Exited(0),
                    stderr,
                },
                MockResponse::Failure { stderr, exit_code } => ExecutionResult {
                    status: ExitInfo::Exited(exit_code),
                    stderr,
                },
                MockResponse::Timeout => ExecutionResult {
                    status: ExitInfo::TimedOut(invocation.timeout.unwrap_or_default()),
                    stderr: String::new(),
                },
            })
        }
    }
}
