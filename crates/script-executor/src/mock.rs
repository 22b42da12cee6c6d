//! Recording ScriptExecutor for unit testing
//!
//! Nothing touches the host: commands and file writes are journaled in order
//! and succeed unless a failure has been injected.

use crate::error::ExecError;
use crate::executor::{CommandOutput, ScriptExecutor};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A file write seen by the recording executor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenFile {
    /// Target path
    pub path: String,
    /// Decoded content
    pub content: Vec<u8>,
    /// Permission bits
    pub mode: u32,
    /// Whether the write appended
    pub append: bool,
}

#[derive(Debug, Default)]
struct State {
    commands: Vec<Vec<String>>,
    writes: Vec<WrittenFile>,
    journal: Vec<String>,
    fail_commands: Vec<String>,
    fail_writes: bool,
}

/// Executor that records instead of executing
#[derive(Debug, Clone, Default)]
pub struct RecordingExecutor {
    state: Arc<Mutex<State>>,
}

impl RecordingExecutor {
    /// Create an executor where everything succeeds
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every command whose joined argv contains `needle`
    pub fn fail_commands_containing(&self, needle: &str) {
        lock(&self.state).fail_commands.push(needle.to_string());
    }

    /// Stop failing commands
    pub fn clear_failures(&self) {
        let mut state = lock(&self.state);
        state.fail_commands.clear();
        state.fail_writes = false;
    }

    /// Fail every file write
    pub fn fail_writes(&self) {
        lock(&self.state).fail_writes = true;
    }

    /// Commands attempted, including failed ones
    pub fn commands(&self) -> Vec<Vec<String>> {
        lock(&self.state).commands.clone()
    }

    /// Number of attempted commands whose joined argv contains `needle`
    pub fn count_commands_containing(&self, needle: &str) -> usize {
        lock(&self.state)
            .commands
            .iter()
            .filter(|argv| argv.join(" ").contains(needle))
            .count()
    }

    /// Successful file writes
    pub fn writes(&self) -> Vec<WrittenFile> {
        lock(&self.state).writes.clone()
    }

    /// `run <argv>` and `write <path>` lines in call order
    pub fn journal(&self) -> Vec<String> {
        lock(&self.state).journal.clone()
    }
}

#[async_trait::async_trait]
impl ScriptExecutor for RecordingExecutor {
    async fn run_command(&self, argv: &[String]) -> Result<CommandOutput, ExecError> {
        if argv.is_empty() {
            return Err(ExecError::EmptyCommand);
        }
        let joined = argv.join(" ");
        let mut state = lock(&self.state);
        state.commands.push(argv.to_vec());
        state.journal.push(format!("run {joined}"));
        if state.fail_commands.iter().any(|needle| joined.contains(needle.as_str())) {
            return Err(ExecError::CommandFailed {
                argv: joined,
                code: Some(1),
                stderr: "injected failure".to_string(),
            });
        }
        Ok(CommandOutput {
            code: Some(0),
            ..Default::default()
        })
    }

    async fn write_file(&self, path: &str, content: &[u8], mode: u32, append: bool) -> Result<(), ExecError> {
        let mut state = lock(&self.state);
        state.journal.push(format!("write {path}"));
        if state.fail_writes {
            return Err(ExecError::io(
                format!("opening {path}"),
                std::io::Error::new(std::io::ErrorKind::PermissionDenied, "injected failure"),
            ));
        }
        state.writes.push(WrittenFile {
            path: path.to_string(),
            content: content.to_vec(),
            mode,
            append,
        });
        Ok(())
    }
}
