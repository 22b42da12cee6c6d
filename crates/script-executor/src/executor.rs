//! Script executor trait and the local implementation

use crate::error::ExecError;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tracing::{debug, warn};

/// Result of a successful command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code
    pub code: Option<i32>,
    /// Captured standard output (lossy UTF-8)
    pub stdout: String,
    /// Captured standard error (lossy UTF-8)
    pub stderr: String,
}

/// Trait for side effects on the host
///
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait ScriptExecutor: Send + Sync {
    /// Run `argv[0]` with the remaining arguments; a non-zero exit is an error
    async fn run_command(&self, argv: &[String]) -> Result<CommandOutput, ExecError>;

    /// Write `content` to `path` with permission bits `mode`, creating parent
    /// directories. With `append`, content is added to the end of an existing file.
    async fn write_file(&self, path: &str, content: &[u8], mode: u32, append: bool) -> Result<(), ExecError>;
}

/// Argv running `script` through `/bin/sh -c`
pub fn shell(script: &str) -> Vec<String> {
    vec!["/bin/sh".to_string(), "-c".to_string(), script.to_string()]
}

/// Parse a whitespace-separated command line such as `kubeadm reset --force`
pub fn split_command(line: &str) -> Vec<String> {
    line.split_whitespace().map(str::to_string).collect()
}

/// Executor running commands and writing files on the local host
#[derive(Debug, Clone, Default)]
pub struct LocalExecutor {
    timeout: Option<Duration>,
}

impl LocalExecutor {
    /// Create an executor without a command time limit
    pub fn new() -> Self {
        Self::default()
    }

    /// Kill commands that run longer than `timeout`
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[async_trait::async_trait]
impl ScriptExecutor for LocalExecutor {
    async fn run_command(&self, argv: &[String]) -> Result<CommandOutput, ExecError> {
        let (program, args) = argv.split_first().ok_or(ExecError::EmptyCommand)?;
        let cmdline = argv.join(" ");
        debug!("Running `{}`", cmdline);

        // kill_on_drop makes the timeout below terminate the child
        let output = tokio::process::Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, output).await.map_err(|_| {
                warn!("Command `{}` timed out after {}s", cmdline, limit.as_secs());
                ExecError::Timeout {
                    argv: cmdline.clone(),
                    secs: limit.as_secs(),
                }
            })?,
            None => output.await,
        }
        .map_err(|e| ExecError::io(format!("spawning {program}"), e))?;

        let result = CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        if !output.status.success() {
            return Err(ExecError::CommandFailed {
                argv: cmdline,
                code: result.code,
                stderr: result.stderr.trim().to_string(),
            });
        }
        debug!("Command `{}` exited with {:?}", cmdline, result.code);
        Ok(result)
    }

    async fn write_file(&self, path: &str, content: &[u8], mode: u32, append: bool) -> Result<(), ExecError> {
        use tokio::io::AsyncWriteExt;

        if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ExecError::io(format!("creating {}", parent.display()), e))?;
        }

        let mut options = tokio::fs::OpenOptions::new();
        options.create(true);
        if append {
            options.append(true);
        } else {
            options.write(true).truncate(true);
        }
        let mut file = options
            .open(path)
            .await
            .map_err(|e| ExecError::io(format!("opening {path}"), e))?;
        file.write_all(content)
            .await
            .map_err(|e| ExecError::io(format!("writing {path}"), e))?;
        file.flush()
            .await
            .map_err(|e| ExecError::io(format!("writing {path}"), e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
                .await
                .map_err(|e| ExecError::io(format!("setting mode {mode:o} on {path}"), e))?;
        }
        #[cfg(not(unix))]
        let _ = mode;

        debug!("Wrote {} bytes to {}", content.len(), path);
        Ok(())
    }
}
