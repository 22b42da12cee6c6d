//! Script executor errors

use thiserror::Error;

/// Errors that can occur while writing files or running commands on the host
#[derive(Debug, Error)]
pub enum ExecError {
    /// Filesystem or process spawn failure
    #[error("I/O error ({context}): {source}")]
    Io {
        /// What was being done
        context: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Command ran but exited unsuccessfully
    #[error("Command `{argv}` failed with exit code {code:?}: {stderr}")]
    CommandFailed {
        /// Command line, space-joined
        argv: String,
        /// Exit code, `None` if killed by a signal
        code: Option<i32>,
        /// Captured standard error
        stderr: String,
    },

    /// Command exceeded its time limit and was killed
    #[error("Command `{argv}` timed out after {secs}s")]
    Timeout {
        /// Command line, space-joined
        argv: String,
        /// Time limit in seconds
        secs: u64,
    },

    /// Command with no program
    #[error("Empty command")]
    EmptyCommand,

    /// Bootstrap document could not be parsed
    #[error("Invalid bootstrap document: {0}")]
    Parse(String),

    /// Template expansion failed
    #[error("Template error: {0}")]
    Template(#[from] tera::Error),

    /// File content could not be decoded
    #[error("Cannot decode content of {path} as {encoding}: {reason}")]
    Encoding {
        /// Target file path
        path: String,
        /// Declared encoding
        encoding: String,
        /// Decoder message
        reason: String,
    },
}

impl From<serde_yaml::Error> for ExecError {
    fn from(e: serde_yaml::Error) -> Self {
        Self::Parse(e.to_string())
    }
}

impl ExecError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}
