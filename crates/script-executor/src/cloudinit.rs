//! Cloud-init style bootstrap documents
//!
//! Only the subset used for node bootstrap is understood:
//!
//! ```yaml
//! ## template: jinja
//! #cloud-config
//! write_files:
//! - path: /etc/kubernetes/kubeadm-join-config.yaml
//!   permissions: '0640'
//!   content: |
//!     ...
//! runcmd:
//! - kubeadm join --config /etc/kubernetes/kubeadm-join-config.yaml
//! - [touch, /run/cluster-api/bootstrap-success.complete]
//! ```
//!
//! Files are written before any command runs; both lists run in order and the
//! first failure stops the document.

use crate::error::ExecError;
use crate::executor::{ScriptExecutor, shell};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use tracing::{debug, info};

/// Permission bits applied when a file entry does not declare any
pub const DEFAULT_FILE_MODE: u32 = 0o644;

/// Parsed bootstrap document
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct BootstrapConfig {
    /// Files to write
    #[serde(default)]
    pub write_files: Vec<WriteFile>,
    /// Commands to run after all files are written
    #[serde(default)]
    pub runcmd: Vec<RunCmd>,
}

/// One `write_files` entry
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct WriteFile {
    /// Absolute target path
    pub path: String,
    /// File content, encoded per `encoding`
    #[serde(default)]
    pub content: String,
    /// Octal permission string such as `0640`
    #[serde(default)]
    pub permissions: Option<String>,
    /// `text/plain` (default), `b64` or `base64`
    #[serde(default)]
    pub encoding: Option<String>,
    /// Append to an existing file instead of replacing it
    #[serde(default)]
    pub append: bool,
}

/// One `runcmd` entry
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum RunCmd {
    /// Shell command line, run through `/bin/sh -c`
    Shell(String),
    /// Program and arguments, run without a shell
    Argv(Vec<String>),
}

impl RunCmd {
    /// Argv to hand to the executor
    pub fn argv(&self) -> Vec<String> {
        match self {
            Self::Shell(line) => shell(line),
            Self::Argv(argv) => argv.clone(),
        }
    }
}

impl WriteFile {
    /// Permission bits for this file
    pub fn mode(&self) -> Result<u32, ExecError> {
        let Some(raw) = self.permissions.as_deref().map(str::trim) else {
            return Ok(DEFAULT_FILE_MODE);
        };
        let digits = raw.strip_prefix("0o").unwrap_or(raw);
        u32::from_str_radix(digits, 8)
            .ok()
            .filter(|m| *m <= 0o7777)
            .ok_or_else(|| ExecError::Parse(format!("invalid permissions {raw:?} for {}", self.path)))
    }

    /// Decoded file content
    pub fn decoded_content(&self) -> Result<Vec<u8>, ExecError> {
        match self.encoding.as_deref() {
            None | Some("" | "text/plain" | "plain") => Ok(self.content.clone().into_bytes()),
            Some(encoding @ ("b64" | "base64")) => {
                let compact: String = self.content.split_whitespace().collect();
                STANDARD.decode(compact).map_err(|e| ExecError::Encoding {
                    path: self.path.clone(),
                    encoding: encoding.to_string(),
                    reason: e.to_string(),
                })
            }
            Some(other) => Err(ExecError::Encoding {
                path: self.path.clone(),
                encoding: other.to_string(),
                reason: "unsupported encoding".to_string(),
            }),
        }
    }
}

impl BootstrapConfig {
    /// Parse a bootstrap document; a document with only comments is empty
    pub fn parse(document: &str) -> Result<Self, ExecError> {
        let has_body = document
            .lines()
            .map(str::trim)
            .any(|l| !l.is_empty() && !l.starts_with('#'));
        if !has_body {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(document)?)
    }

    /// Write every file, then run every command
    pub async fn apply(&self, executor: &dyn ScriptExecutor) -> Result<(), ExecError> {
        for file in &self.write_files {
            let content = file.decoded_content()?;
            let mode = file.mode()?;
            debug!("Writing bootstrap file {} (mode {:o})", file.path, mode);
            executor.write_file(&file.path, &content, mode, file.append).await?;
        }
        for cmd in &self.runcmd {
            executor.run_command(&cmd.argv()).await?;
        }
        info!(
            "Applied bootstrap document: {} files, {} commands",
            self.write_files.len(),
            self.runcmd.len()
        );
        Ok(())
    }
}
