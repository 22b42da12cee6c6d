//! Agent configuration
//!
//! Command-line flags with environment fallbacks, resolved into the
//! [`AgentSettings`] the reconciler is constructed with.

use crate::error::ControllerError;
use clap::Parser;
use script_executor::split_command;
use std::path::PathBuf;
use std::time::Duration;

/// Default directory bundles are downloaded into
pub const DEFAULT_DOWNLOAD_PATH: &str = "/var/lib/byoh/bundles";

/// Default command that removes the node from its cluster
pub const DEFAULT_RESET_COMMAND: &str = "kubeadm reset --force";

/// BYOH host agent
#[derive(Debug, Clone, Parser)]
#[command(name = "byoh-hostagent", version, about)]
pub struct Args {
    /// Namespace of the ByoHost record
    #[arg(long, env = "BYOH_NAMESPACE", default_value = "default")]
    pub namespace: String,

    /// Kubeconfig for the management cluster (in-cluster config when unset)
    #[arg(long, env = "KUBECONFIG")]
    pub kubeconfig: Option<PathBuf>,

    /// Name of the ByoHost record (defaults to the system hostname)
    #[arg(long, env = "BYOH_HOST_NAME")]
    pub host_name: Option<String>,

    /// Bootstrap only; never run install or reset/uninstall scripts
    #[arg(long, env = "BYOH_SKIP_INSTALLATION")]
    pub skip_installation: bool,

    /// Directory that install scripts download bundles into
    #[arg(long = "downloadpath", env = "BYOH_DOWNLOAD_PATH", default_value = DEFAULT_DOWNLOAD_PATH)]
    pub download_path: String,

    /// Command run to remove the node from its cluster during cleanup
    #[arg(long, env = "BYOH_RESET_COMMAND", default_value = DEFAULT_RESET_COMMAND)]
    pub reset_command: String,

    /// Kill bootstrap, install and reset commands after this many seconds
    #[arg(long, env = "BYOH_COMMAND_TIMEOUT_SECS")]
    pub command_timeout_secs: Option<u64>,

    /// Label applied to the ByoHost record at registration (repeatable, `key=value`)
    #[arg(long = "label", value_parser = parse_label)]
    pub labels: Vec<(String, String)>,
}

fn parse_label(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("invalid label {raw:?}, expected key=value"))?;
    if key.is_empty() {
        return Err(format!("invalid label {raw:?}, empty key"));
    }
    Ok((key.to_string(), value.to_string()))
}

/// Reconciler settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentSettings {
    /// Namespace of the host record
    pub namespace: String,
    /// Name of the host record
    pub host_name: String,
    /// Bootstrap only
    pub skip_installation: bool,
    /// Value of `bundle_download_path` in install scripts
    pub download_path: String,
    /// Argv of the reset command
    pub reset_command: Vec<String>,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            namespace: "default".to_string(),
            host_name: String::new(),
            skip_installation: false,
            download_path: DEFAULT_DOWNLOAD_PATH.to_string(),
            reset_command: split_command(DEFAULT_RESET_COMMAND),
        }
    }
}

impl Args {
    /// Resolve settings, falling back to `system_hostname` for the record name
    pub fn settings(&self, system_hostname: Option<String>) -> Result<AgentSettings, ControllerError> {
        let host_name = self
            .host_name
            .clone()
            .or(system_hostname)
            .map(|h| h.trim().to_lowercase())
            .filter(|h| !h.is_empty())
            .ok_or_else(|| ControllerError::InvalidConfig("cannot determine host name, pass --host-name".to_string()))?;

        let reset_command = split_command(&self.reset_command);
        if reset_command.is_empty() {
            return Err(ControllerError::InvalidConfig("--reset-command is empty".to_string()));
        }

        Ok(AgentSettings {
            namespace: self.namespace.clone(),
            host_name,
            skip_installation: self.skip_installation,
            download_path: self.download_path.clone(),
            reset_command,
        })
    }

    /// Per-command time limit
    pub fn command_timeout(&self) -> Option<Duration> {
        self.command_timeout_secs.filter(|s| *s > 0).map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["byoh-hostagent"]).unwrap();
        let settings = args.settings(Some("Host-1".to_string())).unwrap();
        assert_eq!(settings.host_name, "host-1");
        assert_eq!(settings.reset_command, vec!["kubeadm", "reset", "--force"]);
        assert_eq!(settings.download_path, DEFAULT_DOWNLOAD_PATH);
        assert!(!settings.skip_installation);
        assert_eq!(args.command_timeout(), None);
    }

    #[test]
    fn test_flags_override_defaults() {
        let args = Args::try_parse_from([
            "byoh-hostagent",
            "--host-name",
            "edge-7",
            "--skip-installation",
            "--downloadpath",
            "/opt/bundles",
            "--reset-command",
            "/usr/local/bin/reset-node",
            "--command-timeout-secs",
            "600",
            "--label",
            "site=lab",
            "--label",
            "rack=r1",
        ])
        .unwrap();
        let settings = args.settings(None).unwrap();
        assert_eq!(settings.host_name, "edge-7");
        assert!(settings.skip_installation);
        assert_eq!(settings.download_path, "/opt/bundles");
        assert_eq!(settings.reset_command, vec!["/usr/local/bin/reset-node"]);
        assert_eq!(args.command_timeout(), Some(Duration::from_secs(600)));
        assert_eq!(
            args.labels,
            vec![("site".to_string(), "lab".to_string()), ("rack".to_string(), "r1".to_string())]
        );
    }

    #[test]
    fn test_invalid_label_rejected() {
        assert!(Args::try_parse_from(["byoh-hostagent", "--label", "nokey"]).is_err());
        assert!(Args::try_parse_from(["byoh-hostagent", "--label", "=v"]).is_err());
    }

    #[test]
    fn test_missing_host_name_is_config_error() {
        let args = Args::try_parse_from(["byoh-hostagent"]).unwrap();
        assert!(matches!(args.settings(None), Err(ControllerError::InvalidConfig(_))));
    }
}
