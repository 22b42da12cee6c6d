//! BYOH host control
//!
//! Operator tool run on a bring-your-own host:
//! - `detach` releases the host from its cluster and keeps its record
//! - `decommission` also deletes the record and removes the host agent

mod error;
mod prompt;
mod workflow;


use crate::error::WorkflowError;
use crate::prompt::DialoguerPrompter;
use crate::workflow::{
    DEFAULT_POLL_INTERVAL_SECS, DEFAULT_PURGE_COMMAND, DEFAULT_TIMEOUT_SECS, Workflow, WorkflowKind,
    WorkflowSettings,
};
use clap::{Parser, Subcommand};
use cluster_client::{ClusterError, KubeClusterClient};
use kube::Client;
use kube::config::{Config, KubeConfigOptions, Kubeconfig};
use script_executor::{LocalExecutor, split_command};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use sysinfo::System;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Detach or decommission a BYOH host
#[derive(Debug, Parser)]
#[command(name = "hostctl", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Namespace of the host record
    #[arg(long, env = "BYOH_NAMESPACE", default_value = "default", global = true)]
    namespace: String,

    /// Cluster credential written at onboarding (default: ~/.byoh/config)
    #[arg(long, global = true)]
    kubeconfig: Option<PathBuf>,

    /// Name of the host record
    #[arg(long, env = "BYOH_HOST_NAME", global = true)]
    host_name: Option<String>,

    /// Seconds to wait for the host to be released
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS, global = true)]
    timeout_secs: u64,

    /// Seconds between host record reads while waiting
    #[arg(long, default_value_t = DEFAULT_POLL_INTERVAL_SECS, global = true)]
    poll_interval_secs: u64,

    /// Command removing the host agent package
    #[arg(long, default_value = DEFAULT_PURGE_COMMAND, global = true)]
    purge_command: String,

    /// Answer yes to every confirmation
    #[arg(long, short = 'y', global = true)]
    yes: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Release the host from its cluster
    Detach,
    /// Release the host, delete its record and remove the host agent
    Decommission,
}

impl Cli {
    fn kind(&self) -> WorkflowKind {
        match self.command {
            Command::Detach => WorkflowKind::Detach,
            Command::Decommission => WorkflowKind::Decommission,
        }
    }

    fn settings(&self, system_hostname: Option<String>) -> Result<WorkflowSettings, WorkflowError> {
        let kubeconfig = match &self.kubeconfig {
            Some(path) => path.clone(),
            None => default_kubeconfig()?,
        };
        let host_name = self
            .host_name
            .clone()
            .or(system_hostname)
            .map(|h| h.trim().to_lowercase())
            .filter(|h| !h.is_empty())
            .ok_or_else(|| WorkflowError::InvalidConfig("host name is not set and cannot be detected".to_string()))?;
        let purge_command = split_command(&self.purge_command);
        if purge_command.is_empty() {
            return Err(WorkflowError::InvalidConfig("purge command is empty".to_string()));
        }
        if self.poll_interval_secs == 0 {
            return Err(WorkflowError::InvalidConfig("poll interval must be at least 1s".to_string()));
        }
        Ok(WorkflowSettings {
            host_name,
            kubeconfig,
            timeout: Duration::from_secs(self.timeout_secs),
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            purge_command,
        })
    }
}

fn default_kubeconfig() -> Result<PathBuf, WorkflowError> {
    dirs::home_dir()
        .map(|home| home.join(".byoh").join("config"))
        .ok_or_else(|| WorkflowError::InvalidConfig("cannot determine home directory".to_string()))
}

async fn kube_client(kubeconfig: &Path) -> Result<Client, WorkflowError> {
    let kc = Kubeconfig::read_from(kubeconfig).map_err(|e| {
        WorkflowError::InvalidConfig(format!("cannot read kubeconfig {}: {}", kubeconfig.display(), e))
    })?;
    let config = Config::from_custom_kubeconfig(kc, &KubeConfigOptions::default())
        .await
        .map_err(|e| WorkflowError::InvalidConfig(format!("invalid kubeconfig {}: {}", kubeconfig.display(), e)))?;
    Client::try_from(config).map_err(|e| WorkflowError::Cluster(ClusterError::Kube(e)))
}

#[tokio::main]
async fn main() -> Result<(), WorkflowError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Configure rustls crypto provider (use ring for compatibility)
    let _ = rustls::crypto::ring::default_provider().install_default();

    let cli = Cli::parse();
    let settings = cli.settings(System::host_name())?;
    info!("Using credential {}", settings.kubeconfig.display());

    workflow::require_credential(&settings.kubeconfig)?;
    let client = kube_client(&settings.kubeconfig).await?;

    let workflow = Workflow::new(
        Arc::new(KubeClusterClient::new(client)),
        Arc::new(LocalExecutor::new()),
        Arc::new(DialoguerPrompter::new(cli.yes)),
        settings,
    );
    workflow.perform(cli.kind(), &cli.namespace).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["hostctl", "detach", "--host-name", "Host-1"]).unwrap();
        let settings = cli.settings(None).unwrap();

        assert_eq!(cli.kind(), WorkflowKind::Detach);
        assert_eq!(cli.namespace, "default");
        assert_eq!(settings.host_name, "host-1");
        assert_eq!(settings.timeout, Duration::from_secs(300));
        assert_eq!(settings.poll_interval, Duration::from_secs(5));
        assert_eq!(settings.purge_command, vec!["dpkg", "--purge", "byoh-hostagent"]);
        assert!(settings.kubeconfig.ends_with(".byoh/config"));
        assert!(!cli.yes);
    }

    #[test]
    fn test_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "hostctl",
            "decommission",
            "--namespace",
            "edge",
            "--kubeconfig",
            "/tmp/kc",
            "--timeout-secs",
            "10",
            "--yes",
        ])
        .unwrap();
        let settings = cli.settings(Some("edge-01".to_string())).unwrap();

        assert_eq!(cli.kind(), WorkflowKind::Decommission);
        assert_eq!(cli.namespace, "edge");
        assert_eq!(settings.host_name, "edge-01");
        assert_eq!(settings.kubeconfig, PathBuf::from("/tmp/kc"));
        assert_eq!(settings.timeout, Duration::from_secs(10));
        assert!(cli.yes);
    }

    #[test]
    fn test_missing_host_name_is_rejected() {
        let cli = Cli::try_parse_from(["hostctl", "detach", "--kubeconfig", "/tmp/kc"]).unwrap();
        assert!(matches!(cli.settings(None), Err(WorkflowError::InvalidConfig(_))));
    }
}
