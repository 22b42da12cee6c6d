//! BYOH Host Agent
//!
//! Runs on a bring-your-own host and drives its ByoHost record:
//! - registers the host and reports its OS details
//! - bootstraps the node once a machine claims the host
//! - installs Kubernetes components from the installation secret
//! - resets and uninstalls when the host is detached or deleted

mod backoff;
mod config;
mod controller;
mod error;
mod reconciler;
mod registration;
mod watcher;

use crate::config::Args;
use crate::error::ControllerError;
use clap::Parser;
use cluster_client::ClusterError;
use controller::Controller;
use kube::Client;
use kube::config::{Config, KubeConfigOptions, Kubeconfig};
use std::path::Path;
use sysinfo::System;
use tracing::info;
use tracing_subscriber::EnvFilter;

async fn kube_client(kubeconfig: Option<&Path>) -> Result<Client, ControllerError> {
    let config = match kubeconfig {
        Some(path) => {
            let kubeconfig = Kubeconfig::read_from(path).map_err(|e| {
                ControllerError::InvalidConfig(format!("cannot read kubeconfig {}: {}", path.display(), e))
            })?;
            Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                .await
                .map_err(|e| ControllerError::InvalidConfig(format!("invalid kubeconfig {}: {}", path.display(), e)))?
        }
        None => Config::infer()
            .await
            .map_err(|e| ControllerError::InvalidConfig(format!("cannot infer cluster config: {}", e)))?,
    };
    Client::try_from(config).map_err(|e| ControllerError::Cluster(ClusterError::Kube(e)))
}

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Configure rustls crypto provider (use ring for compatibility)
    let _ = rustls::crypto::ring::default_provider().install_default();

    let args = Args::parse();
    let settings = args.settings(System::host_name())?;

    info!("Starting BYOH host agent");
    info!("Configuration:");
    info!("  Host: {}/{}", settings.namespace, settings.host_name);
    info!("  Skip installation: {}", settings.skip_installation);
    info!("  Download path: {}", settings.download_path);
    info!("  Reset command: {}", settings.reset_command.join(" "));

    let client = kube_client(args.kubeconfig.as_deref()).await?;
    let controller = Controller::new(client, settings, &args.labels, args.command_timeout()).await?;
    controller.run().await?;

    Ok(())
}
