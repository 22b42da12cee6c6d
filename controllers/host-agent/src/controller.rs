//! Main controller implementation.
//!
//! Wires the kube-backed cluster client, event recorder and local executor
//! into the reconciler, registers the host and runs the watcher.

use crate::config::AgentSettings;
use crate::error::ControllerError;
use crate::reconciler::Reconciler;
use crate::registration;
use crate::watcher;
use cluster_client::{KubeClusterClient, KubeEventSink};
use crds::ByoHost;
use kube::{Api, Client};
use script_executor::LocalExecutor;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Name events are reported under
const CONTROLLER_NAME: &str = "byoh-hostagent";

/// Host agent controller.
pub struct Controller {
    api: Api<ByoHost>,
    reconciler: Arc<Reconciler>,
}

impl Controller {
    /// Creates a new controller instance and registers the host.
    pub async fn new(
        client: Client,
        settings: AgentSettings,
        labels: &[(String, String)],
        command_timeout: Option<Duration>,
    ) -> Result<Self, ControllerError> {
        info!("Initializing host agent for ByoHost {}/{}", settings.namespace, settings.host_name);

        let cluster = Arc::new(KubeClusterClient::new(client.clone()));
        let events = Arc::new(KubeEventSink::new(
            client.clone(),
            CONTROLLER_NAME,
            Some(settings.host_name.clone()),
        ));
        let mut executor = LocalExecutor::new();
        if let Some(timeout) = command_timeout {
            executor = executor.with_timeout(timeout);
        }

        registration::register(cluster.as_ref(), &settings, labels, registration::host_details()).await?;

        let api = Api::namespaced(client, &settings.namespace);
        let reconciler = Arc::new(Reconciler::new(cluster, events, Arc::new(executor), settings));
        Ok(Self { api, reconciler })
    }

    /// Runs the controller until the watch stream ends.
    pub async fn run(self) -> Result<(), ControllerError> {
        info!("Host agent started, watching ByoHost {}", self.reconciler.settings().host_name);
        watcher::watch_host(self.api, self.reconciler).await
    }
}
