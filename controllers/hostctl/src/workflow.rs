//! Detach and decommission workflow
//!
//! Releases a host from its cluster by scaling its MachineDeployment down
//! with the host's Machine selected for deletion, then waits for the agent
//! to clean up and drop the claim. Decommission additionally deletes the
//! host record and purges the agent package from the machine.
//!
//! Every mutation re-reads the object first and carries its
//! `resourceVersion`, so a concurrent change fails the patch instead of
//! being overwritten.

use crate::error::WorkflowError;
use crate::prompt::Prompter;
use cluster_client::ClusterClientTrait;
use crds::{ByoHost, Machine, MachineDeployment, well_known};
use kube::{Resource, ResourceExt};
use script_executor::ScriptExecutor;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default wait for the host to be released
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Default delay between host record reads while waiting
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

/// Default command removing the agent package
pub const DEFAULT_PURGE_COMMAND: &str = "dpkg --purge byoh-hostagent";

/// What the operator asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowKind {
    /// Release the host from its cluster, keep the record
    Detach,
    /// Release the host, delete its record and purge the agent
    Decommission,
}

/// Workflow configuration
#[derive(Debug, Clone)]
pub struct WorkflowSettings {
    /// Name of the host record
    pub host_name: String,
    /// Cluster credential written at onboarding
    pub kubeconfig: PathBuf,
    /// Maximum wait for the host to be released
    pub timeout: Duration,
    /// Delay between host record reads
    pub poll_interval: Duration,
    /// Command removing the agent package, as argv
    pub purge_command: Vec<String>,
}

/// Fail with `CredentialMissing` unless the credential file exists
pub fn require_credential(path: &Path) -> Result<(), WorkflowError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(WorkflowError::CredentialMissing(path.display().to_string()))
    }
}

/// Detach/decommission driver
pub struct Workflow {
    cluster: Arc<dyn ClusterClientTrait>,
    executor: Arc<dyn ScriptExecutor>,
    prompter: Arc<dyn Prompter>,
    settings: WorkflowSettings,
}

impl std::fmt::Debug for Workflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workflow").field("settings", &self.settings).finish_non_exhaustive()
    }
}

impl Workflow {
    /// Create a workflow over the given store, executor and prompter
    pub fn new(
        cluster: Arc<dyn ClusterClientTrait>,
        executor: Arc<dyn ScriptExecutor>,
        prompter: Arc<dyn Prompter>,
        settings: WorkflowSettings,
    ) -> Self {
        Self {
            cluster,
            executor,
            prompter,
            settings,
        }
    }

    /// Run one detach or decommission of the configured host in `namespace`
    pub async fn perform(&self, kind: WorkflowKind, namespace: &str) -> Result<(), WorkflowError> {
        require_credential(&self.settings.kubeconfig)?;

        let name = self.settings.host_name.as_str();
        let host_key = format!("{}/{}", namespace, name);
        info!("{:?} of ByoHost {} requested", kind, host_key);

        let Some(host) = self.cluster.get_host(namespace, name).await? else {
            return match kind {
                WorkflowKind::Detach => Err(WorkflowError::HostNotFound(host_key)),
                WorkflowKind::Decommission => self.purge_orphan(&host_key).await,
            };
        };

        if host.machine_ref().is_none() {
            return match kind {
                WorkflowKind::Detach => Err(WorkflowError::NotAttached(host_key)),
                WorkflowKind::Decommission => self.decommission(namespace, name).await,
            };
        }

        self.release(&host, namespace).await?;
        self.wait_for_release(namespace, name).await?;

        match kind {
            WorkflowKind::Detach => {
                info!("ByoHost {} detached", host_key);
                Ok(())
            }
            WorkflowKind::Decommission => self.decommission(namespace, name).await,
        }
    }

    async fn purge_orphan(&self, host_key: &str) -> Result<(), WorkflowError> {
        let question = format!("ByoHost {} not found. Remove the host agent from this machine anyway?", host_key);
        if !self.prompter.confirm(&question)? {
            info!("Decommission of {} aborted", host_key);
            return Ok(());
        }
        self.purge().await
    }

    async fn decommission(&self, namespace: &str, name: &str) -> Result<(), WorkflowError> {
        if self.cluster.get_host(namespace, name).await?.is_some() {
            self.cluster.delete_host(namespace, name).await?;
            info!("Deleted ByoHost {}/{}", namespace, name);
        }
        self.purge().await?;
        info!("ByoHost {}/{} decommissioned", namespace, name);
        Ok(())
    }

    async fn purge(&self) -> Result<(), WorkflowError> {
        info!("Purging host agent: {}", self.settings.purge_command.join(" "));
        self.executor.run_command(&self.settings.purge_command).await?;
        Ok(())
    }

    /// Select the host's Machine for deletion and scale its group down by one
    async fn release(&self, host: &ByoHost, namespace: &str) -> Result<(), WorkflowError> {
        let machine_ref = host
            .machine_ref()
            .ok_or_else(|| WorkflowError::NotAttached(format!("{}/{}", namespace, host.name_any())))?;
        let claim_ns = machine_ref.namespace.as_deref().unwrap_or(namespace);

        let claim = self
            .cluster
            .get_byo_machine(claim_ns, &machine_ref.name)
            .await?
            .ok_or_else(|| WorkflowError::ClaimNotFound(format!("ByoMachine {}/{}", claim_ns, machine_ref.name)))?;
        let machine_name = claim
            .owner_machine_name()
            .ok_or_else(|| {
                WorkflowError::ClaimNotFound(format!("ByoMachine {}/{} has no owning Machine", claim_ns, machine_ref.name))
            })?
            .to_string();

        let machine = self.machine(claim_ns, &machine_name).await?;
        let md_name = machine
            .deployment_name()
            .ok_or_else(|| {
                WorkflowError::ScalingGroupNotFound(format!(
                    "Machine {}/{} has no {} label",
                    claim_ns,
                    machine_name,
                    well_known::DEPLOYMENT_NAME_LABEL
                ))
            })?
            .to_string();

        // A selected or deleting Machine was already accounted for in an earlier run
        if machine.annotations().contains_key(well_known::DELETE_MACHINE_ANNOTATION)
            || machine.meta().deletion_timestamp.is_some()
        {
            info!(
                "Machine {}/{} is already selected for deletion, not scaling down again",
                claim_ns, machine_name
            );
            return Ok(());
        }

        let md = self.machine_deployment(claim_ns, &md_name).await?;
        let replicas = md.spec.replicas.unwrap_or(1);
        if replicas < 1 {
            return Err(WorkflowError::ScalingGroupNotFound(format!(
                "MachineDeployment {}/{} has no replicas to remove",
                claim_ns, md_name
            )));
        }
        if replicas == 1 {
            let question = format!(
                "MachineDeployment {}/{} has a single replica; removing it leaves no nodes. Continue?",
                claim_ns, md_name
            );
            if !self.prompter.confirm(&question)? {
                return Err(WorkflowError::Declined(format!("{}/{}", namespace, host.name_any())));
            }
            self.annotate_machine(claim_ns, &machine_name, well_known::EXCLUDE_NODE_DRAINING_ANNOTATION)
                .await?;
        }

        self.annotate_machine(claim_ns, &machine_name, well_known::DELETE_MACHINE_ANNOTATION)
            .await?;

        let md = self.machine_deployment(claim_ns, &md_name).await?;
        let current = md.spec.replicas.unwrap_or(1);
        if current < 1 {
            return Err(WorkflowError::ScalingGroupNotFound(format!(
                "MachineDeployment {}/{} was scaled to {} concurrently",
                claim_ns, md_name, current
            )));
        }
        let patch = json!({
            "metadata": { "resourceVersion": md.resource_version() },
            "spec": { "replicas": current - 1 },
        });
        self.cluster.patch_machine_deployment(claim_ns, &md_name, &patch).await?;
        info!(
            "Scaled MachineDeployment {}/{} from {} to {} replicas",
            claim_ns,
            md_name,
            current,
            current - 1
        );
        Ok(())
    }

    async fn machine(&self, namespace: &str, name: &str) -> Result<Machine, WorkflowError> {
        self.cluster
            .get_machine(namespace, name)
            .await?
            .ok_or_else(|| WorkflowError::ClaimNotFound(format!("Machine {}/{}", namespace, name)))
    }

    async fn machine_deployment(&self, namespace: &str, name: &str) -> Result<MachineDeployment, WorkflowError> {
        self.cluster
            .get_machine_deployment(namespace, name)
            .await?
            .ok_or_else(|| WorkflowError::ScalingGroupNotFound(format!("{}/{}", namespace, name)))
    }

    async fn annotate_machine(&self, namespace: &str, name: &str, annotation: &str) -> Result<(), WorkflowError> {
        let machine = self.machine(namespace, name).await?;
        let patch = json!({
            "metadata": {
                "resourceVersion": machine.resource_version(),
                "annotations": { annotation: "true" },
            }
        });
        self.cluster.patch_machine(namespace, name, &patch).await?;
        debug!("Annotated Machine {}/{} with {}", namespace, name, annotation);
        Ok(())
    }

    /// Wait until the host record no longer references a claim
    async fn wait_for_release(&self, namespace: &str, name: &str) -> Result<(), WorkflowError> {
        let host_key = format!("{}/{}", namespace, name);
        info!("Waiting up to {:?} for ByoHost {} to be released", self.settings.timeout, host_key);

        let poll = async {
            loop {
                match self.cluster.get_host(namespace, name).await? {
                    None => return Ok::<_, WorkflowError>(()),
                    Some(host) if host.machine_ref().is_none() => return Ok(()),
                    Some(_) => debug!("ByoHost {} still claimed", host_key),
                }
                tokio::time::sleep(self.settings.poll_interval).await;
            }
        };

        match tokio::time::timeout(self.settings.timeout, poll).await {
            Ok(result) => result,
            Err(_) => {
                warn!("ByoHost {} was not released in time", host_key);
                Err(WorkflowError::ConvergenceTimeout {
                    host: host_key,
                    timeout: self.settings.timeout,
                })
            }
        }
    }
}
