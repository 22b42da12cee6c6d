//! Reconciliation logic for the local ByoHost record.
//!
//! One pass reads the record, performs at most one side-effecting step on a
//! copy and persists the difference:
//! - `bootstrap`: run the bootstrap document once the host is claimed
//! - `install`: run the install script once bootstrap succeeded
//! - `cleanup`: reset the node and run the uninstall script when detaching
//!
//! Persisting happens after failed steps too, so the False condition that
//! explains a failure reaches the store before the error is retried.

mod bootstrap;
mod cleanup;
mod install;
pub mod reasons;

#[cfg(test)]
pub(crate) mod test_support;
#[cfg(test)]
mod cleanup_test;
#[cfg(test)]
mod persist_test;

use crate::backoff::BackoffStates;
use crate::config::AgentSettings;
use crate::error::ControllerError;
use cluster_client::{ClusterClientTrait, EventKind, EventSink, SecretData};
use crds::{ByoHost, ByoHostStatus, ConditionReason, ConditionType, SecretReference, conditions, well_known};
use kube::ResourceExt;
use script_executor::ScriptExecutor;
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// What the dispatcher should do after a successful pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Nothing left to do until the record changes
    Done,
    /// A step completed and the next one can start right away
    Requeue,
}

/// Reconciles the ByoHost record of the local machine.
pub struct Reconciler {
    pub(crate) cluster: Arc<dyn ClusterClientTrait>,
    pub(crate) events: Arc<dyn EventSink>,
    pub(crate) executor: Arc<dyn ScriptExecutor>,
    pub(crate) settings: AgentSettings,
    /// Error count tracking per record (namespace/name -> backoff)
    backoff_states: BackoffStates,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    /// Creates a new reconciler.
    pub fn new(
        cluster: Arc<dyn ClusterClientTrait>,
        events: Arc<dyn EventSink>,
        executor: Arc<dyn ScriptExecutor>,
        settings: AgentSettings,
    ) -> Self {
        Self {
            cluster,
            events,
            executor,
            settings,
            backoff_states: BackoffStates::default(),
        }
    }

    /// Settings the reconciler was constructed with
    pub fn settings(&self) -> &AgentSettings {
        &self.settings
    }

    /// Next retry delay for a failing record
    pub fn backoff_for(&self, resource_key: &str) -> Duration {
        self.backoff_states.next_for(resource_key)
    }

    /// Run one state-machine step for the named host record.
    pub async fn reconcile_host(&self, name: &str) -> Result<ReconcileOutcome, ControllerError> {
        let namespace = self.settings.namespace.as_str();
        let resource_key = format!("{}/{}", namespace, name);

        let Some(host) = self.cluster.get_host(namespace, name).await? else {
            debug!("ByoHost {} not found, nothing to reconcile", resource_key);
            return Ok(ReconcileOutcome::Done);
        };
        info!("Reconciling ByoHost {}", resource_key);

        let mut updated = host.clone();
        let result = if host.is_deleting() {
            self.reconcile_delete(&mut updated).await
        } else {
            self.reconcile_normal(&mut updated).await
        };

        let persisted = self.persist(&host, &updated).await;
        match (result, persisted) {
            (Ok(outcome), Ok(())) => {
                self.backoff_states.reset(&resource_key);
                Ok(outcome)
            }
            (Ok(_), Err(e)) => Err(e),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(persist_error)) => {
                warn!("Failed to persist ByoHost {} after error: {}", resource_key, persist_error);
                Err(e)
            }
        }
    }

    async fn reconcile_normal(&self, host: &mut ByoHost) -> Result<ReconcileOutcome, ControllerError> {
        if !host.has_finalizer() {
            debug!("Adding finalizer to ByoHost {}", host.name_any());
            host.finalizers_mut().push(well_known::HOST_FINALIZER.to_string());
        }

        if host.cleanup_requested() {
            self.cleanup(host).await?;
            return Ok(ReconcileOutcome::Done);
        }

        if host.machine_ref().is_none() {
            debug!("ByoHost {} is not claimed yet", host.name_any());
            set_condition(
                host,
                ConditionType::BootstrapSucceeded,
                ConditionReason::WaitingForClaim,
                "waiting for a machine to claim the host",
            )?;
            return Ok(ReconcileOutcome::Done);
        }

        if !host.is_condition_true(ConditionType::BootstrapSucceeded) {
            return self.bootstrap(host).await;
        }

        if self.settings.skip_installation {
            debug!("Installation skipped for ByoHost {}", host.name_any());
            return Ok(ReconcileOutcome::Done);
        }

        if !host.is_condition_true(ConditionType::ComponentsInstalled) {
            self.install(host).await?;
        }
        Ok(ReconcileOutcome::Done)
    }

    async fn reconcile_delete(&self, host: &mut ByoHost) -> Result<ReconcileOutcome, ControllerError> {
        info!("ByoHost {} is being deleted", host.name_any());
        if host.machine_ref().is_some() || host.is_condition_true(ConditionType::ComponentsInstalled) {
            self.cleanup(host).await?;
        }
        if host.has_finalizer() {
            host.finalizers_mut().retain(|f| f != well_known::HOST_FINALIZER);
            info!("Removed finalizer from ByoHost {}", host.name_any());
        }
        Ok(ReconcileOutcome::Done)
    }

    /// Read a referenced secret; the error is a message fit for a condition
    pub(crate) async fn fetch_secret(&self, secret_ref: &SecretReference) -> Result<SecretData, String> {
        let namespace = secret_ref.namespace_or(&self.settings.namespace);
        match self.cluster.get_secret(namespace, &secret_ref.name).await {
            Ok(Some(data)) => Ok(data),
            Ok(None) => Err(format!("secret {}/{} not found", namespace, secret_ref.name)),
            Err(e) => Err(format!("failed to read secret {}/{}: {}", namespace, secret_ref.name, e)),
        }
    }

    pub(crate) async fn warn_event(&self, host: &ByoHost, reason: &str, message: &str) {
        warn!("ByoHost {}: {}: {}", host.name_any(), reason, message);
        self.events.record(host, EventKind::Warning, reason, message).await;
    }

    pub(crate) async fn normal_event(&self, host: &ByoHost, reason: &str, message: &str) {
        info!("ByoHost {}: {}: {}", host.name_any(), reason, message);
        self.events.record(host, EventKind::Normal, reason, message).await;
    }

    /// Write the difference between `before` and `after` back to the store.
    ///
    /// Metadata and spec go first, then status through the status
    /// subresource. Both patches carry a resource version, starting from the
    /// one that was read. If another writer changed the record in between
    /// but left the fields this pass touched alone, the patches are retried
    /// once against the fresh version; otherwise the conflict is returned.
    async fn persist(&self, before: &ByoHost, after: &ByoHost) -> Result<(), ControllerError> {
        let namespace = self.settings.namespace.as_str();
        let name = before.name_any();

        match self.write_changes(before, after, before.metadata.resource_version.clone()).await {
            Err(ControllerError::Cluster(e)) if e.is_conflict() => {
                let Some(current) = self.cluster.get_host(namespace, &name).await? else {
                    return Err(ControllerError::Cluster(e));
                };
                if !untouched_by_others(before, after, &current) {
                    debug!("ByoHost {}/{} changed concurrently: {}", namespace, name, e);
                    return Err(ControllerError::Cluster(e));
                }
                debug!("Retrying write of ByoHost {}/{} at a fresh version", namespace, name);
                self.write_changes(before, after, current.metadata.resource_version).await
            }
            result => result,
        }
    }

    async fn write_changes(
        &self,
        before: &ByoHost,
        after: &ByoHost,
        mut resource_version: Option<String>,
    ) -> Result<(), ControllerError> {
        let namespace = self.settings.namespace.as_str();
        let name = before.name_any();

        if let Some(mut patch) = metadata_patch(before, after) {
            if let Some(rv) = resource_version.take() {
                patch["metadata"]["resourceVersion"] = Value::String(rv);
            }
            let patched = self.cluster.patch_host(namespace, &name, &patch).await?;
            resource_version = patched.metadata.resource_version;
            debug!("Patched ByoHost {}/{}", namespace, name);
        }

        // Removing the last finalizer of a deleting record releases it
        if after.is_deleting() && !after.has_finalizer() {
            return Ok(());
        }

        if let Some(mut patch) = status_patch(before, after) {
            if let Some(rv) = resource_version {
                patch["metadata"] = json!({ "resourceVersion": rv });
            }
            self.cluster.patch_host_status(namespace, &name, &patch).await?;
            debug!("Patched status of ByoHost {}/{}", namespace, name);
        }
        Ok(())
    }
}

pub(crate) fn set_condition(
    host: &mut ByoHost,
    condition: ConditionType,
    reason: ConditionReason,
    message: &str,
) -> Result<(), ControllerError> {
    conditions::set(&mut host.status_mut().conditions, condition, reason, message)?;
    Ok(())
}

pub(crate) fn mark_true(host: &mut ByoHost, condition: ConditionType) -> Result<(), ControllerError> {
    conditions::mark_true(&mut host.status_mut().conditions, condition)?;
    Ok(())
}

/// UTF-8 value of `key` in a secret
pub(crate) fn secret_text(data: &SecretData, key: &str, secret_name: &str) -> Result<String, String> {
    let raw = data
        .get(key)
        .ok_or_else(|| format!("secret {} has no key {:?}", secret_name, key))?;
    String::from_utf8(raw.clone()).map_err(|_| format!("key {:?} of secret {} is not UTF-8", key, secret_name))
}

fn map_patch(before: Option<&BTreeMap<String, String>>, after: Option<&BTreeMap<String, String>>) -> Option<Value> {
    let empty = BTreeMap::new();
    let before = before.unwrap_or(&empty);
    let after = after.unwrap_or(&empty);

    let mut patch = Map::new();
    for key in before.keys().filter(|k| !after.contains_key(*k)) {
        patch.insert(key.clone(), Value::Null);
    }
    for (key, value) in after.iter().filter(|(k, v)| before.get(*k) != Some(*v)) {
        patch.insert(key.clone(), Value::String(value.clone()));
    }
    (!patch.is_empty()).then_some(Value::Object(patch))
}

/// Merge patch for labels, annotations, finalizers and spec; `None` if unchanged
fn metadata_patch(before: &ByoHost, after: &ByoHost) -> Option<Value> {
    let mut metadata = Map::new();
    if let Some(labels) = map_patch(before.metadata.labels.as_ref(), after.metadata.labels.as_ref()) {
        metadata.insert("labels".to_string(), labels);
    }
    if let Some(annotations) = map_patch(
        before.metadata.annotations.as_ref(),
        after.metadata.annotations.as_ref(),
    ) {
        metadata.insert("annotations".to_string(), annotations);
    }
    if before.metadata.finalizers != after.metadata.finalizers {
        metadata.insert(
            "finalizers".to_string(),
            json!(after.metadata.finalizers.clone().unwrap_or_default()),
        );
    }

    let mut patch = Map::new();
    if !metadata.is_empty() {
        patch.insert("metadata".to_string(), Value::Object(metadata));
    }
    if before.spec != after.spec {
        patch.insert(
            "spec".to_string(),
            json!({
                "bootstrapSecret": after.spec.bootstrap_secret,
                "installationSecret": after.spec.installation_secret,
                "uninstallationSecret": after.spec.uninstallation_secret,
            }),
        );
    }
    (!patch.is_empty()).then_some(Value::Object(patch))
}

/// Status merge patch holding only the status fields that changed
fn status_patch(before: &ByoHost, after: &ByoHost) -> Option<Value> {
    let empty = ByoHostStatus::default();
    let old = before.status.as_ref().unwrap_or(&empty);
    let new = after.status.as_ref().unwrap_or(&empty);

    let mut status = Map::new();
    if old.machine_ref != new.machine_ref {
        status.insert("machineRef".to_string(), json!(new.machine_ref));
    }
    if old.conditions != new.conditions {
        status.insert("conditions".to_string(), json!(new.conditions));
    }
    if old.host_details != new.host_details {
        status.insert("hostDetails".to_string(), json!(new.host_details));
    }
    (!status.is_empty()).then(|| json!({ "status": status }))
}

/// Whether `current` differs from what this pass read only in fields the
/// pass did not change
fn untouched_by_others(before: &ByoHost, after: &ByoHost, current: &ByoHost) -> bool {
    let ours = |field: fn(&ByoHost) -> Value| {
        let now = field(current);
        now == field(before) || now == field(after)
    };
    ours(|h| json!(h.machine_ref()))
        && ours(|h| json!(h.conditions()))
        && ours(|h| json!(h.spec))
        && ours(|h| json!(h.metadata.finalizers))
}
