//! Mock ClusterClient for unit testing
//!
//! This module provides an in-memory implementation of `ClusterClientTrait`
//! that behaves like the API server where the lifecycle depends on it:
//! - every write bumps `metadata.resourceVersion`
//! - patches carrying a stale `resourceVersion` are rejected as conflicts
//! - status and spec patches touch only their own part of the object
//! - deleting a host with finalizers only sets `deletionTimestamp`; the record
//!   disappears once the last finalizer is patched away
//!
//! Mutating calls are logged so tests can assert that nothing was written.
//! Tests can also make the next call of a given kind fail, or run a
//! concurrent writer right after the next call of a given kind.

mod events;
mod merge;

pub use events::{MockEventSink, RecordedEvent};

use crate::cluster_trait::{ClusterClientTrait, SecretData};
use crate::error::ClusterError;
use crds::{ByoHost, ByoMachine, Machine, MachineDeployment};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::Resource;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type Key = (String, String);

fn key(namespace: &str, name: &str) -> Key {
    (namespace.to_string(), name.to_string())
}

pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A secret as stored by the mock
#[derive(Debug, Clone, PartialEq)]
pub struct StoredSecret {
    /// Secret payload
    pub data: SecretData,
    /// Owner reference set when the secret was written
    pub owner: Option<OwnerReference>,
}

/// Store change run once, right after the next call of a method
type CallHook = Box<dyn FnOnce(&MockClusterClient) + Send>;

#[derive(Default)]
pub(crate) struct AfterCall(HashMap<String, CallHook>);

impl std::fmt::Debug for AfterCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.0.keys()).finish()
    }
}

/// Mock ClusterClient for testing
#[derive(Debug, Clone, Default)]
pub struct MockClusterClient {
    pub(crate) hosts: Arc<Mutex<HashMap<Key, ByoHost>>>,
    pub(crate) secrets: Arc<Mutex<HashMap<Key, StoredSecret>>>,
    pub(crate) byo_machines: Arc<Mutex<HashMap<Key, ByoMachine>>>,
    pub(crate) machines: Arc<Mutex<HashMap<Key, Machine>>>,
    pub(crate) machine_deployments: Arc<Mutex<HashMap<Key, MachineDeployment>>>,
    // Mutating calls, in order
    pub(crate) mutations: Arc<Mutex<Vec<String>>>,
    // Counter for generating resource versions
    pub(crate) next_version: Arc<Mutex<u64>>,
    // Host whose machineRef is cleared when a MachineDeployment is scaled
    pub(crate) release_on_scale_down: Arc<Mutex<Option<Key>>>,
    // Errors returned by the next call of the named method
    pub(crate) failures: Arc<Mutex<HashMap<String, ClusterError>>>,
    pub(crate) after_call: Arc<Mutex<AfterCall>>,
}

impl MockClusterClient {
    /// Create a new, empty mock store
    pub fn new() -> Self {
        Self::default()
    }

    fn next_version(&self) -> u64 {
        let mut v = lock(&self.next_version);
        *v += 1;
        *v
    }

    fn record(&self, call: String) {
        lock(&self.mutations).push(call);
    }

    fn stamp<K: Resource>(&self, obj: &mut K) {
        obj.meta_mut().resource_version = Some(self.next_version().to_string());
    }

    /// Add a host record (for test setup)
    pub fn add_host(&self, mut host: ByoHost) {
        self.stamp(&mut host);
        let k = key(
            host.metadata.namespace.as_deref().unwrap_or("default"),
            host.metadata.name.as_deref().unwrap_or_default(),
        );
        lock(&self.hosts).insert(k, host);
    }

    /// Current copy of a host record
    pub fn host(&self, namespace: &str, name: &str) -> Option<ByoHost> {
        lock(&self.hosts).get(&key(namespace, name)).cloned()
    }

    /// Add a secret (for test setup)
    pub fn add_secret(&self, namespace: &str, name: &str, data: SecretData) {
        lock(&self.secrets).insert(key(namespace, name), StoredSecret { data, owner: None });
    }

    /// Current copy of a secret
    pub fn secret(&self, namespace: &str, name: &str) -> Option<StoredSecret> {
        lock(&self.secrets).get(&key(namespace, name)).cloned()
    }

    /// Add a ByoMachine claim (for test setup)
    pub fn add_byo_machine(&self, mut claim: ByoMachine) {
        self.stamp(&mut claim);
        let k = key(
            claim.metadata.namespace.as_deref().unwrap_or("default"),
            claim.metadata.name.as_deref().unwrap_or_default(),
        );
        lock(&self.byo_machines).insert(k, claim);
    }

    /// Add a Machine (for test setup)
    pub fn add_machine(&self, mut machine: Machine) {
        self.stamp(&mut machine);
        let k = key(
            machine.metadata.namespace.as_deref().unwrap_or("default"),
            machine.metadata.name.as_deref().unwrap_or_default(),
        );
        lock(&self.machines).insert(k, machine);
    }

    /// Current copy of a Machine
    pub fn machine(&self, namespace: &str, name: &str) -> Option<Machine> {
        lock(&self.machines).get(&key(namespace, name)).cloned()
    }

    /// Add a MachineDeployment (for test setup)
    pub fn add_machine_deployment(&self, mut md: MachineDeployment) {
        self.stamp(&mut md);
        let k = key(
            md.metadata.namespace.as_deref().unwrap_or("default"),
            md.metadata.name.as_deref().unwrap_or_default(),
        );
        lock(&self.machine_deployments).insert(k, md);
    }

    /// Current copy of a MachineDeployment
    pub fn machine_deployment(&self, namespace: &str, name: &str) -> Option<MachineDeployment> {
        lock(&self.machine_deployments).get(&key(namespace, name)).cloned()
    }

    /// Mutating calls made so far, e.g. `"patch_machine default/m1"`
    pub fn mutations(&self) -> Vec<String> {
        lock(&self.mutations).clone()
    }

    /// Simulate the agent: clear the host's `machineRef` as soon as any
    /// MachineDeployment is patched
    pub fn release_host_on_scale_down(&self, namespace: &str, name: &str) {
        *lock(&self.release_on_scale_down) = Some(key(namespace, name));
    }

    /// Make the next call of `method` (e.g. `"patch_host"`) fail with `error`
    pub fn fail_next(&self, method: &str, error: ClusterError) {
        lock(&self.failures).insert(method.to_string(), error);
    }

    /// Run `change` against the store right after the next call of
    /// `method` (`"get_host"` or `"patch_machine"`), as a concurrent writer would
    pub fn after_next(&self, method: &str, change: impl FnOnce(&MockClusterClient) + Send + 'static) {
        lock(&self.after_call).0.insert(method.to_string(), Box::new(change));
    }

    /// Run `change` right after the next `get_host`
    pub fn after_next_host_read(&self, change: impl FnOnce(&MockClusterClient) + Send + 'static) {
        self.after_next("get_host", change);
    }

    /// Set a MachineDeployment's replicas as another writer, bumping its version
    pub fn scale_as_other(&self, namespace: &str, name: &str, replicas: i32) {
        let version = self.next_version();
        if let Some(md) = lock(&self.machine_deployments).get_mut(&key(namespace, name)) {
            md.spec.replicas = Some(replicas);
            md.metadata.resource_version = Some(version.to_string());
        }
    }

    /// Apply a merge patch to a stored host as another writer, bumping its version
    pub fn write_host_as_other(&self, namespace: &str, name: &str, patch: &serde_json::Value) {
        let version = self.next_version();
        let mut hosts = lock(&self.hosts);
        if let Some(current) = hosts.get(&key(namespace, name)).cloned() {
            if let Ok(patched) = merge::apply(&current, patch, version) {
                hosts.insert(key(namespace, name), patched);
            }
        }
    }

    fn injected(&self, method: &str) -> Result<(), ClusterError> {
        match lock(&self.failures).remove(method) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn run_hook(&self, method: &str) {
        let hook = lock(&self.after_call).0.remove(method);
        if let Some(change) = hook {
            change(self);
        }
    }

    fn release_host(&self) {
        let Some(k) = lock(&self.release_on_scale_down).clone() else {
            return;
        };
        let version = self.next_version();
        if let Some(host) = lock(&self.hosts).get_mut(&k) {
            if let Some(status) = host.status.as_mut() {
                status.machine_ref = None;
            }
            host.metadata.resource_version = Some(version.to_string());
        }
    }
}

fn without_status(patch: &serde_json::Value) -> serde_json::Value {
    let mut p = patch.clone();
    if let Some(obj) = p.as_object_mut() {
        obj.remove("status");
    }
    p
}

fn only_status(patch: &serde_json::Value) -> serde_json::Value {
    let mut p = serde_json::json!({});
    if let Some(status) = patch.get("status") {
        p["status"] = status.clone();
    }
    if let Some(rv) = patch.pointer("/metadata/resourceVersion") {
        p["metadata"] = serde_json::json!({ "resourceVersion": rv });
    }
    p
}

#[async_trait::async_trait]
impl ClusterClientTrait for MockClusterClient {
    async fn get_host(&self, namespace: &str, name: &str) -> Result<Option<ByoHost>, ClusterError> {
        self.injected("get_host")?;
        let host = self.host(namespace, name);
        self.run_hook("get_host");
        Ok(host)
    }

    async fn create_host(&self, host: &ByoHost) -> Result<ByoHost, ClusterError> {
        let namespace = host.metadata.namespace.clone().unwrap_or_else(|| "default".to_string());
        let name = host.metadata.name.clone().unwrap_or_default();
        let k = key(&namespace, &name);
        if lock(&self.hosts).contains_key(&k) {
            return Err(ClusterError::Conflict(format!("ByoHost {namespace}/{name} already exists")));
        }
        self.record(format!("create_host {namespace}/{name}"));
        let mut created = host.clone();
        created.metadata.namespace = Some(namespace);
        self.stamp(&mut created);
        lock(&self.hosts).insert(k, created.clone());
        Ok(created)
    }

    async fn patch_host(&self, namespace: &str, name: &str, patch: &serde_json::Value) -> Result<ByoHost, ClusterError> {
        self.injected("patch_host")?;
        let k = key(namespace, name);
        let current = self
            .host(namespace, name)
            .ok_or_else(|| ClusterError::NotFound(format!("ByoHost {namespace}/{name}")))?;
        let patched = merge::apply(&current, &without_status(patch), self.next_version())?;
        self.record(format!("patch_host {namespace}/{name}"));

        let mut hosts = lock(&self.hosts);
        if patched.is_deleting() && patched.metadata.finalizers.as_ref().is_none_or(Vec::is_empty) {
            hosts.remove(&k);
        } else {
            hosts.insert(k, patched.clone());
        }
        Ok(patched)
    }

    async fn patch_host_status(&self, namespace: &str, name: &str, patch: &serde_json::Value) -> Result<ByoHost, ClusterError> {
        self.injected("patch_host_status")?;
        let current = self
            .host(namespace, name)
            .ok_or_else(|| ClusterError::NotFound(format!("ByoHost {namespace}/{name}")))?;
        let patched = merge::apply(&current, &only_status(patch), self.next_version())?;
        self.record(format!("patch_host_status {namespace}/{name}"));
        lock(&self.hosts).insert(key(namespace, name), patched.clone());
        Ok(patched)
    }

    async fn delete_host(&self, namespace: &str, name: &str) -> Result<(), ClusterError> {
        self.injected("delete_host")?;
        let Some(current) = self.host(namespace, name) else {
            return Ok(());
        };
        self.record(format!("delete_host {namespace}/{name}"));
        let k = key(namespace, name);
        if current.metadata.finalizers.as_ref().is_none_or(Vec::is_empty) {
            lock(&self.hosts).remove(&k);
            return Ok(());
        }
        if !current.is_deleting() {
            let now = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
            let marked = merge::apply(
                &current,
                &serde_json::json!({ "metadata": { "deletionTimestamp": now } }),
                self.next_version(),
            )?;
            lock(&self.hosts).insert(k, marked);
        }
        Ok(())
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<SecretData>, ClusterError> {
        Ok(self.secret(namespace, name).map(|s| s.data))
    }

    async fn put_secret(
        &self,
        namespace: &str,
        name: &str,
        data: SecretData,
        owner: Option<OwnerReference>,
    ) -> Result<(), ClusterError> {
        self.injected("put_secret")?;
        self.record(format!("put_secret {namespace}/{name}"));
        lock(&self.secrets).insert(key(namespace, name), StoredSecret { data, owner });
        Ok(())
    }

    async fn get_byo_machine(&self, namespace: &str, name: &str) -> Result<Option<ByoMachine>, ClusterError> {
        Ok(lock(&self.byo_machines).get(&key(namespace, name)).cloned())
    }

    async fn get_machine(&self, namespace: &str, name: &str) -> Result<Option<Machine>, ClusterError> {
        Ok(self.machine(namespace, name))
    }

    async fn patch_machine(&self, namespace: &str, name: &str, patch: &serde_json::Value) -> Result<Machine, ClusterError> {
        self.injected("patch_machine")?;
        let current = self
            .machine(namespace, name)
            .ok_or_else(|| ClusterError::NotFound(format!("Machine {namespace}/{name}")))?;
        let patched = merge::apply(&current, patch, self.next_version())?;
        self.record(format!("patch_machine {namespace}/{name}"));
        lock(&self.machines).insert(key(namespace, name), patched.clone());
        self.run_hook("patch_machine");
        Ok(patched)
    }

    async fn get_machine_deployment(&self, namespace: &str, name: &str) -> Result<Option<MachineDeployment>, ClusterError> {
        Ok(self.machine_deployment(namespace, name))
    }

    async fn patch_machine_deployment(
        &self,
        namespace: &str,
        name: &str,
        patch: &serde_json::Value,
    ) -> Result<MachineDeployment, ClusterError> {
        self.injected("patch_machine_deployment")?;
        let current = self
            .machine_deployment(namespace, name)
            .ok_or_else(|| ClusterError::NotFound(format!("MachineDeployment {namespace}/{name}")))?;
        let patched = merge::apply(&current, patch, self.next_version())?;
        self.record(format!("patch_machine_deployment {namespace}/{name}"));
        lock(&self.machine_deployments).insert(key(namespace, name), patched.clone());
        self.release_host();
        Ok(patched)
    }
}
