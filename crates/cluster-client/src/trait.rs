//! ClusterClient trait for mocking
//!
//! This trait abstracts the object store so the agent reconciler and the
//! detach workflow can be unit tested against an in-memory store.
//! Patches are JSON merge patches; a patch that carries
//! `metadata.resourceVersion` is rejected with a conflict if the stored
//! object has moved on.

use crate::error::ClusterError;
use crds::{ByoHost, ByoMachine, Machine, MachineDeployment};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use std::collections::BTreeMap;

/// Decoded secret payload: key to raw bytes
pub type SecretData = BTreeMap<String, Vec<u8>>;

/// Trait for object store operations used by the host lifecycle
///
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait ClusterClientTrait: Send + Sync {
    // Host records
    async fn get_host(&self, namespace: &str, name: &str) -> Result<Option<ByoHost>, ClusterError>;
    async fn create_host(&self, host: &ByoHost) -> Result<ByoHost, ClusterError>;
    /// Merge-patch metadata and spec; any `status` key is ignored
    async fn patch_host(&self, namespace: &str, name: &str, patch: &serde_json::Value) -> Result<ByoHost, ClusterError>;
    /// Merge-patch the status subresource; only the `status` key is applied
    async fn patch_host_status(&self, namespace: &str, name: &str, patch: &serde_json::Value) -> Result<ByoHost, ClusterError>;
    /// Request deletion; finalizers hold the record until they are removed
    async fn delete_host(&self, namespace: &str, name: &str) -> Result<(), ClusterError>;

    // Secrets
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<SecretData>, ClusterError>;
    /// Create or replace a secret, optionally owned by another resource
    async fn put_secret(&self, namespace: &str, name: &str, data: SecretData, owner: Option<OwnerReference>) -> Result<(), ClusterError>;

    // Claim chain
    async fn get_byo_machine(&self, namespace: &str, name: &str) -> Result<Option<ByoMachine>, ClusterError>;
    async fn get_machine(&self, namespace: &str, name: &str) -> Result<Option<Machine>, ClusterError>;
    async fn patch_machine(&self, namespace: &str, name: &str, patch: &serde_json::Value) -> Result<Machine, ClusterError>;
    async fn get_machine_deployment(&self, namespace: &str, name: &str) -> Result<Option<MachineDeployment>, ClusterError>;
    async fn patch_machine_deployment(&self, namespace: &str, name: &str, patch: &serde_json::Value) -> Result<MachineDeployment, ClusterError>;
}
