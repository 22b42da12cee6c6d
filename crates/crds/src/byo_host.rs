//! ByoHost CRD
//!
//! The host record: one per bring-your-own host, written by the agent running
//! on that host, the claim controller and the operator tooling.

use crate::conditions::{self, Condition, ConditionType};
use crate::references::{ObjectReference, SecretReference};
use crate::well_known;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[kube(
    group = "infrastructure.cluster.x-k8s.io",
    version = "v1beta1",
    kind = "ByoHost",
    namespaced,
    status = "ByoHostStatus",
    shortname = "byoh",
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase")]
pub struct ByoHostSpec {
    /// Secret holding the cloud-init style bootstrap document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bootstrap_secret: Option<SecretReference>,

    /// Secret holding the `install` and `uninstall` scripts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installation_secret: Option<SecretReference>,

    /// Secret holding the uninstall script copied after a successful install
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uninstallation_secret: Option<SecretReference>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ByoHostStatus {
    /// Claim bound to this host; None while the host is free
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine_ref: Option<ObjectReference>,

    /// Lifecycle conditions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,

    /// Host details reported by the agent at registration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_details: Option<HostDetails>,
}

/// Operating system facts about the host
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HostDetails {
    /// Hostname as reported by the OS
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,

    /// OS family (e.g., "linux")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os_name: Option<String>,

    /// OS distribution and release (e.g., "Ubuntu 22.04")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os_image: Option<String>,

    /// Kernel version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kernel_version: Option<String>,

    /// CPU architecture (e.g., "x86_64")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub architecture: Option<String>,
}

impl ByoHost {
    /// Conditions on the host, empty when there is no status yet
    pub fn conditions(&self) -> &[Condition] {
        self.status.as_ref().map_or(&[], |s| s.conditions.as_slice())
    }

    /// True if the condition is present and True
    pub fn is_condition_true(&self, condition: ConditionType) -> bool {
        conditions::is_true(self.conditions(), condition)
    }

    /// Claim bound to the host, if any
    pub fn machine_ref(&self) -> Option<&ObjectReference> {
        self.status.as_ref().and_then(|s| s.machine_ref.as_ref())
    }

    /// True if the cleanup annotation is present
    pub fn cleanup_requested(&self) -> bool {
        self.metadata
            .annotations
            .as_ref()
            .is_some_and(|a| a.contains_key(well_known::CLEANUP_ANNOTATION))
    }

    /// True if the agent's finalizer is present
    pub fn has_finalizer(&self) -> bool {
        self.metadata
            .finalizers
            .as_ref()
            .is_some_and(|f| f.iter().any(|x| x == well_known::HOST_FINALIZER))
    }

    /// True once deletion has been requested at the store
    pub fn is_deleting(&self) -> bool {
        self.metadata.deletion_timestamp.is_some()
    }

    /// Mutable status, created on first use
    pub fn status_mut(&mut self) -> &mut ByoHostStatus {
        self.status.get_or_insert_with(ByoHostStatus::default)
    }
}
