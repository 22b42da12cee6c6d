//! Object references used by the host record
//!
//! Kubernetes-style references for secrets and for the claim bound to a host.
//! Both follow the shape of the upstream `SecretReference` / `ObjectReference`
//! types, trimmed to the fields the lifecycle actually reads.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Reference to a Secret holding bootstrap, installation or uninstallation data
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SecretReference {
    /// Name of the Secret
    pub name: String,

    /// Namespace of the Secret (defaults to the namespace of the referencing resource)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl SecretReference {
    /// Create a reference to a Secret in the same namespace
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
        }
    }

    /// Create a reference to a Secret in an explicit namespace
    pub fn with_namespace(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: Some(namespace.into()),
        }
    }

    /// Namespace the Secret lives in, falling back to `default_namespace`
    pub fn namespace_or<'a>(&'a self, default_namespace: &'a str) -> &'a str {
        self.namespace.as_deref().unwrap_or(default_namespace)
    }
}

/// Reference to the claim (`ByoMachine`) that owns a host
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ObjectReference {
    /// API version of the referenced resource (e.g., "infrastructure.cluster.x-k8s.io/v1beta1")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,

    /// Kind of the referenced resource (e.g., "ByoMachine")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    /// Name of the referenced resource
    pub name: String,

    /// Namespace of the referenced resource
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// UID of the referenced resource
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
}

impl ObjectReference {
    /// Helper to create a reference to a `ByoMachine` claim
    pub fn byo_machine(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            api_version: Some(crate::INFRASTRUCTURE_API_VERSION.to_string()),
            kind: Some("ByoMachine".to_string()),
            name: name.into(),
            namespace: Some(namespace.into()),
            uid: None,
        }
    }
}
