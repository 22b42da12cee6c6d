//! Claim-chain CRDs
//!
//! Minimal typed views over the Cluster API resources a host is claimed
//! through: `ByoMachine` (the claim bound via `machineRef`), the `Machine`
//! that owns it, and the `MachineDeployment` that scales Machines. Only the
//! fields the detach workflow reads are modeled; unknown fields are ignored
//! on deserialization.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "infrastructure.cluster.x-k8s.io",
    version = "v1beta1",
    kind = "ByoMachine",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct ByoMachineSpec {
    /// Provider ID assigned once a host is attached
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
}

#[derive(CustomResource, Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "cluster.x-k8s.io",
    version = "v1beta1",
    kind = "Machine",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct MachineSpec {
    /// Cluster this Machine belongs to
    #[serde(default)]
    pub cluster_name: String,

    /// Provider ID of the underlying host
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
}

#[derive(CustomResource, Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "cluster.x-k8s.io",
    version = "v1beta1",
    kind = "MachineDeployment",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct MachineDeploymentSpec {
    /// Cluster this MachineDeployment belongs to
    #[serde(default)]
    pub cluster_name: String,

    /// Declared number of Machines
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
}

impl ByoMachine {
    /// Name of the `Machine` owning this claim, from its owner references
    pub fn owner_machine_name(&self) -> Option<&str> {
        self.metadata
            .owner_references
            .as_ref()?
            .iter()
            .find(|o| o.kind == "Machine")
            .map(|o| o.name.as_str())
    }
}

impl Machine {
    /// Name of the `MachineDeployment` this Machine belongs to
    pub fn deployment_name(&self) -> Option<&str> {
        self.metadata
            .labels
            .as_ref()?
            .get(crate::well_known::DEPLOYMENT_NAME_LABEL)
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
    use std::collections::BTreeMap;

    #[test]
    fn test_owner_machine_name_ignores_other_owners() {
        let claim = ByoMachine {
            metadata: ObjectMeta {
                name: Some("claim".to_string()),
                owner_references: Some(vec![
                    OwnerReference {
                        api_version: "cluster.x-k8s.io/v1beta1".to_string(),
                        kind: "Cluster".to_string(),
                        name: "c1".to_string(),
                        uid: "u1".to_string(),
                        ..Default::default()
                    },
                    OwnerReference {
                        api_version: "cluster.x-k8s.io/v1beta1".to_string(),
                        kind: "Machine".to_string(),
                        name: "m1".to_string(),
                        uid: "u2".to_string(),
                        ..Default::default()
                    },
                ]),
                ..Default::default()
            },
            spec: ByoMachineSpec::default(),
        };
        assert_eq!(claim.owner_machine_name(), Some("m1"));
    }

    #[test]
    fn test_deployment_name_from_label() {
        let machine = Machine {
            metadata: ObjectMeta {
                labels: Some(BTreeMap::from([(
                    crate::well_known::DEPLOYMENT_NAME_LABEL.to_string(),
                    "md-0".to_string(),
                )])),
                ..Default::default()
            },
            spec: MachineSpec::default(),
        };
        assert_eq!(machine.deployment_name(), Some("md-0"));
    }

    #[test]
    fn test_machine_deployment_ignores_unknown_fields() {
        let md: MachineDeploymentSpec = serde_json::from_value(serde_json::json!({
            "clusterName": "c1",
            "replicas": 3,
            "template": { "spec": { "bootstrap": {} } }
        }))
        .unwrap();
        assert_eq!(md.replicas, Some(3));
    }
}
