//! Host registration
//!
//! Creates the ByoHost record for this machine on first start and reports
//! what the machine is running in `status.hostDetails`.

use crate::config::AgentSettings;
use crate::error::ControllerError;
use cluster_client::ClusterClientTrait;
use crds::{ByoHost, ByoHostSpec, HostDetails, well_known};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde_json::json;
use std::collections::BTreeMap;
use sysinfo::System;
use tracing::{debug, info};

/// Details of the local machine
pub fn host_details() -> HostDetails {
    HostDetails {
        hostname: System::host_name(),
        os_name: System::name(),
        os_image: System::long_os_version(),
        kernel_version: System::kernel_version(),
        architecture: Some(std::env::consts::ARCH.to_string()),
    }
}

/// Ensure the host record exists and carries current host details.
pub async fn register(
    cluster: &dyn ClusterClientTrait,
    settings: &AgentSettings,
    labels: &[(String, String)],
    details: HostDetails,
) -> Result<ByoHost, ControllerError> {
    let namespace = settings.namespace.as_str();
    let name = settings.host_name.as_str();

    let host = match cluster.get_host(namespace, name).await? {
        Some(host) => {
            debug!("ByoHost {}/{} already registered", namespace, name);
            host
        }
        None => {
            let host = ByoHost {
                metadata: ObjectMeta {
                    name: Some(name.to_string()),
                    namespace: Some(namespace.to_string()),
                    labels: (!labels.is_empty())
                        .then(|| labels.iter().cloned().collect::<BTreeMap<_, _>>()),
                    finalizers: Some(vec![well_known::HOST_FINALIZER.to_string()]),
                    ..Default::default()
                },
                spec: ByoHostSpec::default(),
                status: None,
            };
            match cluster.create_host(&host).await {
                Ok(created) => {
                    info!("Registered ByoHost {}/{}", namespace, name);
                    created
                }
                // Lost a race with another registration of the same name
                Err(e) if e.is_conflict() => cluster
                    .get_host(namespace, name)
                    .await?
                    .ok_or(ControllerError::Cluster(e))?,
                Err(e) => return Err(e.into()),
            }
        }
    };

    let current = host.status.as_ref().and_then(|s| s.host_details.as_ref());
    if current == Some(&details) {
        return Ok(host);
    }
    let patch = json!({ "status": { "hostDetails": details } });
    let updated = cluster.patch_host_status(namespace, name, &patch).await?;
    info!("Reported host details for ByoHost {}/{}", namespace, name);
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconciler::test_support::{NAMESPACE, HOST, settings, claimed_host};
    use cluster_client::MockClusterClient;

    fn details() -> HostDetails {
        HostDetails {
            hostname: Some(HOST.to_string()),
            os_name: Some("Ubuntu".to_string()),
            os_image: Some("Linux 22.04 Ubuntu".to_string()),
            kernel_version: Some("6.8.0".to_string()),
            architecture: Some("x86_64".to_string()),
        }
    }

    #[tokio::test]
    async fn test_register_creates_record_with_finalizer_and_labels() {
        let cluster = MockClusterClient::new();
        let labels = vec![("site".to_string(), "lab".to_string())];

        let host = register(&cluster, &settings(), &labels, details()).await.unwrap();

        assert!(host.has_finalizer());
        let stored = cluster.host(NAMESPACE, HOST).unwrap();
        assert_eq!(stored.metadata.labels.unwrap().get("site").map(String::as_str), Some("lab"));
        assert_eq!(stored.status.unwrap().host_details, Some(details()));
    }

    #[tokio::test]
    async fn test_register_keeps_existing_record() {
        let cluster = MockClusterClient::new();
        cluster.add_host(claimed_host());

        register(&cluster, &settings(), &[], details()).await.unwrap();
        let mutations = cluster.mutations();
        register(&cluster, &settings(), &[], details()).await.unwrap();

        let stored = cluster.host(NAMESPACE, HOST).unwrap();
        assert!(stored.machine_ref().is_some());
        assert_eq!(mutations, vec!["patch_host_status default/host-1".to_string()]);
        assert_eq!(cluster.mutations(), mutations);
    }

    #[test]
    fn test_local_host_details_report_architecture() {
        assert_eq!(host_details().architecture.as_deref(), Some(std::env::consts::ARCH));
    }
}
