//! Well-known labels, annotations, finalizers and secret keys.

/// Label naming the cluster a host is attached to
pub const CLUSTER_NAME_LABEL: &str = "cluster.x-k8s.io/cluster-name";

/// Label on a `Machine` naming its `MachineDeployment`
pub const DEPLOYMENT_NAME_LABEL: &str = "cluster.x-k8s.io/deployment-name";

/// Presence asks the agent to detach the host from its cluster
pub const CLEANUP_ANNOTATION: &str = "byoh.infrastructure.cluster.x-k8s.io/unattach";

/// Target Kubernetes version for the host
pub const K8S_VERSION_ANNOTATION: &str = "byoh.infrastructure.cluster.x-k8s.io/k8sversion";

/// Registry the installation bundle is pulled from
pub const BUNDLE_REGISTRY_ANNOTATION: &str = "byoh.infrastructure.cluster.x-k8s.io/bundle-registry";

/// Control plane endpoint IP assigned to the host
pub const ENDPOINT_IP_ANNOTATION: &str = "byoh.infrastructure.cluster.x-k8s.io/endpointip";

/// Annotations removed together when cleanup completes
pub const HOST_CLEANUP_ANNOTATIONS: [&str; 4] = [
    CLEANUP_ANNOTATION,
    K8S_VERSION_ANNOTATION,
    BUNDLE_REGISTRY_ANNOTATION,
    ENDPOINT_IP_ANNOTATION,
];

/// Marks a `Machine` as the one to remove on scale down
pub const DELETE_MACHINE_ANNOTATION: &str = "cluster.x-k8s.io/delete-machine";

/// Skips node drain when a `Machine` is deleted
pub const EXCLUDE_NODE_DRAINING_ANNOTATION: &str = "machine.cluster.x-k8s.io/exclude-node-draining";

/// Finalizer held by the agent while local cluster state may exist
pub const HOST_FINALIZER: &str = "byohost.infrastructure.cluster.x-k8s.io";

/// Bootstrap secret key holding the cloud-init document
pub const BOOTSTRAP_DATA_KEY: &str = "value";

/// Installation secret key holding the install script
pub const INSTALL_SCRIPT_KEY: &str = "install";

/// Installation secret key holding the uninstall script
pub const UNINSTALL_SCRIPT_KEY: &str = "uninstall";

/// Name of the uninstallation secret derived for a host
pub fn uninstall_secret_name(host_name: &str) -> String {
    format!("{host_name}-uninstall")
}
