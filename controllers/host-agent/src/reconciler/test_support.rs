//! Test utilities for unit testing the reconciler
//!
//! Builds a reconciler over the in-memory cluster, event sink and executor,
//! plus host records and secrets in the shapes the lifecycle sees.

use crate::config::AgentSettings;
use crate::reconciler::Reconciler;
use cluster_client::{ClusterError, MockClusterClient, MockEventSink, SecretData};
use crds::{
    ByoHost, ByoHostSpec, ByoHostStatus, ConditionReason, ConditionType, ObjectReference, SecretReference,
    conditions, well_known,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use script_executor::RecordingExecutor;
use std::collections::BTreeMap;
use std::sync::Arc;

pub const NAMESPACE: &str = "default";
pub const HOST: &str = "host-1";
pub const BOOTSTRAP_SECRET: &str = "host-1-bootstrap";
pub const INSTALL_SECRET: &str = "k8s-installer";

/// One file and one command
pub const BOOTSTRAP_DOCUMENT: &str = "#cloud-config
write_files:
- path: /etc/kubernetes/join.yaml
  permissions: '0640'
  content: |
    nodeName: {{ ds.meta_data.hostname }}
runcmd:
- kubeadm join --config /etc/kubernetes/join.yaml
";

pub const INSTALL_SCRIPT: &str = "install-bundle --path {{ bundle_download_path }}";
pub const UNINSTALL_SCRIPT: &str = "uninstall-bundle --path {{ bundle_download_path }}";

pub struct Harness {
    pub cluster: MockClusterClient,
    pub events: MockEventSink,
    pub executor: RecordingExecutor,
    pub reconciler: Reconciler,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(settings())
    }

    pub fn with_settings(settings: AgentSettings) -> Self {
        let cluster = MockClusterClient::new();
        let events = MockEventSink::new();
        let executor = RecordingExecutor::new();
        let reconciler = Reconciler::new(
            Arc::new(cluster.clone()),
            Arc::new(events.clone()),
            Arc::new(executor.clone()),
            settings,
        );
        Self {
            cluster,
            events,
            executor,
            reconciler,
        }
    }

    /// Current host record
    pub fn host(&self) -> ByoHost {
        self.cluster.host(NAMESPACE, HOST).expect("host record exists")
    }

    pub fn add_bootstrap_secret(&self, document: &str) {
        self.cluster.add_secret(
            NAMESPACE,
            BOOTSTRAP_SECRET,
            SecretData::from([(well_known::BOOTSTRAP_DATA_KEY.to_string(), document.as_bytes().to_vec())]),
        );
    }

    pub fn add_install_secret(&self) {
        self.cluster.add_secret(
            NAMESPACE,
            INSTALL_SECRET,
            SecretData::from([
                (well_known::INSTALL_SCRIPT_KEY.to_string(), INSTALL_SCRIPT.as_bytes().to_vec()),
                (well_known::UNINSTALL_SCRIPT_KEY.to_string(), UNINSTALL_SCRIPT.as_bytes().to_vec()),
            ]),
        );
    }

    pub fn commands(&self) -> Vec<String> {
        self.executor.commands().into_iter().map(|argv| argv.join(" ")).collect()
    }
}

pub fn settings() -> AgentSettings {
    AgentSettings {
        namespace: NAMESPACE.to_string(),
        host_name: HOST.to_string(),
        ..Default::default()
    }
}

/// Registered host, not claimed
pub fn unclaimed_host() -> ByoHost {
    ByoHost {
        metadata: ObjectMeta {
            name: Some(HOST.to_string()),
            namespace: Some(NAMESPACE.to_string()),
            uid: Some("0b9d6c1e-7a51-4f0e-9d0c-6e1f3f7a2b10".to_string()),
            finalizers: Some(vec![well_known::HOST_FINALIZER.to_string()]),
            ..Default::default()
        },
        spec: ByoHostSpec::default(),
        status: None,
    }
}

/// Host claimed by a machine, with its bootstrap secret referenced
pub fn claimed_host() -> ByoHost {
    let mut host = unclaimed_host();
    host.metadata.labels = Some(BTreeMap::from([(
        well_known::CLUSTER_NAME_LABEL.to_string(),
        "workload-1".to_string(),
    )]));
    host.spec.bootstrap_secret = Some(SecretReference::new(BOOTSTRAP_SECRET));
    host.status = Some(ByoHostStatus {
        machine_ref: Some(ObjectReference::byo_machine("byomachine-1", NAMESPACE)),
        ..Default::default()
    });
    host
}

/// Bootstrapped host with its installation secret referenced
pub fn bootstrapped_host() -> ByoHost {
    let mut host = claimed_host();
    host.spec.installation_secret = Some(SecretReference::new(INSTALL_SECRET));
    conditions::mark_true(&mut host.status_mut().conditions, ConditionType::BootstrapSucceeded).unwrap();
    host
}

/// Host that is bootstrapped and has components installed
pub fn installed_host() -> ByoHost {
    let mut host = claimed_host();
    host.spec.installation_secret = Some(SecretReference::new(INSTALL_SECRET));
    host.spec.uninstallation_secret = Some(SecretReference::with_namespace(
        well_known::uninstall_secret_name(HOST),
        NAMESPACE,
    ));
    let conds = &mut host.status_mut().conditions;
    conditions::mark_true(conds, ConditionType::BootstrapSucceeded).unwrap();
    conditions::mark_true(conds, ConditionType::ComponentsInstalled).unwrap();
    host
}

/// Installed host with the cleanup marker and the cluster annotations set
pub fn detaching_host() -> ByoHost {
    let mut host = installed_host();
    let annotations = host.metadata.annotations.get_or_insert_with(BTreeMap::new);
    for annotation in well_known::HOST_CLEANUP_ANNOTATIONS {
        annotations.insert(annotation.to_string(), "x".to_string());
    }
    host
}

/// Store error that is not a version conflict
pub fn store_outage() -> ClusterError {
    ClusterError::NotFound("store unavailable".to_string())
}

pub fn uninstall_secret() -> SecretData {
    SecretData::from([(well_known::UNINSTALL_SCRIPT_KEY.to_string(), UNINSTALL_SCRIPT.as_bytes().to_vec())])
}

pub fn reason(host: &ByoHost, condition: ConditionType) -> Option<ConditionReason> {
    conditions::get(host.conditions(), condition).map(|c| c.reason)
}
