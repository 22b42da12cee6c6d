//! Kubernetes-backed cluster client

use crate::cluster_trait::{ClusterClientTrait, SecretData};
use crate::error::{ClusterError, api_error_code};
use crds::{ByoHost, ByoMachine, Machine, MachineDeployment};
use k8s_openapi::ByteString;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::api::{DeleteParams, Patch, PatchParams, PostParams};
use kube::{Api, Client};
use tracing::{debug, info};

/// Field manager used for server-side apply
pub const FIELD_MANAGER: &str = "byoh-hostagent";

/// Cluster client backed by the Kubernetes API
#[derive(Clone)]
pub struct KubeClusterClient {
    client: Client,
}

impl std::fmt::Debug for KubeClusterClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeClusterClient").finish_non_exhaustive()
    }
}

impl KubeClusterClient {
    /// Create a new cluster client from an existing Kubernetes client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Create a cluster client from the ambient configuration
    /// (in-cluster service account or `KUBECONFIG`)
    pub async fn try_default() -> Result<Self, ClusterError> {
        Ok(Self::new(Client::try_default().await?))
    }

    /// Underlying Kubernetes client
    pub fn kube_client(&self) -> Client {
        self.client.clone()
    }

    fn hosts(&self, namespace: &str) -> Api<ByoHost> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait::async_trait]
impl ClusterClientTrait for KubeClusterClient {
    async fn get_host(&self, namespace: &str, name: &str) -> Result<Option<ByoHost>, ClusterError> {
        Ok(self.hosts(namespace).get_opt(name).await?)
    }

    async fn create_host(&self, host: &ByoHost) -> Result<ByoHost, ClusterError> {
        let namespace = host.metadata.namespace.as_deref().unwrap_or("default");
        let created = self.hosts(namespace).create(&PostParams::default(), host).await?;
        info!(
            "Created ByoHost {}/{}",
            namespace,
            created.metadata.name.as_deref().unwrap_or("<unknown>")
        );
        Ok(created)
    }

    async fn patch_host(&self, namespace: &str, name: &str, patch: &serde_json::Value) -> Result<ByoHost, ClusterError> {
        let pp = PatchParams::default();
        Ok(self.hosts(namespace).patch(name, &pp, &Patch::Merge(patch)).await?)
    }

    async fn patch_host_status(&self, namespace: &str, name: &str, patch: &serde_json::Value) -> Result<ByoHost, ClusterError> {
        let pp = PatchParams::default();
        Ok(self.hosts(namespace).patch_status(name, &pp, &Patch::Merge(patch)).await?)
    }

    async fn delete_host(&self, namespace: &str, name: &str) -> Result<(), ClusterError> {
        match self.hosts(namespace).delete(name, &DeleteParams::default()).await {
            Ok(_) => {
                info!("Requested deletion of ByoHost {}/{}", namespace, name);
                Ok(())
            }
            Err(e) if api_error_code(&e) == Some(404) => {
                debug!("ByoHost {}/{} already gone", namespace, name);
                Ok(())
            }
            Err(e) => Err(ClusterError::Kube(e)),
        }
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<SecretData>, ClusterError> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        let secret = api.get_opt(name).await?;
        Ok(secret.map(|s| {
            s.data
                .unwrap_or_default()
                .into_iter()
                .map(|(k, v)| (k, v.0))
                .collect()
        }))
    }

    async fn put_secret(
        &self,
        namespace: &str,
        name: &str,
        data: SecretData,
        owner: Option<OwnerReference>,
    ) -> Result<(), ClusterError> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        let secret = Secret {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                owner_references: owner.map(|o| vec![o]),
                ..Default::default()
            },
            data: Some(data.into_iter().map(|(k, v)| (k, ByteString(v))).collect()),
            type_: Some("Opaque".to_string()),
            ..Default::default()
        };
        let pp = PatchParams::apply(FIELD_MANAGER).force();
        api.patch(name, &pp, &Patch::Apply(&secret)).await?;
        debug!("Applied Secret {}/{}", namespace, name);
        Ok(())
    }

    async fn get_byo_machine(&self, namespace: &str, name: &str) -> Result<Option<ByoMachine>, ClusterError> {
        let api: Api<ByoMachine> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn get_machine(&self, namespace: &str, name: &str) -> Result<Option<Machine>, ClusterError> {
        let api: Api<Machine> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn patch_machine(&self, namespace: &str, name: &str, patch: &serde_json::Value) -> Result<Machine, ClusterError> {
        let api: Api<Machine> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.patch(name, &PatchParams::default(), &Patch::Merge(patch)).await?)
    }

    async fn get_machine_deployment(&self, namespace: &str, name: &str) -> Result<Option<MachineDeployment>, ClusterError> {
        let api: Api<MachineDeployment> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn patch_machine_deployment(
        &self,
        namespace: &str,
        name: &str,
        patch: &serde_json::Value,
    ) -> Result<MachineDeployment, ClusterError> {
        let api: Api<MachineDeployment> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.patch(name, &PatchParams::default(), &Patch::Merge(patch)).await?)
    }
}
