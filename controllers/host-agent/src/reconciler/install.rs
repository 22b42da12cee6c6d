//! Installation step
//!
//! The installation secret carries an `install` script and its paired
//! `uninstall` script. After a successful install the uninstall script is
//! copied into a secret owned by the host record so cleanup still works when
//! the installation secret is rotated or removed.
//!
//! `spec.uninstallationSecret` is set as soon as the install script has run.
//! A pass that finds it set while ComponentsInstalled is not True only
//! finishes the bookkeeping: it stores the uninstall secret if missing and
//! marks the condition, without running the install script again.

use super::{Reconciler, mark_true, reasons, secret_text, set_condition};
use crate::error::ControllerError;
use cluster_client::SecretData;
use crds::{ByoHost, ConditionReason, ConditionType, SecretReference, well_known};
use kube::{Resource, ResourceExt};
use script_executor::{shell, template};
use tracing::{info, warn};

impl Reconciler {
    /// Install Kubernetes components on a bootstrapped host.
    pub(crate) async fn install(&self, host: &mut ByoHost) -> Result<(), ControllerError> {
        let name = host.name_any();

        if let Some(uninstall_ref) = host.spec.uninstallation_secret.clone() {
            info!("Install script already ran on ByoHost {}, completing installation", name);
            return self.complete_install(host, &uninstall_ref).await;
        }

        let (install, uninstall) = self.install_scripts(host).await?;

        let rendered = template::render_script(&install, &self.settings.download_path);
        let result = match rendered {
            Ok(script) => self
                .executor
                .run_command(&shell(&script))
                .await
                .map(|_| ())
                .map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        if let Err(message) = result {
            set_condition(
                host,
                ConditionType::ComponentsInstalled,
                ConditionReason::InstallationFailed,
                &message,
            )?;
            self.warn_event(host, reasons::INSTALL_SCRIPT_FAILED, &message).await;
            return Err(ControllerError::InstallationFailed(message));
        }

        let uninstall_ref = SecretReference::with_namespace(
            well_known::uninstall_secret_name(&name),
            self.settings.namespace.as_str(),
        );
        host.spec.uninstallation_secret = Some(uninstall_ref.clone());
        self.store_uninstall_script(host, &uninstall_ref, uninstall).await?;

        mark_true(host, ConditionType::ComponentsInstalled)?;
        self.normal_event(host, reasons::INSTALL_SCRIPT_SUCCEEDED, "install script executed")
            .await;
        info!("Kubernetes components installed on ByoHost {}", name);
        Ok(())
    }

    /// Finish an install whose script ran in an earlier pass.
    async fn complete_install(&self, host: &mut ByoHost, uninstall_ref: &SecretReference) -> Result<(), ControllerError> {
        let namespace = uninstall_ref.namespace_or(&self.settings.namespace);
        // A failed read falls through to a rewrite, which is an idempotent apply
        let stored = matches!(self.cluster.get_secret(namespace, &uninstall_ref.name).await, Ok(Some(_)));
        if !stored {
            let (_, uninstall) = self.install_scripts(host).await?;
            self.store_uninstall_script(host, uninstall_ref, uninstall).await?;
        }

        mark_true(host, ConditionType::ComponentsInstalled)?;
        self.normal_event(host, reasons::INSTALL_SCRIPT_SUCCEEDED, "installation completed")
            .await;
        info!("Kubernetes components installed on ByoHost {}", host.name_any());
        Ok(())
    }

    /// Install and uninstall scripts from the referenced installation secret
    async fn install_scripts(&self, host: &mut ByoHost) -> Result<(String, String), ControllerError> {
        let scripts = match host.spec.installation_secret.clone() {
            None => Err("installation secret is not referenced".to_string()),
            Some(secret_ref) => self.read_install_scripts(&secret_ref).await,
        };
        match scripts {
            Ok(scripts) => Ok(scripts),
            Err(message) => {
                set_condition(
                    host,
                    ConditionType::ComponentsInstalled,
                    ConditionReason::InstallationSecretUnavailable,
                    &message,
                )?;
                self.warn_event(host, reasons::READ_INSTALLATION_SECRET_FAILED, &message)
                    .await;
                Err(ControllerError::InstallationSecretUnavailable(message))
            }
        }
    }

    async fn read_install_scripts(&self, secret_ref: &SecretReference) -> Result<(String, String), String> {
        let data = self.fetch_secret(secret_ref).await?;
        let install = secret_text(&data, well_known::INSTALL_SCRIPT_KEY, &secret_ref.name)?;
        let uninstall = secret_text(&data, well_known::UNINSTALL_SCRIPT_KEY, &secret_ref.name)?;
        Ok((install, uninstall))
    }

    async fn store_uninstall_script(
        &self,
        host: &mut ByoHost,
        uninstall_ref: &SecretReference,
        script: String,
    ) -> Result<(), ControllerError> {
        let namespace = uninstall_ref.namespace_or(&self.settings.namespace).to_string();
        let owner = host.controller_owner_ref(&());
        if owner.is_none() {
            warn!("ByoHost {} has no uid, uninstall secret will not be owned", host.name_any());
        }

        let data = SecretData::from([(well_known::UNINSTALL_SCRIPT_KEY.to_string(), script.into_bytes())]);
        if let Err(e) = self
            .cluster
            .put_secret(&namespace, &uninstall_ref.name, data, owner)
            .await
        {
            let message = format!(
                "failed to store uninstallation secret {}/{}: {}",
                namespace, uninstall_ref.name, e
            );
            set_condition(
                host,
                ConditionType::ComponentsInstalled,
                ConditionReason::InstallationFailed,
                &message,
            )?;
            self.warn_event(host, reasons::STORE_UNINSTALLATION_SECRET_FAILED, &message)
                .await;
            return Err(ControllerError::Cluster(e));
        }
        Ok(())
    }
}
