//! Cleanup step: reverse bootstrap and installation when the host is
//! detached or deleted.
//!
//! A node reset that succeeded is recorded as BootstrapSucceeded=NodeAbsent
//! while ComponentsInstalled stays True. A retry after a failed uninstall
//! sees that pair and runs only the uninstall script.

use super::{Reconciler, reasons, secret_text, set_condition};
use crate::error::ControllerError;
use crds::{ByoHost, ConditionReason, ConditionType, conditions, well_known};
use kube::ResourceExt;
use script_executor::{shell, template};
use tracing::{debug, info};

impl Reconciler {
    /// Release the host from its cluster and clear all claim state.
    pub(crate) async fn cleanup(&self, host: &mut ByoHost) -> Result<(), ControllerError> {
        let name = host.name_any();
        info!("Cleaning up ByoHost {}", name);

        if host.is_condition_true(ConditionType::ComponentsInstalled) {
            self.reset_and_uninstall(host).await?;
        } else {
            debug!("Components not installed on ByoHost {}, skipping reset", name);
        }

        host.labels_mut().remove(well_known::CLUSTER_NAME_LABEL);
        let annotations = host.annotations_mut();
        for annotation in well_known::HOST_CLEANUP_ANNOTATIONS {
            annotations.remove(annotation);
        }
        host.status_mut().machine_ref = None;
        host.spec.installation_secret = None;
        host.spec.uninstallation_secret = None;
        set_condition(
            host,
            ConditionType::BootstrapSucceeded,
            ConditionReason::NodeAbsent,
            "node removed from cluster",
        )?;
        set_condition(
            host,
            ConditionType::ComponentsInstalled,
            ConditionReason::NodeAbsent,
            "components uninstalled",
        )?;
        self.normal_event(host, reasons::RESET_SUCCEEDED, "k8s node reset and released")
            .await;
        Ok(())
    }

    async fn reset_and_uninstall(&self, host: &mut ByoHost) -> Result<(), ControllerError> {
        let name = host.name_any();
        let Some(uninstall_ref) = host.spec.uninstallation_secret.clone() else {
            let message = "components are installed but no uninstallation secret is referenced";
            self.warn_event(host, reasons::UNINSTALLATION_SECRET_MISSING, message)
                .await;
            return Err(ControllerError::UninstallationSecretMissing(name));
        };

        let reset_done = conditions::has_reason(
            host.conditions(),
            ConditionType::BootstrapSucceeded,
            ConditionReason::NodeAbsent,
        );
        if reset_done {
            debug!("Node of ByoHost {} already reset", name);
        } else {
            if let Err(e) = self.executor.run_command(&self.settings.reset_command).await {
                let message = e.to_string();
                self.warn_event(host, reasons::RESET_FAILED, &message).await;
                return Err(ControllerError::ResetFailed(message));
            }
            set_condition(
                host,
                ConditionType::BootstrapSucceeded,
                ConditionReason::NodeAbsent,
                "node reset",
            )?;
            info!("Node of ByoHost {} reset", name);
        }

        let result = match self.fetch_secret(&uninstall_ref).await {
            Ok(data) => secret_text(&data, well_known::UNINSTALL_SCRIPT_KEY, &uninstall_ref.name),
            Err(message) => Err(message),
        };
        let result = match result {
            Ok(script) => match template::render_script(&script, &self.settings.download_path) {
                Ok(rendered) => self
                    .executor
                    .run_command(&shell(&rendered))
                    .await
                    .map(|_| ())
                    .map_err(|e| e.to_string()),
                Err(e) => Err(e.to_string()),
            },
            Err(message) => Err(message),
        };
        if let Err(message) = result {
            self.warn_event(host, reasons::UNINSTALL_SCRIPT_FAILED, &message).await;
            return Err(ControllerError::UninstallFailed(message));
        }
        info!("Uninstall script of ByoHost {} executed", name);
        Ok(())
    }
}
