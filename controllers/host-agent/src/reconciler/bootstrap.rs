//! Bootstrap step

use super::{ReconcileOutcome, Reconciler, mark_true, reasons, secret_text, set_condition};
use crate::error::ControllerError;
use crds::{ByoHost, ConditionReason, ConditionType, SecretReference, well_known};
use kube::ResourceExt;
use script_executor::{BootstrapConfig, template};
use tracing::{debug, info};

impl Reconciler {
    /// Run the bootstrap document of a claimed host that has not bootstrapped yet.
    pub(crate) async fn bootstrap(&self, host: &mut ByoHost) -> Result<ReconcileOutcome, ControllerError> {
        let name = host.name_any();

        let Some(secret_ref) = host.spec.bootstrap_secret.clone() else {
            let message = "bootstrap secret is not available yet";
            set_condition(
                host,
                ConditionType::BootstrapSucceeded,
                ConditionReason::BootstrapSecretUnavailable,
                message,
            )?;
            self.warn_event(host, reasons::BOOTSTRAP_FAILED, message).await;
            return Err(ControllerError::BootstrapSecretUnavailable(name));
        };

        if let Err(message) = self.run_bootstrap(&name, &secret_ref).await {
            set_condition(
                host,
                ConditionType::BootstrapSucceeded,
                ConditionReason::BootstrapExecutionFailed,
                &message,
            )?;
            self.warn_event(host, reasons::BOOTSTRAP_FAILED, &message).await;
            return Err(ControllerError::BootstrapFailed(message));
        }

        mark_true(host, ConditionType::BootstrapSucceeded)?;
        self.normal_event(host, reasons::BOOTSTRAP_SUCCEEDED, "k8s node bootstrapped")
            .await;
        Ok(ReconcileOutcome::Requeue)
    }

    async fn run_bootstrap(&self, host_name: &str, secret_ref: &SecretReference) -> Result<(), String> {
        let data = self.fetch_secret(secret_ref).await?;
        let document = secret_text(&data, well_known::BOOTSTRAP_DATA_KEY, &secret_ref.name)?;
        debug!("Read bootstrap secret {} ({} bytes)", secret_ref.name, document.len());

        let rendered = template::render_bootstrap(&document, host_name).map_err(|e| e.to_string())?;
        let config = BootstrapConfig::parse(&rendered).map_err(|e| e.to_string())?;
        config
            .apply(self.executor.as_ref())
            .await
            .map_err(|e| e.to_string())?;
        info!("Bootstrap document from {} applied", secret_ref.name);
        Ok(())
    }
}
