//! Kubernetes resource watcher.
//!
//! Watches the agent's own ByoHost record with `kube_runtime::Controller`,
//! which serialises reconciliations per object and reconnects on watch
//! errors. Retryable failures requeue with a per-record Fibonacci backoff;
//! the rest wait for the next change to the record.

use crate::error::ControllerError;
use crate::reconciler::{ReconcileOutcome, Reconciler};
use crds::ByoHost;
use futures::StreamExt;
use kube::{Api, ResourceExt};
use kube_runtime::controller::{Action, Config as ControllerConfig};
use kube_runtime::{Controller, watcher};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Delay before the step following a successful one
const REQUEUE_AFTER: Duration = Duration::from_secs(1);

async fn reconcile(host: Arc<ByoHost>, ctx: Arc<Reconciler>) -> Result<Action, ControllerError> {
    debug!("Reconciling ByoHost {}", host.name_any());
    match ctx.reconcile_host(&host.name_any()).await? {
        ReconcileOutcome::Requeue => Ok(Action::requeue(REQUEUE_AFTER)),
        ReconcileOutcome::Done => Ok(Action::await_change()),
    }
}

fn error_policy(host: Arc<ByoHost>, error: &ControllerError, ctx: Arc<Reconciler>) -> Action {
    let resource_key = format!("{}/{}", ctx.settings().namespace, host.name_any());
    if error.is_retryable() {
        let backoff = ctx.backoff_for(&resource_key);
        warn!(
            "Reconciliation of ByoHost {} failed, retrying in {}s: {}",
            resource_key,
            backoff.as_secs(),
            error
        );
        Action::requeue(backoff)
    } else {
        error!(
            "Reconciliation of ByoHost {} failed, waiting for the record to change: {}",
            resource_key, error
        );
        Action::await_change()
    }
}

/// Watch the agent's host record until the controller stream ends.
pub async fn watch_host(api: Api<ByoHost>, reconciler: Arc<Reconciler>) -> Result<(), ControllerError> {
    let host_name = reconciler.settings().host_name.clone();
    info!("Starting ByoHost watcher for {}", host_name);

    let watcher_config = watcher::Config::default().fields(&format!("metadata.name={}", host_name));
    // One record, one reconciliation at a time
    let controller_config = ControllerConfig::default()
        .debounce(Duration::from_secs(1))
        .concurrency(1);

    Controller::new(api, watcher_config)
        .with_config(controller_config)
        .shutdown_on_signal()
        .run(reconcile, error_policy, reconciler)
        .for_each(|res| async move {
            match res {
                Ok((obj, _)) => debug!("Reconciled ByoHost {}", obj.name),
                Err(e) => error!("Controller error for ByoHost: {}", e),
            }
        })
        .await;

    info!("ByoHost watcher for {} stopped", host_name);
    Ok(())
}
