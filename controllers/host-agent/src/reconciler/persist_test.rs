//! Unit tests for writing reconcile results under concurrent and failed writes

#[cfg(test)]
mod tests {
    use crate::error::ControllerError;
    use crate::reconciler::ReconcileOutcome;
    use crate::reconciler::test_support::*;
    use cluster_client::ClusterError;
    use crds::{ConditionReason, ConditionType, ObjectReference, well_known};
    use serde_json::json;

    #[tokio::test]
    async fn test_claim_bound_during_pass_is_kept() {
        let h = Harness::new();
        h.cluster.add_host(unclaimed_host());
        h.cluster.after_next_host_read(|store| {
            store.write_host_as_other(
                NAMESPACE,
                HOST,
                &json!({ "status": { "machineRef": ObjectReference::byo_machine("claim-x", NAMESPACE) } }),
            );
        });

        let err = h.reconciler.reconcile_host(HOST).await.unwrap_err();

        assert!(matches!(err, ControllerError::Cluster(ref e) if e.is_conflict()));
        assert!(err.is_retryable());
        assert_eq!(h.host().machine_ref().map(|r| r.name.as_str()), Some("claim-x"));
    }

    #[tokio::test]
    async fn test_unrelated_concurrent_change_is_written_at_fresh_version() {
        let h = Harness::new();
        h.cluster.add_host(claimed_host());
        h.add_bootstrap_secret(BOOTSTRAP_DOCUMENT);
        h.cluster.after_next_host_read(|store| {
            store.write_host_as_other(
                NAMESPACE,
                HOST,
                &json!({ "metadata": { "annotations": { well_known::ENDPOINT_IP_ANNOTATION: "10.0.0.5" } } }),
            );
        });

        let outcome = h.reconciler.reconcile_host(HOST).await.unwrap();

        assert_eq!(outcome, ReconcileOutcome::Requeue);
        let host = h.host();
        assert!(host.is_condition_true(ConditionType::BootstrapSucceeded));
        assert_eq!(
            host.metadata.annotations.unwrap().get(well_known::ENDPOINT_IP_ANNOTATION).map(String::as_str),
            Some("10.0.0.5")
        );
        assert_eq!(h.executor.count_commands_containing("kubeadm join"), 1);
    }

    #[tokio::test]
    async fn test_conflict_on_first_write_is_retried() {
        let h = Harness::new();
        h.cluster.add_host(bootstrapped_host());
        h.add_install_secret();
        h.cluster.fail_next("patch_host", ClusterError::Conflict("stale".to_string()));

        h.reconciler.reconcile_host(HOST).await.unwrap();

        let host = h.host();
        assert!(host.is_condition_true(ConditionType::ComponentsInstalled));
        assert!(host.spec.uninstallation_secret.is_some());
    }

    #[tokio::test]
    async fn test_failed_spec_write_never_reports_installed_without_uninstall_ref() {
        let h = Harness::new();
        h.cluster.add_host(bootstrapped_host());
        h.add_install_secret();
        h.cluster.fail_next("patch_host", store_outage());

        let err = h.reconciler.reconcile_host(HOST).await.unwrap_err();
        assert!(err.is_retryable());
        let host = h.host();
        assert!(!host.is_condition_true(ConditionType::ComponentsInstalled));
        assert!(host.spec.uninstallation_secret.is_none());

        h.reconciler.reconcile_host(HOST).await.unwrap();
        let host = h.host();
        assert!(host.is_condition_true(ConditionType::ComponentsInstalled));
        assert!(host.spec.uninstallation_secret.is_some());

        // Detaching afterwards runs the full cleanup
        h.cluster.write_host_as_other(
            NAMESPACE,
            HOST,
            &json!({ "metadata": { "annotations": { well_known::CLEANUP_ANNOTATION: "" } } }),
        );
        h.reconciler.reconcile_host(HOST).await.unwrap();
        let host = h.host();
        assert!(host.machine_ref().is_none());
        assert_eq!(reason(&host, ConditionType::ComponentsInstalled), Some(ConditionReason::NodeAbsent));
        assert_eq!(h.executor.count_commands_containing("uninstall-bundle"), 1);
    }

    #[tokio::test]
    async fn test_failed_status_write_completes_without_reinstall() {
        let h = Harness::new();
        h.cluster.add_host(bootstrapped_host());
        h.add_install_secret();
        h.cluster.fail_next("patch_host_status", store_outage());

        h.reconciler.reconcile_host(HOST).await.unwrap_err();
        let host = h.host();
        assert!(host.spec.uninstallation_secret.is_some());
        assert!(!host.is_condition_true(ConditionType::ComponentsInstalled));

        h.reconciler.reconcile_host(HOST).await.unwrap();

        assert!(h.host().is_condition_true(ConditionType::ComponentsInstalled));
        assert_eq!(h.executor.count_commands_containing("install-bundle"), 1);
    }

    #[tokio::test]
    async fn test_uninstall_secret_write_failure_is_reported_and_resumed() {
        let h = Harness::new();
        h.cluster.add_host(bootstrapped_host());
        h.add_install_secret();
        h.cluster.fail_next("put_secret", store_outage());

        let err = h.reconciler.reconcile_host(HOST).await.unwrap_err();

        assert!(matches!(err, ControllerError::Cluster(_)));
        assert_eq!(h.events.reasons(), vec!["StoreUninstallationSecretFailed"]);
        let host = h.host();
        assert_eq!(
            reason(&host, ConditionType::ComponentsInstalled),
            Some(ConditionReason::InstallationFailed)
        );
        assert!(host.spec.uninstallation_secret.is_some());
        let uninstall_name = well_known::uninstall_secret_name(HOST);
        assert!(h.cluster.secret(NAMESPACE, &uninstall_name).is_none());

        h.reconciler.reconcile_host(HOST).await.unwrap();

        assert!(h.host().is_condition_true(ConditionType::ComponentsInstalled));
        assert_eq!(h.cluster.secret(NAMESPACE, &uninstall_name).unwrap().data, uninstall_secret());
        assert_eq!(h.executor.count_commands_containing("install-bundle"), 1);
        assert_eq!(
            h.events.reasons(),
            vec!["StoreUninstallationSecretFailed", "InstallScriptExecutionSucceeded"]
        );
    }
}
