//! Unit tests for the cleanup step

#[cfg(test)]
mod tests {
    use crate::error::ControllerError;
    use crate::reconciler::ReconcileOutcome;
    use crate::reconciler::test_support::*;
    use cluster_client::ClusterClientTrait;
    use crds::{ConditionReason, ConditionStatus, ConditionType, SecretReference, conditions, well_known};
    use kube::ResourceExt;

    fn assert_released(h: &Harness) {
        let host = h.host();
        assert!(host.machine_ref().is_none());
        assert!(host.spec.installation_secret.is_none());
        assert!(host.spec.uninstallation_secret.is_none());
        assert!(!host.labels().contains_key(well_known::CLUSTER_NAME_LABEL));
        for annotation in well_known::HOST_CLEANUP_ANNOTATIONS {
            assert!(!host.annotations().contains_key(annotation), "{annotation} still set");
        }
        for condition in [ConditionType::BootstrapSucceeded, ConditionType::ComponentsInstalled] {
            let c = conditions::get(host.conditions(), condition).unwrap();
            assert_eq!(c.status, ConditionStatus::False);
            assert_eq!(c.reason, ConditionReason::NodeAbsent);
        }
    }

    #[tokio::test]
    async fn test_cleanup_resets_uninstalls_and_clears_state() {
        let h = Harness::new();
        h.cluster.add_host(detaching_host());
        h.cluster.add_secret(NAMESPACE, &well_known::uninstall_secret_name(HOST), uninstall_secret());

        let outcome = h.reconciler.reconcile_host(HOST).await.unwrap();

        assert_eq!(outcome, ReconcileOutcome::Done);
        assert_eq!(
            h.commands(),
            vec![
                "kubeadm reset --force",
                "/bin/sh -c uninstall-bundle --path /var/lib/byoh/bundles",
            ]
        );
        assert_released(&h);
        assert!(h.host().has_finalizer());
        assert_eq!(h.events.reasons(), vec!["ResetK8sNodeSucceeded"]);
    }

    #[tokio::test]
    async fn test_install_then_cleanup_round_trip() {
        let h = Harness::new();
        let mut host = claimed_host();
        host.spec.installation_secret = Some(SecretReference::new(INSTALL_SECRET));
        h.cluster.add_host(host);
        h.add_bootstrap_secret(BOOTSTRAP_DOCUMENT);
        h.add_install_secret();

        assert_eq!(h.reconciler.reconcile_host(HOST).await.unwrap(), ReconcileOutcome::Requeue);
        assert_eq!(h.reconciler.reconcile_host(HOST).await.unwrap(), ReconcileOutcome::Done);
        assert!(h.host().spec.uninstallation_secret.is_some());

        // Detach request
        let mut host = h.host();
        host.annotations_mut()
            .insert(well_known::CLEANUP_ANNOTATION.to_string(), String::new());
        h.cluster.add_host(host);

        h.reconciler.reconcile_host(HOST).await.unwrap();

        assert_released(&h);
        assert_eq!(h.executor.count_commands_containing("kubeadm reset"), 1);
        assert_eq!(h.executor.count_commands_containing("uninstall-bundle"), 1);

        // Released host goes back to waiting for a claim
        h.reconciler.reconcile_host(HOST).await.unwrap();
        assert_eq!(
            reason(&h.host(), ConditionType::BootstrapSucceeded),
            Some(ConditionReason::WaitingForClaim)
        );
        assert_eq!(h.executor.count_commands_containing("kubeadm reset"), 1);
    }

    #[tokio::test]
    async fn test_cleanup_without_components_never_resets() {
        let h = Harness::new();
        let mut host = detaching_host();
        host.status_mut().conditions.clear();
        h.cluster.add_host(host);

        h.reconciler.reconcile_host(HOST).await.unwrap();

        assert!(h.executor.commands().is_empty());
        assert_released(&h);
    }

    #[tokio::test]
    async fn test_missing_uninstallation_secret_is_not_retried() {
        let h = Harness::new();
        let mut host = detaching_host();
        host.spec.uninstallation_secret = None;
        h.cluster.add_host(host);

        let err = h.reconciler.reconcile_host(HOST).await.unwrap_err();

        assert!(matches!(err, ControllerError::UninstallationSecretMissing(_)));
        assert!(!err.is_retryable());
        assert!(h.executor.commands().is_empty());
        assert_eq!(h.events.reasons(), vec!["UninstallationSecretMissing"]);
        assert!(h.host().machine_ref().is_some());
    }

    #[tokio::test]
    async fn test_reset_failure_leaves_conditions_unchanged() {
        let h = Harness::new();
        h.cluster.add_host(detaching_host());
        h.cluster.add_secret(NAMESPACE, &well_known::uninstall_secret_name(HOST), uninstall_secret());
        h.executor.fail_commands_containing("kubeadm reset");
        let before = h.host();

        let err = h.reconciler.reconcile_host(HOST).await.unwrap_err();

        assert!(matches!(err, ControllerError::ResetFailed(_)));
        let after = h.host();
        assert_eq!(after.conditions(), before.conditions());
        assert!(after.is_condition_true(ConditionType::BootstrapSucceeded));
        assert_eq!(h.executor.count_commands_containing("uninstall-bundle"), 0);
        let warnings = h.events.warnings();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].reason, "ResetK8sNodeFailed");
    }

    #[tokio::test]
    async fn test_uninstall_failure_retry_skips_reset() {
        let h = Harness::new();
        h.cluster.add_host(detaching_host());
        h.cluster.add_secret(NAMESPACE, &well_known::uninstall_secret_name(HOST), uninstall_secret());
        h.executor.fail_commands_containing("uninstall-bundle");

        let err = h.reconciler.reconcile_host(HOST).await.unwrap_err();

        assert!(matches!(err, ControllerError::UninstallFailed(_)));
        let host = h.host();
        assert_eq!(
            reason(&host, ConditionType::BootstrapSucceeded),
            Some(ConditionReason::NodeAbsent)
        );
        assert!(host.is_condition_true(ConditionType::ComponentsInstalled));
        assert!(host.machine_ref().is_some());
        assert_eq!(h.events.reasons(), vec!["UninstallScriptFailed"]);

        h.executor.clear_failures();
        h.reconciler.reconcile_host(HOST).await.unwrap();

        assert_eq!(h.executor.count_commands_containing("kubeadm reset"), 1);
        assert_eq!(h.executor.count_commands_containing("uninstall-bundle"), 2);
        assert_released(&h);
    }

    #[tokio::test]
    async fn test_deleted_host_is_cleaned_up_and_finalizer_removed() {
        let h = Harness::new();
        h.cluster.add_host(installed_host());
        h.cluster.add_secret(NAMESPACE, &well_known::uninstall_secret_name(HOST), uninstall_secret());
        h.cluster.delete_host(NAMESPACE, HOST).await.unwrap();

        h.reconciler.reconcile_host(HOST).await.unwrap();

        assert_eq!(h.executor.count_commands_containing("kubeadm reset"), 1);
        assert!(h.cluster.host(NAMESPACE, HOST).is_none());
    }

    #[tokio::test]
    async fn test_deleted_unclaimed_host_only_drops_finalizer() {
        let h = Harness::new();
        h.cluster.add_host(unclaimed_host());
        h.cluster.delete_host(NAMESPACE, HOST).await.unwrap();

        h.reconciler.reconcile_host(HOST).await.unwrap();

        assert!(h.executor.commands().is_empty());
        assert!(h.events.events().is_empty());
        assert!(h.cluster.host(NAMESPACE, HOST).is_none());
    }
}
