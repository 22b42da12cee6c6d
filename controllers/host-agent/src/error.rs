//! Controller-specific error types.
//!
//! Every reconcile failure maps to one of these variants. The variant decides
//! whether the dispatcher retries with backoff or waits for the next change
//! to the host record.

use cluster_client::ClusterError;
use crds::ConditionError;
use thiserror::Error;

/// Errors that can occur in the host agent.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Object store error
    #[error("Cluster error: {0}")]
    Cluster(#[from] ClusterError),

    /// Condition helper rejected a (type, reason) pair
    #[error("Condition error: {0}")]
    Condition(#[from] ConditionError),

    /// Host record is claimed but has no bootstrap secret yet
    #[error("Bootstrap secret unavailable for {0}")]
    BootstrapSecretUnavailable(String),

    /// Bootstrap secret could not be read, parsed or executed
    #[error("Bootstrap failed: {0}")]
    BootstrapFailed(String),

    /// Installation secret is not referenced or cannot be read
    #[error("Installation secret unavailable: {0}")]
    InstallationSecretUnavailable(String),

    /// Install script failed
    #[error("Installation failed: {0}")]
    InstallationFailed(String),

    /// Components are installed but there is no uninstall script to reverse them
    #[error("Uninstallation secret missing for {0}")]
    UninstallationSecretMissing(String),

    /// Reset command failed
    #[error("Node reset failed: {0}")]
    ResetFailed(String),

    /// Uninstall script failed
    #[error("Uninstall script failed: {0}")]
    UninstallFailed(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ControllerError {
    /// Whether the dispatcher should retry with backoff
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Self::UninstallationSecretMissing(_) | Self::Condition(_) | Self::InvalidConfig(_)
        )
    }
}
