//! Error types for the detach workflow

use cluster_client::ClusterError;
use script_executor::ExecError;
use std::time::Duration;
use thiserror::Error;

/// Workflow errors
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Cluster credential written at onboarding is missing
    #[error("Cluster credential {0} not found; onboard the host again to recreate it")]
    CredentialMissing(String),

    /// Host record does not exist
    #[error("ByoHost {0} not found")]
    HostNotFound(String),

    /// Host record is not claimed by any machine
    #[error("ByoHost {0} is not attached to a cluster")]
    NotAttached(String),

    /// Claim chain could not be resolved
    #[error("Claim not found: {0}")]
    ClaimNotFound(String),

    /// Scaling group could not be resolved or has nothing to remove
    #[error("MachineDeployment not found: {0}")]
    ScalingGroupNotFound(String),

    /// Operator declined removing the last replica
    #[error("Detach of {0} declined")]
    Declined(String),

    /// Host was not released in time
    #[error("ByoHost {host} still claimed after {timeout:?}")]
    ConvergenceTimeout {
        /// Host record, `namespace/name`
        host: String,
        /// Time waited
        timeout: Duration,
    },

    /// Interactive prompt failed
    #[error("Prompt failed: {0}")]
    Prompt(String),

    /// Cluster API error
    #[error("Cluster error: {0}")]
    Cluster(#[from] ClusterError),

    /// Local command failed
    #[error("Local command failed: {0}")]
    Exec(#[from] ExecError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
