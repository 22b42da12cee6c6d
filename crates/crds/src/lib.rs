//! BYOH CRD Definitions
//!
//! Kubernetes Custom Resource Definitions and shared vocabulary for the
//! bring-your-own-host agent and operator tooling.

pub mod byo_host;
pub mod claim;
pub mod conditions;
pub mod references;
pub mod well_known;

pub use byo_host::*;
pub use claim::*;
pub use conditions::{
    Condition, ConditionError, ConditionReason, ConditionSeverity, ConditionStatus, ConditionType,
};
pub use references::*;

/// API version of the infrastructure provider resources
pub const INFRASTRUCTURE_API_VERSION: &str = "infrastructure.cluster.x-k8s.io/v1beta1";
