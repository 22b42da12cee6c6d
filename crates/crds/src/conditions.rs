//! Host record conditions
//!
//! The condition vocabulary is a closed set of (type, reason) pairs. Each pair
//! maps to exactly one status and severity through [`TRANSITIONS`]; callers
//! never pick a status by hand, they pick the reason that explains it.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Condition types tracked on a host record
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConditionType {
    /// The node has been bootstrapped from the bootstrap secret
    BootstrapSucceeded,

    /// Kubernetes components have been installed from the installation secret
    ComponentsInstalled,
}

impl ConditionType {
    /// Reason recorded when this condition becomes True
    pub fn success_reason(self) -> ConditionReason {
        match self {
            Self::BootstrapSucceeded => ConditionReason::BootstrapSucceeded,
            Self::ComponentsInstalled => ConditionReason::ComponentsInstalled,
        }
    }
}

impl std::fmt::Display for ConditionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BootstrapSucceeded => write!(f, "BootstrapSucceeded"),
            Self::ComponentsInstalled => write!(f, "ComponentsInstalled"),
        }
    }
}

/// Machine-readable reasons, carried on every condition including True ones
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash)]
pub enum ConditionReason {
    /// Host is not claimed yet
    WaitingForClaim,
    /// Host is claimed but has no bootstrap secret
    BootstrapSecretUnavailable,
    /// Bootstrap files or commands failed
    BootstrapExecutionFailed,
    /// Bootstrap finished
    BootstrapSucceeded,
    /// Bootstrap finished but no installation secret is set
    InstallationSecretUnavailable,
    /// Install script failed
    InstallationFailed,
    /// Install script finished
    ComponentsInstalled,
    /// Host has left the cluster
    NodeAbsent,
}

impl std::fmt::Display for ConditionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::WaitingForClaim => "WaitingForClaim",
            Self::BootstrapSecretUnavailable => "BootstrapSecretUnavailable",
            Self::BootstrapExecutionFailed => "BootstrapExecutionFailed",
            Self::BootstrapSucceeded => "BootstrapSucceeded",
            Self::InstallationSecretUnavailable => "InstallationSecretUnavailable",
            Self::InstallationFailed => "InstallationFailed",
            Self::ComponentsInstalled => "ComponentsInstalled",
            Self::NodeAbsent => "NodeAbsent",
        };
        f.write_str(s)
    }
}

/// Condition status following Kubernetes conventions
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub enum ConditionStatus {
    /// Condition is true
    True,
    /// Condition is false
    False,
    /// Condition status is unknown
    #[default]
    Unknown,
}

impl std::fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::True => write!(f, "True"),
            Self::False => write!(f, "False"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Severity of a False condition
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub enum ConditionSeverity {
    /// Expected, transient state
    Info,
    /// Degraded but progressing
    Warning,
    /// Failed, needs a retry or an operator
    Error,
}

/// Kubernetes-style condition for status reporting
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition
    #[serde(rename = "type")]
    pub type_: ConditionType,

    /// Status of the condition (True, False, Unknown)
    pub status: ConditionStatus,

    /// Machine-readable reason for the condition
    pub reason: ConditionReason,

    /// Severity, set only on False conditions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<ConditionSeverity>,

    /// Human-readable message
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,

    /// Last time the condition status changed
    pub last_transition_time: DateTime<Utc>,
}

/// One row of the transition table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// Condition the row applies to
    pub condition: ConditionType,
    /// Reason that selects the row
    pub reason: ConditionReason,
    /// Resulting status
    pub status: ConditionStatus,
    /// Resulting severity
    pub severity: Option<ConditionSeverity>,
}

const fn row(
    condition: ConditionType,
    reason: ConditionReason,
    status: ConditionStatus,
    severity: Option<ConditionSeverity>,
) -> Transition {
    Transition { condition, reason, status, severity }
}

/// Every legal (type, reason) pair and the status/severity it implies
pub const TRANSITIONS: &[Transition] = &[
    row(ConditionType::BootstrapSucceeded, ConditionReason::WaitingForClaim, ConditionStatus::False, Some(ConditionSeverity::Info)),
    row(ConditionType::BootstrapSucceeded, ConditionReason::BootstrapSecretUnavailable, ConditionStatus::False, Some(ConditionSeverity::Info)),
    row(ConditionType::BootstrapSucceeded, ConditionReason::BootstrapExecutionFailed, ConditionStatus::False, Some(ConditionSeverity::Error)),
    row(ConditionType::BootstrapSucceeded, ConditionReason::BootstrapSucceeded, ConditionStatus::True, None),
    row(ConditionType::BootstrapSucceeded, ConditionReason::NodeAbsent, ConditionStatus::False, Some(ConditionSeverity::Info)),
    row(ConditionType::ComponentsInstalled, ConditionReason::InstallationSecretUnavailable, ConditionStatus::False, Some(ConditionSeverity::Info)),
    row(ConditionType::ComponentsInstalled, ConditionReason::InstallationFailed, ConditionStatus::False, Some(ConditionSeverity::Error)),
    row(ConditionType::ComponentsInstalled, ConditionReason::ComponentsInstalled, ConditionStatus::True, None),
    row(ConditionType::ComponentsInstalled, ConditionReason::NodeAbsent, ConditionStatus::False, Some(ConditionSeverity::Info)),
];

/// Errors raised by condition helpers
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConditionError {
    /// The reason is not defined for the condition type
    #[error("reason {reason} is not valid for condition {condition}")]
    InvalidTransition {
        /// Condition type requested
        condition: ConditionType,
        /// Reason requested
        reason: ConditionReason,
    },
}

/// Look up the table row for a (type, reason) pair
pub fn transition(condition: ConditionType, reason: ConditionReason) -> Option<&'static Transition> {
    TRANSITIONS
        .iter()
        .find(|t| t.condition == condition && t.reason == reason)
}

/// Get a condition by type
pub fn get(conditions: &[Condition], condition: ConditionType) -> Option<&Condition> {
    conditions.iter().find(|c| c.type_ == condition)
}

/// True if the condition exists and is True
pub fn is_true(conditions: &[Condition], condition: ConditionType) -> bool {
    get(conditions, condition).is_some_and(|c| c.status == ConditionStatus::True)
}

/// True if the condition exists and carries `reason`
pub fn has_reason(conditions: &[Condition], condition: ConditionType, reason: ConditionReason) -> bool {
    get(conditions, condition).is_some_and(|c| c.reason == reason)
}

/// Set a condition from the transition table.
///
/// `lastTransitionTime` moves only when the status flips. The list stays
/// sorted by condition type so serialized status is stable.
pub fn set(
    conditions: &mut Vec<Condition>,
    condition: ConditionType,
    reason: ConditionReason,
    message: impl Into<String>,
) -> Result<(), ConditionError> {
    let row = transition(condition, reason)
        .ok_or(ConditionError::InvalidTransition { condition, reason })?;
    let message = message.into();

    match conditions.iter_mut().find(|c| c.type_ == condition) {
        Some(existing) => {
            if existing.status != row.status {
                existing.last_transition_time = Utc::now();
            }
            existing.status = row.status;
            existing.reason = reason;
            existing.severity = row.severity;
            existing.message = message;
        }
        None => {
            conditions.push(Condition {
                type_: condition,
                status: row.status,
                reason,
                severity: row.severity,
                message,
                last_transition_time: Utc::now(),
            });
            conditions.sort_by_key(|c| c.type_);
        }
    }
    Ok(())
}

/// Mark a condition True with its success reason
pub fn mark_true(conditions: &mut Vec<Condition>, condition: ConditionType) -> Result<(), ConditionError> {
    set(conditions, condition, condition.success_reason(), "")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_type_has_a_true_row() {
        for ct in [ConditionType::BootstrapSucceeded, ConditionType::ComponentsInstalled] {
            let row = transition(ct, ct.success_reason()).map(|r| r.status);
            assert_eq!(row, Some(ConditionStatus::True), "{ct} needs a True row");
        }
    }

    #[test]
    fn test_set_rejects_pair_outside_table() {
        let mut conds = Vec::new();
        let result = set(
            &mut conds,
            ConditionType::ComponentsInstalled,
            ConditionReason::WaitingForClaim,
            "",
        );
        assert_eq!(
            result,
            Err(ConditionError::InvalidTransition {
                condition: ConditionType::ComponentsInstalled,
                reason: ConditionReason::WaitingForClaim,
            })
        );
        assert!(conds.is_empty());
    }

    #[test]
    fn test_set_derives_status_and_severity() {
        let mut conds = Vec::new();
        set(
            &mut conds,
            ConditionType::BootstrapSucceeded,
            ConditionReason::BootstrapExecutionFailed,
            "exit 1",
        )
        .unwrap();

        let c = get(&conds, ConditionType::BootstrapSucceeded).unwrap();
        assert_eq!(c.status, ConditionStatus::False);
        assert_eq!(c.severity, Some(ConditionSeverity::Error));
        assert_eq!(c.message, "exit 1");
    }

    #[test]
    fn test_transition_time_only_moves_on_status_change() {
        let mut conds = Vec::new();
        set(&mut conds, ConditionType::BootstrapSucceeded, ConditionReason::WaitingForClaim, "").unwrap();
        let first = conds[0].last_transition_time;

        // Same status (False), different reason
        set(&mut conds, ConditionType::BootstrapSucceeded, ConditionReason::BootstrapSecretUnavailable, "").unwrap();
        assert_eq!(conds[0].last_transition_time, first);
        assert_eq!(conds[0].reason, ConditionReason::BootstrapSecretUnavailable);

        mark_true(&mut conds, ConditionType::BootstrapSucceeded).unwrap();
        assert!(conds[0].last_transition_time >= first);
        assert!(is_true(&conds, ConditionType::BootstrapSucceeded));
        assert_eq!(conds[0].severity, None);
    }

    #[test]
    fn test_conditions_stay_ordered_by_type() {
        let mut conds = Vec::new();
        mark_true(&mut conds, ConditionType::ComponentsInstalled).unwrap();
        mark_true(&mut conds, ConditionType::BootstrapSucceeded).unwrap();
        let types: Vec<_> = conds.iter().map(|c| c.type_).collect();
        assert_eq!(types, vec![ConditionType::BootstrapSucceeded, ConditionType::ComponentsInstalled]);
    }

    #[test]
    fn test_condition_serializes_with_kubernetes_field_names() {
        let mut conds = Vec::new();
        set(&mut conds, ConditionType::ComponentsInstalled, ConditionReason::NodeAbsent, "").unwrap();
        let json = serde_json::to_value(&conds[0]).unwrap();
        assert_eq!(json["type"], "ComponentsInstalled");
        assert_eq!(json["status"], "False");
        assert_eq!(json["reason"], "NodeAbsent");
        assert_eq!(json["severity"], "Info");
        assert!(json.get("lastTransitionTime").is_some());
        assert!(json.get("message").is_none());
    }
}
