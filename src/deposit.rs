// src/deposit.rs

//! Deposit and Guidance records.
//!
//! A [`Deposit`] is the single authoritative result record emitted by a unit
//! on completion. Deposits are write-once: re-running a unit appends a new
//! version in the artifact store, it never mutates a prior record. The JSON
//! shape produced by serde here is persisted verbatim.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{BuildId, UnitId};

/// Outcome of a unit, as recorded in its deposit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DepositStatus {
    Pass,
    Fail,
    Warn,
}

/// What produced this deposit.
///
/// `ExecutionError` marks an infrastructure failure (worker unreachable,
/// retries exhausted) as opposed to a substantive verification failure; both
/// carry `status = Fail` but callers remediate them differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepositKind {
    Drop,
    Checkpoint,
    ExecutionError,
}

/// One entry in a checkpoint's audit trail: a check that was examined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    pub check: String,
    pub passed: bool,
}

/// An unmet check, with remediation guidance for whoever fixes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedCheck {
    pub check: String,
    pub remediation: String,
}

/// The result record a unit emits on completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deposit {
    pub unit_id: UnitId,
    pub build_id: BuildId,
    pub kind: DepositKind,
    pub status: DepositStatus,
    pub timestamp: DateTime<Utc>,

    /// Ordered audit trail of everything a checkpoint examined.
    /// Empty for drops.
    #[serde(default)]
    pub verified: Vec<CheckResult>,

    /// Checks that did not pass, each with remediation guidance.
    #[serde(default)]
    pub failed: Vec<FailedCheck>,

    /// Store key of the guidance document this checkpoint wrote, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guidance_ref: Option<String>,

    /// Free-text notes consumed by dependent drops.
    #[serde(default)]
    pub recommendations_for_downstream: Vec<String>,

    /// Artifacts reported by the worker (drops only).
    #[serde(default)]
    pub artifacts: Vec<String>,
}

impl Deposit {
    /// A passing drop deposit wrapping the worker's reported artifacts.
    pub fn drop_pass(build_id: &str, unit_id: &str, artifacts: Vec<String>) -> Self {
        Self {
            unit_id: unit_id.to_string(),
            build_id: build_id.to_string(),
            kind: DepositKind::Drop,
            status: DepositStatus::Pass,
            timestamp: Utc::now(),
            verified: Vec::new(),
            failed: Vec::new(),
            guidance_ref: None,
            recommendations_for_downstream: Vec::new(),
            artifacts,
        }
    }

    /// A failing deposit for a unit whose execution itself broke down
    /// (worker unreachable, retries exhausted). The execution error is the
    /// sole failed entry.
    pub fn execution_error(build_id: &str, unit_id: &str, error: &str) -> Self {
        Self {
            unit_id: unit_id.to_string(),
            build_id: build_id.to_string(),
            kind: DepositKind::ExecutionError,
            status: DepositStatus::Fail,
            timestamp: Utc::now(),
            verified: Vec::new(),
            failed: vec![FailedCheck {
                check: "execution".to_string(),
                remediation: error.to_string(),
            }],
            guidance_ref: None,
            recommendations_for_downstream: Vec::new(),
            artifacts: Vec::new(),
        }
    }
}

/// A document written by a passing (or warning) checkpoint to inform
/// downstream drops of decisions, conventions, or edge cases observed
/// upstream. Owned by the checkpoint that created it; read-only to all
/// downstream consumers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Guidance {
    pub checkpoint_id: UnitId,
    pub build_id: BuildId,
    pub summary: String,
    #[serde(default)]
    pub notes: Vec<String>,
    pub timestamp: DateTime<Utc>,
}
