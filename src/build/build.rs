// src/build/build.rs

//! The build aggregate root.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::dag::UnitState;
use crate::types::{BuildId, UnitId};

/// Overall status of a build.
///
/// `Halted` is terminal but resumable: after human remediation the
/// controller's `resume` re-enters the loop. `Failed` means the build ran to
/// exhaustion with at least one failed unit; `Completed` allows warnings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildStatus {
    Running,
    Completed,
    Halted,
    Failed,
}

/// Severity of a risk-log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskSeverity {
    /// A checkpoint warned; downstream proceeded with a flagged risk.
    Warning,
    /// A unit failed; its downstream is blocked but siblings continue.
    Failure,
    /// A critical checkpoint failed and halted the build.
    Halt,
}

/// One entry in the build's risk log. Warnings and later failures are
/// recorded as independent entries; no causal correlation is inferred.
#[derive(Debug, Clone, Serialize)]
pub struct RiskEntry {
    pub unit_id: UnitId,
    pub severity: RiskSeverity,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl RiskEntry {
    pub fn new(unit_id: &str, severity: RiskSeverity, message: String) -> Self {
        Self {
            unit_id: unit_id.to_string(),
            severity,
            message,
            timestamp: Utc::now(),
        }
    }
}

/// Mutable aggregate state of one build. The unit graph and per-unit states
/// live in the scheduler; this carries what the scheduler does not own.
#[derive(Debug)]
pub struct Build {
    pub build_id: BuildId,
    pub status: BuildStatus,
    pub risk_log: Vec<RiskEntry>,
}

impl Build {
    pub fn new(build_id: BuildId) -> Self {
        Self {
            build_id,
            status: BuildStatus::Running,
            risk_log: Vec::new(),
        }
    }

    pub fn record_risk(&mut self, entry: RiskEntry) {
        self.risk_log.push(entry);
    }
}

/// Per-unit line of a status report.
#[derive(Debug, Clone, Serialize)]
pub struct UnitStateEntry {
    pub id: UnitId,
    pub state: UnitState,
}

/// Coherent snapshot returned by the status query, even mid-failure.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub build_id: BuildId,
    pub build_status: BuildStatus,
    pub units: Vec<UnitStateEntry>,
    pub risk_log: Vec<RiskEntry>,
}
