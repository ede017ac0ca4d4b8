// src/dag/unit.rs

//! Unit metadata and the per-build state machine.

use serde::Serialize;

use crate::config::model::{CheckSpec, UnitConfig};
use crate::types::{Priority, UnitId, UnitKind};

/// Per-build state of a unit.
///
/// Transitions: `Pending → Ready → Running → {Passed, Failed, Warned}`.
/// Terminal states are immutable; a unit that must run again (resume) is
/// reset to `Pending`, producing a new deposit version rather than mutating
/// the old one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitState {
    /// Waiting on dependencies (or permanently blocked by a failed gate;
    /// blocked units stay `Pending` and never become eligible).
    Pending,
    /// All upstream units resolved; queued for dispatch.
    Ready,
    /// Dispatched to the executor.
    Running,
    Passed,
    Failed,
    Warned,
}

impl UnitState {
    /// Whether the unit has reached a terminal state.
    pub fn is_terminal(self) -> bool {
        matches!(self, UnitState::Passed | UnitState::Failed | UnitState::Warned)
    }

    /// Whether downstream units may proceed past this state.
    pub fn permits_progress(self) -> bool {
        matches!(self, UnitState::Passed | UnitState::Warned)
    }
}

/// Static unit information derived from the plan.
#[derive(Debug, Clone)]
pub struct UnitInfo {
    pub id: UnitId,
    pub kind: UnitKind,
    pub brief: String,
    pub cmd: Option<String>,
    pub depends_on: Vec<UnitId>,
    pub gates: Vec<UnitId>,
    pub priority: Priority,
    pub checks: Vec<CheckSpec>,
}

impl UnitInfo {
    pub fn from_config(id: UnitId, cfg: &UnitConfig) -> Self {
        Self {
            id,
            kind: cfg.kind,
            brief: cfg.brief.clone(),
            cmd: cfg.cmd.clone(),
            depends_on: cfg.depends_on.clone(),
            gates: cfg.gates.clone(),
            priority: cfg.priority,
            checks: cfg.checks.clone(),
        }
    }
}

/// Description of a unit the scheduler wants the executor to run now.
#[derive(Debug, Clone)]
pub struct ScheduledUnit {
    pub id: UnitId,
    pub kind: UnitKind,
    pub brief: String,
    pub cmd: Option<String>,
    /// Upstream deposits a checkpoint verifies, and the dependencies whose
    /// guidance a drop receives.
    pub depends_on: Vec<UnitId>,
    pub priority: Priority,
    pub checks: Vec<CheckSpec>,
}

impl ScheduledUnit {
    pub fn from_unit_info(info: &UnitInfo) -> Self {
        Self {
            id: info.id.clone(),
            kind: info.kind,
            brief: info.brief.clone(),
            cmd: info.cmd.clone(),
            depends_on: info.depends_on.clone(),
            priority: info.priority,
            checks: info.checks.clone(),
        }
    }
}
