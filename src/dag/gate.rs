// src/dag/gate.rs

//! Gate evaluation: turning a unit's terminal deposit into an eligibility
//! decision for its downstream edges.
//!
//! This is a pure function; the scheduler applies the decision to the graph
//! and the engine records risk entries / escalations.

use crate::deposit::DepositStatus;
use crate::types::{Priority, UnitKind};

/// What a terminal deposit means for the units downstream of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Downstream units become eligible once their other upstreams resolve.
    Unblock,
    /// Downstream proceeds, but the build's risk log records the warning.
    /// Non-critical issues should not stall a build, only be visible.
    UnblockWithRisk,
    /// Transitively downstream units stay blocked; sibling branches continue
    /// and the build stays running. Partial-failure containment.
    BlockDownstream,
    /// The whole build halts: no further dispatch, gated units permanently
    /// blocked, escalation raised. In-flight units still finish.
    Halt,
}

/// Evaluate a terminal deposit against the unit's kind and priority.
///
/// Drops cannot warn and carry no escalation priority, so a failed drop
/// (always an execution error in this design) blocks its downstream like a
/// normal-priority checkpoint failure.
pub fn evaluate(kind: UnitKind, priority: Priority, status: DepositStatus) -> GateDecision {
    match (kind, status) {
        (_, DepositStatus::Pass) => GateDecision::Unblock,
        (UnitKind::Drop, DepositStatus::Warn) => GateDecision::Unblock,
        (UnitKind::Checkpoint, DepositStatus::Warn) => GateDecision::UnblockWithRisk,
        (UnitKind::Drop, DepositStatus::Fail) => GateDecision::BlockDownstream,
        (UnitKind::Checkpoint, DepositStatus::Fail) => match priority {
            Priority::Critical => GateDecision::Halt,
            Priority::Normal => GateDecision::BlockDownstream,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn critical_checkpoint_failure_halts() {
        assert_eq!(
            evaluate(UnitKind::Checkpoint, Priority::Critical, DepositStatus::Fail),
            GateDecision::Halt
        );
    }

    #[test]
    fn normal_checkpoint_failure_blocks_locally() {
        assert_eq!(
            evaluate(UnitKind::Checkpoint, Priority::Normal, DepositStatus::Fail),
            GateDecision::BlockDownstream
        );
    }

    #[test]
    fn warn_unblocks_with_risk() {
        assert_eq!(
            evaluate(UnitKind::Checkpoint, Priority::Critical, DepositStatus::Warn),
            GateDecision::UnblockWithRisk
        );
    }

    #[test]
    fn drop_failure_blocks_downstream_regardless_of_priority() {
        assert_eq!(
            evaluate(UnitKind::Drop, Priority::Critical, DepositStatus::Fail),
            GateDecision::BlockDownstream
        );
    }
}
