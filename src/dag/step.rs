// src/dag/step.rs

//! Step-by-step execution result types for the scheduler.

use crate::dag::unit::ScheduledUnit;
use crate::types::UnitId;

/// Structured result of a single scheduler "step".
///
/// This is useful for tests that want to manually step the build and make
/// assertions about what changed.
#[derive(Debug, Clone, Default)]
pub struct SchedulerStep {
    /// Units that became ready to run as a result of this step.
    pub newly_ready: Vec<ScheduledUnit>,
    /// Units newly blocked by an upstream failure in this step.
    pub newly_blocked: Vec<UnitId>,
    /// Set when a critical checkpoint failure halted the build in this step;
    /// carries the checkpoint's id.
    pub halted_by: Option<UnitId>,
    /// Whether this step left the build settled: nothing ready or running,
    /// and every remaining pending unit permanently blocked.
    pub settled: bool,
}
