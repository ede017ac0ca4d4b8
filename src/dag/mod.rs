// src/dag/mod.rs

//! Unit graph and scheduling.
//!
//! - [`graph`] holds the directed acyclic graph of build units.
//! - [`unit`] provides unit metadata, the per-build state machine, and the
//!   dispatch descriptor type.
//! - [`scheduler`] decides which units are ready, applies terminal outcomes,
//!   and propagates blocking/halting through the graph.
//! - [`gate`] translates a checkpoint's deposit into a gate decision.
//! - [`step`] defines the result type for scheduler steps.

pub mod gate;
pub mod graph;
pub mod scheduler;
pub mod step;
pub mod unit;

pub use gate::GateDecision;
pub use graph::UnitGraph;
pub use scheduler::Scheduler;
pub use step::SchedulerStep;
pub use unit::{ScheduledUnit, UnitInfo, UnitState};
