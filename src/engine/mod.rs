// src/engine/mod.rs

//! Orchestration engine.
//!
//! This module ties together:
//! - the unit scheduler and gate evaluation
//! - the artifact store (every deposit write happens in the core step)
//! - the main runtime event loop reacting to unit completions
//!
//! The pure core state machine lives in [`core`]; the async/IO shell is
//! implemented in [`runtime`]. The core is single-threaded by construction:
//! every deposit write and every gate evaluation happens in one logical
//! sequence, so two checkpoints can never race to halt or unblock the same
//! edge.

use crate::dag::ScheduledUnit;
use crate::deposit::{Deposit, Guidance};
use crate::types::UnitId;

/// Events flowing into the engine from executors and callers.
#[derive(Debug)]
pub enum BuildEvent {
    /// A dispatched unit finished and produced its deposit (and, for a
    /// passing/warning checkpoint, a guidance document).
    UnitCompleted {
        unit: UnitId,
        deposit: Deposit,
        guidance: Option<Guidance>,
    },
    /// Graceful shutdown requested (e.g. Ctrl-C).
    ShutdownRequested,
}

/// Command produced by the pure core, to be executed by the outer IO shell.
#[derive(Debug)]
pub enum EngineCommand {
    /// Hand these units to the executor.
    DispatchUnits(Vec<ScheduledUnit>),
    /// Raise an escalation for a critical checkpoint failure. Fired exactly
    /// once per halt transition.
    Escalate {
        unit_id: UnitId,
        concerns: Vec<String>,
    },
    /// The build is terminal; the loop should exit.
    RequestExit,
}

/// Decision returned by the core after handling a single [`BuildEvent`].
#[derive(Debug)]
pub struct EngineStep {
    /// Commands the IO shell should execute (dispatch units, escalate, exit).
    pub commands: Vec<EngineCommand>,
    /// Whether the outer runtime loop should keep running.
    pub keep_running: bool,
}

pub mod core;
pub mod runtime;

pub use core::CoreEngine;
pub use runtime::Runtime;
