// src/exec/worker.rs

//! Pluggable worker abstraction.
//!
//! The engine never performs a drop's creative work itself; it delegates to
//! a `Worker`. Production uses [`CommandWorker`]; tests provide their own
//! implementation that scripts outcomes without spawning processes.
//!
//! [`CommandWorker`]: crate::exec::command_worker::CommandWorker

use std::future::Future;
use std::pin::Pin;

use crate::dag::ScheduledUnit;
use crate::deposit::Guidance;

/// What a worker reports back for a completed drop.
#[derive(Debug, Clone, Default)]
pub struct WorkerOutput {
    /// Artifacts the worker produced (paths, keys, identifiers).
    pub artifacts: Vec<String>,
    /// Free-text notes for downstream units.
    pub recommendations: Vec<String>,
}

/// Trait abstracting how a drop's work gets done.
///
/// An `Err` from `run_drop` is an infrastructure failure (worker
/// unreachable, crashed); the executor retries it with backoff and, once
/// exhausted, records it as an execution-error deposit. Workers do not
/// report verification verdicts; that is the checkpoints' job.
pub trait Worker: Send + Sync {
    /// Execute the drop described by `unit`, with the guidance documents
    /// written by the checkpoints it depends on.
    fn run_drop<'a>(
        &'a self,
        unit: &'a ScheduledUnit,
        guidance: Vec<Guidance>,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<WorkerOutput>> + Send + 'a>>;
}
