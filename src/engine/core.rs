// src/engine/core.rs

//! Pure core engine state machine.
//!
//! This module contains a synchronous, deterministic core that consumes
//! [`BuildEvent`]s and produces:
//! - updated build/unit state
//! - a list of commands describing what the IO shell should do next
//!
//! The async shell (`engine::runtime::Runtime`) is responsible for reading
//! events from channels, spawning unit executions, and calling the notifier.
//! The core can be unit tested without Tokio, channels, or processes; only
//! the artifact store (interior-mutability, non-blocking in memory) is
//! touched here so that deposit writes stay in the single serialized
//! sequence of state transitions.

use std::collections::VecDeque;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::build::build::{Build, BuildStatus, RiskEntry, RiskSeverity, StatusReport, UnitStateEntry};
use crate::dag::{ScheduledUnit, Scheduler, UnitState};
use crate::deposit::{Deposit, DepositStatus, Guidance};
use crate::engine::{BuildEvent, EngineCommand, EngineStep};
use crate::store::ArtifactStore;
use crate::types::BuildId;

/// Pure core state for one build.
///
/// Owns the scheduler (per-unit states), the build aggregate (status and
/// risk log), and the FIFO dispatch queue that bounds concurrency to
/// `max_parallel`. It has no channels and no Tokio types.
pub struct CoreEngine {
    build: Build,
    scheduler: Scheduler,
    store: Arc<dyn ArtifactStore>,
    /// Ready units waiting for a free execution slot, in arrival order.
    dispatch_queue: VecDeque<ScheduledUnit>,
    in_flight: usize,
    max_parallel: usize,
    /// Set once the halt escalation for the current running phase has fired.
    escalated: bool,
    /// Set on shutdown: stop dispatching, drain in-flight completions, then
    /// exit. In-flight deposits are still recorded.
    shutdown: bool,
}

impl std::fmt::Debug for CoreEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreEngine")
            .field("build", &self.build)
            .field("in_flight", &self.in_flight)
            .field("max_parallel", &self.max_parallel)
            .finish_non_exhaustive()
    }
}

impl CoreEngine {
    pub fn new(
        build: Build,
        scheduler: Scheduler,
        store: Arc<dyn ArtifactStore>,
        max_parallel: usize,
    ) -> Self {
        Self {
            build,
            scheduler,
            store,
            dispatch_queue: VecDeque::new(),
            in_flight: 0,
            max_parallel: max_parallel.max(1),
            escalated: false,
            shutdown: false,
        }
    }

    pub fn build_id(&self) -> &BuildId {
        &self.build.build_id
    }

    pub fn status(&self) -> BuildStatus {
        self.build.status
    }

    /// Coherent snapshot of the build, valid mid-failure.
    pub fn status_report(&self) -> StatusReport {
        StatusReport {
            build_id: self.build.build_id.clone(),
            build_status: self.build.status,
            units: self
                .scheduler
                .unit_states()
                .into_iter()
                .map(|(id, state)| UnitStateEntry { id, state })
                .collect(),
            risk_log: self.build.risk_log.clone(),
        }
    }

    /// Kick off the build: mark root units ready and dispatch the first
    /// batch.
    pub fn start(&mut self) -> EngineStep {
        info!(build = %self.build.build_id, "build started");
        self.shutdown = false;
        let step = self.scheduler.start();
        self.enqueue(step.newly_ready);
        self.finish_step(Vec::new(), step.settled)
    }

    /// Re-enter the loop after a halt, once a human has remediated.
    ///
    /// Failed and blocked units reset to pending; re-running them appends
    /// new deposit versions.
    pub fn resume(&mut self) -> EngineStep {
        info!(build = %self.build.build_id, "resuming halted build");
        self.build.status = BuildStatus::Running;
        self.escalated = false;
        self.shutdown = false;
        let step = self.scheduler.reset_for_resume();
        self.enqueue(step.newly_ready);
        self.finish_step(Vec::new(), step.settled)
    }

    /// Handle a single event, updating core state and returning the
    /// resulting commands for the IO shell.
    pub fn step(&mut self, event: BuildEvent) -> EngineStep {
        match event {
            BuildEvent::UnitCompleted {
                unit,
                deposit,
                guidance,
            } => self.handle_unit_completed(&unit, deposit, guidance),
            BuildEvent::ShutdownRequested => self.handle_shutdown(),
        }
    }

    /// Stop dispatching but keep the loop alive until in-flight units have
    /// reported their deposits. The interrupted build stays `Running`, so it
    /// can be driven again later.
    fn handle_shutdown(&mut self) -> EngineStep {
        info!(
            build = %self.build.build_id,
            in_flight = self.in_flight,
            "shutdown requested; draining in-flight units"
        );
        self.shutdown = true;
        self.dispatch_queue.clear();
        self.scheduler.cancel_ready();
        self.finish_step(Vec::new(), false)
    }

    fn handle_unit_completed(
        &mut self,
        unit: &str,
        mut deposit: Deposit,
        guidance: Option<Guidance>,
    ) -> EngineStep {
        self.in_flight = self.in_flight.saturating_sub(1);

        // Record the deposit unconditionally: even after a halt, a finished
        // unit's output is still useful evidence and is never discarded.
        if let Some(guidance) = guidance {
            match self.store.put_guidance(&self.build.build_id, guidance) {
                Ok(key) => deposit.guidance_ref = Some(key),
                Err(err) => warn!(unit = %unit, error = %err, "failed to store guidance"),
            }
        }
        let status = deposit.status;
        if let Err(err) = self.store.put_deposit(&self.build.build_id, deposit.clone()) {
            warn!(unit = %unit, error = %err, "failed to store deposit");
        }

        let sched_step = self.scheduler.handle_completion(unit, status);

        let mut commands = Vec::new();
        self.record_risks(unit, &deposit, &sched_step.halted_by, &mut commands);

        if self.scheduler.is_halted() || self.shutdown {
            // Stop dispatching units not already running; in-flight ones
            // drain through this same handler.
            self.dispatch_queue.clear();
            if self.shutdown {
                self.scheduler.cancel_ready();
            }
        } else {
            self.enqueue(sched_step.newly_ready);
        }

        let step = self.finish_step(commands, sched_step.settled);
        debug!(
            unit = %unit,
            in_flight = self.in_flight,
            queued = self.dispatch_queue.len(),
            keep_running = step.keep_running,
            "completion processed"
        );
        step
    }

    fn record_risks(
        &mut self,
        unit: &str,
        deposit: &Deposit,
        halted_by: &Option<String>,
        commands: &mut Vec<EngineCommand>,
    ) {
        let concerns: Vec<String> = deposit
            .failed
            .iter()
            .map(|f| format!("{}: {}", f.check, f.remediation))
            .collect();

        match deposit.status {
            DepositStatus::Pass => {}
            DepositStatus::Warn => {
                self.build.record_risk(RiskEntry::new(
                    unit,
                    RiskSeverity::Warning,
                    format!("checkpoint warned; unmet checks: {concerns:?}"),
                ));
            }
            DepositStatus::Fail => {
                if halted_by.is_some() {
                    self.build.status = BuildStatus::Halted;
                    self.build.record_risk(RiskEntry::new(
                        unit,
                        RiskSeverity::Halt,
                        format!("critical checkpoint failed; build halted: {concerns:?}"),
                    ));
                    if !self.escalated {
                        self.escalated = true;
                        commands.push(EngineCommand::Escalate {
                            unit_id: unit.to_string(),
                            concerns,
                        });
                    }
                } else {
                    self.build.record_risk(RiskEntry::new(
                        unit,
                        RiskSeverity::Failure,
                        format!("unit failed; downstream blocked: {concerns:?}"),
                    ));
                }
            }
        }
    }

    fn enqueue(&mut self, ready: Vec<ScheduledUnit>) {
        for unit in ready {
            self.dispatch_queue.push_back(unit);
        }
    }

    /// Drain the dispatch queue into free execution slots, then settle the
    /// build status if nothing can make progress any more.
    fn finish_step(&mut self, mut commands: Vec<EngineCommand>, settled: bool) -> EngineStep {
        let mut dispatch = Vec::new();
        while self.in_flight < self.max_parallel {
            let Some(unit) = self.dispatch_queue.pop_front() else {
                break;
            };
            // A queued unit may have been pulled back to pending by a
            // failing gate since it was enqueued; skip it here.
            if self.scheduler.state_of(&unit.id) != Some(UnitState::Ready) {
                debug!(unit = %unit.id, "queued unit no longer ready; dropping from queue");
                continue;
            }
            self.scheduler.mark_running(&unit.id);
            self.in_flight += 1;
            dispatch.push(unit);
        }
        if !dispatch.is_empty() {
            commands.push(EngineCommand::DispatchUnits(dispatch));
        }

        let mut keep_running = true;
        if settled && self.in_flight == 0 {
            self.finalize_status();
            keep_running = false;
            commands.push(EngineCommand::RequestExit);
        } else if self.shutdown && self.in_flight == 0 {
            info!(build = %self.build.build_id, "shutdown drain complete; exiting");
            keep_running = false;
            commands.push(EngineCommand::RequestExit);
        }

        EngineStep {
            commands,
            keep_running,
        }
    }

    fn finalize_status(&mut self) {
        if self.scheduler.is_halted() {
            self.build.status = BuildStatus::Halted;
        } else if self.scheduler.any_failed() {
            self.build.status = BuildStatus::Failed;
        } else {
            self.build.status = BuildStatus::Completed;
        }
        info!(
            build = %self.build.build_id,
            status = ?self.build.status,
            risks = self.build.risk_log.len(),
            "build settled"
        );
    }
}
