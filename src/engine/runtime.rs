// src/engine/runtime.rs

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::build::notify::Notifier;
use crate::dag::ScheduledUnit;
use crate::engine::core::CoreEngine;
use crate::engine::{BuildEvent, EngineCommand, EngineStep};
use crate::errors::Result;
use crate::exec::executor::UnitExecutor;

/// Drives one build in response to [`BuildEvent`]s and delegates actual unit
/// execution to the [`UnitExecutor`].
///
/// This is a pure IO shell around [`CoreEngine`], which contains all the
/// scheduling semantics. The shell reads events from the channel, spawns
/// unit executions, and fires escalations. Unit execution may suspend on the
/// external worker; it never blocks the core's ability to dispatch other
/// ready units.
pub struct Runtime {
    core: CoreEngine,
    event_rx: mpsc::Receiver<BuildEvent>,
    event_tx: mpsc::Sender<BuildEvent>,
    executor: Arc<UnitExecutor>,
    notifier: Arc<dyn Notifier>,
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .finish_non_exhaustive()
    }
}

impl Runtime {
    pub fn new(
        core: CoreEngine,
        event_rx: mpsc::Receiver<BuildEvent>,
        event_tx: mpsc::Sender<BuildEvent>,
        executor: Arc<UnitExecutor>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            core,
            event_rx,
            event_tx,
            executor,
            notifier,
        }
    }

    /// Main event loop.
    ///
    /// - Executes the commands of `initial` (produced by `CoreEngine::start`
    ///   or `CoreEngine::resume` before the loop takes ownership).
    /// - Consumes [`BuildEvent`]s from the channel, feeds them into the pure
    ///   core, and executes the commands it returns.
    ///
    /// Returns the core (and its final build state) once the build settles.
    pub async fn run(mut self, initial: EngineStep) -> Result<CoreEngine> {
        info!(build = %self.core.build_id(), "runtime started");

        let mut keep_running = initial.keep_running;
        self.execute_commands(initial.commands).await;

        while keep_running {
            let event = match self.event_rx.recv().await {
                Some(e) => e,
                None => {
                    info!("runtime event channel closed; exiting");
                    break;
                }
            };

            debug!(?event, "runtime received event");

            let step = self.core.step(event);
            self.execute_commands(step.commands).await;

            if !step.keep_running {
                info!("core requested exit; stopping runtime");
                keep_running = false;
            }
        }

        info!(build = %self.core.build_id(), status = ?self.core.status(), "runtime exiting");
        Ok(self.core)
    }

    async fn execute_commands(&mut self, commands: Vec<EngineCommand>) {
        for command in commands {
            match command {
                EngineCommand::DispatchUnits(units) => self.spawn_ready(units),
                EngineCommand::Escalate { unit_id, concerns } => {
                    self.notifier
                        .escalate(self.core.build_id(), &unit_id, &concerns);
                }
                EngineCommand::RequestExit => {
                    debug!("core issued RequestExit command");
                }
            }
        }
    }

    /// Spawn one execution task per dispatched unit. Each task produces its
    /// deposit and reports back as a [`BuildEvent::UnitCompleted`].
    fn spawn_ready(&mut self, units: Vec<ScheduledUnit>) {
        if units.is_empty() {
            return;
        }

        let names: Vec<_> = units.iter().map(|u| u.id.clone()).collect();
        debug!(?names, "spawning ready units");

        for unit in units {
            let executor = Arc::clone(&self.executor);
            let tx = self.event_tx.clone();
            let build_id = self.core.build_id().clone();

            tokio::spawn(async move {
                let (deposit, guidance) = executor.execute(&build_id, &unit).await;
                let _ = tx
                    .send(BuildEvent::UnitCompleted {
                        unit: unit.id.clone(),
                        deposit,
                        guidance,
                    })
                    .await;
            });
        }
    }
}
