// src/build/controller.rs

//! Top-level API: submit a build, run it, query status, resume after a halt.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::anyhow;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::build::build::{Build, BuildStatus, StatusReport};
use crate::build::notify::Notifier;
use crate::config::model::PlanFile;
use crate::dag::{Scheduler, UnitGraph};
use crate::engine::{BuildEvent, CoreEngine, Runtime};
use crate::errors::{DropgateError, Result};
use crate::exec::checks::CheckRegistry;
use crate::exec::executor::{RetryPolicy, UnitExecutor};
use crate::exec::worker::Worker;
use crate::store::ArtifactStore;
use crate::types::BuildId;

struct BuildEntry {
    core: CoreEngine,
    retry: RetryPolicy,
}

/// Public entry point for the engine.
///
/// Holds the external collaborators (worker, artifact store, notifier, check
/// registry) and the builds submitted so far. A build runs to settlement
/// inside [`BuildController::run`]; [`BuildController::status`] returns a
/// coherent snapshot between runs, including which checkpoint halted a
/// halted build and its specific failed checks.
pub struct BuildController {
    worker: Arc<dyn Worker>,
    store: Arc<dyn ArtifactStore>,
    notifier: Arc<dyn Notifier>,
    checks: Arc<CheckRegistry>,
    builds: HashMap<BuildId, BuildEntry>,
    build_counter: u64,
}

impl BuildController {
    pub fn new(
        worker: Arc<dyn Worker>,
        store: Arc<dyn ArtifactStore>,
        notifier: Arc<dyn Notifier>,
        checks: CheckRegistry,
    ) -> Self {
        Self {
            worker,
            store,
            notifier,
            checks: Arc::new(checks),
            builds: HashMap::new(),
            build_counter: 0,
        }
    }

    /// Validate the plan's graph and check references, create a build in
    /// `Running` state, and return its id. Nothing executes yet; rejection
    /// happens before any unit is created.
    pub fn submit(&mut self, plan: &PlanFile) -> Result<BuildId> {
        let graph = UnitGraph::from_plan(plan)?;
        self.resolve_check_names(plan)?;

        self.build_counter += 1;
        let build_id: BuildId = format!("build-{}", self.build_counter);

        let scheduler = Scheduler::new(graph);
        let build = Build::new(build_id.clone());
        let core = CoreEngine::new(
            build,
            scheduler,
            Arc::clone(&self.store),
            plan.build.max_parallel,
        );

        info!(
            build = %build_id,
            units = plan.unit.len(),
            max_parallel = plan.build.max_parallel,
            "build submitted"
        );

        self.builds.insert(
            build_id.clone(),
            BuildEntry {
                core,
                retry: RetryPolicy::from(plan.build.retry),
            },
        );
        Ok(build_id)
    }

    /// Every check a checkpoint declares must resolve in the registry;
    /// unknown names are a submission error, not a runtime surprise.
    fn resolve_check_names(&self, plan: &PlanFile) -> Result<()> {
        for (id, unit) in plan.unit.iter() {
            for check in unit.checks.iter() {
                if !self.checks.contains(&check.name) {
                    return Err(DropgateError::InvalidGraph(format!(
                        "checkpoint '{id}' references unknown check '{}'",
                        check.name
                    )));
                }
            }
        }
        Ok(())
    }

    /// Drive a submitted build until it settles (completed, failed, or
    /// halted). Idempotent on terminal builds: returns their status without
    /// re-running anything.
    pub async fn run(&mut self, build_id: &str) -> Result<BuildStatus> {
        let mut entry = self
            .builds
            .remove(build_id)
            .ok_or_else(|| DropgateError::BuildNotFound(build_id.to_string()))?;

        if entry.core.status() != BuildStatus::Running {
            let status = entry.core.status();
            debug!(build = %build_id, ?status, "build already terminal; not re-running");
            self.builds.insert(build_id.to_string(), entry);
            return Ok(status);
        }

        let initial = entry.core.start();
        let core = self.drive(entry.core, entry.retry, initial).await?;
        let status = core.status();
        entry.core = core;
        self.builds.insert(build_id.to_string(), entry);
        Ok(status)
    }

    /// Current build state, per-unit state, and accumulated risk log.
    pub fn status(&self, build_id: &str) -> Result<StatusReport> {
        self.builds
            .get(build_id)
            .map(|entry| entry.core.status_report())
            .ok_or_else(|| DropgateError::BuildNotFound(build_id.to_string()))
    }

    /// For a halted build: re-evaluate gates and re-enter the loop, useful
    /// after a human has supplied remediation. Failed and blocked units
    /// re-run, appending new deposit versions.
    pub async fn resume(&mut self, build_id: &str) -> Result<BuildStatus> {
        let mut entry = self
            .builds
            .remove(build_id)
            .ok_or_else(|| DropgateError::BuildNotFound(build_id.to_string()))?;

        if entry.core.status() != BuildStatus::Halted {
            let status = entry.core.status();
            self.builds.insert(build_id.to_string(), entry);
            return Err(DropgateError::Other(anyhow!(
                "build '{build_id}' is {status:?}, not halted; nothing to resume"
            )));
        }

        let initial = entry.core.resume();
        let core = self.drive(entry.core, entry.retry, initial).await?;
        let status = core.status();
        entry.core = core;
        self.builds.insert(build_id.to_string(), entry);
        Ok(status)
    }

    async fn drive(
        &self,
        core: CoreEngine,
        retry: RetryPolicy,
        initial: crate::engine::EngineStep,
    ) -> Result<CoreEngine> {
        let (event_tx, event_rx) = mpsc::channel::<BuildEvent>(64);

        let executor = Arc::new(UnitExecutor::new(
            Arc::clone(&self.worker),
            Arc::clone(&self.store),
            Arc::clone(&self.checks),
            retry,
        ));

        // Ctrl-C → graceful shutdown: in-flight units finish and their
        // deposits are recorded; nothing new dispatches.
        let ctrl_c = {
            let tx = event_tx.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    let _ = tx.send(BuildEvent::ShutdownRequested).await;
                }
            })
        };

        let runtime = Runtime::new(
            core,
            event_rx,
            event_tx,
            executor,
            Arc::clone(&self.notifier),
        );
        let result = runtime.run(initial).await;
        // The listener must not outlive its run.
        ctrl_c.abort();
        result
    }

    /// All deposit versions recorded for a unit, oldest first.
    pub fn deposit_history(&self, build_id: &str, unit_id: &str) -> Vec<crate::deposit::Deposit> {
        self.store
            .deposit_versions(&build_id.to_string(), &unit_id.to_string())
    }
}
