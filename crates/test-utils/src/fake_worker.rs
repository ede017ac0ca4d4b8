use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;

use dropgate::dag::ScheduledUnit;
use dropgate::deposit::Guidance;
use dropgate::exec::{Worker, WorkerOutput};

/// Scripted behaviour for one drop.
#[derive(Debug, Clone)]
pub enum DropBehaviour {
    /// Succeed immediately with the given artifacts.
    Succeed(Vec<String>),
    /// Fail the first `n` invocations (exercises executor retries), then
    /// succeed.
    FailTimes(u32),
    /// Fail every invocation; retries exhaust into an execution-error
    /// deposit.
    AlwaysFail,
}

/// A fake worker that:
/// - records which drops were "run" (and how often)
/// - resolves each drop according to its scripted [`DropBehaviour`]
///   (default: succeed with no artifacts).
#[derive(Debug, Default)]
pub struct FakeWorker {
    behaviours: Mutex<HashMap<String, DropBehaviour>>,
    attempts: Mutex<HashMap<String, u32>>,
    executed: Mutex<Vec<String>>,
}

impl FakeWorker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_behaviour(&self, unit_id: &str, behaviour: DropBehaviour) {
        self.behaviours
            .lock()
            .unwrap()
            .insert(unit_id.to_string(), behaviour);
    }

    /// Drop ids in invocation order (retries appear as repeats).
    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }

    /// Guidance documents seen per drop are not recorded; tests that care
    /// read the store directly.
    fn resolve(&self, unit_id: &str) -> anyhow::Result<WorkerOutput> {
        let attempt = {
            let mut attempts = self.attempts.lock().unwrap();
            let counter = attempts.entry(unit_id.to_string()).or_insert(0);
            *counter += 1;
            *counter
        };

        let behaviour = self
            .behaviours
            .lock()
            .unwrap()
            .get(unit_id)
            .cloned()
            .unwrap_or(DropBehaviour::Succeed(Vec::new()));

        match behaviour {
            DropBehaviour::Succeed(artifacts) => Ok(WorkerOutput {
                artifacts,
                recommendations: Vec::new(),
            }),
            DropBehaviour::FailTimes(n) if attempt <= n => {
                anyhow::bail!("scripted failure {attempt}/{n} for '{unit_id}'")
            }
            DropBehaviour::FailTimes(_) => Ok(WorkerOutput::default()),
            DropBehaviour::AlwaysFail => {
                anyhow::bail!("scripted permanent failure for '{unit_id}'")
            }
        }
    }
}

impl Worker for FakeWorker {
    fn run_drop<'a>(
        &'a self,
        unit: &'a ScheduledUnit,
        _guidance: Vec<Guidance>,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<WorkerOutput>> + Send + 'a>> {
        Box::pin(async move {
            self.executed.lock().unwrap().push(unit.id.clone());
            self.resolve(&unit.id)
        })
    }
}
