// src/exec/executor.rs

//! Executes exactly one unit and produces its deposit.
//!
//! Infrastructure errors never escape this module: worker failures are
//! retried with exponential backoff and, once retries are exhausted, funnel
//! into a failing deposit with the distinct `ExecutionError` kind. The
//! engine therefore always receives a deposit, never an `Err`.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::config::model::RetrySection;
use crate::dag::ScheduledUnit;
use crate::deposit::{
    CheckResult, Deposit, DepositKind, DepositStatus, FailedCheck, Guidance,
};
use crate::exec::checks::{CheckContext, CheckRegistry};
use crate::exec::worker::Worker;
use crate::store::ArtifactStore;
use crate::types::{BuildId, UnitId, UnitKind};

/// Bounded retry with exponential backoff for worker-level failures.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl From<RetrySection> for RetryPolicy {
    fn from(section: RetrySection) -> Self {
        Self {
            max_attempts: section.max_attempts,
            base_delay: Duration::from_millis(section.base_delay_ms),
        }
    }
}

impl RetryPolicy {
    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        // attempt is 1-based; first retry waits the base delay.
        self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

/// Runs single units: worker invocation for drops, check evaluation for
/// checkpoints. Shared across the engine's spawned executions.
pub struct UnitExecutor {
    worker: Arc<dyn Worker>,
    store: Arc<dyn ArtifactStore>,
    checks: Arc<CheckRegistry>,
    retry: RetryPolicy,
}

impl UnitExecutor {
    pub fn new(
        worker: Arc<dyn Worker>,
        store: Arc<dyn ArtifactStore>,
        checks: Arc<CheckRegistry>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            worker,
            store,
            checks,
            retry,
        }
    }

    /// Execute one unit to a deposit (plus the guidance document a passing
    /// or warning checkpoint writes). Infallible by design; see module docs.
    pub async fn execute(
        &self,
        build_id: &BuildId,
        unit: &ScheduledUnit,
    ) -> (Deposit, Option<Guidance>) {
        match unit.kind {
            UnitKind::Drop => (self.execute_drop(build_id, unit).await, None),
            UnitKind::Checkpoint => self.execute_checkpoint(build_id, unit),
        }
    }

    async fn execute_drop(&self, build_id: &BuildId, unit: &ScheduledUnit) -> Deposit {
        let guidance = self.gather_guidance(build_id, &unit.depends_on);

        let mut last_error = String::new();
        for attempt in 1..=self.retry.max_attempts {
            match self.worker.run_drop(unit, guidance.clone()).await {
                Ok(output) => {
                    info!(
                        unit = %unit.id,
                        attempt,
                        artifacts = output.artifacts.len(),
                        "drop completed"
                    );
                    let mut deposit = Deposit::drop_pass(build_id, &unit.id, output.artifacts);
                    deposit.recommendations_for_downstream = output.recommendations;
                    return deposit;
                }
                Err(err) => {
                    last_error = format!("{err:#}");
                    warn!(
                        unit = %unit.id,
                        attempt,
                        max_attempts = self.retry.max_attempts,
                        error = %last_error,
                        "worker invocation failed"
                    );
                    if attempt < self.retry.max_attempts {
                        let delay = self.retry.delay_for_attempt(attempt);
                        debug!(unit = %unit.id, ?delay, "backing off before retry");
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        warn!(unit = %unit.id, "retries exhausted; recording execution-error deposit");
        Deposit::execution_error(build_id, &unit.id, &last_error)
    }

    fn execute_checkpoint(
        &self,
        build_id: &BuildId,
        unit: &ScheduledUnit,
    ) -> (Deposit, Option<Guidance>) {
        let (deposits, missing) = self.gather_deposits(build_id, &unit.depends_on);

        let mut verified = Vec::new();
        let mut failed = Vec::new();
        let mut blocking_failed = false;

        let ctx = CheckContext {
            build_id,
            checkpoint_id: &unit.id,
            deposits: &deposits,
            missing: &missing,
        };

        for spec in &unit.checks {
            // Names are resolved at submit time; a miss here would mean the
            // registry changed under a running build.
            let passed = self.checks.evaluate(&spec.name, &ctx).unwrap_or_else(|| {
                warn!(check = %spec.name, checkpoint = %unit.id, "no evaluator registered");
                false
            });
            verified.push(CheckResult {
                check: spec.name.clone(),
                passed,
            });
            if !passed {
                blocking_failed |= spec.blocking;
                failed.push(FailedCheck {
                    check: spec.name.clone(),
                    remediation: format!(
                        "check '{}' did not pass; inspect the deposits of {:?} and re-run",
                        spec.name, unit.depends_on
                    ),
                });
            }
        }

        let status = if blocking_failed {
            DepositStatus::Fail
        } else if !failed.is_empty() {
            DepositStatus::Warn
        } else {
            DepositStatus::Pass
        };

        info!(
            checkpoint = %unit.id,
            ?status,
            verified = verified.len(),
            failed = failed.len(),
            "checkpoint evaluated"
        );

        // A passing or warning checkpoint writes guidance summarizing its
        // observations for downstream units.
        let guidance = match status {
            DepositStatus::Pass | DepositStatus::Warn => Some(Guidance {
                checkpoint_id: unit.id.clone(),
                build_id: build_id.clone(),
                summary: format!(
                    "checkpoint '{}' verified {} check(s) over {:?}",
                    unit.id,
                    verified.len(),
                    unit.depends_on
                ),
                notes: failed
                    .iter()
                    .map(|f| format!("non-blocking: {}", f.remediation))
                    .collect(),
                timestamp: Utc::now(),
            }),
            DepositStatus::Fail => None,
        };

        let deposit = Deposit {
            unit_id: unit.id.clone(),
            build_id: build_id.clone(),
            kind: DepositKind::Checkpoint,
            status,
            timestamp: Utc::now(),
            verified,
            failed,
            guidance_ref: None, // filled in by the engine once stored
            recommendations_for_downstream: Vec::new(),
            artifacts: Vec::new(),
        };

        (deposit, guidance)
    }

    /// Latest guidance documents from the checkpoint dependencies of a drop.
    fn gather_guidance(&self, build_id: &BuildId, depends_on: &[UnitId]) -> Vec<Guidance> {
        depends_on
            .iter()
            .filter_map(|dep| self.store.latest_guidance(build_id, dep))
            .collect()
    }

    /// Latest deposits of a checkpoint's dependencies, plus any dependency
    /// that has not produced one.
    fn gather_deposits(
        &self,
        build_id: &BuildId,
        depends_on: &[UnitId],
    ) -> (Vec<Deposit>, Vec<UnitId>) {
        let mut deposits = Vec::new();
        let mut missing = Vec::new();
        for dep in depends_on {
            match self.store.latest_deposit(build_id, dep) {
                Some(d) => deposits.push(d),
                None => missing.push(dep.clone()),
            }
        }
        (deposits, missing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::model::CheckSpec;
    use crate::store::MemoryStore;
    use crate::types::Priority;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FlakyWorker {
        fail_times: u32,
        calls: AtomicU32,
    }

    impl Worker for FlakyWorker {
        fn run_drop<'a>(
            &'a self,
            _unit: &'a ScheduledUnit,
            _guidance: Vec<Guidance>,
        ) -> Pin<Box<dyn Future<Output = anyhow::Result<crate::exec::WorkerOutput>> + Send + 'a>>
        {
            Box::pin(async move {
                let call = self.calls.fetch_add(1, Ordering::SeqCst);
                if call < self.fail_times {
                    anyhow::bail!("worker unreachable (call {call})")
                }
                Ok(crate::exec::WorkerOutput {
                    artifacts: vec!["out.txt".into()],
                    recommendations: vec![],
                })
            })
        }
    }

    fn drop_unit(id: &str) -> ScheduledUnit {
        ScheduledUnit {
            id: id.to_string(),
            kind: UnitKind::Drop,
            brief: String::new(),
            cmd: None,
            depends_on: vec![],
            priority: Priority::Normal,
            checks: vec![],
        }
    }

    fn checkpoint_unit(id: &str, depends_on: &[&str], checks: &[(&str, bool)]) -> ScheduledUnit {
        ScheduledUnit {
            id: id.to_string(),
            kind: UnitKind::Checkpoint,
            brief: String::new(),
            cmd: None,
            depends_on: depends_on.iter().map(|s| s.to_string()).collect(),
            priority: Priority::Normal,
            checks: checks
                .iter()
                .map(|(name, blocking)| CheckSpec {
                    name: name.to_string(),
                    blocking: *blocking,
                })
                .collect(),
        }
    }

    fn executor(worker: Arc<dyn Worker>, store: Arc<MemoryStore>) -> UnitExecutor {
        UnitExecutor::new(
            worker,
            store,
            Arc::new(CheckRegistry::with_builtins()),
            RetryPolicy {
                max_attempts: 3,
                base_delay: Duration::from_millis(1),
            },
        )
    }

    #[tokio::test]
    async fn drop_succeeds_after_transient_failures() {
        let store = Arc::new(MemoryStore::new());
        let worker = Arc::new(FlakyWorker {
            fail_times: 2,
            calls: AtomicU32::new(0),
        });
        let exec = executor(worker.clone(), store);

        let (deposit, guidance) = exec.execute(&"build-1".to_string(), &drop_unit("D1")).await;
        assert_eq!(deposit.status, DepositStatus::Pass);
        assert_eq!(deposit.kind, DepositKind::Drop);
        assert!(guidance.is_none());
        assert_eq!(worker.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retry_exhaustion_yields_execution_error_deposit() {
        let store = Arc::new(MemoryStore::new());
        let worker = Arc::new(FlakyWorker {
            fail_times: 10,
            calls: AtomicU32::new(0),
        });
        let exec = executor(worker, store);

        let (deposit, _) = exec.execute(&"build-1".to_string(), &drop_unit("D1")).await;
        assert_eq!(deposit.kind, DepositKind::ExecutionError);
        assert_eq!(deposit.status, DepositStatus::Fail);
        assert!(deposit.failed[0].remediation.contains("worker unreachable"));
    }

    #[tokio::test]
    async fn checkpoint_warns_on_non_blocking_failure_and_writes_guidance() {
        let store = Arc::new(MemoryStore::new());
        let build = "build-1".to_string();
        store
            .put_deposit(&build, Deposit::drop_pass(&build, "D1", vec![]))
            .unwrap();
        store
            .put_deposit(&build, Deposit::execution_error(&build, "D2", "boom"))
            .unwrap();

        let worker = Arc::new(FlakyWorker {
            fail_times: 0,
            calls: AtomicU32::new(0),
        });
        let exec = executor(worker, store);

        // upstream_all_passed fails (D2 failed) but is non-blocking;
        // upstream_no_warnings passes.
        let unit = checkpoint_unit(
            "C1",
            &["D1", "D2"],
            &[("upstream_all_passed", false), ("upstream_no_warnings", true)],
        );
        let (deposit, guidance) = exec.execute(&build, &unit).await;
        assert_eq!(deposit.status, DepositStatus::Warn);
        assert_eq!(deposit.verified.len(), 2);
        assert_eq!(deposit.failed.len(), 1);
        assert!(guidance.is_some());
    }

    #[tokio::test]
    async fn checkpoint_fails_on_blocking_failure_without_guidance() {
        let store = Arc::new(MemoryStore::new());
        let build = "build-1".to_string();
        store
            .put_deposit(&build, Deposit::execution_error(&build, "D1", "boom"))
            .unwrap();

        let worker = Arc::new(FlakyWorker {
            fail_times: 0,
            calls: AtomicU32::new(0),
        });
        let exec = executor(worker, store);

        let unit = checkpoint_unit("C1", &["D1"], &[("upstream_all_passed", true)]);
        let (deposit, guidance) = exec.execute(&build, &unit).await;
        assert_eq!(deposit.status, DepositStatus::Fail);
        assert_eq!(deposit.kind, DepositKind::Checkpoint);
        assert!(guidance.is_none());
    }
}
