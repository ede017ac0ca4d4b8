// src/exec/checks.rs

//! Named verification checks for checkpoints.
//!
//! Plan files reference checks by name; the names resolve against a
//! [`CheckRegistry`] when a build is submitted, so an unknown name is
//! rejected before anything executes. Each evaluator is a pure predicate
//! over the upstream deposits a checkpoint verifies.

use std::collections::HashMap;
use std::sync::Arc;

use crate::deposit::{Deposit, DepositStatus};
use crate::types::UnitId;

/// Everything an evaluator may inspect.
pub struct CheckContext<'a> {
    pub build_id: &'a str,
    pub checkpoint_id: &'a str,
    /// Latest deposit of each `depends_on` unit that has produced one.
    pub deposits: &'a [Deposit],
    /// Dependencies with no deposit yet. Non-empty only if a dependency was
    /// satisfied by something other than a recorded deposit, which the
    /// scheduler does not allow; builtins still guard against it.
    pub missing: &'a [UnitId],
}

type CheckFn = dyn Fn(&CheckContext<'_>) -> bool + Send + Sync;

/// Registry mapping check names to evaluators.
#[derive(Clone, Default)]
pub struct CheckRegistry {
    evaluators: HashMap<String, Arc<CheckFn>>,
}

impl CheckRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-loaded with the builtin evaluators, so TOML-only plans
    /// work without registering code.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("deposit_present", |ctx| {
            ctx.missing.is_empty() && !ctx.deposits.is_empty()
        });
        registry.register("upstream_all_passed", |ctx| {
            ctx.missing.is_empty()
                && ctx
                    .deposits
                    .iter()
                    .all(|d| d.status == DepositStatus::Pass)
        });
        registry.register("upstream_no_warnings", |ctx| {
            ctx.deposits
                .iter()
                .all(|d| d.status != DepositStatus::Warn)
        });
        registry
    }

    pub fn register(
        &mut self,
        name: &str,
        evaluate: impl Fn(&CheckContext<'_>) -> bool + Send + Sync + 'static,
    ) {
        self.evaluators.insert(name.to_string(), Arc::new(evaluate));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.evaluators.contains_key(name)
    }

    /// Run the named evaluator; `None` if the name is unregistered.
    pub fn evaluate(&self, name: &str, ctx: &CheckContext<'_>) -> Option<bool> {
        self.evaluators.get(name).map(|f| f(ctx))
    }
}

impl std::fmt::Debug for CheckRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.evaluators.keys().collect();
        names.sort();
        f.debug_struct("CheckRegistry").field("checks", &names).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_judge_upstream_deposits() {
        let registry = CheckRegistry::with_builtins();
        let pass = Deposit::drop_pass("build-1", "D1", vec![]);
        let fail = Deposit::execution_error("build-1", "D2", "boom");

        let all_pass = CheckContext {
            build_id: "build-1",
            checkpoint_id: "C1",
            deposits: std::slice::from_ref(&pass),
            missing: &[],
        };
        assert_eq!(registry.evaluate("upstream_all_passed", &all_pass), Some(true));

        let deposits = vec![pass, fail];
        let mixed = CheckContext {
            build_id: "build-1",
            checkpoint_id: "C1",
            deposits: &deposits,
            missing: &[],
        };
        assert_eq!(registry.evaluate("upstream_all_passed", &mixed), Some(false));
        assert_eq!(registry.evaluate("upstream_no_warnings", &mixed), Some(true));
        assert_eq!(registry.evaluate("no_such_check", &mixed), None);
    }
}
