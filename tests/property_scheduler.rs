// tests/property_scheduler.rs

//! Property tests over the pure scheduler: random acyclic plans, random
//! completion orders, random drop failures.
//!
//! Invariants exercised:
//! - a unit is only dispatched once every upstream permits progress
//! - no unit runs twice
//! - the run always settles, with every unit either terminal or
//!   permanently blocked behind a failed ancestor

use proptest::prelude::*;

use dropgate::dag::{Scheduler, UnitGraph, UnitState};
use dropgate::deposit::DepositStatus;
use dropgate_test_utils::builders::{PlanBuilder, UnitBuilder};

/// Lower-triangular adjacency matrix: `edges[j][i]` (for `i < j`) means
/// `Uj` depends on `Ui`. Acyclic by construction.
fn arb_dag() -> impl Strategy<Value = Vec<Vec<bool>>> {
    (2usize..8).prop_flat_map(|n| {
        prop::collection::vec(prop::collection::vec(prop::bool::weighted(0.3), n), n)
    })
}

fn unit_id(i: usize) -> String {
    format!("U{i}")
}

fn plan_from_edges(edges: &[Vec<bool>]) -> dropgate::config::PlanFile {
    let mut builder = PlanBuilder::new();
    for (j, row) in edges.iter().enumerate() {
        let mut unit = UnitBuilder::drop_unit("generated");
        for (i, &edge) in row.iter().enumerate().take(j) {
            if edge {
                unit = unit.depends_on(&unit_id(i));
            }
        }
        builder = builder.with_unit(&unit_id(j), unit.build());
    }
    builder.build()
}

proptest! {
    #[test]
    fn scheduler_settles_with_causal_ordering(
        edges in arb_dag(),
        fail in prop::collection::vec(prop::bool::weighted(0.2), 8),
        choices in prop::collection::vec(any::<prop::sample::Index>(), 16),
    ) {
        let n = edges.len();
        let plan = plan_from_edges(&edges);
        let graph = UnitGraph::from_plan(&plan).unwrap();
        let mut scheduler = Scheduler::new(graph);

        let mut ready: Vec<String> = scheduler
            .start()
            .newly_ready
            .iter()
            .map(|u| u.id.clone())
            .collect();
        let mut completed: Vec<String> = Vec::new();

        while !ready.is_empty() {
            // Bound the loop defensively; n completions is the maximum.
            prop_assert!(completed.len() < n, "scheduler produced too many completions");

            let pick = choices[completed.len() % choices.len()].index(ready.len());
            let id = ready.remove(pick);

            // Causal ordering: everything upstream of a dispatched unit has
            // already resolved with a progress-permitting outcome.
            for up in scheduler.graph().upstream_of(&id) {
                let state = scheduler.state_of(up).unwrap();
                prop_assert!(
                    state.permits_progress(),
                    "unit {id} dispatched while upstream {up} is {state:?}"
                );
            }

            scheduler.mark_running(&id);
            let idx: usize = id[1..].parse().unwrap();
            let status = if fail[idx % fail.len()] {
                DepositStatus::Fail
            } else {
                DepositStatus::Pass
            };
            let step = scheduler.handle_completion(&id, status);
            completed.push(id);

            ready.extend(step.newly_ready.iter().map(|u| u.id.clone()));
            // A queued unit may have been pulled back to pending by a later
            // failure; only still-ready units remain dispatchable.
            ready.retain(|u| scheduler.state_of(u) == Some(UnitState::Ready));
        }

        // No unit ran twice.
        let mut seen = completed.clone();
        seen.sort();
        seen.dedup();
        prop_assert_eq!(seen.len(), completed.len());

        // The run settled: nothing active, and every non-terminal unit is
        // permanently blocked behind a failed or blocked upstream.
        prop_assert!(scheduler.settled());
        for j in 0..n {
            let id = unit_id(j);
            let state = scheduler.state_of(&id).unwrap();
            match state {
                UnitState::Passed | UnitState::Failed => {}
                UnitState::Pending => {
                    prop_assert!(scheduler.is_blocked(&id), "unit {} idle but not blocked", id);
                    let upstream_broken = scheduler.graph().upstream_of(&id).iter().any(|up| {
                        scheduler.state_of(up) == Some(UnitState::Failed)
                            || scheduler.is_blocked(up)
                    });
                    prop_assert!(upstream_broken, "unit {} blocked without a broken upstream", id);
                }
                other => prop_assert!(false, "unexpected final state {:?} for {}", other, id),
            }
        }

        // Conversely, with no failures everything must have completed.
        if completed.len() == n {
            prop_assert!(!scheduler.unit_states().iter().any(|(_, s)| *s == UnitState::Pending));
        }
    }
}
