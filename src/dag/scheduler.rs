// src/dag/scheduler.rs

use std::collections::{HashMap, HashSet};

use tracing::{debug, info, warn};

use crate::dag::gate::{self, GateDecision};
use crate::dag::graph::UnitGraph;
use crate::dag::step::SchedulerStep;
use crate::dag::unit::{ScheduledUnit, UnitState};
use crate::deposit::DepositStatus;
use crate::types::UnitId;

/// Scheduler holds the immutable unit graph plus mutable per-build state.
///
/// It is responsible for:
/// - deciding when a pending unit is ready to run (all upstreams resolved
///   with a progress-permitting outcome)
/// - applying terminal outcomes from deposits
/// - blocking the downstream of failed units
/// - halting the build on a critical checkpoint failure
///
/// The state map is owned exclusively here; every transition happens in a
/// single logical sequence driven by the engine core, so two checkpoints can
/// never race to halt or unblock the same edge.
#[derive(Debug)]
pub struct Scheduler {
    graph: UnitGraph,
    states: HashMap<UnitId, UnitState>,
    /// Units that can never become eligible because an upstream failed.
    /// They stay `Pending` in the public state; this set is what makes the
    /// blockage permanent.
    blocked: HashSet<UnitId>,
    halted: bool,
}

impl Scheduler {
    /// Construct a scheduler over a validated [`UnitGraph`]; every unit
    /// starts out `Pending`.
    pub fn new(graph: UnitGraph) -> Self {
        let states = graph
            .units()
            .map(|id| (id.to_string(), UnitState::Pending))
            .collect();
        Self {
            graph,
            states,
            blocked: HashSet::new(),
            halted: false,
        }
    }

    pub fn graph(&self) -> &UnitGraph {
        &self.graph
    }

    /// Current state of a unit, or `None` if unknown.
    pub fn state_of(&self, id: &str) -> Option<UnitState> {
        self.states.get(id).copied()
    }

    /// Whether the unit is permanently blocked by an upstream failure.
    pub fn is_blocked(&self, id: &str) -> bool {
        self.blocked.contains(id)
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Snapshot of all unit states, sorted by id for stable reporting.
    pub fn unit_states(&self) -> Vec<(UnitId, UnitState)> {
        let mut snapshot: Vec<_> = self
            .states
            .iter()
            .map(|(id, state)| (id.clone(), *state))
            .collect();
        snapshot.sort_by(|a, b| a.0.cmp(&b.0));
        snapshot
    }

    /// Initial step: mark root units ready.
    pub fn start(&mut self) -> SchedulerStep {
        let newly_ready = self.collect_new_ready();
        let settled = self.settled();
        SchedulerStep {
            newly_ready,
            newly_blocked: Vec::new(),
            halted_by: None,
            settled,
        }
    }

    /// Record that a ready unit was handed to the executor.
    pub fn mark_running(&mut self, id: &str) {
        match self.states.get_mut(id) {
            Some(state @ UnitState::Ready) => *state = UnitState::Running,
            Some(state) => warn!(unit = %id, ?state, "mark_running on unit that is not Ready"),
            None => warn!(unit = %id, "mark_running for unknown unit; ignoring"),
        }
    }

    /// Apply a unit's terminal deposit outcome and propagate eligibility
    /// changes through the graph.
    pub fn handle_completion(&mut self, id: &str, status: DepositStatus) -> SchedulerStep {
        let mut step = SchedulerStep::default();

        let Some(info) = self.graph.info(id).cloned() else {
            warn!(unit = %id, "completion for unknown unit; ignoring");
            step.settled = self.settled();
            return step;
        };

        match self.states.get(id) {
            Some(state) if state.is_terminal() => {
                // Deposits are write-once and so are terminal states; a late
                // duplicate completion is dropped here.
                warn!(unit = %id, ?state, "completion for already-terminal unit; ignoring");
                step.settled = self.settled();
                return step;
            }
            None => {
                step.settled = self.settled();
                return step;
            }
            _ => {}
        }

        let terminal = match status {
            DepositStatus::Pass => UnitState::Passed,
            DepositStatus::Warn => UnitState::Warned,
            DepositStatus::Fail => UnitState::Failed,
        };
        self.states.insert(id.to_string(), terminal);
        debug!(unit = %id, ?terminal, "unit reached terminal state");

        match gate::evaluate(info.kind, info.priority, status) {
            GateDecision::Unblock | GateDecision::UnblockWithRisk => {
                if !self.halted {
                    step.newly_ready = self.collect_new_ready();
                }
            }
            GateDecision::BlockDownstream => {
                step.newly_blocked = self.block_downstream_of(id);
                // Sibling branches may still have become ready.
                if !self.halted {
                    step.newly_ready = self.collect_new_ready();
                }
            }
            GateDecision::Halt => {
                info!(checkpoint = %id, "critical checkpoint failed; halting build");
                self.halted = true;
                step.halted_by = Some(id.to_string());
                step.newly_blocked = self.block_downstream_of(id);
                self.cancel_ready();
            }
        }

        step.settled = self.settled();
        step
    }

    /// Whether the build has nothing left that can make progress: no unit
    /// ready or running, and every remaining pending unit permanently
    /// blocked (or the build is halted with all in-flight work drained).
    pub fn settled(&self) -> bool {
        let any_active = self
            .states
            .values()
            .any(|s| matches!(s, UnitState::Ready | UnitState::Running));
        if any_active {
            return false;
        }
        if self.halted {
            return true;
        }
        self.states
            .iter()
            .filter(|(_, s)| matches!(s, UnitState::Pending))
            .all(|(id, _)| self.blocked.contains(id))
    }

    /// Whether any unit ended in `Failed`.
    pub fn any_failed(&self) -> bool {
        self.states.values().any(|s| matches!(s, UnitState::Failed))
    }

    /// Reset failed and blocked units back to `Pending` so a halted build
    /// can re-enter the loop after human remediation. Re-running a unit
    /// appends a new deposit version; nothing terminal is mutated in place
    /// except this explicit reset.
    pub fn reset_for_resume(&mut self) -> SchedulerStep {
        let to_reset: Vec<UnitId> = self
            .states
            .iter()
            .filter(|(id, state)| {
                matches!(state, UnitState::Failed) || self.blocked.contains(*id)
            })
            .map(|(id, _)| id.clone())
            .collect();

        for id in &to_reset {
            self.states.insert(id.clone(), UnitState::Pending);
        }
        self.blocked.clear();
        self.halted = false;

        info!(reset = to_reset.len(), "resuming build; failed and blocked units reset");

        let newly_ready = self.collect_new_ready();
        let settled = self.settled();
        SchedulerStep {
            newly_ready,
            newly_blocked: Vec::new(),
            halted_by: None,
            settled,
        }
    }

    /// Collect units that are `Pending`, not blocked, and whose every
    /// upstream permits progress; mark them `Ready` and return them.
    fn collect_new_ready(&mut self) -> Vec<ScheduledUnit> {
        let candidates: Vec<UnitId> = self
            .states
            .iter()
            .filter(|(id, state)| {
                matches!(state, UnitState::Pending)
                    && !self.blocked.contains(*id)
                    && self.upstream_satisfied(id)
            })
            .map(|(id, _)| id.clone())
            .collect();

        let mut ready = Vec::new();
        for id in candidates {
            if let Some(info) = self.graph.info(&id) {
                debug!(unit = %id, "upstream satisfied; marking Ready");
                ready.push(ScheduledUnit::from_unit_info(info));
                self.states.insert(id, UnitState::Ready);
            }
        }
        // Stable dispatch order among simultaneously-ready units.
        ready.sort_by(|a, b| a.id.cmp(&b.id));
        ready
    }

    /// Every upstream (dependency or gating checkpoint) must be terminal
    /// with a progress-permitting outcome. A single failed gate blocks the
    /// unit no matter what the other gates concluded.
    fn upstream_satisfied(&self, id: &str) -> bool {
        self.graph.upstream_of(id).iter().all(|up| {
            self.states
                .get(up)
                .is_some_and(|state| state.permits_progress())
        })
    }

    /// Mark the transitive downstream of a failed unit as permanently
    /// blocked. Already-terminal units are left alone; ready-but-undispatched
    /// units are pulled back to `Pending`.
    fn block_downstream_of(&mut self, failed: &str) -> Vec<UnitId> {
        let mut stack: Vec<UnitId> = self.graph.downstream_of(failed).to_vec();
        let mut newly_blocked = Vec::new();

        while let Some(id) = stack.pop() {
            if self.blocked.contains(&id) {
                continue;
            }
            match self.states.get(&id) {
                Some(UnitState::Pending) | Some(UnitState::Ready) => {
                    if matches!(self.states.get(&id), Some(UnitState::Ready)) {
                        self.states.insert(id.clone(), UnitState::Pending);
                    }
                    debug!(unit = %id, upstream = %failed, "blocked by upstream failure");
                    self.blocked.insert(id.clone());
                    newly_blocked.push(id.clone());
                    stack.extend(self.graph.downstream_of(&id).iter().cloned());
                }
                // Running units finish and record their deposits; terminal
                // units keep their outcome.
                _ => {}
            }
        }

        newly_blocked.sort();
        newly_blocked
    }

    /// Pull ready-but-undispatched units back to `Pending`. Used on halt and
    /// on shutdown, where nothing queued may still be dispatched.
    pub fn cancel_ready(&mut self) {
        for state in self.states.values_mut() {
            if matches!(state, UnitState::Ready) {
                *state = UnitState::Pending;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::model::UnitConfig;
    use crate::config::model::{BuildSection, PlanFile, RawPlanFile};
    use crate::types::{Priority, UnitKind};
    use std::collections::BTreeMap;

    fn unit(kind: UnitKind, depends_on: &[&str], gates: &[&str], priority: Priority) -> UnitConfig {
        UnitConfig {
            kind,
            brief: String::new(),
            cmd: None,
            depends_on: depends_on.iter().map(|s| s.to_string()).collect(),
            gates: gates.iter().map(|s| s.to_string()).collect(),
            priority,
            checks: Vec::new(),
        }
    }

    /// `D1 → C1 → {D2, D3}`, `D4` independent; C1 priority as given.
    fn diamond(priority: Priority) -> Scheduler {
        let mut units = BTreeMap::new();
        units.insert("D1".into(), unit(UnitKind::Drop, &[], &[], Priority::Normal));
        units.insert(
            "C1".into(),
            unit(UnitKind::Checkpoint, &["D1"], &["D2", "D3"], priority),
        );
        units.insert("D2".into(), unit(UnitKind::Drop, &[], &[], Priority::Normal));
        units.insert("D3".into(), unit(UnitKind::Drop, &[], &[], Priority::Normal));
        units.insert("D4".into(), unit(UnitKind::Drop, &[], &[], Priority::Normal));
        let plan = PlanFile::try_from(RawPlanFile {
            build: BuildSection::default(),
            unit: units,
        })
        .unwrap();
        Scheduler::new(UnitGraph::from_plan(&plan).unwrap())
    }

    fn ids(units: &[ScheduledUnit]) -> Vec<&str> {
        units.iter().map(|u| u.id.as_str()).collect()
    }

    #[test]
    fn roots_become_ready_first() {
        let mut s = diamond(Priority::Critical);
        let step = s.start();
        assert_eq!(ids(&step.newly_ready), vec!["D1", "D4"]);
        assert_eq!(s.state_of("C1"), Some(UnitState::Pending));
    }

    #[test]
    fn checkpoint_ready_after_dependency_passes() {
        let mut s = diamond(Priority::Critical);
        let step = s.start();
        for u in &step.newly_ready {
            s.mark_running(&u.id);
        }
        let step = s.handle_completion("D1", DepositStatus::Pass);
        assert_eq!(ids(&step.newly_ready), vec!["C1"]);
    }

    #[test]
    fn critical_failure_halts_and_blocks_gated_units() {
        let mut s = diamond(Priority::Critical);
        let start = s.start();
        for u in &start.newly_ready {
            s.mark_running(&u.id);
        }
        s.handle_completion("D4", DepositStatus::Pass);
        let step = s.handle_completion("D1", DepositStatus::Pass);
        s.mark_running("C1");
        assert_eq!(ids(&step.newly_ready), vec!["C1"]);

        let step = s.handle_completion("C1", DepositStatus::Fail);
        assert_eq!(step.halted_by.as_deref(), Some("C1"));
        assert_eq!(step.newly_blocked, vec!["D2".to_string(), "D3".to_string()]);
        assert!(s.is_halted());
        assert!(step.settled);
        // Blocked units remain pending permanently.
        assert_eq!(s.state_of("D2"), Some(UnitState::Pending));
        assert!(s.is_blocked("D2"));
        assert_eq!(s.state_of("D4"), Some(UnitState::Passed));
    }

    #[test]
    fn normal_failure_blocks_only_its_downstream() {
        let mut s = diamond(Priority::Normal);
        let start = s.start();
        for u in &start.newly_ready {
            s.mark_running(&u.id);
        }
        let step = s.handle_completion("D1", DepositStatus::Pass);
        s.mark_running("C1");
        assert_eq!(ids(&step.newly_ready), vec!["C1"]);

        let step = s.handle_completion("C1", DepositStatus::Fail);
        assert!(step.halted_by.is_none());
        assert!(!s.is_halted());
        assert_eq!(step.newly_blocked, vec!["D2".to_string(), "D3".to_string()]);
        assert!(!step.settled, "D4 is still running");

        let step = s.handle_completion("D4", DepositStatus::Pass);
        assert!(step.settled);
        assert!(s.any_failed());
    }

    #[test]
    fn warn_unblocks_downstream() {
        let mut s = diamond(Priority::Normal);
        let start = s.start();
        for u in &start.newly_ready {
            s.mark_running(&u.id);
        }
        s.handle_completion("D4", DepositStatus::Pass);
        s.handle_completion("D1", DepositStatus::Pass);
        s.mark_running("C1");

        let step = s.handle_completion("C1", DepositStatus::Warn);
        assert_eq!(ids(&step.newly_ready), vec!["D2", "D3"]);
        assert_eq!(s.state_of("C1"), Some(UnitState::Warned));
    }

    #[test]
    fn critical_fail_tie_break_wins_over_pass() {
        // Two checkpoints gate the same drop: C1 passes, C2 (critical) fails.
        let mut units = BTreeMap::new();
        units.insert(
            "C1".into(),
            unit(UnitKind::Checkpoint, &[], &["D1"], Priority::Normal),
        );
        units.insert(
            "C2".into(),
            unit(UnitKind::Checkpoint, &[], &["D1"], Priority::Critical),
        );
        units.insert("D1".into(), unit(UnitKind::Drop, &[], &[], Priority::Normal));
        let plan = PlanFile::try_from(RawPlanFile {
            build: BuildSection::default(),
            unit: units,
        })
        .unwrap();
        let mut s = Scheduler::new(UnitGraph::from_plan(&plan).unwrap());

        let start = s.start();
        assert_eq!(ids(&start.newly_ready), vec!["C1", "C2"]);
        s.mark_running("C1");
        s.mark_running("C2");

        let step = s.handle_completion("C1", DepositStatus::Pass);
        assert!(step.newly_ready.is_empty(), "D1 still gated by C2");

        let step = s.handle_completion("C2", DepositStatus::Fail);
        assert_eq!(step.halted_by.as_deref(), Some("C2"));
        assert!(s.is_blocked("D1"));
        assert_eq!(s.state_of("D1"), Some(UnitState::Pending));
    }

    #[test]
    fn resume_resets_failed_and_blocked() {
        let mut s = diamond(Priority::Critical);
        let start = s.start();
        for u in &start.newly_ready {
            s.mark_running(&u.id);
        }
        s.handle_completion("D4", DepositStatus::Pass);
        s.handle_completion("D1", DepositStatus::Pass);
        s.mark_running("C1");
        s.handle_completion("C1", DepositStatus::Fail);
        assert!(s.is_halted());

        let step = s.reset_for_resume();
        assert!(!s.is_halted());
        // C1's dependency D1 already passed, so it re-runs immediately.
        assert_eq!(ids(&step.newly_ready), vec!["C1"]);
        assert!(!s.is_blocked("D2"));

        s.mark_running("C1");
        let step = s.handle_completion("C1", DepositStatus::Pass);
        assert_eq!(ids(&step.newly_ready), vec!["D2", "D3"]);
    }
}
