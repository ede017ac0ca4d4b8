// src/config/validate.rs

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use tracing::warn;

use crate::config::model::{PlanFile, RawPlanFile};
use crate::errors::{DropgateError, Result};
use crate::types::UnitKind;

impl TryFrom<RawPlanFile> for PlanFile {
    type Error = DropgateError;

    fn try_from(raw: RawPlanFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_plan(&raw)?;
        Ok(PlanFile::new_unchecked(raw.build, raw.unit))
    }
}

fn validate_raw_plan(plan: &RawPlanFile) -> Result<()> {
    ensure_has_units(plan)?;
    validate_build_section(plan)?;
    validate_unit_shapes(plan)?;
    validate_edges(plan)?;
    validate_dag(plan)?;
    lint_checkpoint_density(plan);
    Ok(())
}

fn ensure_has_units(plan: &RawPlanFile) -> Result<()> {
    if plan.unit.is_empty() {
        return Err(DropgateError::PlanError(
            "plan must contain at least one [unit.<id>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_build_section(plan: &RawPlanFile) -> Result<()> {
    if plan.build.max_parallel == 0 {
        return Err(DropgateError::PlanError(
            "[build].max_parallel must be >= 1 (got 0)".to_string(),
        ));
    }
    if plan.build.retry.max_attempts == 0 {
        return Err(DropgateError::PlanError(
            "[build.retry].max_attempts must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

/// Drops validate nothing, so gates and checks belong to checkpoints only.
fn validate_unit_shapes(plan: &RawPlanFile) -> Result<()> {
    for (id, unit) in plan.unit.iter() {
        if unit.kind == UnitKind::Drop {
            if !unit.gates.is_empty() {
                return Err(DropgateError::InvalidGraph(format!(
                    "drop '{id}' declares `gates`; only checkpoints may gate units"
                )));
            }
            if !unit.checks.is_empty() {
                return Err(DropgateError::InvalidGraph(format!(
                    "drop '{id}' declares `checks`; only checkpoints verify"
                )));
            }
        }
    }
    Ok(())
}

fn validate_edges(plan: &RawPlanFile) -> Result<()> {
    for (id, unit) in plan.unit.iter() {
        for (edge, targets) in [("depends_on", &unit.depends_on), ("gates", &unit.gates)] {
            for target in targets {
                if !plan.unit.contains_key(target) {
                    return Err(DropgateError::DanglingReference {
                        unit: id.clone(),
                        target: target.clone(),
                        edge: edge.to_string(),
                    });
                }
                if target == id {
                    return Err(DropgateError::InvalidGraph(format!(
                        "unit '{id}' references itself in `{edge}`"
                    )));
                }
            }
        }
    }
    Ok(())
}

fn validate_dag(plan: &RawPlanFile) -> Result<()> {
    // Build a petgraph graph over the combined edge set.
    //
    // Edge direction: upstream -> downstream. For
    //   [unit.C1]
    //   depends_on = ["D1"]
    //   gates = ["D2"]
    // we add edges D1 -> C1 and C1 -> D2.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for id in plan.unit.keys() {
        graph.add_node(id.as_str());
    }

    for (id, unit) in plan.unit.iter() {
        for dep in unit.depends_on.iter() {
            graph.add_edge(dep.as_str(), id.as_str(), ());
        }
        for gated in unit.gates.iter() {
            graph.add_edge(id.as_str(), gated.as_str(), ());
        }
    }

    // A topological sort will fail if there is a cycle.
    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => {
            let node = cycle.node_id();
            Err(DropgateError::GraphCycle(format!(
                "cycle in the combined depends_on/gates edge set involving unit '{node}'"
            )))
        }
    }
}

/// Planning heuristic, not an invariant: a checkpoint-heavy plan usually
/// means the build should be decomposed differently. Warn, never reject.
fn lint_checkpoint_density(plan: &RawPlanFile) {
    let total = plan.unit.len();
    let checkpoints = plan
        .unit
        .values()
        .filter(|u| u.kind == UnitKind::Checkpoint)
        .count();

    if total > 0 {
        let density = checkpoints as f64 / total as f64;
        if density > plan.build.checkpoint_density_warn {
            warn!(
                checkpoints,
                total,
                threshold = plan.build.checkpoint_density_warn,
                "checkpoint density is high; consider decomposing the build differently"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::model::{BuildSection, UnitConfig};
    use std::collections::BTreeMap;

    fn unit(kind: UnitKind, depends_on: &[&str], gates: &[&str]) -> UnitConfig {
        UnitConfig {
            kind,
            brief: String::new(),
            cmd: None,
            depends_on: depends_on.iter().map(|s| s.to_string()).collect(),
            gates: gates.iter().map(|s| s.to_string()).collect(),
            priority: Default::default(),
            checks: Vec::new(),
        }
    }

    fn plan(units: Vec<(&str, UnitConfig)>) -> RawPlanFile {
        let mut map = BTreeMap::new();
        for (id, u) in units {
            map.insert(id.to_string(), u);
        }
        RawPlanFile {
            build: BuildSection::default(),
            unit: map,
        }
    }

    #[test]
    fn accepts_simple_gated_chain() {
        let raw = plan(vec![
            ("D1", unit(UnitKind::Drop, &[], &[])),
            ("C1", unit(UnitKind::Checkpoint, &["D1"], &["D2"])),
            ("D2", unit(UnitKind::Drop, &[], &[])),
        ]);
        assert!(PlanFile::try_from(raw).is_ok());
    }

    #[test]
    fn rejects_self_dependency() {
        let raw = plan(vec![("D1", unit(UnitKind::Drop, &["D1"], &[]))]);
        let err = PlanFile::try_from(raw).unwrap_err();
        assert!(matches!(err, DropgateError::InvalidGraph(_)));
    }

    #[test]
    fn rejects_dangling_reference() {
        let raw = plan(vec![("D1", unit(UnitKind::Drop, &["ghost"], &[]))]);
        let err = PlanFile::try_from(raw).unwrap_err();
        assert!(matches!(err, DropgateError::DanglingReference { .. }));
    }

    #[test]
    fn rejects_cycle_through_gates() {
        // D1 depends on D2, C1 depends on D1 and gates D2: D2 -> D1 -> C1 -> D2.
        let raw = plan(vec![
            ("D1", unit(UnitKind::Drop, &["D2"], &[])),
            ("C1", unit(UnitKind::Checkpoint, &["D1"], &["D2"])),
            ("D2", unit(UnitKind::Drop, &[], &[])),
        ]);
        let err = PlanFile::try_from(raw).unwrap_err();
        assert!(matches!(err, DropgateError::GraphCycle(_)));
    }

    #[test]
    fn rejects_gates_on_drop() {
        let raw = plan(vec![
            ("D1", unit(UnitKind::Drop, &[], &["D2"])),
            ("D2", unit(UnitKind::Drop, &[], &[])),
        ]);
        let err = PlanFile::try_from(raw).unwrap_err();
        assert!(matches!(err, DropgateError::InvalidGraph(_)));
    }

    #[test]
    fn rejects_empty_plan() {
        let raw = plan(vec![]);
        let err = PlanFile::try_from(raw).unwrap_err();
        assert!(matches!(err, DropgateError::PlanError(_)));
    }
}
