// src/dag/graph.rs

use std::collections::HashMap;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::PlanFile;
use crate::dag::unit::UnitInfo;
use crate::errors::{DropgateError, Result};
use crate::types::{UnitId, UnitKind};

/// Internal node structure: unit info plus adjacency over the combined
/// `depends_on` ∪ `gates` edge set.
#[derive(Debug, Clone)]
struct UnitNode {
    info: UnitInfo,
    /// Direct upstream units: declared dependencies plus any checkpoints
    /// gating this unit. All of them must resolve before this unit may run.
    upstream: Vec<UnitId>,
    /// Direct downstream units over the same combined edge set.
    downstream: Vec<UnitId>,
}

/// In-memory DAG of build units, keyed by unit id.
///
/// `gates` edges are semantically identical to `depends_on` for scheduling;
/// they are kept separate in [`UnitInfo`] because only checkpoints may hold
/// them. The graph is read-only after [`UnitGraph::validate`] succeeds.
#[derive(Debug, Clone, Default)]
pub struct UnitGraph {
    nodes: HashMap<UnitId, UnitNode>,
}

impl UnitGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build and validate a graph from a validated [`PlanFile`].
    pub fn from_plan(plan: &PlanFile) -> Result<Self> {
        let mut graph = Self::new();
        for (id, cfg) in plan.unit.iter() {
            graph.add_unit(UnitInfo::from_config(id.clone(), cfg))?;
        }
        graph.validate()?;
        Ok(graph)
    }

    /// Add a unit to the graph.
    ///
    /// Adjacency is rebuilt lazily by [`UnitGraph::validate`]; callers must
    /// validate before querying edges.
    pub fn add_unit(&mut self, info: UnitInfo) -> Result<()> {
        if self.nodes.contains_key(&info.id) {
            return Err(DropgateError::DuplicateUnit(info.id));
        }
        self.nodes.insert(
            info.id.clone(),
            UnitNode {
                info,
                upstream: Vec::new(),
                downstream: Vec::new(),
            },
        );
        Ok(())
    }

    /// Check edge consistency and acyclicity, then materialize adjacency.
    ///
    /// Fails with `DanglingReference` if any `depends_on`/`gates` edge
    /// targets an unknown unit or the unit itself, `InvalidGraph` if a drop
    /// holds gates, and `GraphCycle` if the combined edge set is cyclic.
    pub fn validate(&mut self) -> Result<()> {
        self.check_references()?;
        self.check_acyclic()?;
        self.link_adjacency();
        Ok(())
    }

    fn check_references(&self) -> Result<()> {
        for node in self.nodes.values() {
            let info = &node.info;
            if info.kind == UnitKind::Drop && !info.gates.is_empty() {
                return Err(DropgateError::InvalidGraph(format!(
                    "drop '{}' declares `gates`; only checkpoints may gate units",
                    info.id
                )));
            }
            for (edge, targets) in [("depends_on", &info.depends_on), ("gates", &info.gates)] {
                for target in targets {
                    if target == &info.id {
                        return Err(DropgateError::InvalidGraph(format!(
                            "unit '{}' references itself in `{edge}`",
                            info.id
                        )));
                    }
                    if !self.nodes.contains_key(target) {
                        return Err(DropgateError::DanglingReference {
                            unit: info.id.clone(),
                            target: target.clone(),
                            edge: edge.to_string(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    fn check_acyclic(&self) -> Result<()> {
        let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

        for id in self.nodes.keys() {
            graph.add_node(id.as_str());
        }
        for node in self.nodes.values() {
            for dep in node.info.depends_on.iter() {
                graph.add_edge(dep.as_str(), node.info.id.as_str(), ());
            }
            for gated in node.info.gates.iter() {
                graph.add_edge(node.info.id.as_str(), gated.as_str(), ());
            }
        }

        match toposort(&graph, None) {
            Ok(_order) => Ok(()),
            Err(cycle) => Err(DropgateError::GraphCycle(format!(
                "cycle in the combined depends_on/gates edge set involving unit '{}'",
                cycle.node_id()
            ))),
        }
    }

    /// Populate `upstream`/`downstream` from the declared edges.
    fn link_adjacency(&mut self) {
        // Collect edges first to avoid borrowing issues while mutating.
        let mut edges: Vec<(UnitId, UnitId)> = Vec::new();
        for node in self.nodes.values() {
            for dep in node.info.depends_on.iter() {
                edges.push((dep.clone(), node.info.id.clone()));
            }
            for gated in node.info.gates.iter() {
                edges.push((node.info.id.clone(), gated.clone()));
            }
        }

        for node in self.nodes.values_mut() {
            node.upstream.clear();
            node.downstream.clear();
        }

        for (up, down) in edges {
            if let Some(node) = self.nodes.get_mut(&down) {
                if !node.upstream.contains(&up) {
                    node.upstream.push(up.clone());
                }
            }
            if let Some(node) = self.nodes.get_mut(&up) {
                if !node.downstream.contains(&down) {
                    node.downstream.push(down);
                }
            }
        }
    }

    /// Return all unit ids.
    pub fn units(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Static info for a unit.
    pub fn info(&self, id: &str) -> Option<&UnitInfo> {
        self.nodes.get(id).map(|n| &n.info)
    }

    /// Direct upstream of a unit: its `depends_on` plus any checkpoints
    /// gating it.
    pub fn upstream_of(&self, id: &str) -> &[UnitId] {
        self.nodes
            .get(id)
            .map(|n| n.upstream.as_slice())
            .unwrap_or(&[])
    }

    /// Direct downstream of a unit over the combined edge set.
    pub fn downstream_of(&self, id: &str) -> &[UnitId] {
        self.nodes
            .get(id)
            .map(|n| n.downstream.as_slice())
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Priority;

    fn info(id: &str, kind: UnitKind, depends_on: &[&str], gates: &[&str]) -> UnitInfo {
        UnitInfo {
            id: id.to_string(),
            kind,
            brief: String::new(),
            cmd: None,
            depends_on: depends_on.iter().map(|s| s.to_string()).collect(),
            gates: gates.iter().map(|s| s.to_string()).collect(),
            priority: Priority::Normal,
            checks: Vec::new(),
        }
    }

    #[test]
    fn duplicate_unit_is_rejected() {
        let mut g = UnitGraph::new();
        g.add_unit(info("D1", UnitKind::Drop, &[], &[])).unwrap();
        let err = g.add_unit(info("D1", UnitKind::Drop, &[], &[])).unwrap_err();
        assert!(matches!(err, DropgateError::DuplicateUnit(id) if id == "D1"));
    }

    #[test]
    fn gates_contribute_to_adjacency() {
        let mut g = UnitGraph::new();
        g.add_unit(info("D1", UnitKind::Drop, &[], &[])).unwrap();
        g.add_unit(info("C1", UnitKind::Checkpoint, &["D1"], &["D2"]))
            .unwrap();
        g.add_unit(info("D2", UnitKind::Drop, &[], &[])).unwrap();
        g.validate().unwrap();

        assert_eq!(g.upstream_of("C1"), &["D1".to_string()]);
        assert_eq!(g.upstream_of("D2"), &["C1".to_string()]);
        assert_eq!(g.downstream_of("C1"), &["D2".to_string()]);
    }

    #[test]
    fn self_gate_cycle_is_rejected() {
        let mut g = UnitGraph::new();
        g.add_unit(info("C1", UnitKind::Checkpoint, &["D2"], &["D2"]))
            .unwrap();
        g.add_unit(info("D2", UnitKind::Drop, &[], &[])).unwrap();
        let err = g.validate().unwrap_err();
        assert!(matches!(err, DropgateError::GraphCycle(_)));
    }
}
