#![allow(dead_code)]

use std::collections::BTreeMap;

use dropgate::config::{BuildSection, CheckSpec, PlanFile, RawPlanFile, UnitConfig};
use dropgate::types::{Priority, UnitKind};

/// Builder for [`PlanFile`] to simplify test setup.
pub struct PlanBuilder {
    build: BuildSection,
    unit: BTreeMap<String, UnitConfig>,
}

impl PlanBuilder {
    pub fn new() -> Self {
        Self {
            build: BuildSection::default(),
            unit: BTreeMap::new(),
        }
    }

    pub fn with_unit(mut self, id: &str, unit: UnitConfig) -> Self {
        self.unit.insert(id.to_string(), unit);
        self
    }

    pub fn max_parallel(mut self, n: usize) -> Self {
        self.build.max_parallel = n;
        self
    }

    pub fn retry(mut self, max_attempts: u32, base_delay_ms: u64) -> Self {
        self.build.retry.max_attempts = max_attempts;
        self.build.retry.base_delay_ms = base_delay_ms;
        self
    }

    pub fn build(self) -> PlanFile {
        PlanFile::try_from(self.raw()).expect("Failed to build valid plan from builder")
    }

    /// Raw, unvalidated form for tests exercising validation failures.
    pub fn raw(self) -> RawPlanFile {
        RawPlanFile {
            build: self.build,
            unit: self.unit,
        }
    }
}

impl Default for PlanBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for [`UnitConfig`].
pub struct UnitBuilder {
    unit: UnitConfig,
}

impl UnitBuilder {
    pub fn drop_unit(brief: &str) -> Self {
        Self {
            unit: UnitConfig {
                kind: UnitKind::Drop,
                brief: brief.to_string(),
                cmd: None,
                depends_on: vec![],
                gates: vec![],
                priority: Priority::Normal,
                checks: vec![],
            },
        }
    }

    pub fn checkpoint() -> Self {
        Self {
            unit: UnitConfig {
                kind: UnitKind::Checkpoint,
                brief: String::new(),
                cmd: None,
                depends_on: vec![],
                gates: vec![],
                priority: Priority::Normal,
                checks: vec![],
            },
        }
    }

    pub fn cmd(mut self, cmd: &str) -> Self {
        self.unit.cmd = Some(cmd.to_string());
        self
    }

    pub fn depends_on(mut self, dep: &str) -> Self {
        self.unit.depends_on.push(dep.to_string());
        self
    }

    pub fn gates(mut self, gated: &str) -> Self {
        self.unit.gates.push(gated.to_string());
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.unit.priority = priority;
        self
    }

    pub fn check(mut self, name: &str, blocking: bool) -> Self {
        self.unit.checks.push(CheckSpec {
            name: name.to_string(),
            blocking,
        });
        self
    }

    pub fn build(self) -> UnitConfig {
        self.unit
    }
}
