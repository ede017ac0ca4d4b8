// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::types::{Priority, UnitKind};

/// Top-level plan as read from a TOML file, before validation.
///
/// ```toml
/// [build]
/// max_parallel = 4
///
/// [unit.D1]
/// kind = "drop"
/// brief = "Design the account schema"
/// cmd = "make schema"
///
/// [unit.C1]
/// kind = "checkpoint"
/// depends_on = ["D1"]
/// gates = ["D2"]
/// priority = "critical"
/// checks = [{ name = "upstream_all_passed", blocking = true }]
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct RawPlanFile {
    /// Global behaviour from `[build]`.
    #[serde(default)]
    pub build: BuildSection,

    /// All units from `[unit.<id>]`. Keys are the unit ids
    /// (e.g. `"D1.1"`, `"C1"`).
    #[serde(default)]
    pub unit: BTreeMap<String, UnitConfig>,
}

/// A plan whose graph has been validated (acyclic, no dangling references,
/// gates only on checkpoints). Constructed via `TryFrom<RawPlanFile>`.
#[derive(Debug, Clone)]
pub struct PlanFile {
    pub build: BuildSection,
    pub unit: BTreeMap<String, UnitConfig>,
}

impl PlanFile {
    /// Wrap already-validated sections. Only `validate` should call this.
    pub(crate) fn new_unchecked(build: BuildSection, unit: BTreeMap<String, UnitConfig>) -> Self {
        Self { build, unit }
    }
}

/// `[build]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct BuildSection {
    /// Maximum number of units executing concurrently.
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,

    /// Warn (never reject) when checkpoints exceed this share of all units.
    #[serde(default = "default_checkpoint_density_warn")]
    pub checkpoint_density_warn: f64,

    /// Retry behaviour for executor-level (infrastructure) failures.
    #[serde(default)]
    pub retry: RetrySection,
}

fn default_max_parallel() -> usize {
    4
}

fn default_checkpoint_density_warn() -> f64 {
    0.5
}

impl Default for BuildSection {
    fn default() -> Self {
        Self {
            max_parallel: default_max_parallel(),
            checkpoint_density_warn: default_checkpoint_density_warn(),
            retry: RetrySection::default(),
        }
    }
}

/// `[build.retry]` section.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RetrySection {
    /// Total attempts before an execution error becomes a failing deposit.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Backoff base; attempt n sleeps `base_delay_ms * 2^(n-1)`.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    250
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

/// `[unit.<id>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct UnitConfig {
    /// `"drop"` or `"checkpoint"`.
    pub kind: UnitKind,

    /// Free-text brief handed to the worker (drops).
    #[serde(default)]
    pub brief: String,

    /// Optional shell command for the bundled command worker.
    #[serde(default)]
    pub cmd: Option<String>,

    /// Units that must reach terminal success before this one may start.
    #[serde(default)]
    pub depends_on: Vec<String>,

    /// Units that must not start until this checkpoint is terminal.
    /// Only checkpoints may hold gates.
    #[serde(default)]
    pub gates: Vec<String>,

    /// `"critical"` halts the build on failure; `"normal"` blocks only the
    /// downstream of this checkpoint.
    #[serde(default)]
    pub priority: Priority,

    /// Ordered verification tasks (checkpoints only). Names resolve against
    /// the check registry at submit time.
    #[serde(default)]
    pub checks: Vec<CheckSpec>,
}

/// One verification task of a checkpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckSpec {
    pub name: String,

    /// Blocking checks fail the checkpoint; non-blocking ones only warn.
    #[serde(default = "default_blocking")]
    pub blocking: bool,
}

fn default_blocking() -> bool {
    true
}
