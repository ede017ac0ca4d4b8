use std::fmt;

use serde::{Deserialize, Serialize};

/// Canonical unit id type used throughout the engine (e.g. `"D1.1"`, `"C1"`).
pub type UnitId = String;

/// Canonical build id type (e.g. `"build-3"`).
pub type BuildId = String;

/// Whether a build unit produces work or verifies it.
///
/// - `Drop`: an independently schedulable unit of build work, executed by an
///   external worker. Drops validate nothing themselves.
/// - `Checkpoint`: a verification gate that inspects upstream deposits and
///   decides whether its gated units may proceed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitKind {
    Drop,
    Checkpoint,
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitKind::Drop => write!(f, "drop"),
            UnitKind::Checkpoint => write!(f, "checkpoint"),
        }
    }
}

/// Escalation behaviour of a checkpoint on failure.
///
/// - `Critical`: failure halts the whole build and raises an escalation.
/// - `Normal`: failure blocks only the downstream of this checkpoint; sibling
///   branches keep running, with the failure recorded in the risk log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Critical,
    #[default]
    Normal,
}
