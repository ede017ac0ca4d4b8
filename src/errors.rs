// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DropgateError {
    #[error("Plan error: {0}")]
    PlanError(String),

    #[error("Invalid graph: {0}")]
    InvalidGraph(String),

    #[error("Duplicate unit id: {0}")]
    DuplicateUnit(String),

    #[error("Cycle detected in unit graph: {0}")]
    GraphCycle(String),

    #[error("Unit '{unit}' references unknown unit '{target}' in `{edge}`")]
    DanglingReference {
        unit: String,
        target: String,
        edge: String,
    },

    #[error("Build not found: {0}")]
    BuildNotFound(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, DropgateError>;
