// src/config/mod.rs

//! Build plan files.
//!
//! - [`model`] maps the TOML plan onto serde structs.
//! - [`loader`] reads a plan from disk.
//! - [`validate`] turns a raw plan into a validated one (graph checks run
//!   before anything executes).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path};
pub use model::{BuildSection, CheckSpec, PlanFile, RawPlanFile, RetrySection, UnitConfig};
