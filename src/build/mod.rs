// src/build/mod.rs

//! Build aggregate and public entry points.
//!
//! - [`build`] holds the aggregate root: overall status, risk log, and the
//!   status-report shape exposed to callers.
//! - [`notify`] defines the escalation seam for critical failures.
//! - [`controller`] is the top-level API: submit / run / status / resume.

pub mod build;
pub mod controller;
pub mod notify;

pub use build::{Build, BuildStatus, RiskEntry, RiskSeverity, StatusReport, UnitStateEntry};
pub use controller::BuildController;
pub use notify::{LogNotifier, Notifier};
