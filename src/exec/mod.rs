// src/exec/mod.rs

//! Unit execution layer.
//!
//! This module is responsible for producing exactly one [`Deposit`] per
//! dispatched unit and reporting back to the engine:
//!
//! - [`worker`] defines the `Worker` trait, the seam to the external
//!   collaborator that does a drop's actual creative work. Tests swap in a
//!   fake implementation.
//! - [`command_worker`] is the bundled production worker that runs a drop's
//!   configured shell command.
//! - [`checks`] holds the named registry of checkpoint verification
//!   evaluators, plus the builtins the CLI registers.
//! - [`executor`] runs a single unit: worker invocation with bounded retry
//!   and backoff for drops, check evaluation for checkpoints.
//!
//! [`Deposit`]: crate::deposit::Deposit

pub mod checks;
pub mod command_worker;
pub mod executor;
pub mod worker;

pub use checks::{CheckContext, CheckRegistry};
pub use command_worker::CommandWorker;
pub use executor::{RetryPolicy, UnitExecutor};
pub use worker::{Worker, WorkerOutput};
