// src/lib.rs

pub mod build;
pub mod cli;
pub mod config;
pub mod dag;
pub mod deposit;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod store;
pub mod types;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tracing::debug;

use crate::build::{BuildController, BuildStatus, LogNotifier};
use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::config::model::PlanFile;
use crate::exec::checks::CheckRegistry;
use crate::exec::command_worker::CommandWorker;
use crate::store::MemoryStore;
use crate::types::UnitKind;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - plan loading and validation
/// - the build controller with the bundled command worker, the in-memory
///   artifact store, the builtin check registry, and the log notifier
/// - one run of the submitted build, with the final report on stdout
pub async fn run(args: CliArgs) -> Result<BuildStatus> {
    let plan_path = PathBuf::from(&args.plan);
    let mut plan = load_and_validate(&plan_path)?;

    if let Some(max_parallel) = args.max_parallel {
        plan.build.max_parallel = max_parallel.max(1);
    }

    if args.dry_run {
        print_dry_run(&plan);
        return Ok(BuildStatus::Completed);
    }

    let worker = Arc::new(CommandWorker::new());
    let store = Arc::new(MemoryStore::new());
    let notifier = Arc::new(LogNotifier);
    let mut controller =
        BuildController::new(worker, store, notifier, CheckRegistry::with_builtins());

    let build_id = controller.submit(&plan)?;
    let status = controller.run(&build_id).await?;

    let report = controller.status(&build_id)?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    debug!(?status, "run finished");
    Ok(status)
}

/// Simple dry-run output: print units, kinds, edges and checks.
fn print_dry_run(plan: &PlanFile) {
    println!("dropgate dry-run");
    println!("  build.max_parallel = {}", plan.build.max_parallel);
    println!(
        "  build.retry = {} attempt(s), base delay {}ms",
        plan.build.retry.max_attempts, plan.build.retry.base_delay_ms
    );
    println!();

    println!("units ({}):", plan.unit.len());
    for (id, unit) in plan.unit.iter() {
        println!("  - {id} ({})", unit.kind);
        if !unit.brief.is_empty() {
            println!("      brief: {}", unit.brief);
        }
        if let Some(ref cmd) = unit.cmd {
            println!("      cmd: {cmd}");
        }
        if !unit.depends_on.is_empty() {
            println!("      depends_on: {:?}", unit.depends_on);
        }
        if unit.kind == UnitKind::Checkpoint {
            println!("      priority: {:?}", unit.priority);
            if !unit.gates.is_empty() {
                println!("      gates: {:?}", unit.gates);
            }
            for check in unit.checks.iter() {
                println!(
                    "      check: {} ({})",
                    check.name,
                    if check.blocking { "blocking" } else { "non-blocking" }
                );
            }
        }
    }

    debug!("dry-run complete (no execution)");
}
