// tests/plan_validation.rs

//! Plan-file loading and validation from real TOML on disk.

use std::io::Write;

use dropgate::config::{load_and_validate, load_from_path};
use dropgate::errors::DropgateError;
use dropgate::types::{Priority, UnitKind};
use tempfile::NamedTempFile;

fn write_plan(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("create temp plan file");
    file.write_all(contents.as_bytes()).expect("write plan");
    file
}

#[test]
fn loads_full_plan_with_defaults() {
    let file = write_plan(
        r#"
[build]
max_parallel = 2

[unit.D1]
kind = "drop"
brief = "create the schema"
cmd = "echo schema"

[unit.C1]
kind = "checkpoint"
depends_on = ["D1"]
gates = ["D2"]
priority = "critical"
checks = [{ name = "upstream_all_passed" }]

[unit.D2]
kind = "drop"
brief = "seed the data"
"#,
    );

    let plan = load_and_validate(file.path()).unwrap();
    assert_eq!(plan.build.max_parallel, 2);
    // Retry section falls back to defaults.
    assert_eq!(plan.build.retry.max_attempts, 3);
    assert_eq!(plan.build.retry.base_delay_ms, 250);

    let c1 = &plan.unit["C1"];
    assert_eq!(c1.kind, UnitKind::Checkpoint);
    assert_eq!(c1.priority, Priority::Critical);
    assert_eq!(c1.checks.len(), 1);
    // Checks block by default.
    assert!(c1.checks[0].blocking);

    let d1 = &plan.unit["D1"];
    assert_eq!(d1.priority, Priority::Normal);
    assert_eq!(d1.cmd.as_deref(), Some("echo schema"));
}

#[test]
fn rejects_unknown_kind() {
    let file = write_plan(
        r#"
[unit.D1]
kind = "sprint"
"#,
    );
    let err = load_from_path(file.path()).unwrap_err();
    assert!(matches!(err, DropgateError::TomlError(_)));
}

#[test]
fn rejects_missing_file() {
    let err = load_and_validate("/nonexistent/Dropgate.toml").unwrap_err();
    assert!(matches!(err, DropgateError::IoError(_)));
}

#[test]
fn rejects_dangling_gate_target() {
    let file = write_plan(
        r#"
[unit.C1]
kind = "checkpoint"
gates = ["ghost"]
"#,
    );
    let err = load_and_validate(file.path()).unwrap_err();
    match err {
        DropgateError::DanglingReference { unit, target, edge } => {
            assert_eq!(unit, "C1");
            assert_eq!(target, "ghost");
            assert_eq!(edge, "gates");
        }
        other => panic!("expected dangling reference, got {other:?}"),
    }
}

#[test]
fn rejects_self_dependency() {
    let file = write_plan(
        r#"
[unit.D1]
kind = "drop"
depends_on = ["D1"]
"#,
    );
    let err = load_and_validate(file.path()).unwrap_err();
    assert!(matches!(err, DropgateError::InvalidGraph(_)));
}

#[test]
fn rejects_dependency_cycle_across_gates() {
    let file = write_plan(
        r#"
[unit.D1]
kind = "drop"
depends_on = ["D2"]

[unit.C1]
kind = "checkpoint"
depends_on = ["D1"]
gates = ["D2"]

[unit.D2]
kind = "drop"
"#,
    );
    let err = load_and_validate(file.path()).unwrap_err();
    assert!(matches!(err, DropgateError::GraphCycle(_)));
}

#[test]
fn rejects_checks_on_a_drop() {
    let file = write_plan(
        r#"
[unit.D1]
kind = "drop"
checks = [{ name = "deposit_present" }]
"#,
    );
    let err = load_and_validate(file.path()).unwrap_err();
    assert!(matches!(err, DropgateError::InvalidGraph(_)));
}

#[test]
fn rejects_zero_max_parallel() {
    let file = write_plan(
        r#"
[build]
max_parallel = 0

[unit.D1]
kind = "drop"
"#,
    );
    let err = load_and_validate(file.path()).unwrap_err();
    assert!(matches!(err, DropgateError::PlanError(_)));
}
