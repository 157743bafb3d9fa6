//! End-to-end tests for the `validate` command.
//!
//! These tests invoke the actual CLI binary and check the behavior of the
//! `validate` subcommand from a user's perspective.

#[allow(dead_code)]
mod common;
use common::prelude::*;

#[test]
fn test_validate_prints_execution_groups() {
    let fixture = TestFixture::new().with_plan(plans::DIAMOND);

    fixture
        .command()
        .args(["--color", "never", "validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[OK] Plan parsed successfully (4 work item(s))"))
        .stdout(predicate::str::contains("0: base"))
        .stdout(predicate::str::contains("1: left, right"))
        .stdout(predicate::str::contains("2: join"))
        .stdout(predicate::str::contains("Plan is valid"));
}

#[test]
fn test_validate_reads_plan_from_environment() {
    let fixture = TestFixture::new().with_file("plans/custom.yaml", plans::LINEAR);

    fixture
        .command()
        .env("ISORUN_PLAN", fixture.path().join("plans/custom.yaml"))
        .args(["validate", "--color", "never"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1: lint"));
}

#[test]
fn test_validate_json_plan() {
    let fixture = TestFixture::new().with_file(
        "plan.json",
        r#"{"items": [{"id": "only", "commands": [["true"]]}]}"#,
    );

    fixture
        .command()
        .args(["validate", "--plan", "plan.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("0: only"));
}

#[test]
fn test_validate_missing_plan_has_hint() {
    let fixture = TestFixture::new();

    fixture
        .command()
        .arg("validate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Plan file not found"))
        .stderr(predicate::str::contains("ISORUN_PLAN"));
}

#[test]
fn test_validate_cycle_fails() {
    let fixture = TestFixture::new().with_plan(plans::CYCLE);

    fixture
        .command()
        .arg("validate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Cyclic dependency detected"))
        .stderr(predicate::str::contains("format"))
        .stderr(predicate::str::contains("lint"));
}

#[test]
fn test_validate_invalid_yaml_fails() {
    let fixture = TestFixture::new().with_plan(plans::INVALID_YAML);

    fixture
        .command()
        .arg("validate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("YAML parsing error"));
}

#[test]
fn test_validate_duplicate_id_fails() {
    let fixture = TestFixture::new().with_plan(plans::DUPLICATE_ID);

    fixture
        .command()
        .arg("validate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Duplicate work item id 'format'"));
}

#[test]
fn test_validate_suggests_misspelled_dependency() {
    let fixture = TestFixture::new().with_plan(plans::MISSPELLED_DEPENDENCY);

    fixture
        .command()
        .args(["validate", "--color", "never"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[WARN]"))
        .stdout(predicate::str::contains("did you mean 'format'?"));

    fixture
        .command()
        .args(["validate", "--strict"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--strict"));
}

#[test]
fn test_usage_error_exit_code() {
    let fixture = TestFixture::new();

    fixture
        .command()
        .args(["validate", "--no-such-flag"])
        .assert()
        .code(2);
}
