//! End-to-end tests for the `merge` and `apply` commands.

#[allow(dead_code)]
mod common;
use common::prelude::*;

#[test]
fn test_merge_moves_sources_into_target() {
    let fixture = TestFixture::new()
        .with_file("a/one.txt", "one")
        .with_file("b/sub/two.txt", "two");

    fixture
        .command()
        .args(["--color", "never", "merge", "a", "b", "--target", "out"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[OK] Merged 2 source(s)"));

    fixture.child("out/one.txt").assert("one");
    fixture.child("out/sub/two.txt").assert("two");
    fixture.child("a").assert(predicate::path::missing());
}

#[test]
fn test_merge_copy_keeps_sources() {
    let fixture = TestFixture::new().with_file("a/one.txt", "one");

    fixture
        .command()
        .args(["merge", "a", "--target", "out", "--copy"])
        .assert()
        .success();

    fixture.child("a/one.txt").assert("one");
    fixture.child("out/one.txt").assert("one");
}

#[test]
fn test_merge_dry_run_reports_conflict() {
    let fixture = TestFixture::new()
        .with_file("a/same.txt", "a")
        .with_file("b/same.txt", "b");

    fixture
        .command()
        .args([
            "--color",
            "never",
            "merge",
            "a",
            "b",
            "--target",
            "out",
            "--block-overwrite",
            "--dry-run",
        ])
        .assert()
        .failure()
        .stdout(predicate::str::contains("[CONFLICT]"))
        .stderr(predicate::str::contains("would be blocked"));

    fixture.child("out").assert(predicate::path::missing());
    fixture.child("a/same.txt").assert("a");
}

#[test]
fn test_merge_blocked_overwrite_has_hint() {
    let fixture = TestFixture::new()
        .with_file("out/same.txt", "old")
        .with_file("a/same.txt", "new");

    fixture
        .command()
        .args(["merge", "a", "--target", "out", "--block-overwrite"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Overwrite blocked"))
        .stderr(predicate::str::contains("hint:"));

    fixture.child("out/same.txt").assert("old");
}

#[test]
fn test_merge_exclude_pattern() {
    let fixture = TestFixture::new()
        .with_file("a/keep.txt", "keep")
        .with_file("a/cache/blob", "blob");

    fixture
        .command()
        .args(["merge", "a", "--target", "out", "--copy", "--exclude", "/cache/*"])
        .assert()
        .success();

    fixture.child("out/keep.txt").assert("keep");
    fixture.child("out/cache").assert(predicate::path::missing());
}

#[test]
fn test_merge_requires_a_source() {
    TestFixture::new()
        .command()
        .args(["merge", "--target", "out"])
        .assert()
        .code(2);
}

#[test]
fn test_apply_writes_changes_and_deletions() {
    let fixture = TestFixture::new()
        .with_file("root/keep.txt", "keep")
        .with_file("root/old.txt", "old")
        .with_file("changes/new.txt", "new")
        .with_file("changes/old.txt_HIDDEN~", "");

    fixture
        .command()
        .args(["--color", "never", "apply", "changes", "--root", "root"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Applied 1 change(s) and 1 deletion(s)"))
        .stdout(predicate::str::contains("+ new.txt"))
        .stdout(predicate::str::contains("- old.txt"));

    fixture.child("root/keep.txt").assert("keep");
    fixture.child("root/new.txt").assert("new");
    fixture.child("root/old.txt").assert(predicate::path::missing());
    fixture
        .child("root/old.txt_HIDDEN~")
        .assert(predicate::path::missing());
}

#[test]
fn test_apply_dry_run_changes_nothing() {
    let fixture = TestFixture::new()
        .with_file("root/old.txt", "old")
        .with_file("changes/old.txt_HIDDEN~", "");

    fixture
        .command()
        .args(["apply", "changes", "--root", "root", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Would apply"));

    fixture.child("root/old.txt").assert("old");
    fixture.child("changes/old.txt_HIDDEN~").assert("");
}

#[test]
fn test_apply_missing_changes_folder() {
    TestFixture::new()
        .command()
        .args(["apply", "nowhere", "--root", "."])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Change-set folder not found"));
}

#[test]
fn test_completions_bash_names_binary() {
    TestFixture::new()
        .command()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("_isorun()"))
        .stdout(predicate::str::contains("validate"));
}
