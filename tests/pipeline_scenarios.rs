//! Whole-run scenarios driven through `execute_pipeline` with a fake sandbox.
//!
//! The fake runner writes into each step's capture folder the way a real
//! copy-on-write mount would, so these tests cover leveling, per-step
//! reconciliation, publishing, the final merge, cleanup and applying the
//! result, without namespaces or mount helpers.

#[allow(dead_code)]
mod common;

use std::fs;
use std::path::Path;

use common::prelude::*;
use isorun::config::{RunPlan, RunSettings, WorkItem};
use isorun::error::Error;
use isorun::phases::{self, apply, step_post};
use isorun::pipeline::Pipeline;

fn cmd(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}

fn item(id: &str, deps: &[&str], commands: &[&[&str]]) -> WorkItem {
    WorkItem::new(id, commands.iter().map(|c| cmd(c)).collect()).depends_on(deps.iter().copied())
}

fn plan(temp: &TempDir, items: Vec<WorkItem>) -> RunPlan {
    RunPlan {
        settings: RunSettings {
            root: temp.path().join("root"),
            operation_root: temp.path().join("ops"),
            change_capture_root: temp.path().join("changes"),
            ..Default::default()
        },
        items,
    }
}

fn read(path: &Path) -> String {
    fs::read_to_string(path).unwrap()
}

#[test]
fn test_linear_chain_builds_on_previous_changes() {
    let temp = TempDir::new().unwrap();
    temp.child("root/config.txt").write_str("v0").unwrap();
    let plan = plan(
        &temp,
        vec![
            item("first", &[], &[&["copy-up", "config.txt", "+a"]]),
            item("second", &["first"], &[&["copy-up", "config.txt", "+b"]]),
        ],
    );

    let report = phases::execute_pipeline(&plan, &FakeSandbox).unwrap();

    assert_eq!(read(&report.final_changes.join("config.txt")), "v0+a+b");
    assert_eq!(report.changes.changed.len(), 1);
    assert!(report.changes.deleted.is_empty());
    // The root is only read during a run
    assert_eq!(read(&temp.path().join("root/config.txt")), "v0");
}

#[test]
fn test_three_step_chain_collects_every_file_and_cleans_up() {
    let temp = TempDir::new().unwrap();
    fs::create_dir_all(temp.path().join("root")).unwrap();
    let plan = plan(
        &temp,
        vec![
            item("a", &[], &[&["write", "a.txt", "a"]]),
            item("b", &["a"], &[&["write", "b.txt", "b"]]),
            item("c", &["b"], &[&["write", "c.txt", "c"]]),
        ],
    );

    let report = phases::execute_pipeline(&plan, &FakeSandbox).unwrap();

    let names: Vec<String> = report
        .changes
        .changed
        .iter()
        .map(|p| p.display().to_string())
        .collect();
    assert_eq!(names, ["a.txt", "b.txt", "c.txt"]);

    let run_dir = report.final_changes.parent().unwrap();
    let left: Vec<_> = fs::read_dir(run_dir)
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(left, vec![std::ffi::OsString::from("final")]);
    assert!(!temp.path().join("ops").join(&report.pipeline_id).exists());
}

#[test]
fn test_diamond_merges_shared_ancestor_once() {
    let temp = TempDir::new().unwrap();
    fs::create_dir_all(temp.path().join("root")).unwrap();
    let plan = plan(
        &temp,
        vec![
            item("base", &[], &[&["write", "shared.txt", "base"]]),
            item("left", &["base"], &[&["write", "left.txt", "left"]]),
            item("right", &["base"], &[&["write", "right.txt", "right"]]),
            item("join", &["left", "right"], &[&["write", "join.txt", "join"]]),
        ],
    );

    let report = phases::execute_pipeline(&plan, &FakeSandbox).unwrap();

    for (file, content) in [
        ("shared.txt", "base"),
        ("left.txt", "left"),
        ("right.txt", "right"),
        ("join.txt", "join"),
    ] {
        assert_eq!(read(&report.final_changes.join(file)), content, "{file}");
    }
    assert_eq!(report.steps, 4);
}

#[test]
fn test_diamond_join_inbox_holds_both_branches() {
    let temp = TempDir::new().unwrap();
    let plan = plan(
        &temp,
        vec![
            item("base", &[], &[&["true"]]),
            item("left", &["base"], &[&["true"]]),
            item("right", &["base"], &[&["true"]]),
            item("join", &["left", "right"], &[&["true"]]),
        ],
    );
    let pipeline = Pipeline::build(&plan.items, &plan.settings).unwrap();
    let step = |id: &str| pipeline.find_step(id).unwrap();
    for (id, file) in [
        ("base", "shared.txt"),
        ("left", "left.txt"),
        ("right", "right.txt"),
    ] {
        let capture = &pipeline.step(step(id)).locations().change_capture;
        fs::create_dir_all(capture).unwrap();
        fs::write(capture.join(file), id).unwrap();
    }

    for id in ["base", "left", "right"] {
        step_post::execute(&pipeline, step(id)).unwrap();
    }

    let inbox = &pipeline.step(step("join")).locations().previous_changes;
    assert_eq!(read(&inbox.join("shared.txt")), "base");
    assert_eq!(read(&inbox.join("left.txt")), "left");
    assert_eq!(read(&inbox.join("right.txt")), "right");
    let mut names: Vec<_> = fs::read_dir(inbox)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names, ["left.txt", "right.txt", "shared.txt"]);
}

#[test]
fn test_independent_items_writing_same_path_conflict() {
    let temp = TempDir::new().unwrap();
    fs::create_dir_all(temp.path().join("root")).unwrap();
    let plan = plan(
        &temp,
        vec![
            item("left", &[], &[&["write", "same.txt", "left"]]),
            item("right", &[], &[&["write", "same.txt", "right"]]),
        ],
    );

    let err = phases::execute_pipeline(&plan, &FakeSandbox).unwrap_err();
    assert!(err.is_overwrite_blocked(), "unexpected error: {err}");
}

#[test]
fn test_deletion_and_modification_by_siblings_conflict() {
    let temp = TempDir::new().unwrap();
    temp.child("root/victim.txt").write_str("v0").unwrap();
    let plan = plan(
        &temp,
        vec![
            item("base", &[], &[&["write", "base.txt", "base"]]),
            item("remover", &["base"], &[&["delete", "victim.txt"]]),
            item("editor", &["base"], &[&["copy-up", "victim.txt", "+edit"]]),
            item("join", &["remover", "editor"], &[&["write", "join.txt", "join"]]),
        ],
    );

    let err = phases::execute_pipeline(&plan, &FakeSandbox).unwrap_err();
    assert!(err.is_overwrite_blocked(), "unexpected error: {err}");
    match err.root_cause() {
        Error::OverwriteBlocked { .. } => {}
        other => panic!("expected a conflict, got {other}"),
    }
}

#[test]
fn test_later_step_may_delete_inherited_file() {
    let temp = TempDir::new().unwrap();
    fs::create_dir_all(temp.path().join("root")).unwrap();
    let plan = plan(
        &temp,
        vec![
            item("create", &[], &[&["write", "scratch.txt", "tmp"]]),
            item("remove", &["create"], &[&["delete", "scratch.txt"]]),
        ],
    );

    let report = phases::execute_pipeline(&plan, &FakeSandbox).unwrap();

    assert!(!report.final_changes.join("scratch.txt").exists());
    assert!(report
        .changes
        .deleted
        .contains(Path::new("scratch.txt")));
}

#[test]
fn test_union_meta_folder_deletions_are_flattened() {
    let temp = TempDir::new().unwrap();
    temp.child("root/old.txt").write_str("old").unwrap();
    let plan = plan(&temp, vec![item("hide", &[], &[&["hide", "old.txt"]])]);

    let report = phases::execute_pipeline(&plan, &FakeSandbox).unwrap();

    assert!(report.final_changes.join("old.txt_HIDDEN~").exists());
    assert!(!report.final_changes.join(".unionfs-fuse").exists());
    assert!(report.changes.deleted.contains(Path::new("old.txt")));
}

#[test]
fn test_excluded_paths_are_not_reported() {
    let temp = TempDir::new().unwrap();
    fs::create_dir_all(temp.path().join("root")).unwrap();
    let mut build = item(
        "build",
        &[],
        &[
            &["write", "src/lib.rs", "pub fn f() {}"],
            &["write", "target/out.o", "binary"],
        ],
    );
    build.exclude = vec!["/target/*".to_string()];
    let plan = plan(&temp, vec![build]);

    let report = phases::execute_pipeline(&plan, &FakeSandbox).unwrap();

    assert!(report.final_changes.join("src/lib.rs").exists());
    assert!(!report.final_changes.join("target/out.o").exists());
}

#[test]
fn test_parallel_groups_match_sequential_result() {
    let temp = TempDir::new().unwrap();
    fs::create_dir_all(temp.path().join("root")).unwrap();
    let items: Vec<WorkItem> = (0..6)
        .map(|i| {
            let file = format!("file-{i}.txt");
            item(&format!("item-{i}"), &[], &[&["write", &file, "x"]])
        })
        .collect();
    let mut plan = plan(&temp, items);
    plan.settings.parallel = true;

    let report = phases::execute_pipeline(&plan, &FakeSandbox).unwrap();

    assert_eq!(report.changes.changed.len(), 6);
}

#[test]
fn test_apply_after_run_updates_root() {
    let temp = TempDir::new().unwrap();
    temp.child("root/keep.txt").write_str("keep").unwrap();
    temp.child("root/edit.txt").write_str("v0").unwrap();
    temp.child("root/drop.txt").write_str("drop").unwrap();
    let plan = plan(
        &temp,
        vec![
            item("edit", &[], &[&["copy-up", "edit.txt", "+1"]]),
            item("drop", &["edit"], &[&["delete", "drop.txt"], &["write", "new.txt", "new"]]),
        ],
    );

    let report = phases::execute_pipeline(&plan, &FakeSandbox).unwrap();
    let applied = apply::execute(
        &report.final_changes,
        &temp.path().join("root"),
        &apply::default_options(),
    )
    .unwrap();

    let root = temp.path().join("root");
    assert_eq!(read(&root.join("keep.txt")), "keep");
    assert_eq!(read(&root.join("edit.txt")), "v0+1");
    assert_eq!(read(&root.join("new.txt")), "new");
    assert!(!root.join("drop.txt").exists());
    assert!(!root.join("drop.txt_HIDDEN~").exists());
    assert_eq!(applied.deleted.len(), 1);
}

#[test]
fn test_cycle_is_rejected_before_running() {
    let temp = TempDir::new().unwrap();
    let plan = plan(
        &temp,
        vec![
            item("a", &["b"], &[&["write", "a", "a"]]),
            item("b", &["a"], &[&["write", "b", "b"]]),
        ],
    );

    let err = phases::execute_pipeline(&plan, &FakeSandbox).unwrap_err();
    assert!(matches!(err, Error::CyclicDependency { .. }));
}
