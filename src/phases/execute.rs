//! Phase 1: Running an execution group
//!
//! Each step gets an [`IsolationContext`] describing its layers: the real
//! root at the bottom, the captures of all transitive dependencies above it
//! (most recent first) and its own capture folder as the writable top.
//!
//! Steps of a group run one after another, or concurrently with `rayon`
//! when the run asks for it. Concurrent steps never share a path.

use std::sync::Mutex;

use log::{error, info};
use rayon::prelude::*;

use super::StepRunner;
use crate::config::RunSettings;
use crate::error::{Error, Result};
use crate::isolation::IsolationContext;
use crate::pipeline::{ExecutionGroup, Pipeline, StepId};

/// Build the sandbox handoff for one step.
pub fn step_context(pipeline: &Pipeline, id: StepId, settings: &RunSettings) -> IsolationContext {
    let step = pipeline.step(id);
    IsolationContext {
        root: pipeline.root().to_path_buf(),
        layers: pipeline.previous_change_capture_locations(id),
        change_capture: step.locations().change_capture.clone(),
        operation_directory: step.locations().operation.clone(),
        overlay_work: step.locations().overlay_work.clone(),
        working_directory: step.work_item().working_directory.clone(),
        commands: step.work_item().commands.clone(),
        strategy: settings.strategy,
        isolate_network: settings.isolate_network,
        log_level: log::max_level().to_string().to_lowercase(),
    }
}

/// Execute every step of `group`.
///
/// Fails with the first step failure; in parallel mode the remaining
/// steps of the group still finish and further failures are logged.
pub fn execute(
    pipeline: &Pipeline,
    group: &ExecutionGroup,
    settings: &RunSettings,
    runner: &dyn StepRunner,
) -> Result<()> {
    info!(
        "Executing {} with {} step(s)",
        group.id(),
        group.steps().len()
    );

    if !settings.parallel || group.steps().len() < 2 {
        for &id in group.steps() {
            run_step(pipeline, id, settings, runner)?;
        }
        return Ok(());
    }

    let errors: Mutex<Vec<Error>> = Mutex::new(Vec::new());
    group.steps().par_iter().for_each(|&id| {
        if let Err(e) = run_step(pipeline, id, settings, runner) {
            match errors.lock() {
                Ok(mut errors) => errors.push(e),
                Err(poisoned) => poisoned.into_inner().push(e),
            }
        }
    });

    let mut errors = errors.into_inner().map_err(|_| Error::InvariantViolation {
        message: format!("error list of {} was poisoned", group.id()),
    })?;
    if errors.is_empty() {
        return Ok(());
    }
    let first = errors.remove(0);
    for other in &errors {
        error!("Another step of {} failed as well: {}", group.id(), other);
    }
    Err(first)
}

fn run_step(pipeline: &Pipeline, id: StepId, settings: &RunSettings, runner: &dyn StepRunner) -> Result<()> {
    let step = pipeline.step(id);
    info!("Running step '{}'", step.id());
    let context = step_context(pipeline, id, settings);
    runner.run(&context).map_err(|e| Error::Step {
        step: step.id().to_string(),
        stage: "execution".to_string(),
        inner: Box::new(e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorkItem;
    use crate::isolation::StrategyKind;
    use std::collections::HashSet;
    use std::path::PathBuf;

    struct Recording {
        seen: Mutex<Vec<PathBuf>>,
        fail_for: Option<PathBuf>,
    }

    impl StepRunner for Recording {
        fn run(&self, context: &IsolationContext) -> Result<()> {
            self.seen.lock().unwrap().push(context.change_capture.clone());
            if self.fail_for.as_ref() == Some(&context.change_capture) {
                return Err(Error::Isolation {
                    message: "boom".to_string(),
                });
            }
            Ok(())
        }
    }

    fn item(id: &str, deps: &[&str]) -> WorkItem {
        WorkItem::new(id, vec![vec!["true".to_string()]]).depends_on(deps.iter().copied())
    }

    fn settings(parallel: bool) -> RunSettings {
        RunSettings {
            root: PathBuf::from("/"),
            operation_root: PathBuf::from("/ops"),
            change_capture_root: PathBuf::from("/changes"),
            strategy: StrategyKind::Overlay,
            isolate_network: false,
            parallel,
        }
    }

    #[test]
    fn test_step_context_layers_and_settings() {
        let pipeline = Pipeline::build(
            &[item("a", &[]), item("b", &["a"])],
            &settings(false),
        )
        .unwrap();
        let a = pipeline.find_step("a").unwrap();
        let b = pipeline.find_step("b").unwrap();
        let context = step_context(&pipeline, b, &settings(false));
        assert_eq!(
            context.layers,
            vec![pipeline.step(a).locations().change_capture.clone()]
        );
        assert_eq!(context.change_capture, pipeline.step(b).locations().change_capture);
        assert_eq!(context.operation_directory, pipeline.step(b).locations().operation);
        assert_eq!(context.strategy, StrategyKind::Overlay);
        assert!(!context.isolate_network);
        assert_eq!(context.commands, vec![vec!["true".to_string()]]);
    }

    #[test]
    fn test_overlay_work_shares_parent_with_capture() {
        let pipeline = Pipeline::build(&[item("a", &[])], &settings(false)).unwrap();
        let a = pipeline.find_step("a").unwrap();
        let context = step_context(&pipeline, a, &settings(false));
        assert_eq!(context.overlay_work.parent(), context.change_capture.parent());
        assert!(context.overlay_work.starts_with("/changes"));
        assert!(!context.overlay_work.starts_with("/ops"));
    }

    #[test]
    fn test_sequential_stops_at_first_failure() {
        let pipeline = Pipeline::build(
            &[item("a", &[]), item("b", &[]), item("c", &[])],
            &settings(false),
        )
        .unwrap();
        let b = pipeline.find_step("b").unwrap();
        let runner = Recording {
            seen: Mutex::new(Vec::new()),
            fail_for: Some(pipeline.step(b).locations().change_capture.clone()),
        };
        let err = execute(&pipeline, &pipeline.groups()[0], &settings(false), &runner).unwrap_err();
        assert!(matches!(err, Error::Step { ref step, .. } if step == "b"));
        assert_eq!(runner.seen.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_parallel_runs_every_step_once() {
        let items: Vec<WorkItem> = (0..8).map(|i| item(&format!("s{}", i), &[])).collect();
        let pipeline = Pipeline::build(&items, &settings(true)).unwrap();
        let runner = Recording {
            seen: Mutex::new(Vec::new()),
            fail_for: None,
        };
        execute(&pipeline, &pipeline.groups()[0], &settings(true), &runner).unwrap();
        let seen: HashSet<PathBuf> = runner.seen.lock().unwrap().iter().cloned().collect();
        assert_eq!(seen.len(), 8);
    }

    #[test]
    fn test_parallel_failure_still_runs_siblings() {
        let items: Vec<WorkItem> = (0..4).map(|i| item(&format!("s{}", i), &[])).collect();
        let pipeline = Pipeline::build(&items, &settings(true)).unwrap();
        let s0 = pipeline.find_step("s0").unwrap();
        let runner = Recording {
            seen: Mutex::new(Vec::new()),
            fail_for: Some(pipeline.step(s0).locations().change_capture.clone()),
        };
        let err = execute(&pipeline, &pipeline.groups()[0], &settings(true), &runner).unwrap_err();
        assert!(matches!(err, Error::Step { .. }));
        assert_eq!(runner.seen.lock().unwrap().len(), 4);
    }
}
