//! Building a pipeline from leveled work items

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use log::debug;
use uuid::Uuid;

use super::{ExecutionGroup, Pipeline, Step, StepId, StepLocations};
use crate::config::{RunSettings, WorkItem};
use crate::error::{fs_error, Error, Result};
use crate::ordering::build_execution_order;
use crate::path::encode_path_component;

impl Pipeline {
    /// Level `items` and lay out a fresh pipeline under `settings`' roots.
    ///
    /// Fails before anything is created if the items contain a cycle or an
    /// invalid path pattern.
    pub fn build(items: &[WorkItem], settings: &RunSettings) -> Result<Self> {
        let order = build_execution_order(items)?;

        let id = format!("PIPELINE-{}", Uuid::new_v4());
        let root = absolute(&settings.root)?;
        let operation_location = absolute(&settings.operation_root)?.join(&id);
        let change_capture_location = absolute(&settings.change_capture_root)?.join(&id);
        let temporary = change_capture_location.join("tmp");

        let mut groups = Vec::with_capacity(order.len());
        let mut steps: Vec<Step> = Vec::with_capacity(items.len());
        let mut by_id: HashMap<&str, StepId> = HashMap::with_capacity(items.len());
        let mut used_keys: HashSet<String> = HashSet::new();

        for (index, level) in order.iter().enumerate() {
            let group_id = format!("group-{}", index);
            let mut members = Vec::with_capacity(level.len());

            for item in level {
                let key = unique_key(&item.id, &mut used_keys);
                let filter = item.filter().map_err(|e| Error::ConfigParse {
                    message: format!("Work item '{}' has an invalid path pattern: {}", item.id, e),
                    hint: None,
                })?;
                let step_id = StepId(steps.len());
                steps.push(Step {
                    id: item.id.clone(),
                    key: key.clone(),
                    group: index,
                    item: (*item).clone(),
                    filter,
                    dependencies: Vec::new(),
                    dependents: Vec::new(),
                    locations: StepLocations::new(
                        operation_location.join(&group_id).join(&key),
                        temporary.join(&group_id).join(&key),
                    ),
                });
                by_id.insert(item.id.as_str(), step_id);
                members.push(step_id);
            }

            groups.push(ExecutionGroup {
                id: group_id,
                steps: members,
            });
        }

        for index in 0..steps.len() {
            let mut dependencies: Vec<StepId> = Vec::new();
            for dependency in &steps[index].item.dependencies {
                if let Some(&dep) = by_id.get(dependency.as_str()) {
                    if !dependencies.contains(&dep) {
                        dependencies.push(dep);
                    }
                }
            }
            for &dep in &dependencies {
                steps[dep.0].dependents.push(StepId(index));
            }
            steps[index].dependencies = dependencies;
        }

        debug!(
            "Built pipeline {} with {} steps in {} groups",
            id,
            steps.len(),
            groups.len()
        );

        Ok(Pipeline {
            id,
            root,
            operation_location,
            change_capture_location,
            groups,
            steps,
        })
    }
}

fn unique_key(id: &str, used: &mut HashSet<String>) -> String {
    let base = encode_path_component(id);
    let mut key = base.clone();
    let mut n = 1;
    while !used.insert(key.clone()) {
        key = format!("{}-{}", base, n);
        n += 1;
    }
    key
}

fn absolute(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path).map_err(fs_error("resolve", path))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, deps: &[&str]) -> WorkItem {
        WorkItem::new(id, vec![vec!["true".to_string()]]).depends_on(deps.iter().copied())
    }

    #[test]
    fn test_build_groups_follow_levels() {
        let pipeline = Pipeline::build(
            &[item("c", &["b"]), item("b", &["a"]), item("a", &[])],
            &RunSettings::default(),
        )
        .unwrap();
        let names: Vec<Vec<&str>> = pipeline
            .groups()
            .iter()
            .map(|g| g.steps().iter().map(|&s| pipeline.step(s).id()).collect())
            .collect();
        assert_eq!(names, vec![vec!["a"], vec!["b"], vec!["c"]]);
        assert_eq!(pipeline.groups()[1].id(), "group-1");
    }

    #[test]
    fn test_build_rejects_cycles() {
        let err = Pipeline::build(
            &[item("a", &["b"]), item("b", &["a"])],
            &RunSettings::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::CyclicDependency { .. }));
    }

    #[test]
    fn test_build_ignores_dangling_dependencies() {
        let pipeline =
            Pipeline::build(&[item("a", &["gone"])], &RunSettings::default()).unwrap();
        let a = pipeline.find_step("a").unwrap();
        assert!(pipeline.step(a).dependencies().is_empty());
    }

    #[test]
    fn test_colliding_keys_are_disambiguated() {
        let pipeline = Pipeline::build(
            &[item("lint/fix", &[]), item("lint-fix", &[])],
            &RunSettings::default(),
        )
        .unwrap();
        let keys: Vec<&str> = pipeline.steps().map(|s| s.key()).collect();
        assert_eq!(keys, vec!["lint-fix", "lint-fix-1"]);
    }

    #[test]
    fn test_relative_roots_become_absolute() {
        let settings = RunSettings {
            root: PathBuf::from("project"),
            operation_root: PathBuf::from("ops"),
            change_capture_root: PathBuf::from("changes"),
            ..Default::default()
        };
        let pipeline = Pipeline::build(&[item("a", &[])], &settings).unwrap();
        assert!(pipeline.root().is_absolute());
        assert!(pipeline.operation_location().is_absolute());
        assert!(pipeline.change_capture_location().is_absolute());
    }

    #[test]
    fn test_unique_pipeline_ids() {
        let a = Pipeline::build(&[item("a", &[])], &RunSettings::default()).unwrap();
        let b = Pipeline::build(&[item("a", &[])], &RunSettings::default()).unwrap();
        assert_ne!(a.id(), b.id());
    }
}
