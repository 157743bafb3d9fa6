//! Dependency leveling of work items
//!
//! Work items name their dependencies by id. This module turns that relation
//! into execution groups: ordered levels in which every dependency of an
//! item sits in a strictly earlier level than the item itself.
//!
//! ## Process
//!
//! 1.  **Graph construction**: one node per work item, linked to its
//!     dependencies and dependents. Dependencies on ids outside the working
//!     set are dropped with a warning, so filtered plans still level.
//!
//! 2.  **Kahn's algorithm**: the nodes without outstanding dependencies form
//!     the first level. Draining a level releases its dependents; those whose
//!     last dependency was drained form the next level. Within a level items
//!     keep their input order.
//!
//! 3.  **Cycle reporting**: if some nodes are never drained, a depth-first
//!     search over the remainder names one cycle and leveling fails with
//!     [`Error::CyclicDependency`]. No partial order is returned.
//!
//! [`has_cycles`] offers the depth-first check on its own, for validating a
//! plan without leveling it.

use std::collections::{BTreeSet, HashMap};

use log::warn;

use crate::config::WorkItem;
use crate::error::{Error, Result};

/// Execution groups of borrowed work items, in execution order.
pub type ExecutionOrder<'a> = Vec<Vec<&'a WorkItem>>;

struct Graph {
    dependencies: Vec<BTreeSet<usize>>,
    dependents: Vec<BTreeSet<usize>>,
}

impl Graph {
    fn build(items: &[WorkItem]) -> Result<Self> {
        let mut index = HashMap::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            if index.insert(item.id.as_str(), i).is_some() {
                return Err(Error::ConfigParse {
                    message: format!("Duplicate work item id '{}'", item.id),
                    hint: Some("Give every work item a unique id".to_string()),
                });
            }
        }

        let mut dependencies = vec![BTreeSet::new(); items.len()];
        let mut dependents = vec![BTreeSet::new(); items.len()];
        for (i, item) in items.iter().enumerate() {
            for dependency in &item.dependencies {
                match index.get(dependency.as_str()) {
                    Some(&j) => {
                        dependencies[i].insert(j);
                        dependents[j].insert(i);
                    }
                    None => warn!(
                        "Work item '{}' depends on unknown item '{}', ignoring the dependency",
                        item.id, dependency
                    ),
                }
            }
        }

        Ok(Self {
            dependencies,
            dependents,
        })
    }

    /// One cycle among `candidates`, as a closed path of node indices.
    fn find_cycle(&self, candidates: &BTreeSet<usize>) -> Option<Vec<usize>> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Unvisited,
            OnStack,
            Done,
        }

        fn visit(
            graph: &Graph,
            node: usize,
            candidates: &BTreeSet<usize>,
            marks: &mut [Mark],
            stack: &mut Vec<usize>,
        ) -> Option<Vec<usize>> {
            marks[node] = Mark::OnStack;
            stack.push(node);
            for &next in &graph.dependencies[node] {
                if !candidates.contains(&next) {
                    continue;
                }
                match marks[next] {
                    Mark::OnStack => {
                        let start = stack.iter().position(|&n| n == next).unwrap_or(0);
                        let mut cycle = stack[start..].to_vec();
                        cycle.push(next);
                        return Some(cycle);
                    }
                    Mark::Unvisited => {
                        if let Some(cycle) = visit(graph, next, candidates, marks, stack) {
                            return Some(cycle);
                        }
                    }
                    Mark::Done => {}
                }
            }
            stack.pop();
            marks[node] = Mark::Done;
            None
        }

        let mut marks = vec![Mark::Unvisited; self.dependencies.len()];
        let mut stack = Vec::new();
        for &node in candidates {
            if marks[node] == Mark::Unvisited {
                if let Some(cycle) = visit(self, node, candidates, &mut marks, &mut stack) {
                    return Some(cycle);
                }
            }
        }
        None
    }
}

/// Partition `items` into execution groups.
///
/// Fails with [`Error::CyclicDependency`] naming an item on a cycle.
pub fn build_execution_order(items: &[WorkItem]) -> Result<ExecutionOrder<'_>> {
    let graph = Graph::build(items)?;
    let mut outstanding: Vec<usize> = graph.dependencies.iter().map(BTreeSet::len).collect();

    let mut levels: Vec<Vec<usize>> = Vec::new();
    let mut current: Vec<usize> = (0..items.len()).filter(|&i| outstanding[i] == 0).collect();
    let mut drained = 0;

    while !current.is_empty() {
        let mut next = Vec::new();
        for &node in &current {
            for &dependent in &graph.dependents[node] {
                outstanding[dependent] -= 1;
                if outstanding[dependent] == 0 {
                    next.push(dependent);
                }
            }
        }
        next.sort_unstable();
        drained += current.len();
        levels.push(std::mem::replace(&mut current, next));
    }

    if drained < items.len() {
        let remaining: BTreeSet<usize> = (0..items.len()).filter(|&i| outstanding[i] > 0).collect();
        let cycle = graph.find_cycle(&remaining).ok_or_else(|| Error::InvariantViolation {
            message: "leveling stalled without a dependency cycle".to_string(),
        })?;
        return Err(cycle_error(items, &cycle));
    }

    Ok(levels
        .into_iter()
        .map(|level| level.into_iter().map(|i| &items[i]).collect())
        .collect())
}

/// Depth-first cycle check over the dependency relation.
///
/// Unknown dependency ids are ignored, as in [`build_execution_order`].
pub fn has_cycles(items: &[WorkItem]) -> Result<bool> {
    Ok(find_cycle(items)?.is_some())
}

/// The ids along one dependency cycle, first id repeated at the end.
pub fn find_cycle(items: &[WorkItem]) -> Result<Option<Vec<String>>> {
    let graph = Graph::build(items)?;
    let all: BTreeSet<usize> = (0..items.len()).collect();
    Ok(graph
        .find_cycle(&all)
        .map(|cycle| cycle.into_iter().map(|i| items[i].id.clone()).collect()))
}

fn cycle_error(items: &[WorkItem], cycle: &[usize]) -> Error {
    let names: Vec<&str> = cycle.iter().map(|&i| items[i].id.as_str()).collect();
    Error::CyclicDependency {
        item: names.first().map(|s| s.to_string()).unwrap_or_default(),
        cycle: names.join(" -> "),
    }
}
