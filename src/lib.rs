//! # isorun
//!
//! This library runs refactoring commands against a filesystem root without
//! touching it. Every work item of a plan runs in its own sandbox: a private
//! user and mount namespace in which the root is visible through a
//! copy-on-write mount, so whatever the commands write or delete lands in a
//! per-item change-set. The change-sets are then reconciled along the
//! dependency graph and, on request, applied to the real root.
//!
//! ## Quick Example
//!
//! ```
//! use isorun::config;
//! use isorun::ordering;
//!
//! let plan = config::parse(r#"
//! items:
//!   - id: format
//!     commands: [["cargo", "fmt"]]
//!   - id: lint
//!     dependencies: [format]
//!     commands: [["cargo", "clippy", "--fix"]]
//! "#).unwrap();
//!
//! let groups = ordering::build_execution_order(&plan.items).unwrap();
//! assert_eq!(groups.len(), 2);
//! assert_eq!(groups[1][0].id, "lint");
//! ```
//!
//! ## Core Concepts
//!
//! - **Plans (`config`)**: work items with commands, dependencies and path
//!   filters, plus run settings.
//! - **Ordering (`ordering`)**: dependency leveling into execution groups.
//! - **Pipelines (`pipeline`)**: the steps of one run with their per-step
//!   locations.
//! - **Isolation (`isolation`)**: namespaces, mounts and the sandbox child.
//! - **Merging (`merge`)**: the change-set merge engine with deletion
//!   markers and overwrite blocking.
//! - **Phases (`phases`)**: execution, per-step reconciliation, the final
//!   merge and applying the result.
//!
//! ## Execution Flow
//!
//! [`phases::execute_pipeline`] drives a run:
//!
//! 1.  **Build**: level the plan and lay out every step's locations.
//! 2.  **Execute**: run each execution group, one sandbox per step.
//! 3.  **Step post**: fold inherited and own changes into the step's final
//!     change-set and publish it to the dependents.
//! 4.  **Pipeline post**: merge the final steps into one change-set.
//! 5.  **Cleanup**: remove scratch locations, also after a failure.
//!
//! Applying the result to the root is a separate, explicit phase
//! ([`phases::apply`]).

pub mod config;
pub mod defaults;
pub mod error;
pub mod filesystem;
pub mod isolation;
pub mod merge;
pub mod ordering;
pub mod output;
pub mod path;
pub mod phases;
pub mod pipeline;
pub mod suggestions;

#[cfg(test)]
mod path_proptest;
