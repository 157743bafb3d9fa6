//! # Run Plan Schema and Parsing
//!
//! This module defines the resolved work-item plan `isorun` executes and the
//! logic for loading it. The plan is the fully resolved output of whatever
//! recipe front end produced it: every work item already carries its
//! commands, its dependencies by id and its path filter.
//!
//! ## Key Components
//!
//! - **`WorkItem`**: one unit of work, run in its own sandbox.
//! - **`RunSettings`**: where the run operates and how it isolates steps.
//! - **`RunPlan`**: the work items together with their settings.
//!
//! ## Format
//!
//! Plans are YAML by default; files ending in `.json` are read as JSON.
//! Include and exclude patterns are relative to the configured root.
//!
//! ```yaml
//! settings:
//!   strategy: overlay
//! items:
//!   - id: format
//!     commands:
//!       - ["cargo", "fmt"]
//!   - id: rename
//!     dependencies: [format]
//!     working_directory: /srv/project
//!     commands:
//!       - ["sed -i s/foo/bar/g src/*.rs"]
//!     include: ["/srv/project/src/*"]
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::defaults;
use crate::error::{Error, Result};
use crate::isolation::StrategyKind;
use crate::path::PathFilter;

/// One identified unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    /// Stable identifier, unique within a plan.
    pub id: String,
    /// Ids of the work items whose changes this one builds on.
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Commands run in order. A single-element command is handed to the
    /// shell verbatim; longer ones are quoted argument vectors.
    pub commands: Vec<Vec<String>>,
    /// Directory the commands start in, inside the sandbox.
    #[serde(default = "default_working_directory")]
    pub working_directory: PathBuf,
    /// Root-relative patterns of changes that are significant.
    #[serde(default)]
    pub include: Vec<String>,
    /// Root-relative patterns of changes that are ignored.
    #[serde(default)]
    pub exclude: Vec<String>,
}

fn default_working_directory() -> PathBuf {
    PathBuf::from("/")
}

impl WorkItem {
    /// Create a work item without dependencies or filters.
    pub fn new(id: impl Into<String>, commands: Vec<Vec<String>>) -> Self {
        Self {
            id: id.into(),
            dependencies: Vec::new(),
            commands,
            working_directory: default_working_directory(),
            include: Vec::new(),
            exclude: Vec::new(),
        }
    }

    /// Builder-style helper adding dependencies.
    pub fn depends_on<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies
            .extend(dependencies.into_iter().map(Into::into));
        self
    }

    /// Compile this item's include/exclude patterns.
    pub fn filter(&self) -> Result<PathFilter> {
        PathFilter::from_patterns(&self.include, &self.exclude)
    }
}

/// Where a run operates and how it isolates its steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSettings {
    /// Filesystem root exposed read-only to every step.
    pub root: PathBuf,
    /// Root for per-step scratch directories and mount points.
    pub operation_root: PathBuf,
    /// Root for captured change-sets and the final output.
    pub change_capture_root: PathBuf,
    pub strategy: StrategyKind,
    pub isolate_network: bool,
    /// Run the steps of an execution group concurrently.
    pub parallel: bool,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            root: defaults::default_root(),
            operation_root: defaults::default_operation_root(),
            change_capture_root: defaults::default_change_capture_root(),
            strategy: StrategyKind::default(),
            isolate_network: true,
            parallel: false,
        }
    }
}

/// A resolved plan: work items plus settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunPlan {
    #[serde(default)]
    pub settings: RunSettings,
    pub items: Vec<WorkItem>,
}

impl RunPlan {
    /// Check ids, commands and patterns.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for item in &self.items {
            if item.id.trim().is_empty() {
                return Err(Error::ConfigParse {
                    message: "Work item with an empty id".to_string(),
                    hint: Some("Every work item needs a non-empty 'id'".to_string()),
                });
            }
            if !seen.insert(item.id.as_str()) {
                return Err(Error::ConfigParse {
                    message: format!("Duplicate work item id '{}'", item.id),
                    hint: Some("Give every work item a unique id".to_string()),
                });
            }
            if item.commands.is_empty() || item.commands.iter().any(|c| c.is_empty()) {
                return Err(Error::ConfigParse {
                    message: format!("Work item '{}' has no command to run", item.id),
                    hint: Some(
                        "Add at least one non-empty entry to 'commands', e.g. [\"make\", \"fmt\"]"
                            .to_string(),
                    ),
                });
            }
            item.filter().map_err(|e| Error::ConfigParse {
                message: format!("Work item '{}' has an invalid path pattern: {}", item.id, e),
                hint: None,
            })?;
        }
        Ok(())
    }
}

/// Parse a YAML plan and validate it.
pub fn parse(yaml_content: &str) -> Result<RunPlan> {
    let plan: RunPlan = serde_yaml::from_str(yaml_content)?;
    plan.validate()?;
    Ok(plan)
}

/// Parse a JSON plan and validate it.
pub fn parse_json(json_content: &str) -> Result<RunPlan> {
    let plan: RunPlan = serde_json::from_str(json_content)?;
    plan.validate()?;
    Ok(plan)
}

/// Load a plan from disk, choosing the format by extension.
pub fn from_file<P: AsRef<Path>>(path: P) -> Result<RunPlan> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| Error::ConfigParse {
        message: format!("Cannot read plan '{}': {}", path.display(), e),
        hint: Some("Pass an existing plan file with --plan or ISORUN_PLAN".to_string()),
    })?;
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => parse_json(&content),
        _ => parse(&content),
    }
}
