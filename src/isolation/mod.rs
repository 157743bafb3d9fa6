//! # Isolation Sandbox
//!
//! Every step runs its commands inside a private sandbox: a new user and
//! mount namespace (optionally a network namespace) whose root filesystem is
//! a union of the real root and the change-sets of the step's dependencies,
//! with the step's own change-capture folder as the only writable layer.
//!
//! ## Lifecycle
//!
//! ```text
//! parent:  initialize -> prepare_outside ----------------------------> cleanup_outside
//!                                   \                                 /
//! child:                             prepare_inside -> commands -> cleanup_inside
//! ```
//!
//! The parent re-executes the current binary as `isorun isolate-child` and
//! hands it an [`IsolationContext`] over a pipe inherited as file descriptor
//! [`CONTEXT_FD`]. Cleanup runs on every exit path; cleanup failures are
//! reported next to the error that caused the unwind.
//!
//! ## Strategies
//!
//! - [`StrategyKind::Overlay`]: `mergerfs` joins the read-only layers, a
//!   kernel overlay mount adds the writable capture on top.
//! - [`StrategyKind::Union`]: `unionfs-fuse` mounts all branches at once in
//!   copy-on-write mode.

mod context;
mod mounts;
mod namespace;
mod shell;
mod strategy;

use serde::{Deserialize, Serialize};

pub use context::IsolationContext;
pub use namespace::{read_context, run_child, run_isolated};
pub use shell::{command_line, quote, run_commands};
pub use strategy::{convert_whiteouts, Isolator};

/// Subcommand name the re-executed sandbox child is started with.
pub const CHILD_COMMAND: &str = "isolate-child";

/// File descriptor the child reads its serialized context from.
pub const CONTEXT_FD: i32 = 3;

/// Which mount backend assembles the sandbox root.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    /// `mergerfs` lower view plus a kernel overlay mount.
    Overlay,
    /// A single `unionfs-fuse` copy-on-write mount.
    #[default]
    Union,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Overlay => "overlay",
            StrategyKind::Union => "union",
        }
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StrategyKind {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "overlay" => Ok(StrategyKind::Overlay),
            "union" => Ok(StrategyKind::Union),
            other => Err(crate::error::Error::ConfigParse {
                message: format!("Unknown isolation strategy '{}'", other),
                hint: Some("Use 'overlay' or 'union'".to_string()),
            }),
        }
    }
}
