//! Shared test utilities for integration and E2E tests.
//!
//! Add `mod common;` to a test file, then use the helpers:
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! let fixture = TestFixture::new().with_plan(plans::LINEAR);
//! fixture.command().arg("validate").assert().success();
//! ```

use assert_fs::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};

use isorun::error::Result;
use isorun::isolation::IsolationContext;
use isorun::phases::StepRunner;

/// Re-export commonly used test dependencies for convenience.
#[allow(unused_imports)]
pub mod prelude {
    pub use assert_cmd::cargo::cargo_bin_cmd;
    pub use assert_fs::prelude::*;
    pub use assert_fs::TempDir;
    pub use predicates::prelude::*;

    pub use super::plans;
    pub use super::{FakeSandbox, TestFixture};
}

/// Plan snippets for testing.
#[allow(dead_code)]
pub mod plans {
    /// Two items, the second depending on the first.
    pub const LINEAR: &str = r#"
items:
  - id: format
    commands: [["cargo", "fmt"]]
  - id: lint
    dependencies: [format]
    commands: [["cargo", "clippy", "--fix"]]
"#;

    /// Four items forming a diamond.
    pub const DIAMOND: &str = r#"
items:
  - id: base
    commands: [["true"]]
  - id: left
    dependencies: [base]
    commands: [["true"]]
  - id: right
    dependencies: [base]
    commands: [["true"]]
  - id: join
    dependencies: [left, right]
    commands: [["true"]]
"#;

    /// Two items depending on each other.
    pub const CYCLE: &str = r#"
items:
  - id: format
    dependencies: [lint]
    commands: [["true"]]
  - id: lint
    dependencies: [format]
    commands: [["true"]]
"#;

    /// A dependency on an id that is close to an existing one.
    pub const MISSPELLED_DEPENDENCY: &str = r#"
items:
  - id: format
    commands: [["true"]]
  - id: lint
    dependencies: [fromat]
    commands: [["true"]]
"#;

    /// Two items with the same id.
    pub const DUPLICATE_ID: &str = r#"
items:
  - id: format
    commands: [["true"]]
  - id: format
    commands: [["true"]]
"#;

    /// Invalid YAML for error testing.
    pub const INVALID_YAML: &str = "items: [unclosed";
}

/// A temporary directory with an optional plan and files.
pub struct TestFixture {
    temp_dir: assert_fs::TempDir,
}

#[allow(dead_code)]
impl TestFixture {
    /// Create a new test fixture with an empty temporary directory.
    pub fn new() -> Self {
        Self {
            temp_dir: assert_fs::TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Add an `isorun.yaml` plan with the given content.
    pub fn with_plan(self, content: &str) -> Self {
        self.temp_dir
            .child("isorun.yaml")
            .write_str(content)
            .expect("Failed to write plan file");
        self
    }

    /// Add a file with the given path and content.
    pub fn with_file(self, path: &str, content: &str) -> Self {
        self.temp_dir
            .child(path)
            .write_str(content)
            .expect("Failed to write file");
        self
    }

    /// Get the path to the temporary directory.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Get the path to the plan file.
    pub fn plan_path(&self) -> PathBuf {
        self.temp_dir.path().join("isorun.yaml")
    }

    /// Create a child path in the temp directory.
    pub fn child(&self, path: &str) -> assert_fs::fixture::ChildPath {
        self.temp_dir.child(path)
    }

    /// Create a command configured to run in this fixture's directory.
    pub fn command(&self) -> assert_cmd::Command {
        let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("isorun");
        cmd.current_dir(self.path())
            .env_remove("ISORUN_PLAN")
            .env_remove("RUST_LOG");
        cmd
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Step runner that plays a sandbox without namespaces or mounts.
///
/// Commands are interpreted instead of executed:
/// - `["write", path, content]` writes a file into the capture,
/// - `["delete", path]` records a deletion marker in the capture,
/// - `["hide", path]` records the marker in the union meta folder,
/// - `["copy-up", path, suffix]` reads `path` through the layers (capture,
///   then dependency layers, then the root) and writes it back with
///   `suffix` appended.
#[allow(dead_code)]
pub struct FakeSandbox;

impl FakeSandbox {
    fn read_through(context: &IsolationContext, path: &str) -> Option<String> {
        std::iter::once(&context.change_capture)
            .chain(context.layers.iter())
            .chain(std::iter::once(&context.root))
            .find_map(|dir| fs::read_to_string(dir.join(path)).ok())
    }
}

impl StepRunner for FakeSandbox {
    fn run(&self, context: &IsolationContext) -> Result<()> {
        let capture = &context.change_capture;
        fs::create_dir_all(capture)?;
        for command in &context.commands {
            let args: Vec<&str> = command.iter().map(String::as_str).collect();
            match args.as_slice() {
                ["write", path, content] => {
                    let target = capture.join(path);
                    if let Some(parent) = target.parent() {
                        fs::create_dir_all(parent)?;
                    }
                    fs::write(target, content)?;
                }
                ["delete", path] => {
                    fs::write(capture.join(format!("{path}_HIDDEN~")), "")?;
                }
                ["hide", path] => {
                    let meta = capture.join(".unionfs-fuse");
                    fs::create_dir_all(&meta)?;
                    fs::write(meta.join(format!("{path}_HIDDEN~")), "")?;
                }
                ["copy-up", path, suffix] => {
                    let current = Self::read_through(context, path).unwrap_or_default();
                    fs::write(capture.join(path), format!("{current}{suffix}"))?;
                }
                _ => {}
            }
        }
        Ok(())
    }
}
