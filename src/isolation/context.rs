//! The parent-to-child handoff

use std::io::{Read, Write};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::StrategyKind;
use crate::error::Result;

/// Everything the sandbox child needs to assemble its root and run a step.
///
/// Serialized as JSON and written once to the child's context pipe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IsolationContext {
    /// Real filesystem root, mounted read-only as the lowest layer.
    pub root: PathBuf,
    /// Change captures of prior steps, most recent first.
    #[serde(default)]
    pub layers: Vec<PathBuf>,
    /// This step's writable layer.
    pub change_capture: PathBuf,
    /// Scratch directory for mount points and helper state.
    pub operation_directory: PathBuf,
    /// Overlay workdir; must share a filesystem with `change_capture`.
    pub overlay_work: PathBuf,
    pub working_directory: PathBuf,
    pub commands: Vec<Vec<String>>,
    #[serde(default)]
    pub strategy: StrategyKind,
    #[serde(default)]
    pub isolate_network: bool,
    /// Log filter the child initialises its logger with.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl IsolationContext {
    pub fn write_to<W: Write>(&self, writer: W) -> Result<()> {
        serde_json::to_writer(writer, self)?;
        Ok(())
    }

    /// Read a context from `reader` until end of stream.
    pub fn read_from<R: Read>(mut reader: R) -> Result<Self> {
        let mut buffer = Vec::new();
        reader.read_to_end(&mut buffer)?;
        Ok(serde_json::from_slice(&buffer)?)
    }
}
