//! The two mount strategies behind one lifecycle
//!
//! Both strategies finish with the same inside layout: `/dev` and `/proc`
//! bound from the real root, a fresh `/tmp` from the operation directory,
//! and a chroot into the assembled root. They differ in how that root is
//! assembled and on which side of the namespace boundary it is mounted.

use std::fs;
use std::os::unix::fs::{FileTypeExt, MetadataExt};
use std::path::{Path, PathBuf};

use log::{debug, trace, warn};
use walkdir::WalkDir;

use super::context::IsolationContext;
use super::mounts::{run_helper, ChangeRoot, MountStack};
use super::StrategyKind;
use crate::defaults;
use crate::error::{fs_error, Error, Result};
use crate::merge::create_dirs;

/// Scratch paths of one step.
///
/// Everything lives under the operation directory except the overlay
/// workdir, which the kernel requires on the same mount as the capture.
#[derive(Debug, Clone)]
struct ScratchLayout {
    rootfs: PathBuf,
    lower: PathBuf,
    overlay_work: PathBuf,
    tmp: PathBuf,
}

impl ScratchLayout {
    fn new(context: &IsolationContext) -> Self {
        let operation = &context.operation_directory;
        Self {
            rootfs: operation.join("rootfs"),
            lower: operation.join("mergerfs"),
            overlay_work: context.overlay_work.clone(),
            tmp: operation.join("tmp"),
        }
    }
}

/// The shared inside part: binds plus chroot, undone in reverse.
#[derive(Debug, Default)]
struct SandboxRoot {
    mounts: MountStack,
    change_root: Option<ChangeRoot>,
    /// Leaving the chroot failed; paths no longer resolve outside it.
    stuck: bool,
}

impl SandboxRoot {
    fn enter(&mut self, context: &IsolationContext, layout: &ScratchLayout) -> Result<()> {
        for name in ["dev", "proc"] {
            self.mounts
                .bind(&context.root.join(name), &layout.rootfs.join(name))?;
        }
        create_dirs(&layout.tmp, defaults::FOLDER_PERMISSION)?;
        self.mounts.bind(&layout.tmp, &layout.rootfs.join("tmp"))?;
        self.change_root = Some(ChangeRoot::enter(
            &layout.rootfs,
            &context.working_directory,
        )?);
        Ok(())
    }

    fn leave(&mut self, layout: &ScratchLayout) -> Vec<Error> {
        let mut errors = Vec::new();
        if let Some(mut change_root) = self.change_root.take() {
            if let Err(e) = change_root.leave() {
                self.stuck = true;
                errors.push(e);
                return errors;
            }
        }
        errors.extend(self.mounts.unwind());
        if layout.tmp.exists() {
            if let Err(e) = fs::remove_dir_all(&layout.tmp) {
                errors.push(fs_error("remove", &layout.tmp)(e));
            }
        }
        errors
    }
}

/// Kernel overlay on top of a `mergerfs` view of the read-only layers.
#[derive(Debug)]
pub struct OverlayStrategy {
    context: IsolationContext,
    layout: ScratchLayout,
    mounts: MountStack,
    sandbox: SandboxRoot,
}

/// One `unionfs-fuse` copy-on-write mount made outside the namespace.
#[derive(Debug)]
pub struct UnionStrategy {
    context: IsolationContext,
    layout: ScratchLayout,
    mounted: bool,
    sandbox: SandboxRoot,
}

/// A sandbox strategy selected by the context's [`StrategyKind`].
#[derive(Debug)]
pub enum Isolator {
    Overlay(OverlayStrategy),
    Union(UnionStrategy),
}

impl Isolator {
    pub fn new(context: &IsolationContext) -> Self {
        let layout = ScratchLayout::new(context);
        match context.strategy {
            StrategyKind::Overlay => Isolator::Overlay(OverlayStrategy {
                context: context.clone(),
                layout,
                mounts: MountStack::new(),
                sandbox: SandboxRoot::default(),
            }),
            StrategyKind::Union => Isolator::Union(UnionStrategy {
                context: context.clone(),
                layout,
                mounted: false,
                sandbox: SandboxRoot::default(),
            }),
        }
    }

    pub fn kind(&self) -> StrategyKind {
        match self {
            Isolator::Overlay(_) => StrategyKind::Overlay,
            Isolator::Union(_) => StrategyKind::Union,
        }
    }

    fn context(&self) -> &IsolationContext {
        match self {
            Isolator::Overlay(s) => &s.context,
            Isolator::Union(s) => &s.context,
        }
    }

    /// Create the step's change-capture and operation directories.
    pub fn initialize(&self) -> Result<()> {
        let context = self.context();
        trace!("Initializing {} isolator", self.kind());
        create_dirs(&context.change_capture, defaults::FOLDER_PERMISSION)?;
        create_dirs(&context.operation_directory, defaults::FOLDER_PERMISSION)?;
        Ok(())
    }

    /// Work done by the parent before the child starts.
    pub fn prepare_outside(&mut self) -> Result<()> {
        match self {
            Isolator::Overlay(_) => Ok(()),
            Isolator::Union(s) => s.mount_union(),
        }
    }

    /// Assemble the root and enter it, inside the new namespaces.
    pub fn prepare_inside(&mut self) -> Result<()> {
        match self {
            Isolator::Overlay(s) => {
                s.mount_layers()?;
                s.sandbox.enter(&s.context, &s.layout)
            }
            Isolator::Union(s) => s.sandbox.enter(&s.context, &s.layout),
        }
    }

    /// Leave the chroot and undo every inside mount.
    pub fn cleanup_inside(&mut self) -> Vec<Error> {
        match self {
            Isolator::Overlay(s) => {
                let mut errors = s.sandbox.leave(&s.layout);
                if s.sandbox.stuck {
                    return errors;
                }
                errors.extend(s.mounts.unwind());
                if errors.is_empty() {
                    for dir in [&s.layout.rootfs, &s.layout.lower] {
                        remove_empty_dir(dir, &mut errors);
                    }
                    if s.layout.overlay_work.exists() {
                        if let Err(e) = fs::remove_dir_all(&s.layout.overlay_work) {
                            errors.push(fs_error("remove", &s.layout.overlay_work)(e));
                        }
                    }
                }
                errors
            }
            Isolator::Union(s) => s.sandbox.leave(&s.layout),
        }
    }

    /// Parent-side unwind; also runs when the child never started.
    ///
    /// Overlay captures keep their raw whiteouts here, since dependents stack
    /// them as lower layers. They are converted when the step is staged.
    pub fn cleanup_outside(&mut self) -> Vec<Error> {
        let mut errors = Vec::new();
        match self {
            Isolator::Overlay(_) => {}
            Isolator::Union(s) => {
                if s.mounted {
                    let args = vec![
                        "-u".to_string(),
                        "-z".to_string(),
                        s.layout.rootfs.to_string_lossy().into_owned(),
                    ];
                    match run_helper(defaults::FUSERMOUNT_BINARY, &args) {
                        Ok(()) => s.mounted = false,
                        Err(e) => errors.push(e),
                    }
                }
                if !s.mounted {
                    remove_empty_dir(&s.layout.rootfs, &mut errors);
                }
            }
        }
        let operation = &self.context().operation_directory;
        if errors.is_empty() {
            remove_empty_dir(operation, &mut errors);
        }
        errors
    }
}

impl OverlayStrategy {
    /// Overlay `lowerdir`: dependency captures, most recent first, over the
    /// `mergerfs` view of the root.
    ///
    /// Captures stay kernel layers so their whiteouts keep hiding deleted
    /// paths from later steps.
    fn lowerdir(&self) -> String {
        self.context
            .layers
            .iter()
            .chain(std::iter::once(&self.layout.lower))
            .map(|p| p.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(":")
    }

    fn mount_layers(&mut self) -> Result<()> {
        create_dirs(&self.layout.lower, defaults::FOLDER_PERMISSION)?;
        run_helper(
            defaults::MERGERFS_BINARY,
            &[
                self.context.root.to_string_lossy().into_owned(),
                self.layout.lower.to_string_lossy().into_owned(),
            ],
        )?;
        self.mounts.track(&self.layout.lower);
        self.mounts.overlay(
            &self.lowerdir(),
            &self.context.change_capture,
            &self.layout.overlay_work,
            &self.layout.rootfs,
        )
    }
}

impl UnionStrategy {
    /// Branch list handed to `unionfs-fuse`: the capture is the only writable one.
    fn branches(&self) -> String {
        let mut branches = vec![format!("{}=RW", self.context.change_capture.display())];
        branches.extend(
            self.context
                .layers
                .iter()
                .chain(std::iter::once(&self.context.root))
                .map(|p| format!("{}=RO", p.display())),
        );
        branches.join(":")
    }

    fn mount_union(&mut self) -> Result<()> {
        create_dirs(&self.layout.rootfs, defaults::FOLDER_PERMISSION)?;
        run_helper(
            defaults::UNIONFS_BINARY,
            &[
                "-o".to_string(),
                "cow,hide_meta_files,hard_remove".to_string(),
                self.branches(),
                self.layout.rootfs.to_string_lossy().into_owned(),
            ],
        )?;
        self.mounted = true;
        Ok(())
    }
}

fn remove_empty_dir(dir: &Path, errors: &mut Vec<Error>) {
    match fs::read_dir(dir) {
        Ok(mut entries) => {
            if entries.next().is_some() {
                debug!("Keeping non-empty '{}'", dir.display());
                return;
            }
            if let Err(e) = fs::remove_dir(dir) {
                errors.push(fs_error("remove", dir)(e));
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => errors.push(fs_error("read directory", dir)(e)),
    }
}

/// Turn overlay whiteouts in `capture` into deletion markers.
///
/// The kernel records a deletion in the upper layer as a `0:0` character
/// device. Each one is replaced by an empty file named `<path><marker>`.
/// Returns how many whiteouts were converted.
pub fn convert_whiteouts(capture: &Path, marker: &str) -> Result<usize> {
    if !capture.exists() {
        return Ok(0);
    }
    let mut whiteouts = Vec::new();
    for entry in WalkDir::new(capture).min_depth(1) {
        let entry = entry.map_err(|e| Error::Filesystem {
            operation: "walk".to_string(),
            path: capture.to_path_buf(),
            source: e.into(),
        })?;
        if !entry.file_type().is_char_device() {
            continue;
        }
        let metadata = entry
            .metadata()
            .map_err(|e| Error::Filesystem {
                operation: "stat".to_string(),
                path: entry.path().to_path_buf(),
                source: e.into(),
            })?;
        if metadata.rdev() == 0 {
            whiteouts.push(entry.into_path());
        } else {
            warn!("Ignoring device node '{}' in change capture", entry.path().display());
        }
    }

    for whiteout in &whiteouts {
        fs::remove_file(whiteout).map_err(fs_error("remove", whiteout))?;
        let mut marked = whiteout.clone().into_os_string();
        marked.push(marker);
        fs::File::create(&marked).map_err(fs_error("create", Path::new(&marked)))?;
        trace!("Converted whiteout '{}'", whiteout.display());
    }
    Ok(whiteouts.len())
}
