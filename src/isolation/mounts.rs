//! Mount bookkeeping, chroot handling and mount helper invocation

use std::fs::File;
use std::io;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::process::Command;

use log::{debug, error, trace};
use nix::errno::Errno;
use nix::mount::{mount, umount2, MntFlags, MsFlags};
use nix::unistd::{chdir, chroot};

use crate::error::{fs_error, Error, Result};

/// Wrap a failed system call with the operation and path it concerned.
pub(crate) fn sys_error<'a>(operation: &'a str, path: &'a Path) -> impl FnOnce(Errno) -> Error + 'a {
    move |errno| Error::Filesystem {
        operation: operation.to_string(),
        path: path.to_path_buf(),
        source: io::Error::from(errno),
    }
}

/// Mounts made by one strategy, unmounted in reverse order.
#[derive(Debug, Default)]
pub(crate) struct MountStack {
    targets: Vec<PathBuf>,
}

impl MountStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a mount some helper program made on our behalf.
    pub fn track(&mut self, target: &Path) {
        self.targets.push(target.to_path_buf());
    }

    /// Recursively bind `source` onto `target`, creating `target` if needed.
    pub fn bind(&mut self, source: &Path, target: &Path) -> Result<()> {
        std::fs::create_dir_all(target).map_err(fs_error("create mount point", target))?;
        mount(
            Some(source),
            target,
            None::<&str>,
            MsFlags::MS_BIND | MsFlags::MS_REC,
            None::<&str>,
        )
        .map_err(sys_error("bind mount", target))?;
        debug!("Bound '{}' onto '{}'", source.display(), target.display());
        self.track(target);
        Ok(())
    }

    /// Mount a kernel overlay of `lowerdir`, `upper` and `work` onto `target`.
    ///
    /// `lowerdir` is a colon-separated stack, topmost first.
    pub fn overlay(&mut self, lowerdir: &str, upper: &Path, work: &Path, target: &Path) -> Result<()> {
        std::fs::create_dir_all(target).map_err(fs_error("create mount point", target))?;
        std::fs::create_dir_all(work).map_err(fs_error("create overlay work directory", work))?;
        let options = format!(
            "lowerdir={},upperdir={},workdir={}",
            lowerdir,
            upper.display(),
            work.display()
        );
        mount(
            Some("none"),
            target,
            Some("overlay"),
            MsFlags::MS_NOSUID,
            Some(options.as_str()),
        )
        .map_err(sys_error("overlay mount", target))?;
        debug!("Mounted overlay on '{}' ({})", target.display(), options);
        self.track(target);
        Ok(())
    }

    /// Lazily unmount everything in reverse order, collecting failures.
    pub fn unwind(&mut self) -> Vec<Error> {
        let mut errors = Vec::new();
        while let Some(target) = self.targets.pop() {
            trace!("Unmounting '{}'", target.display());
            if let Err(e) = umount2(&target, MntFlags::MNT_DETACH) {
                errors.push(sys_error("unmount", &target)(e));
            }
        }
        errors
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

/// An entered chroot that can be left again.
///
/// A handle on the original root is kept open while inside, so leaving is
/// `fchdir` to that handle followed by `chroot(".")`.
#[derive(Debug)]
pub(crate) struct ChangeRoot {
    saved_root: Option<File>,
}

impl ChangeRoot {
    pub fn enter(new_root: &Path, working_directory: &Path) -> Result<Self> {
        let saved_root = File::open("/").map_err(fs_error("open", Path::new("/")))?;
        chroot(new_root).map_err(sys_error("chroot", new_root))?;
        let mut entered = Self {
            saved_root: Some(saved_root),
        };
        if let Err(e) = chdir(working_directory) {
            let original = sys_error("change directory", working_directory)(e);
            return Err(match entered.leave() {
                Ok(()) => original,
                Err(cleanup) => Error::Cleanup {
                    original: Some(Box::new(original)),
                    errors: vec![cleanup],
                },
            });
        }
        debug!(
            "Entered chroot '{}' at '{}'",
            new_root.display(),
            working_directory.display()
        );
        Ok(entered)
    }

    /// Return to the original root. Leaving twice is a no-op.
    pub fn leave(&mut self) -> Result<()> {
        let Some(saved_root) = self.saved_root.take() else {
            return Ok(());
        };
        // SAFETY: the descriptor is owned by `saved_root` and open.
        Errno::result(unsafe { libc::fchdir(saved_root.as_raw_fd()) })
            .map_err(sys_error("fchdir", Path::new("/")))?;
        chroot(".").map_err(sys_error("chroot", Path::new(".")))?;
        debug!("Left chroot");
        Ok(())
    }
}

/// Run an external helper to completion, failing with its captured output.
pub(crate) fn run_helper(program: &str, args: &[String]) -> Result<()> {
    let command_line = std::iter::once(program.to_string())
        .chain(args.iter().cloned())
        .collect::<Vec<_>>()
        .join(" ");
    debug!("Running helper: {}", command_line);

    let output = Command::new(program).args(args).output().map_err(|e| {
        error!("Could not start '{}': {}", command_line, e);
        Error::ExternalToolFailure {
            command: command_line.clone(),
            output: e.to_string(),
        }
    })?;

    if output.status.success() {
        return Ok(());
    }
    let mut captured = String::from_utf8_lossy(&output.stdout).into_owned();
    captured.push_str(&String::from_utf8_lossy(&output.stderr));
    error!(
        "'{}' exited with {}: {}",
        command_line,
        output.status,
        captured.trim_end()
    );
    Err(Error::ExternalToolFailure {
        command: format!("{} ({})", command_line, output.status),
        output: captured,
    })
}
