//! Crossing the namespace boundary
//!
//! The parent spawns `/proc/self/exe isolate-child` in its own process
//! group. Between fork and exec the child moves the context pipe to
//! [`CONTEXT_FD`], unshares its user and mount namespaces (plus network when
//! asked) and maps the invoking user and group to root. Only async-signal
//! safe calls happen in that window; every buffer is prepared beforehand.

use std::ffi::CStr;
use std::fs::File;
use std::io::{self, Write};
use std::os::unix::io::{AsRawFd, FromRawFd, RawFd};
use std::os::unix::process::CommandExt;
use std::process::{Command, Stdio};

use log::{debug, info, trace};
use nix::fcntl::OFlag;
use nix::mount::{mount, MsFlags};
use nix::sched::{unshare, CloneFlags};
use nix::unistd::{getgid, getuid, pipe2};

use super::context::IsolationContext;
use super::shell::run_commands;
use super::strategy::Isolator;
use super::{CHILD_COMMAND, CONTEXT_FD};
use crate::error::{Error, Result};

const SELF_EXE: &str = "/proc/self/exe";

/// Single-entry id maps written by the child before exec.
struct IdMaps {
    uid_map: Vec<u8>,
    gid_map: Vec<u8>,
}

impl IdMaps {
    fn for_current_user() -> Self {
        Self {
            uid_map: format!("0 {} 1\n", getuid()).into_bytes(),
            gid_map: format!("0 {} 1\n", getgid()).into_bytes(),
        }
    }
}

fn namespace_flags(isolate_network: bool) -> CloneFlags {
    let mut flags = CloneFlags::CLONE_NEWUSER | CloneFlags::CLONE_NEWNS;
    if isolate_network {
        flags |= CloneFlags::CLONE_NEWNET;
    }
    flags
}

/// Write `content` to a procfs file with raw syscalls only.
fn write_proc_file(path: &CStr, content: &[u8]) -> io::Result<()> {
    // SAFETY: `path` is NUL terminated and `content` outlives the calls.
    unsafe {
        let fd = libc::open(path.as_ptr(), libc::O_WRONLY | libc::O_CLOEXEC);
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }
        let written = libc::write(fd, content.as_ptr().cast(), content.len());
        let result = if written < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(())
        };
        libc::close(fd);
        result
    }
}

/// Runs in the forked child before exec.
fn enter_namespaces(pipe: RawFd, flags: CloneFlags, maps: &IdMaps) -> io::Result<()> {
    // SAFETY: plain descriptor syscalls on descriptors this process owns.
    unsafe {
        if pipe == CONTEXT_FD {
            if libc::fcntl(pipe, libc::F_SETFD, 0) < 0 {
                return Err(io::Error::last_os_error());
            }
        } else if libc::dup2(pipe, CONTEXT_FD) < 0 {
            return Err(io::Error::last_os_error());
        }
    }
    unshare(flags).map_err(io::Error::from)?;
    write_proc_file(c"/proc/self/setgroups", b"deny")?;
    write_proc_file(c"/proc/self/uid_map", &maps.uid_map)?;
    write_proc_file(c"/proc/self/gid_map", &maps.gid_map)?;
    Ok(())
}

/// Run one step's commands in a fresh sandbox and wait for them.
///
/// Outside preparation and cleanup happen here; everything else happens in
/// the re-executed child. Cleanup runs even when preparation or the child
/// failed, and its errors are reported alongside the original one.
pub fn run_isolated(context: &IsolationContext) -> Result<()> {
    let mut isolator = Isolator::new(context);
    isolator.initialize()?;

    let outcome = isolator
        .prepare_outside()
        .and_then(|()| spawn_child(context));
    let cleanup = isolator.cleanup_outside();
    Error::combine(outcome.err(), cleanup)
}

fn spawn_child(context: &IsolationContext) -> Result<()> {
    let mut payload = Vec::new();
    context.write_to(&mut payload)?;

    let (read_end, write_end) = pipe2(OFlag::O_CLOEXEC)?;
    let pipe = read_end.as_raw_fd();
    let flags = namespace_flags(context.isolate_network);
    let maps = IdMaps::for_current_user();

    let mut command = Command::new(SELF_EXE);
    command
        .arg(CHILD_COMMAND)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .process_group(0);
    // SAFETY: the hook only issues async-signal-safe syscalls and touches
    // buffers allocated before the fork.
    unsafe {
        command.pre_exec(move || enter_namespaces(pipe, flags, &maps));
    }

    debug!(
        "Starting sandbox child for '{}' ({} strategy)",
        context.change_capture.display(),
        context.strategy
    );
    let mut child = command.spawn().map_err(|e| Error::Isolation {
        message: format!("cannot start sandbox child: {}", e),
    })?;
    drop(read_end);

    let mut writer = File::from(write_end);
    let sent = writer.write_all(&payload);
    drop(writer);

    let status = child.wait().map_err(|e| Error::Isolation {
        message: format!("cannot wait for sandbox child: {}", e),
    })?;
    sent.map_err(|e| Error::Isolation {
        message: format!("cannot hand the context to the sandbox child: {}", e),
    })?;
    if !status.success() {
        return Err(Error::Isolation {
            message: format!("sandbox child exited with {}", status),
        });
    }
    trace!("Sandbox child finished");
    Ok(())
}

/// Read the context the parent wrote to [`CONTEXT_FD`].
pub fn read_context() -> Result<IsolationContext> {
    // SAFETY: F_GETFD only inspects the descriptor table.
    if unsafe { libc::fcntl(CONTEXT_FD, libc::F_GETFD) } < 0 {
        return Err(Error::Isolation {
            message: format!(
                "no context on descriptor {}; '{}' is started by isorun itself",
                CONTEXT_FD, CHILD_COMMAND
            ),
        });
    }
    // SAFETY: the descriptor is open and nothing else in this process owns it.
    let pipe = unsafe { File::from_raw_fd(CONTEXT_FD) };
    IsolationContext::read_from(pipe)
}

/// The child half: assemble the sandbox, run the commands, unwind.
pub fn run_child(context: &IsolationContext) -> Result<()> {
    mount(
        None::<&str>,
        "/",
        None::<&str>,
        MsFlags::MS_REC | MsFlags::MS_PRIVATE,
        None::<&str>,
    )
    .map_err(|e| Error::Isolation {
        message: format!("cannot make mounts private: {}", e),
    })?;

    let mut isolator = Isolator::new(context);
    let outcome = isolator.prepare_inside().and_then(|()| {
        let failed = run_commands(&context.commands)?;
        info!(
            "Ran {} command(s), {} exited non-zero",
            context.commands.len(),
            failed
        );
        Ok(())
    });
    let cleanup = isolator.cleanup_inside();
    Error::combine(outcome.err(), cleanup)
}
