//! Running work item commands through the sandbox shell

use std::process::{Command, Stdio};

use log::{info, warn};

use crate::defaults;
use crate::error::{Error, Result};

/// Quote `arg` for `/bin/sh` unless it is made of safe characters only.
pub fn quote(arg: &str) -> String {
    let safe = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:@,+%".contains(c));
    if safe {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', "'\\''"))
    }
}

/// Shell line for one command.
///
/// A single-element command is a script and passes through verbatim; longer
/// ones are argument vectors and every element is quoted.
pub fn command_line(command: &[String]) -> String {
    match command {
        [script] => script.clone(),
        args => args.iter().map(|a| quote(a)).collect::<Vec<_>>().join(" "),
    }
}

/// Run `commands` one after another and return how many exited non-zero.
///
/// A failing command is logged and the next one still runs. Only a shell
/// that cannot be started at all is an error.
pub fn run_commands(commands: &[Vec<String>]) -> Result<usize> {
    let mut failed = 0;
    for command in commands {
        let line = command_line(command);
        info!("Running '{}'", line);
        let status = Command::new(defaults::SHELL)
            .arg("-c")
            .arg(&line)
            .env_clear()
            .env("PATH", defaults::SANDBOX_PATH)
            .env("PS1", "isorun$ ")
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .map_err(|e| Error::ExternalToolFailure {
                command: format!("{} -c {}", defaults::SHELL, line),
                output: e.to_string(),
            })?;
        if !status.success() {
            warn!("Command '{}' exited with {}, continuing", line, status);
            failed += 1;
        }
    }
    Ok(failed)
}
