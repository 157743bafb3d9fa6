//! # Error Suggestions
//!
//! This module provides helper functions for generating helpful error
//! messages with hints and suggestions. Following CLI recommendations,
//! errors should tell users what went wrong AND how to fix it.
//!
//! Cyclic dependencies and overwrite conflicts are almost always caused by
//! the plan's author, so both name the offending item or path.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use isorun::suggestions;
//!
//! // Instead of returning the library error as is:
//! return Err(suggestions::for_error(err));
//! ```

use std::path::Path;

use crate::error::Error;

/// Generate an error for when the plan file is not found.
pub fn plan_not_found(path: &Path) -> anyhow::Error {
    anyhow::anyhow!(
        "Plan file not found: {path}\n\n\
         hint: Use -p/--plan to point at a YAML or JSON plan\n\
         hint: Set the ISORUN_PLAN environment variable",
        path = path.display()
    )
}

/// Generate an error for a cycle between work items.
pub fn cycle_detected(item: &str, cycle: &str) -> anyhow::Error {
    anyhow::anyhow!(
        "Cyclic dependency detected at work item '{item}': {cycle}\n\n\
         hint: Remove one of the 'dependencies' entries along the cycle\n\
         hint: Run 'isorun validate' to print the execution groups once it is fixed"
    )
}

/// Generate an error for two change-sets touching the same path.
pub fn overwrite_blocked(source: &Path, conflicting: &Path) -> anyhow::Error {
    anyhow::anyhow!(
        "Overwrite blocked: '{source}' collides with existing '{conflicting}'\n\n\
         hint: Two independent work items changed the same path; make one depend on the other\n\
         hint: Narrow a work item with 'include'/'exclude' patterns so it only reports its own changes",
        source = source.display(),
        conflicting = conflicting.display()
    )
}

/// Generate an error for a failing mount helper.
pub fn external_tool_failed(command: &str, output: &str) -> anyhow::Error {
    let output = output.trim_end();
    let detail = if output.is_empty() {
        String::new()
    } else {
        format!("\noutput: {output}")
    };
    anyhow::anyhow!(
        "External tool failed: {command}{detail}\n\n\
         hint: Check that mergerfs or unionfs-fuse and fusermount are installed\n\
         hint: Try the other backend with --strategy overlay|union"
    )
}

/// Generate an error for a sandbox that could not be set up.
pub fn isolation_failed(message: &str) -> anyhow::Error {
    anyhow::anyhow!(
        "Isolation error: {message}\n\n\
         hint: Unprivileged user namespaces must be enabled (kernel.unprivileged_userns_clone=1)\n\
         hint: Run with --log-level debug to see each mount as it happens"
    )
}

/// Hint for a dependency on an id that is not part of the plan.
///
/// Returns a "did you mean" line when a known id is close enough.
pub fn unknown_dependency(item: &str, dependency: &str, known: &[&str]) -> String {
    let did_you_mean = find_similar(dependency, known)
        .map(|s| format!(" (did you mean '{s}'?)"))
        .unwrap_or_default();
    format!("work item '{item}' depends on unknown item '{dependency}'{did_you_mean}; the dependency is ignored")
}

/// Turn a library error into a user-facing error with hints where we have them.
pub fn for_error(err: Error) -> anyhow::Error {
    match err.root_cause() {
        Error::CyclicDependency { item, cycle } => cycle_detected(item, cycle),
        Error::OverwriteBlocked {
            source_path,
            conflicting_path,
        } => overwrite_blocked(source_path, conflicting_path)
            .context(err.to_string()),
        Error::ExternalToolFailure { command, output } => {
            external_tool_failed(command, output).context(err.to_string())
        }
        Error::Isolation { message } => isolation_failed(message).context(err.to_string()),
        _ => anyhow::Error::new(err),
    }
}

/// Find a similar string from a list of candidates using edit distance.
///
/// Returns Some(candidate) if a close match is found (edit distance <= 2).
fn find_similar<'a>(input: &str, candidates: &[&'a str]) -> Option<&'a str> {
    candidates
        .iter()
        .filter_map(|&candidate| {
            let distance = edit_distance(input, candidate);
            if distance <= 2 && distance < input.len() {
                Some((candidate, distance))
            } else {
                None
            }
        })
        .min_by_key(|(_, distance)| *distance)
        .map(|(candidate, _)| candidate)
}

/// Calculate the Levenshtein edit distance between two strings.
fn edit_distance(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let a_len = a_chars.len();
    let b_len = b_chars.len();

    if a_len == 0 {
        return b_len;
    }
    if b_len == 0 {
        return a_len;
    }

    let mut previous: Vec<usize> = (0..=b_len).collect();
    let mut current = vec![0usize; b_len + 1];
    for i in 1..=a_len {
        current[0] = i;
        for j in 1..=b_len {
            let cost = usize::from(a_chars[i - 1] != b_chars[j - 1]);
            current[j] = (previous[j] + 1)
                .min(current[j - 1] + 1)
                .min(previous[j - 1] + cost);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[b_len]
}
