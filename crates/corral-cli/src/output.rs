//! Formatted output helpers for CLI commands.
//!
//! Command results go to stdout so they can be piped; logs go to stderr.

#![allow(clippy::print_stdout)]

use corral_common::types::ContainerId;
use corral_runtime::State;
use corral_supervisor::StartResponse;

/// Prints a single line of command output.
pub fn print_line(line: &str) {
    println!("{line}");
}

/// Prints the stream names of a started container.
pub fn print_streams(id: &ContainerId, response: &StartResponse) {
    println!("{id}");
    println!("  stdin:  {}", response.stdin);
    println!("  stdout: {}", response.stdout);
    println!("  stderr: {}", response.stderr);
}

/// Prints container states as an aligned table.
pub fn print_table(states: &[State]) {
    for line in format_table(states) {
        println!("{line}");
    }
}

/// Renders container states as table lines, header first.
#[must_use]
pub fn format_table(states: &[State]) -> Vec<String> {
    let width = states
        .iter()
        .map(|s| s.id.as_str().len())
        .max()
        .unwrap_or(0)
        .max("ID".len());
    let mut lines = vec![format!("{:<width$}  {:<8}  {:<8}  BUNDLE", "ID", "STATUS", "SHIM")];
    for state in states {
        let shim = state
            .shim_pid
            .map_or_else(|| "-".to_owned(), |pid| pid.to_string());
        lines.push(format!(
            "{:<width$}  {:<8}  {:<8}  {}",
            state.id.as_str(),
            state.status.to_string(),
            shim,
            state.bundle.display()
        ));
    }
    lines
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use corral_common::types::Status;

    use super::*;

    fn state(id: &str, status: Status, shim_pid: Option<u32>) -> State {
        State {
            id: ContainerId::parse(id).unwrap(),
            status,
            bundle: PathBuf::from(format!("/bundles/{id}")),
            shim_pid,
        }
    }

    #[test]
    fn empty_table_has_only_header() {
        let lines = format_table(&[]);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("ID"));
    }

    #[test]
    fn rows_are_aligned_to_longest_id() {
        let lines = format_table(&[
            state("a", Status::Created, None),
            state("long-name", Status::Running, Some(42)),
        ]);
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("a          created   -"));
        assert!(lines[2].starts_with("long-name  running   42"));
        assert!(lines[2].ends_with("/bundles/long-name"));
    }
}
