//! Integration Test: Engine Boundaries
//!
//! **Policy**: `askstream-core` is a library driven through delivery sinks.
//! It never writes to the terminal, never installs a logging backend and
//! never depends on argument parsing. Those belong to surfaces such as the
//! CLI.

use std::fs;

use architectural_enforcement::{find_violations, workspace_root};

#[test]
fn test_engine_does_not_print() {
    let violations = find_violations(
        &["askstream/core/src"],
        &["println!(", "print!(", "eprintln!(", "eprint!(", "dbg!("],
    );

    assert!(
        violations.is_empty(),
        "Engine code writes to the terminal; deliver through a sink instead:\n{}",
        violations
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    );
}

#[test]
fn test_engine_has_no_surface_dependencies() {
    let manifest = fs::read_to_string(workspace_root().join("askstream/core/Cargo.toml"))
        .expect("core manifest is readable");
    let dependencies = manifest
        .split("[dev-dependencies]")
        .next()
        .unwrap_or_default();

    for forbidden in ["clap", "tracing-subscriber", "ratatui", "crossterm", "anyhow"] {
        let declared = dependencies
            .lines()
            .any(|line| line.trim_start().starts_with(&format!("{forbidden} ")));
        assert!(!declared, "askstream-core must not depend on {forbidden}");
    }
}

#[test]
fn test_engine_does_not_block_on_stdin() {
    let violations = find_violations(&["askstream/core/src"], &["std::io::stdin", "read_line("]);
    assert!(
        violations.is_empty(),
        "Engine code reads stdin: {:?}",
        violations.iter().map(ToString::to_string).collect::<Vec<_>>()
    );
}
