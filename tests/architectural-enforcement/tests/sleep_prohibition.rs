//! Integration Test: Sleep Prohibition
//!
//! **Policy**: Production code in the engine and the CLI MUST NOT call sleep
//! methods. Pacing waits on scheduler ticks, reads wait on the body stream.
//! **Exceptions**: test code (`#[cfg(test)]` modules and `tests/` directories).

use architectural_enforcement::find_violations;

#[test]
fn test_no_sleep_in_production_code() {
    let violations = find_violations(
        &["askstream/core/src", "askstream/cli/src"],
        &["::sleep(", ".sleep(", "sleep_until("],
    );

    if !violations.is_empty() {
        eprintln!("\nSleep calls found in production code:\n");
        for violation in &violations {
            eprintln!("  {violation}");
        }
        eprintln!("\nAcceptable waits:");
        eprintln!("  - Scheduler ticks (tokio::time::interval via TokioScheduler)");
        eprintln!("  - tokio::time::timeout around a body read");

        panic!(
            "\nFound {} sleep violation(s) in production code.",
            violations.len()
        );
    }
}
