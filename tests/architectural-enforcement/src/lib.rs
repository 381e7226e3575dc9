//! Architectural Enforcement Integration Tests
//!
//! This package contains integration tests that enforce architectural principles:
//! - No sleep() calls in production code; pacing waits on timers and I/O only
//! - The engine never writes to the terminal; surfaces own stdout/stderr
//! - The engine stays free of UI and logging-backend dependencies
//!
//! The helpers below scan source trees relative to the workspace root.

use std::fs;
use std::path::{Path, PathBuf};

/// One line of production code
#[derive(Debug, Clone)]
pub struct SourceLine {
    pub path: PathBuf,
    pub number: usize,
    /// Line with any trailing `//` comment removed
    pub code: String,
    pub text: String,
}

impl std::fmt::Display for SourceLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{} - {}", self.path.display(), self.number, self.text.trim())
    }
}

/// Workspace root, two levels above this package
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
}

/// All `.rs` files under `dir` (relative to the workspace root)
pub fn rust_files(dir: &str) -> Vec<PathBuf> {
    let path = workspace_root().join(dir);
    if !path.exists() {
        return Vec::new();
    }

    walkdir::WalkDir::new(path)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("rs"))
        .map(|e| e.into_path())
        .collect()
}

/// Code lines of `path` up to its `#[cfg(test)]` module
pub fn production_lines(path: &Path) -> Vec<SourceLine> {
    let Ok(content) = fs::read_to_string(path) else {
        return Vec::new();
    };

    content
        .lines()
        .enumerate()
        .take_while(|(_, line)| !line.trim_start().starts_with("#[cfg(test)]"))
        .map(|(idx, line)| SourceLine {
            path: path.to_path_buf(),
            number: idx + 1,
            code: line.split("//").next().unwrap_or(line).to_string(),
            text: line.to_string(),
        })
        .collect()
}

/// Production lines under `dirs` whose code matches any of `needles`
pub fn find_violations(dirs: &[&str], needles: &[&str]) -> Vec<SourceLine> {
    dirs.iter()
        .flat_map(|dir| rust_files(dir))
        .flat_map(|path| production_lines(&path))
        .filter(|line| needles.iter().any(|n| line.code.contains(n)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_production_lines_stop_at_test_module() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("sample.rs");
        fs::write(
            &file,
            "fn run() { tokio::time::sleep(d); } // sleep(\n#[cfg(test)]\nmod tests { fn t() { sleep(d) } }\n",
        )
        .unwrap();

        let lines = production_lines(&file);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].code.contains("::sleep("));
        assert!(!lines[0].code.contains("// sleep("));
    }

    #[test]
    fn test_workspace_root_contains_engine() {
        assert!(workspace_root().join("askstream/core/src/lib.rs").exists());
    }
}
