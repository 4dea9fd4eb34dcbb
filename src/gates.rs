//! Quality gates - mechanical pattern checks over the checkpointed workspace.
//!
//! A gate is `{name, pattern, forbidden}`. A forbidden pattern found anywhere
//! in scope fails the gate; a required pattern (`forbidden: false`) fails the
//! gate when it appears nowhere. Gates are independent of the validation
//! command and never judge quality beyond the pattern match.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// A single pattern-based invariant check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityGate {
    pub name: String,
    /// Literal substring matched against workspace file contents
    pub pattern: String,
    /// true: the pattern must not appear; false: the pattern must appear
    #[serde(default = "default_forbidden")]
    pub forbidden: bool,
}

fn default_forbidden() -> bool {
    true
}

impl QualityGate {
    pub fn forbidden(name: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pattern: pattern.into(),
            forbidden: true,
        }
    }

    pub fn required(name: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pattern: pattern.into(),
            forbidden: false,
        }
    }
}

/// One failed gate with a human-readable detail
#[derive(Debug, Clone, PartialEq)]
pub struct GateFailure {
    pub gate: String,
    pub detail: String,
}

/// Result of evaluating all gates against a workspace
#[derive(Debug, Clone, Default)]
pub struct GateOutcome {
    pub failures: Vec<GateFailure>,
}

impl GateOutcome {
    pub fn all_passed(&self) -> bool {
        self.failures.is_empty()
    }

    /// Name of the first failed gate, if any
    pub fn first_failed_gate(&self) -> Option<&str> {
        self.failures.first().map(|f| f.gate.as_str())
    }
}

/// Evaluate gates against every readable text file under the workspace.
///
/// The `.git` directory is skipped; unreadable or non-UTF-8 files are
/// ignored rather than failing the scan.
pub fn run_gates(gates: &[QualityGate], workspace: &Path) -> GateOutcome {
    let mut outcome = GateOutcome::default();
    if gates.is_empty() {
        return outcome;
    }

    let files = workspace_files(workspace);

    for gate in gates {
        let mut found_in: Option<String> = None;
        for (path, content) in &files {
            if content.contains(&gate.pattern) {
                found_in = Some(path.clone());
                break;
            }
        }

        match (gate.forbidden, found_in) {
            (true, Some(path)) => outcome.failures.push(GateFailure {
                gate: gate.name.clone(),
                detail: format!("forbidden pattern `{}` found in {}", gate.pattern, path),
            }),
            (false, None) => outcome.failures.push(GateFailure {
                gate: gate.name.clone(),
                detail: format!("required pattern `{}` not found in workspace", gate.pattern),
            }),
            _ => {}
        }
    }

    outcome
}

fn workspace_files(workspace: &Path) -> Vec<(String, String)> {
    // The root itself is a literal path; metacharacters in it must not be
    // interpreted by the glob.
    let root = glob::Pattern::escape(&workspace.display().to_string());
    let pattern = format!("{}/**/*", root);
    let mut files = Vec::new();

    let Ok(paths) = glob::glob(&pattern) else {
        log::warn!("invalid workspace glob: {}", pattern);
        return files;
    };

    for path in paths.flatten() {
        if path.components().any(|c| c.as_os_str() == ".git") {
            continue;
        }
        if !path.is_file() {
            continue;
        }
        if let Ok(content) = std::fs::read_to_string(&path) {
            files.push((path.display().to_string(), content));
        }
    }

    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn workspace_with(files: &[(&str, &str)]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for (name, content) in files {
            let path = dir.path().join(name);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).unwrap();
            }
            std::fs::write(path, content).unwrap();
        }
        dir
    }

    #[test]
    fn test_forbidden_pattern_absent_passes() {
        let dir = workspace_with(&[("main.rs", "fn main() {}")]);
        let gates = vec![QualityGate::forbidden("no_unwrap", ".unwrap()")];

        let outcome = run_gates(&gates, dir.path());
        assert!(outcome.all_passed());
    }

    #[test]
    fn test_forbidden_pattern_present_fails() {
        let dir = workspace_with(&[("main.rs", "let x = foo.unwrap();")]);
        let gates = vec![QualityGate::forbidden("no_unwrap", ".unwrap()")];

        let outcome = run_gates(&gates, dir.path());
        assert!(!outcome.all_passed());
        assert_eq!(outcome.first_failed_gate(), Some("no_unwrap"));
        assert!(outcome.failures[0].detail.contains("main.rs"));
    }

    #[test]
    fn test_required_pattern_present_passes() {
        let dir = workspace_with(&[("lib.rs", "#[cfg(test)]\nmod tests {}")]);
        let gates = vec![QualityGate::required("has_tests", "#[cfg(test)]")];

        let outcome = run_gates(&gates, dir.path());
        assert!(outcome.all_passed());
    }

    #[test]
    fn test_required_pattern_absent_fails() {
        let dir = workspace_with(&[("lib.rs", "pub fn add() {}")]);
        let gates = vec![QualityGate::required("has_tests", "#[cfg(test)]")];

        let outcome = run_gates(&gates, dir.path());
        assert!(!outcome.all_passed());
        assert!(outcome.failures[0].detail.contains("not found"));
    }

    #[test]
    fn test_git_directory_skipped() {
        let dir = workspace_with(&[(".git/config", "forbidden-marker"), ("ok.rs", "clean")]);
        let gates = vec![QualityGate::forbidden("no_marker", "forbidden-marker")];

        let outcome = run_gates(&gates, dir.path());
        assert!(outcome.all_passed());
    }

    #[test]
    fn test_nested_files_scanned() {
        let dir = workspace_with(&[("src/deep/module.rs", "forbidden-marker")]);
        let gates = vec![QualityGate::forbidden("no_marker", "forbidden-marker")];

        let outcome = run_gates(&gates, dir.path());
        assert!(!outcome.all_passed());
    }

    #[test]
    fn test_multiple_gates_report_each_failure() {
        let dir = workspace_with(&[("a.rs", "alpha")]);
        let gates = vec![
            QualityGate::forbidden("no_alpha", "alpha"),
            QualityGate::required("has_beta", "beta"),
        ];

        let outcome = run_gates(&gates, dir.path());
        assert_eq!(outcome.failures.len(), 2);
        assert_eq!(outcome.first_failed_gate(), Some("no_alpha"));
    }

    #[test]
    fn test_workspace_path_with_glob_metacharacters() {
        let dir = workspace_with(&[]);
        let workspace = dir.path().join("ws [1] *odd?");
        std::fs::create_dir_all(&workspace).unwrap();
        std::fs::write(workspace.join("main.rs"), "// forbidden-marker").unwrap();

        let gates = vec![QualityGate::forbidden("no_marker", "forbidden-marker")];
        let outcome = run_gates(&gates, &workspace);
        assert!(!outcome.all_passed());
        assert_eq!(outcome.first_failed_gate(), Some("no_marker"));
    }

    #[test]
    fn test_no_gates_always_passes() {
        let dir = workspace_with(&[("a.rs", "anything")]);
        let outcome = run_gates(&[], dir.path());
        assert!(outcome.all_passed());
    }

    #[test]
    fn test_gate_serde_default_forbidden() {
        let gate: QualityGate =
            serde_yaml::from_str("name: no_todos\npattern: \"TODO\"").unwrap();
        assert!(gate.forbidden);

        let gate: QualityGate =
            serde_yaml::from_str("name: has_tests\npattern: \"#[test]\"\nforbidden: false")
                .unwrap();
        assert!(!gate.forbidden);
    }
}
