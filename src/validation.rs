//! External validation of the workspace.
//!
//! Validation is the objective check; the agent's self-report alone never
//! completes a run. The validator never surfaces an error to the controller:
//! a command that cannot run, or that overruns its timeout, is reported as a
//! failed cycle so the loop continues with that feedback.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

/// Outcome of running the validation command once
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    pub passed: bool,
    pub exit_code: i32,
    /// Captured stdout and stderr, concatenated
    pub output: String,
    /// Lines from the output that look like errors, for cycle feedback
    pub error_lines: Vec<String>,
}

impl ValidationReport {
    pub fn passed(output: impl Into<String>) -> Self {
        Self {
            passed: true,
            exit_code: 0,
            output: output.into(),
            error_lines: Vec::new(),
        }
    }

    pub fn failed(exit_code: i32, output: impl Into<String>) -> Self {
        let output = output.into();
        let error_lines = extract_error_lines(&output);
        Self {
            passed: false,
            exit_code,
            output,
            error_lines,
        }
    }
}

const MAX_ERROR_LINES: usize = 20;

/// Pull out lines that look like compiler or test errors
pub fn extract_error_lines(output: &str) -> Vec<String> {
    output
        .lines()
        .filter(|line| line.to_lowercase().contains("error"))
        .map(|line| line.trim().to_string())
        .take(MAX_ERROR_LINES)
        .collect()
}

/// Runs the configured validation command against a workspace
#[async_trait]
pub trait Validator: Send + Sync {
    async fn validate(&self, workspace: &Path, command: &str, timeout: Duration)
    -> ValidationReport;
}

/// Shell-based validator: runs the command via `sh -c` in the workspace
#[derive(Debug, Default)]
pub struct CommandValidator;

impl CommandValidator {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Validator for CommandValidator {
    async fn validate(
        &self,
        workspace: &Path,
        command: &str,
        timeout: Duration,
    ) -> ValidationReport {
        log::debug!("validating with `{}` in {}", command, workspace.display());

        let run = Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(workspace)
            .output();

        let output = match tokio::time::timeout(timeout, run).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return ValidationReport::failed(
                    -1,
                    format!("error: validation command failed to start: {}", e),
                );
            }
            Err(_) => {
                return ValidationReport::failed(
                    -1,
                    format!(
                        "error: validation timed out after {}s",
                        timeout.as_secs()
                    ),
                );
            }
        };

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        let exit_code = output.status.code().unwrap_or(-1);

        if output.status.success() {
            ValidationReport::passed(combined)
        } else {
            ValidationReport::failed(exit_code, combined)
        }
    }
}
