//! Outbound message assembly.
//!
//! Each cycle's agent call receives exactly one user message built from the
//! static task text and the current rendered feedback. No prior agent output
//! is ever replayed; continuity is textual and on disk.

/// Builds the system prompt and per-cycle user message
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    task: String,
    completion_signal: String,
}

impl PromptBuilder {
    pub fn new(task: impl Into<String>, completion_signal: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            completion_signal: completion_signal.into(),
        }
    }

    /// System prompt: the fresh-context contract and the exact completion
    /// token the agent must emit on its own line when all work is done
    pub fn system(&self) -> String {
        format!(
            "You are in a fresh-context work loop. You have NO MEMORY of previous cycles; \
             your state persists only in the workspace and the feedback below.\n\n\
             Rules:\n\
             1. Do ONE small step toward the task. Not a phase - one file, one fix, one test.\n\
             2. Do not retry errors within this cycle; the loop restarts you with fresh context.\n\
             3. Validation runs externally - do not run tests yourself.\n\
             4. If ALL work is complete, emit this exact line by itself:\n\
             {}\n",
            self.completion_signal
        )
    }

    /// User message: static task text plus rendered feedback from prior
    /// cycles (empty on the first cycle)
    pub fn user_message(&self, feedback: &str) -> String {
        if feedback.is_empty() {
            self.task.clone()
        } else {
            format!("{}\n\n## Previous Cycle Feedback\n{}", self.task, feedback)
        }
    }
}

/// Check agent output for the completion token.
///
/// A match requires a line that, after trimming surrounding whitespace, is
/// exactly the token. Substring matches inside a longer line do not count.
pub fn contains_completion_line(output: &str, token: &str) -> bool {
    output.lines().any(|line| line.trim() == token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_without_feedback() {
        let builder = PromptBuilder::new("Build a web server", "<promise>COMPLETE</promise>");
        assert_eq!(builder.user_message(""), "Build a web server");
    }

    #[test]
    fn test_user_message_with_feedback() {
        let builder = PromptBuilder::new("Build a web server", "<promise>COMPLETE</promise>");
        let message = builder.user_message("## Cycle 1\nValidation: FAILED\n");

        assert!(message.starts_with("Build a web server"));
        assert!(message.contains("## Previous Cycle Feedback"));
        assert!(message.contains("Validation: FAILED"));
    }

    #[test]
    fn test_system_contains_completion_signal() {
        let builder = PromptBuilder::new("task", "<done>");
        let system = builder.system();
        assert!(system.contains("<done>"));
        assert!(system.contains("NO MEMORY"));
    }

    #[test]
    fn test_completion_line_exact_match() {
        let token = "<promise>COMPLETE</promise>";
        assert!(contains_completion_line("<promise>COMPLETE</promise>", token));
    }

    #[test]
    fn test_completion_line_trimmed_match() {
        let token = "<promise>COMPLETE</promise>";
        assert!(contains_completion_line(
            "done with everything\n   <promise>COMPLETE</promise>  \n",
            token
        ));
    }

    #[test]
    fn test_completion_line_substring_does_not_match() {
        let token = "<promise>COMPLETE</promise>";
        assert!(!contains_completion_line(
            "status: <promise>COMPLETE</promise> ok",
            token
        ));
    }

    #[test]
    fn test_completion_line_absent() {
        let token = "<promise>COMPLETE</promise>";
        assert!(!contains_completion_line("still working on it", token));
    }

    #[test]
    fn test_completion_line_empty_output() {
        assert!(!contains_completion_line("", "<promise>COMPLETE</promise>"));
    }
}
