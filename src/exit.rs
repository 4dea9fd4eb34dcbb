//! Exit policy - the pure decision function evaluated once per cycle.
//!
//! Precedence, strictly in order: a pending signal is handled by the
//! controller before this function is reached; success requires validation
//! AND the completion token AND all quality gates; a gate failure after
//! validation and token success is a normal failed cycle, not completion;
//! any non-success at the cycle ceiling fails the run; otherwise continue.

/// Facts gathered by the controller over one cycle
#[derive(Debug, Clone)]
pub struct CycleFacts {
    pub validation_passed: bool,
    pub promise_found: bool,
    pub gates_passed: bool,
    /// Name of the first violated gate, when gates failed
    pub failed_gate: Option<String>,
    /// Cycle count including the cycle being evaluated
    pub cycle_count: u32,
    pub max_cycles: u32,
}

/// Decision produced by the exit policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitDecision {
    /// Terminal success
    Complete,
    /// Terminal failure with a human-readable reason
    Failed(String),
    /// Keep looping; carries the feedback summary for the cycle entry
    Continue(String),
}

impl ExitDecision {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ExitDecision::Continue(_))
    }
}

/// Pure exit evaluation; no side effects
pub struct ExitPolicy;

impl ExitPolicy {
    pub fn evaluate(facts: &CycleFacts) -> ExitDecision {
        if facts.validation_passed && facts.promise_found && facts.gates_passed {
            return ExitDecision::Complete;
        }

        let summary = match (facts.validation_passed, facts.promise_found) {
            (true, true) => {
                let gate = facts.failed_gate.as_deref().unwrap_or("unknown");
                format!("gate `{}` violated", gate)
            }
            (true, false) => "validation passed, waiting for completion signal".to_string(),
            (false, true) => "claimed complete but validation failed".to_string(),
            (false, false) => "validation failed".to_string(),
        };

        if facts.cycle_count >= facts.max_cycles {
            return ExitDecision::Failed("max iterations exhausted".to_string());
        }

        ExitDecision::Continue(summary)
    }
}
