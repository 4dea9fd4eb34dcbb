//! Agent abstraction.
//!
//! The controller is agnostic to the model behind the trait; it only needs
//! text output, a list of proposed actions, and usage accounting for run
//! budgets. Each call is self-contained: no conversation state survives
//! between cycles.

pub mod anthropic;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use anthropic::{AnthropicAgent, AnthropicConfig};

/// A workspace action proposed by the agent.
///
/// The action set is closed; anything else in the reply is ignored. Paths
/// are relative to the workspace root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Action {
    ReadFile { path: String },
    WriteFile { path: String, content: String },
    Execute { command: String },
}

/// Token usage for one agent call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl Usage {
    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

/// One complete agent response
#[derive(Debug, Clone, Default)]
pub struct AgentReply {
    /// Concatenated text blocks; scanned for the completion token
    pub text: String,
    /// Proposed actions, in the order the agent emitted them
    pub actions: Vec<Action>,
    pub usage: Usage,
    /// Estimated cost of this call in USD
    pub cost_usd: f64,
}

/// A coding agent invoked once per cycle with a fresh context
#[async_trait]
pub trait Agent: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<AgentReply>;
}
