//! Anthropic-backed agent.
//!
//! One stateless messages-API call per cycle. Tool-use blocks in the reply
//! are mapped onto the closed action set; unknown tool names are skipped
//! with a warning rather than failing the cycle.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};

use crate::agent::{Action, Agent, AgentReply, Usage};
use crate::error::{CyclrError, Result};

/// Anthropic API base URL
const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";

/// Anthropic API version
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Default model to use
const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// Default max tokens
const DEFAULT_MAX_TOKENS: u32 = 8192;

/// Per-million-token pricing in USD: (input, output)
fn model_pricing(model: &str) -> (f64, f64) {
    if model.contains("opus") {
        (15.0, 75.0)
    } else if model.contains("haiku") {
        (0.80, 4.0)
    } else {
        // sonnet and unrecognized models
        (3.0, 15.0)
    }
}

/// Configuration for the Anthropic agent
#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    pub model: String,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout: Duration::from_secs(300),
        }
    }
}

impl AnthropicConfig {
    /// Create a new config with a specific model
    pub fn with_model(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }
}

/// Anthropic API agent
pub struct AnthropicAgent {
    client: Client,
    api_key: String,
    config: AnthropicConfig,
}

impl AnthropicAgent {
    /// Create a new agent, reading ANTHROPIC_API_KEY from the environment
    pub fn new(config: AnthropicConfig) -> Result<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .map_err(|_| CyclrError::Agent("ANTHROPIC_API_KEY not set".to_string()))?;
        Self::with_api_key(api_key, config)
    }

    /// Create an agent with an explicit API key
    pub fn with_api_key(api_key: String, config: AnthropicConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| CyclrError::Agent(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            config,
        })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Schemas for the three workspace tools the loop exposes
    fn tool_definitions() -> Value {
        json!([
            {
                "name": "read_file",
                "description": "Read a file from the workspace",
                "input_schema": {
                    "type": "object",
                    "properties": {
                        "path": { "type": "string", "description": "Workspace-relative path" }
                    },
                    "required": ["path"]
                }
            },
            {
                "name": "write_file",
                "description": "Create or overwrite a file in the workspace",
                "input_schema": {
                    "type": "object",
                    "properties": {
                        "path": { "type": "string", "description": "Workspace-relative path" },
                        "content": { "type": "string", "description": "Full file content" }
                    },
                    "required": ["path", "content"]
                }
            },
            {
                "name": "execute",
                "description": "Run a shell command in the workspace",
                "input_schema": {
                    "type": "object",
                    "properties": {
                        "command": { "type": "string", "description": "Shell command line" }
                    },
                    "required": ["command"]
                }
            }
        ])
    }

    fn build_request(&self, system: &str, user: &str) -> Value {
        json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens,
            "system": system,
            "messages": [
                { "role": "user", "content": user }
            ],
            "tools": Self::tool_definitions()
        })
    }

    fn parse_reply(&self, body: Value) -> AgentReply {
        let usage = body
            .get("usage")
            .map(|u| Usage {
                input_tokens: u["input_tokens"].as_u64().unwrap_or(0),
                output_tokens: u["output_tokens"].as_u64().unwrap_or(0),
            })
            .unwrap_or_default();

        let (input_rate, output_rate) = model_pricing(&self.config.model);
        let cost_usd = usage.input_tokens as f64 / 1_000_000.0 * input_rate
            + usage.output_tokens as f64 / 1_000_000.0 * output_rate;

        let mut text = String::new();
        let mut actions = Vec::new();

        if let Some(blocks) = body["content"].as_array() {
            for block in blocks {
                match block["type"].as_str() {
                    Some("text") => {
                        if let Some(t) = block["text"].as_str() {
                            if !text.is_empty() {
                                text.push('\n');
                            }
                            text.push_str(t);
                        }
                    }
                    Some("tool_use") => {
                        let name = block["name"].as_str().unwrap_or("");
                        let input = &block["input"];
                        match Self::parse_action(name, input) {
                            Some(action) => actions.push(action),
                            None => {
                                log::warn!("ignoring unknown or malformed tool use: {}", name);
                            }
                        }
                    }
                    _ => {}
                }
            }
        }

        AgentReply {
            text,
            actions,
            usage,
            cost_usd,
        }
    }

    fn parse_action(name: &str, input: &Value) -> Option<Action> {
        match name {
            "read_file" => Some(Action::ReadFile {
                path: input["path"].as_str()?.to_string(),
            }),
            "write_file" => Some(Action::WriteFile {
                path: input["path"].as_str()?.to_string(),
                content: input["content"].as_str()?.to_string(),
            }),
            "execute" => Some(Action::Execute {
                command: input["command"].as_str()?.to_string(),
            }),
            _ => None,
        }
    }

    async fn send_request(&self, body: Value) -> Result<Value> {
        let response = self
            .client
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| CyclrError::Agent(format!("request failed: {}", e)))?;

        let status = response.status();

        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|h| h.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(60);
            return Err(CyclrError::Agent(format!(
                "rate limited, retry after {} seconds",
                retry_after
            )));
        }

        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(CyclrError::Agent(format!(
                "API error {}: {}",
                status, error_body
            )));
        }

        response
            .json()
            .await
            .map_err(|e| CyclrError::Agent(format!("failed to parse response: {}", e)))
    }
}

#[async_trait]
impl Agent for AnthropicAgent {
    async fn complete(&self, system: &str, user: &str) -> Result<AgentReply> {
        let body = self.build_request(system, user);
        let response = self.send_request(body).await?;
        Ok(self.parse_reply(response))
    }
}

impl std::fmt::Debug for AnthropicAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicAgent")
            .field("model", &self.config.model)
            .field("max_tokens", &self.config.max_tokens)
            .finish()
    }
}
