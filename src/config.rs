//! Run configuration.
//!
//! A `RunConfig` is constructed once, stored inside the control record, and
//! never mutated while a run is in flight. Loading cascades from an explicit
//! path, to the local `.cyclr/cyclr.yml`, to the global config, to defaults.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CyclrError, Result};
use crate::gates::QualityGate;
use crate::progress::ProgressCap;

/// Default completion token the agent must emit on its own line
pub const DEFAULT_COMPLETION_SIGNAL: &str = "<promise>COMPLETE</promise>";

/// Static configuration for one loop; immutable once a run starts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Static task text presented to the agent every cycle
    pub task: String,
    /// Maximum cycles before the run fails
    pub max_cycles: u32,
    /// Per-cycle agent-call timeout in seconds
    pub cycle_timeout_secs: u64,
    /// Shell command that externally verifies the work
    pub validation_command: String,
    /// Validation-command timeout in seconds
    pub validation_timeout_secs: u64,
    /// Exact line the agent emits to self-report completion
    pub completion_signal: String,
    /// Pattern-based invariant checks over the workspace
    pub quality_gates: Vec<QualityGate>,
    /// Bounds on progress feedback accumulation
    pub progress_cap: ProgressCap,
    /// Checkpoint the workspace after each cycle's actions
    pub auto_commit: bool,
    /// Commit message template; `{cycle}` is substituted
    pub commit_template: String,
    /// Optional total-token budget across the run
    pub max_tokens: Option<u64>,
    /// Optional total-cost budget in USD across the run
    pub max_cost_usd: Option<f64>,
    /// Optional wall-clock budget in seconds across the run
    pub max_time_secs: Option<u64>,
    /// Whether an Invalidate signal discards accumulated feedback
    pub invalidate_clears_progress: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            task: String::new(),
            max_cycles: 100,
            cycle_timeout_secs: 600,
            validation_command: "cargo test".to_string(),
            validation_timeout_secs: 300,
            completion_signal: DEFAULT_COMPLETION_SIGNAL.to_string(),
            quality_gates: vec![
                QualityGate::forbidden("no_todos", "TODO"),
                QualityGate::forbidden("no_dead_code", "allow(dead_code)"),
            ],
            progress_cap: ProgressCap::default(),
            auto_commit: true,
            commit_template: "cyclr: cycle {cycle}".to_string(),
            max_tokens: None,
            max_cost_usd: None,
            max_time_secs: None,
            invalidate_clears_progress: false,
        }
    }
}

impl RunConfig {
    pub fn cycle_timeout(&self) -> Duration {
        Duration::from_secs(self.cycle_timeout_secs)
    }

    pub fn validation_timeout(&self) -> Duration {
        Duration::from_secs(self.validation_timeout_secs)
    }

    /// Deterministic checkpoint message for a cycle
    pub fn commit_message(&self, cycle: u32) -> String {
        self.commit_template.replace("{cycle}", &cycle.to_string())
    }

    /// Get the global config directory path
    pub fn global_config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("cyclr"))
    }

    /// Get the global config file path
    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_config_dir().map(|d| d.join("cyclr.yml"))
    }

    /// Get the local config directory path (relative to work_dir)
    pub fn local_config_dir(work_dir: &Path) -> PathBuf {
        work_dir.join(".cyclr")
    }

    /// Get the local config file path (relative to work_dir)
    pub fn local_config_path(work_dir: &Path) -> PathBuf {
        Self::local_config_dir(work_dir).join("cyclr.yml")
    }

    /// Load configuration with the cascade: explicit path -> local -> global
    /// -> defaults
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path);
        }

        let local_config = Self::local_config_path(Path::new("."));
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    log::warn!("failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        if let Some(global_config) = Self::global_config_path()
            && global_config.exists()
        {
            match Self::load_from_file(&global_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    log::warn!("failed to load config from {}: {}", global_config.display(), e);
                }
            }
        }

        log::info!("no config file found, using defaults");
        Ok(Self::default())
    }

    /// Load configuration from a YAML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)?;
        let config: Self = serde_yaml::from_str(&content)
            .map_err(|e| CyclrError::Config(format!("{}: {}", path.as_ref().display(), e)))?;
        log::info!("loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Save configuration to a YAML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(self)
            .map_err(|e| CyclrError::Config(e.to_string()))?;
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, content)?;
        Ok(())
    }

    /// Save to the local config path (`.cyclr/cyclr.yml`)
    pub fn save_local(&self, work_dir: &Path) -> Result<()> {
        self.save(Self::local_config_path(work_dir))
    }
}
