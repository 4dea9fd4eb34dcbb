//! Cyclr - fresh-context loop control for autonomous coding agents
//!
//! Cyclr runs an agent against a workspace in repeated, independently-contexted
//! cycles until validation passes, a completion token is emitted, and quality
//! gates hold. No conversational history survives a cycle; continuity lives in
//! the progress log, the versioned workspace, and the persisted control record.

pub mod agent;
pub mod config;
pub mod controller;
pub mod coordination;
pub mod domain;
pub mod error;
pub mod exit;
pub mod gates;
pub mod id;
pub mod progress;
pub mod prompt;
pub mod recovery;
pub mod store;
pub mod tools;
pub mod validation;
pub mod vcs;

pub use error::{CyclrError, Result};
