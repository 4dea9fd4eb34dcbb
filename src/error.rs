//! Error types for Cyclr
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

/// All error types that can occur in Cyclr
#[derive(Debug, Error)]
pub enum CyclrError {
    /// Control record not found in the state store
    #[error("Record not found: {0}")]
    RecordNotFound(String),

    /// Another controller already holds Running for this id
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Invalid state transition or operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Storage/persistence error - fatal to a run
    #[error("Storage error: {0}")]
    Storage(String),

    /// Agent call error
    #[error("Agent error: {0}")]
    Agent(String),

    /// Tool-action application error
    #[error("Tool error: {0}")]
    Tool(String),

    /// Version-control error
    #[error("Vcs error: {0}")]
    Vcs(String),

    /// Configuration load/save error
    #[error("Config error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for Cyclr operations
pub type Result<T> = std::result::Result<T, CyclrError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_not_found_error() {
        let err = CyclrError::RecordNotFound("run-001".to_string());
        assert_eq!(err.to_string(), "Record not found: run-001");
    }

    #[test]
    fn test_conflict_error() {
        let err = CyclrError::Conflict("run-001 already running".to_string());
        assert_eq!(err.to_string(), "Conflict: run-001 already running");
    }

    #[test]
    fn test_invalid_state_error() {
        let err = CyclrError::InvalidState("terminal record is immutable".to_string());
        assert_eq!(err.to_string(), "Invalid state: terminal record is immutable");
    }

    #[test]
    fn test_storage_error() {
        let err = CyclrError::Storage("file locked".to_string());
        assert_eq!(err.to_string(), "Storage error: file locked");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: CyclrError = io_err.into();
        assert!(matches!(err, CyclrError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid").unwrap_err();
        let err: CyclrError = json_err.into();
        assert!(matches!(err, CyclrError::Json(_)));
    }

    #[test]
    fn test_result_type_alias() {
        fn returns_ok() -> Result<i32> {
            Ok(42)
        }

        fn returns_err() -> Result<i32> {
            Err(CyclrError::Agent("rate limited".to_string()))
        }

        assert!(returns_ok().is_ok());
        assert!(returns_err().is_err());
    }
}
