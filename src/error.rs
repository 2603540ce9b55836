//! Error handling module for the pipeline
//!
//! Provides centralized error handling with proper error types using thiserror.
//! All errors in the library should use these types for consistency.

use thiserror::Error;

/// Main error type for pipeline operations
#[derive(Error, Debug)]
pub enum PipelineError {
    /// IO errors (script writing, directory creation, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors (missing resource keys, unknown GPU type)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Validation errors (application preconditions, dependency cycles)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Submission errors (sbatch returned non-zero or malformed output)
    #[error("Submission of '{job}' failed: {cause}")]
    Submission { job: String, cause: String },

    /// Orchestrator driven outside its legal state sequence
    #[error("State error: {0}")]
    State(String),

    /// Internal consistency faults (bugs, not user errors)
    #[error("Internal error: {0}")]
    Internal(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

// Convenient error constructors
impl PipelineError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a submission error carrying the failing job's name
    pub fn submission(job: impl Into<String>, cause: impl Into<String>) -> Self {
        Self::Submission {
            job: job.into(),
            cause: cause.into(),
        }
    }

    /// Create a state error
    pub fn state(msg: impl Into<String>) -> Self {
        Self::State(msg.into())
    }

    /// Create an internal-consistency error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}
