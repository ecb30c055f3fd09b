//! Error types for the namehunt engine
//!
//! Probe-local failures are never represented here: they are recorded as
//! [`ProbeStatus`](crate::ProbeStatus) data on a result. These variants cover
//! caller input, catalog problems and job bookkeeping.

use thiserror::Error;

use crate::types::JobState;

#[derive(Error, Debug)]
pub enum NamehuntError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid template: {0}")]
    InvalidTemplate(String),

    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Invalid job transition: {from} -> {to}")]
    InvalidTransition { from: JobState, to: JobState },

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl NamehuntError {
    /// Stable machine-readable error code.
    pub const fn code(&self) -> &'static str {
        match self {
            NamehuntError::InvalidInput(_) => "INVALID_INPUT",
            NamehuntError::InvalidTemplate(_) => "INVALID_TEMPLATE",
            NamehuntError::NotFound(_) => "NOT_FOUND",
            NamehuntError::InvalidTransition { .. } => "INVALID_TRANSITION",
            NamehuntError::Catalog(_) => "CATALOG",
            NamehuntError::Network(_) => "NETWORK",
            NamehuntError::Config(_) => "CONFIG",
        }
    }
}

/// Result type alias for namehunt operations
pub type NamehuntResult<T> = Result<T, NamehuntError>;
