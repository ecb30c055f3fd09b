//! Namehunt Common - Shared types and traits
//!
//! This crate provides the data model, traits, configuration and error types
//! used across the namehunt enumeration engine.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;
pub mod username;

// Re-export commonly used types
pub use config::EngineConfig;
pub use error::{NamehuntError, NamehuntResult};
pub use traits::{CatalogProvider, Prober};
pub use types::{
    ExistenceSignal, JobId, JobSnapshot, JobState, LookupStats, ProbeDefinition, ProbeResult,
    ProbeStatus, ResultSet, SignalRule, ACCOUNT_PLACEHOLDER,
};
pub use username::{normalize_username, username_key};
