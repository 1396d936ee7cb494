//! Resource policy for fnflow jobs.
//!
//! Resolves CPU, memory and cloud flavor for a function definition from
//! three layers, most specific first: the definition itself, its queue's
//! defaults, and the global default queue. Also carries the archival
//! concurrency-limit policy.

#![warn(missing_docs)]

pub mod policy;
pub mod store;

pub use policy::{ConcurrencyLimit, QueuePolicy};
pub use store::{ResourceConfigStore, Resources, DEFAULT_MEMORY_MB};

/// Result type for resource policy operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors raised while loading the resource policy.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Policy file could not be read
    #[error("Cannot read resource policy {path}: {source}")]
    Io {
        /// File path
        path: String,
        /// Underlying error
        source: std::io::Error,
    },

    /// Policy file is not valid JSON
    #[error("Cannot parse resource policy: {0}")]
    Json(#[from] serde_json::Error),

    /// Policy is valid JSON but has the wrong shape
    #[error("Invalid resource policy: {0}")]
    Invalid(String),
}
