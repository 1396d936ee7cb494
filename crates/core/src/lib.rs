//! fnflow core data models.
//!
//! This crate defines the run-level data structures shared by the
//! resolver, the resource policy and the job builder: compositions,
//! function definitions, dependency group identifiers and the
//! scheduler-facing job record.

#![warn(missing_docs)]

// Data addressing
mod composition;

// Work items
mod definition;
mod oracle;

// Scheduler-facing identities and records
mod id;
mod job;

pub use composition::{Component, Composition};
pub use definition::{FunctionDefinition, FunctionNode, RunPlan};
pub use oracle::{materialize_node, EligibilityOracle};
pub use id::GroupId;
pub use job::Job;

/// Errors raised while building core model values.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// A composition component could not be parsed
    #[error("Invalid composition component '{0}': expected <run>:<position>[:<tag>]")]
    InvalidComponent(String),
}

/// Result type for core model operations.
pub type Result<T> = std::result::Result<T, ModelError>;

/// Date a function definition was created on.
pub type Date = chrono::NaiveDate;
