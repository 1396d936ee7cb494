//! Execution layer - graph validation, dependency resolution, job building
//! and submission.

#![warn(missing_docs)]

pub mod graph;
pub mod dependency;
pub mod builder;
pub mod submission;
pub mod submit;
pub mod engine;

pub use graph::{FunctionGraph, GraphError, GraphSpec};
pub use dependency::{DependencyPlan, DependencyResolver, ResolvedJob};
pub use builder::JobDefinitionBuilder;
pub use submission::SubmissionFile;
pub use submit::{SubmitError, SubmitOptions, Submitter, WrSubmitter};
pub use engine::{DriverConfig, DriverError, DriverMode, ExecutionDriver, RunSummary};
