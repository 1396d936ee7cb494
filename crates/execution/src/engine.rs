//! The execution driver - turns a run plan into scheduler submissions.

use crate::builder::JobDefinitionBuilder;
use crate::dependency::DependencyResolver;
use crate::graph::{FunctionGraph, GraphError};
use crate::submission::SubmissionFile;
use crate::submit::{SubmitError, SubmitOptions, Submitter, WrSubmitter};
use fnflow_core::{Job, RunPlan};
use fnflow_resources::ResourceConfigStore;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, info};

/// What the driver does with the records it builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DriverMode {
    /// Only write the submission file
    #[default]
    WriteOnly,
    /// Write the submission file, then hand it to the submitter
    Submit,
}

/// Configuration for the execution driver.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Write-only or submit
    pub mode: DriverMode,
    /// Where records are appended
    pub submission_file: PathBuf,
    /// Run-scoped directory for job logs
    pub log_dir: PathBuf,
    /// Options of the default submitter
    pub submit: SubmitOptions,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            mode: DriverMode::WriteOnly,
            submission_file: PathBuf::from("jobs.json"),
            log_dir: PathBuf::from("log"),
            submit: SubmitOptions::default(),
        }
    }
}

impl DriverConfig {
    /// Set the mode.
    pub fn with_mode(mut self, mode: DriverMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the submission file.
    pub fn with_submission_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.submission_file = path.into();
        self
    }

    /// Set the log directory.
    pub fn with_log_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_dir = path.into();
        self
    }

    /// Set the submit options.
    pub fn with_submit_options(mut self, options: SubmitOptions) -> Self {
        self.submit = options;
        self
    }
}

/// Errors that stop a run.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    /// The graph or the plan is invalid
    #[error("Run {id_run}: {source}")]
    Graph {
        /// Run at fault
        id_run: u64,
        /// Underlying error
        #[source]
        source: GraphError,
    },

    /// The submission file could not be created
    #[error("Run {id_run}: cannot create {path}: {source}")]
    Create {
        /// Run at fault
        id_run: u64,
        /// Submission file
        path: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// A record could not be written to the submission file
    #[error("Run {id_run}, function {function}: cannot write {path}: {source}")]
    Io {
        /// Run at fault
        id_run: u64,
        /// Function being written
        function: String,
        /// Submission file
        path: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The submit primitive failed
    #[error("Run {id_run}: submission failed: {source}")]
    Submit {
        /// Run at fault
        id_run: u64,
        /// Underlying error
        #[source]
        source: SubmitError,
    },
}

/// What a run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Run identifier
    pub id_run: u64,
    /// Jobs written per function
    pub jobs_per_function: BTreeMap<String, usize>,
    /// Functions that only had the excluded placeholder
    pub skipped: Vec<String>,
    /// Submission file
    pub submission_file: PathBuf,
    /// Whether the file was handed to the submitter
    pub submitted: bool,
}

impl RunSummary {
    /// Total number of jobs written.
    pub fn total_jobs(&self) -> usize {
        self.jobs_per_function.values().sum()
    }
}

/// Walks the function graph and emits one job per non-excluded definition.
pub struct ExecutionDriver {
    config: DriverConfig,
    resolver: DependencyResolver,
    builder: JobDefinitionBuilder,
    submitter: Box<dyn Submitter>,
}

impl ExecutionDriver {
    /// Create a driver using `wr` with the configured submit options.
    pub fn new(config: DriverConfig, resources: ResourceConfigStore) -> Self {
        let builder = JobDefinitionBuilder::new(resources, config.log_dir.clone());
        let submitter = Box::new(WrSubmitter::new(config.submit.clone()));
        Self {
            config,
            resolver: DependencyResolver::new(),
            builder,
            submitter,
        }
    }

    /// Replace the submitter.
    pub fn with_submitter(mut self, submitter: Box<dyn Submitter>) -> Self {
        self.submitter = submitter;
        self
    }

    /// The configuration in use.
    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Build every job of the run in dependency order without writing anything.
    pub fn plan_jobs(
        &self,
        graph: &FunctionGraph,
        plan: &RunPlan,
    ) -> Result<Vec<(String, Job)>, DriverError> {
        let graph_error = |source: GraphError| DriverError::Graph {
            id_run: plan.id_run,
            source,
        };

        let resolved = self.resolver.resolve(graph, plan).map_err(graph_error)?;
        let mut jobs = Vec::new();

        for function in graph.topological_order() {
            let node = plan
                .node(function)
                .ok_or_else(|| graph_error(GraphError::MissingDefinitions(function.clone())))?;
            let slots = resolved
                .function(function)
                .ok_or_else(|| graph_error(GraphError::MissingDefinitions(function.clone())))?;

            for ((_, definition), job) in node.slots().zip(slots) {
                if definition.excluded {
                    continue;
                }
                jobs.push((function.clone(), self.builder.build(definition, job)));
            }
        }

        Ok(jobs)
    }

    /// Write the run's records and, in submit mode, hand them to the submitter.
    ///
    /// The submission file is started fresh for every run. The whole graph
    /// is resolved before the first record is written, and a partially
    /// written file is left in place on failure.
    pub async fn run(
        &self,
        graph: &FunctionGraph,
        plan: &RunPlan,
    ) -> Result<RunSummary, DriverError> {
        let jobs = self.plan_jobs(graph, plan)?;
        let path = &self.config.submission_file;
        let io_error = |function: &str, source: std::io::Error| DriverError::Io {
            id_run: plan.id_run,
            function: function.to_string(),
            path: path.display().to_string(),
            source,
        };

        let mut summary = RunSummary {
            id_run: plan.id_run,
            jobs_per_function: BTreeMap::new(),
            skipped: Vec::new(),
            submission_file: path.clone(),
            submitted: false,
        };

        for function in graph.topological_order() {
            if plan.node(function).is_some_and(|node| node.is_placeholder()) {
                info!("Run {}: {} excluded, no job", plan.id_run, function);
                summary.skipped.push(function.clone());
            }
        }

        let mut file = SubmissionFile::create(path)
            .await
            .map_err(|source| DriverError::Create {
                id_run: plan.id_run,
                path: path.display().to_string(),
                source,
            })?;

        for (function, job) in &jobs {
            file.append(job).await.map_err(|e| io_error(function, e))?;
            debug!(
                "Run {}: wrote {} job with {} dep(s)",
                plan.id_run,
                function,
                job.deps.len()
            );
            *summary.jobs_per_function.entry(function.clone()).or_default() += 1;
        }

        for (function, count) in &summary.jobs_per_function {
            info!("Run {}: {} -> {} job(s)", plan.id_run, function, count);
        }
        info!(
            "Run {}: wrote {} job(s) to {}",
            plan.id_run,
            file.records(),
            path.display()
        );

        if self.config.mode == DriverMode::Submit {
            self.submitter
                .submit(path)
                .await
                .map_err(|source| DriverError::Submit {
                    id_run: plan.id_run,
                    source,
                })?;
            info!("Run {}: submitted {}", plan.id_run, path.display());
            summary.submitted = true;
        }

        Ok(summary)
    }
}
