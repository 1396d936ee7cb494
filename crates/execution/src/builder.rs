//! Turns a resolved function definition into a scheduler job.

use crate::dependency::ResolvedJob;
use fnflow_core::{FunctionDefinition, Job};
use fnflow_resources::ResourceConfigStore;
use std::path::{Path, PathBuf};

/// File-creation mask applied to every job.
pub const JOB_UMASK: &str = "0077";

/// Builds submission records for one run.
#[derive(Debug, Clone)]
pub struct JobDefinitionBuilder {
    resources: ResourceConfigStore,
    log_dir: PathBuf,
    priority: i32,
}

impl JobDefinitionBuilder {
    /// Create a builder writing job logs under `log_dir`.
    pub fn new(resources: ResourceConfigStore, log_dir: impl Into<PathBuf>) -> Self {
        Self {
            resources,
            log_dir: log_dir.into(),
            priority: 0,
        }
    }

    /// Set the priority given to every job.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Path of the log file of one job.
    ///
    /// `<function>-<created_on>-<identifier>[.<chunk>].out`
    pub fn log_path(&self, function: &str, definition: &FunctionDefinition) -> PathBuf {
        let mut name = format!(
            "{}-{}-{}",
            function,
            definition.created_on.format("%Y%m%d"),
            definition.identifier
        );
        if let Some(chunk) = definition.chunk_index {
            name.push_str(&format!(".{}", chunk));
        }
        name.push_str(".out");
        self.log_dir.join(name)
    }

    /// Build the submission record of one definition.
    pub fn build(&self, definition: &FunctionDefinition, resolved: &ResolvedJob) -> Job {
        let function = resolved.function.as_str();
        let resources = self.resources.resources_for(definition);

        let cmd = if definition.streams_output {
            format!("umask {} && {}", JOB_UMASK, definition.command)
        } else {
            wrap_with_tee(&definition.command, &self.log_path(function, definition))
        };

        Job {
            cmd,
            cpus: resources.cpus,
            memory: resources.memory(),
            priority: self.priority,
            dep_grps: resolved.dep_grps(),
            deps: resolved.rendered_deps(),
            rep_grp: format!("{}-{}", definition.identifier, function),
            limit_grps: self.resources.limit_group_for(function),
            cloud_flavor: resources.cloud_flavor,
        }
    }
}

fn wrap_with_tee(command: &str, log: &Path) -> String {
    format!(
        "umask {} && set -o pipefail && ({}) 2>&1 | tee -a {}",
        JOB_UMASK,
        command,
        shell_quote(&log.to_string_lossy())
    )
}

/// Single-quote a word for the shell.
fn shell_quote(word: &str) -> String {
    format!("'{}'", word.replace('\'', r"'\''"))
}
