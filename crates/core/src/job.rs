//! The scheduler submission record.

use serde::{Deserialize, Serialize};

/// One job as submitted to the scheduler, serialized one per line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    /// Fully wrapped shell command
    pub cmd: String,

    /// CPUs, 0 lets the scheduler choose
    pub cpus: u32,

    /// Memory as `<MB>M`
    pub memory: String,

    /// Scheduling priority
    pub priority: i32,

    /// The job's own groups: `[generic, specific]`
    pub dep_grps: [String; 2],

    /// Groups that must complete before this job starts
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deps: Vec<String>,

    /// Reporting group, `<run>-<function>`
    pub rep_grp: String,

    /// Concurrency limit group, `<name>:<ceiling>`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit_grps: Option<String>,

    /// Cloud flavor requested by the queue policy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_flavor: Option<String>,
}

impl Job {
    /// Render the record as a single JSON line without trailing newline.
    pub fn to_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
