//! Policy file format.
//!
//! ```json
//! {
//!   "default_queue": { "memory": 2000 },
//!   "lowload_queue": { "cloud_flavor": "ukb1.small", "cpus": 1 },
//!   "archive_limit": 3
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Key of the global default queue.
pub const DEFAULT_QUEUE_KEY: &str = "default_queue";

/// Suffix of queue-specific keys.
pub const QUEUE_KEY_SUFFIX: &str = "_queue";

/// Key of the archival concurrency ceiling.
pub const ARCHIVE_LIMIT_KEY: &str = "archive_limit";

/// Key of the list of functions under the archival limit.
pub const ARCHIVE_FUNCTIONS_KEY: &str = "archive_functions";

/// Overrides attached to one queue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QueuePolicy {
    /// CPU count
    #[serde(default)]
    pub cpus: Option<u32>,

    /// Memory in MB
    #[serde(default)]
    pub memory: Option<u32>,

    /// Cloud flavor for jobs on this queue
    #[serde(default)]
    pub cloud_flavor: Option<String>,
}

impl QueuePolicy {
    /// Create an empty policy.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the CPU count.
    pub fn with_cpus(mut self, cpus: u32) -> Self {
        self.cpus = Some(cpus);
        self
    }

    /// Set the memory in MB.
    pub fn with_memory(mut self, memory: u32) -> Self {
        self.memory = Some(memory);
        self
    }

    /// Set the cloud flavor.
    pub fn with_cloud_flavor(mut self, flavor: impl Into<String>) -> Self {
        self.cloud_flavor = Some(flavor.into());
        self
    }
}

/// Bounds how many jobs of a class may run at once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConcurrencyLimit {
    /// Name of the limit group
    pub name: String,

    /// Maximum number of concurrently running jobs
    pub ceiling: u32,

    /// Functions whose jobs join the group
    pub functions: BTreeSet<String>,
}

impl ConcurrencyLimit {
    /// Name of the archival limit group.
    pub const ARCHIVE: &'static str = "archive";

    /// Default archival ceiling.
    pub const DEFAULT_CEILING: u32 = 3;

    /// The archival limit with its default ceiling and function.
    pub fn archive() -> Self {
        Self {
            name: Self::ARCHIVE.to_string(),
            ceiling: Self::DEFAULT_CEILING,
            functions: ["archive_to_irods".to_string()].into_iter().collect(),
        }
    }

    /// Whether jobs of `function` join this group.
    pub fn applies_to(&self, function: &str) -> bool {
        self.functions.contains(function)
    }

    /// Scheduler tag, `<name>:<ceiling>`.
    pub fn tag(&self) -> String {
        format!("{}:{}", self.name, self.ceiling)
    }
}

impl Default for ConcurrencyLimit {
    fn default() -> Self {
        Self::archive()
    }
}
