//! Layered resource configuration.

use crate::policy::{
    ConcurrencyLimit, QueuePolicy, ARCHIVE_FUNCTIONS_KEY, ARCHIVE_LIMIT_KEY, DEFAULT_QUEUE_KEY,
    QUEUE_KEY_SUFFIX,
};
use crate::{ConfigError, Result};
use fnflow_core::FunctionDefinition;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, warn};

/// Memory used when no layer sets one.
pub const DEFAULT_MEMORY_MB: u32 = 2000;

/// Resources resolved for one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resources {
    /// CPU count, 0 lets the scheduler choose
    pub cpus: u32,
    /// Memory in MB
    pub memory_mb: u32,
    /// Cloud flavor, if the queue asks for one
    pub cloud_flavor: Option<String>,
}

impl Resources {
    /// Memory in the scheduler's `<MB>M` notation.
    pub fn memory(&self) -> String {
        format!("{}M", self.memory_mb)
    }
}

/// Resource policy populated once at startup.
///
/// Precedence, most specific first: definition, queue, default queue,
/// built-in baseline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceConfigStore {
    default: QueuePolicy,
    queues: BTreeMap<String, QueuePolicy>,
    archive: ConcurrencyLimit,
}

impl ResourceConfigStore {
    /// Create a store with no queue overrides.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default queue policy.
    pub fn with_default(mut self, policy: QueuePolicy) -> Self {
        self.default = policy;
        self
    }

    /// Add a named queue policy.
    pub fn with_queue(mut self, name: impl Into<String>, policy: QueuePolicy) -> Self {
        self.queues.insert(name.into(), policy);
        self
    }

    /// Set the archival concurrency ceiling.
    pub fn with_archive_limit(mut self, ceiling: u32) -> Self {
        self.archive.ceiling = ceiling;
        self
    }

    /// Replace the archival concurrency-limit policy.
    pub fn with_archive_policy(mut self, limit: ConcurrencyLimit) -> Self {
        self.archive = limit;
        self
    }

    /// Load the policy from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    /// Parse the policy from JSON text.
    pub fn from_json_str(text: &str) -> Result<Self> {
        match serde_json::from_str::<Value>(text)? {
            Value::Object(map) => Self::from_map(map),
            other => Err(ConfigError::Invalid(format!(
                "expected a JSON object, found {}",
                json_kind(&other)
            ))),
        }
    }

    fn from_map(map: Map<String, Value>) -> Result<Self> {
        let mut store = Self::new();

        for (key, value) in map {
            if key == DEFAULT_QUEUE_KEY {
                store.default = queue_policy(&key, value)?;
            } else if key == ARCHIVE_LIMIT_KEY {
                let ceiling = value
                    .as_u64()
                    .and_then(|n| u32::try_from(n).ok())
                    .ok_or_else(|| {
                        ConfigError::Invalid(format!("{} must be a non-negative integer", key))
                    })?;
                store.archive.ceiling = ceiling;
            } else if key == ARCHIVE_FUNCTIONS_KEY {
                let functions: Vec<String> = serde_json::from_value(value).map_err(|e| {
                    ConfigError::Invalid(format!("{} must be a list of names: {}", key, e))
                })?;
                store.archive.functions = functions.into_iter().collect();
            } else if let Some(name) = key.strip_suffix(QUEUE_KEY_SUFFIX) {
                let policy = queue_policy(&key, value)?;
                store.queues.insert(name.to_string(), policy);
            } else {
                warn!("Ignoring unknown resource policy key: {}", key);
            }
        }

        debug!(
            "Loaded resource policy with {} queue(s), archive limit {}",
            store.queues.len(),
            store.archive.tag()
        );
        Ok(store)
    }

    /// Resolve the resources of one definition.
    pub fn resources_for(&self, definition: &FunctionDefinition) -> Resources {
        let queue = definition.queue.as_deref().and_then(|name| self.queues.get(name));
        let layered = |pick: fn(&QueuePolicy) -> Option<u32>| {
            queue.and_then(pick).or_else(|| pick(&self.default))
        };

        let cpus = if definition.cpu_count > 0 {
            definition.cpu_count
        } else {
            layered(|p| p.cpus).unwrap_or(0)
        };

        let memory_mb = definition
            .memory_mb
            .or_else(|| layered(|p| p.memory))
            .unwrap_or(DEFAULT_MEMORY_MB);

        let cloud_flavor = queue
            .and_then(|p| p.cloud_flavor.clone())
            .or_else(|| self.default.cloud_flavor.clone());

        Resources {
            cpus,
            memory_mb,
            cloud_flavor,
        }
    }

    /// Concurrency-limit tag for jobs of `function`, if any.
    pub fn limit_group_for(&self, function: &str) -> Option<String> {
        self.archive
            .applies_to(function)
            .then(|| self.archive.tag())
    }

    /// The archival concurrency-limit policy.
    pub fn archive_limit(&self) -> &ConcurrencyLimit {
        &self.archive
    }
}

fn queue_policy(key: &str, value: Value) -> Result<QueuePolicy> {
    if !value.is_object() {
        return Err(ConfigError::Invalid(format!(
            "{} must be an object, found {}",
            key,
            json_kind(&value)
        )));
    }
    serde_json::from_value(value).map_err(|e| ConfigError::Invalid(format!("{}: {}", key, e)))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
