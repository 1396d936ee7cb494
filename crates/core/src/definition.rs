//! Function definitions and the per-run plan that groups them by function.

use crate::{Composition, Date};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One concrete, already-decided unit of work for a function and run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    /// Run identifier
    pub identifier: u64,

    /// Who created this definition
    pub created_by: String,

    /// When this definition was created
    pub created_on: Date,

    /// Name of the job, usually the function name
    pub job_name: String,

    /// Command to run, empty for excluded definitions
    #[serde(default)]
    pub command: String,

    /// Data addressed by this job, `None` for the whole run
    #[serde(default)]
    pub composition: Option<Composition>,

    /// Number of CPUs, 0 leaves the choice to the resource policy
    #[serde(default)]
    pub cpu_count: u32,

    /// Memory in MB
    #[serde(default)]
    pub memory_mb: Option<u32>,

    /// Queue name used to select queue-level resource defaults
    #[serde(default)]
    pub queue: Option<String>,

    /// Chunk number when the function is split into chunks
    #[serde(default)]
    pub chunk_index: Option<u32>,

    /// No job should be run for this function
    #[serde(default)]
    pub excluded: bool,

    /// The command writes its own log, so output is not tee'd
    #[serde(default)]
    pub streams_output: bool,
}

impl FunctionDefinition {
    /// Create a new definition with default resources.
    pub fn new(
        identifier: u64,
        created_by: impl Into<String>,
        created_on: Date,
        job_name: impl Into<String>,
        command: impl Into<String>,
    ) -> Self {
        Self {
            identifier,
            created_by: created_by.into(),
            created_on,
            job_name: job_name.into(),
            command: command.into(),
            composition: None,
            cpu_count: 0,
            memory_mb: None,
            queue: None,
            chunk_index: None,
            excluded: false,
            streams_output: false,
        }
    }

    /// Create the placeholder for a function that has no work for this run.
    pub fn excluded(
        identifier: u64,
        created_by: impl Into<String>,
        created_on: Date,
        job_name: impl Into<String>,
    ) -> Self {
        let mut definition = Self::new(identifier, created_by, created_on, job_name, "");
        definition.excluded = true;
        definition
    }

    /// Set the composition.
    pub fn with_composition(mut self, composition: Composition) -> Self {
        self.composition = Some(composition);
        self
    }

    /// Set the CPU count.
    pub fn with_cpu_count(mut self, cpu_count: u32) -> Self {
        self.cpu_count = cpu_count;
        self
    }

    /// Set the memory requirement in MB.
    pub fn with_memory_mb(mut self, memory_mb: u32) -> Self {
        self.memory_mb = Some(memory_mb);
        self
    }

    /// Set the queue.
    pub fn with_queue(mut self, queue: impl Into<String>) -> Self {
        self.queue = Some(queue.into());
        self
    }

    /// Set the chunk index.
    pub fn with_chunk(mut self, chunk_index: u32) -> Self {
        self.chunk_index = Some(chunk_index);
        self
    }

    /// Mark the command as writing its own log.
    pub fn streaming(mut self) -> Self {
        self.streams_output = true;
        self
    }

    /// The composition this definition can be matched on.
    ///
    /// Whole-run definitions (no composition, or an empty one) never match
    /// anything specifically and return `None`.
    pub fn specific_composition(&self) -> Option<&Composition> {
        self.composition.as_ref().filter(|c| !c.is_empty())
    }
}

/// Borrowed view of one function's ordered definitions.
///
/// The position of a definition in the list is its slot index.
#[derive(Debug, Clone, Copy)]
pub struct FunctionNode<'a> {
    /// Function name
    pub name: &'a str,
    /// Definitions in slot order
    pub definitions: &'a [FunctionDefinition],
}

impl<'a> FunctionNode<'a> {
    /// Number of definitions.
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Whether this function only carries the excluded placeholder.
    pub fn is_placeholder(&self) -> bool {
        matches!(self.definitions, [only] if only.excluded)
    }

    /// Definitions paired with their slot index.
    pub fn slots(&self) -> impl Iterator<Item = (usize, &'a FunctionDefinition)> {
        self.definitions.iter().enumerate()
    }
}

/// Every function's definitions for a single run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunPlan {
    /// Run identifier
    pub id_run: u64,

    /// Function name -> ordered definitions
    #[serde(default)]
    pub functions: BTreeMap<String, Vec<FunctionDefinition>>,
}

impl RunPlan {
    /// Create an empty plan for a run.
    pub fn new(id_run: u64) -> Self {
        Self {
            id_run,
            functions: BTreeMap::new(),
        }
    }

    /// Set the definitions of a function.
    pub fn with_function(
        mut self,
        name: impl Into<String>,
        definitions: Vec<FunctionDefinition>,
    ) -> Self {
        self.functions.insert(name.into(), definitions);
        self
    }

    /// Look up a function's definitions.
    pub fn node(&self, name: &str) -> Option<FunctionNode<'_>> {
        self.functions
            .get_key_value(name)
            .map(|(name, definitions)| FunctionNode { name, definitions })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> Date {
        Date::from_ymd_opt(2024, 3, 12).unwrap()
    }

    #[test]
    fn test_whole_run_has_no_specific_composition() {
        let d = FunctionDefinition::new(1, "pipeline", date(), "f", "run_f");
        assert!(d.specific_composition().is_none());

        let d = d.with_composition(Composition::new());
        assert!(d.specific_composition().is_none());

        let d = d.with_composition("1:1".parse().unwrap());
        assert!(d.specific_composition().is_some());
    }

    #[test]
    fn test_placeholder_detection() {
        let plan = RunPlan::new(1)
            .with_function("skip", vec![FunctionDefinition::excluded(1, "p", date(), "skip")])
            .with_function("work", vec![FunctionDefinition::new(1, "p", date(), "work", "w")]);

        assert!(plan.node("skip").unwrap().is_placeholder());
        assert!(!plan.node("work").unwrap().is_placeholder());
        assert!(plan.node("missing").is_none());
    }

    #[test]
    fn test_definition_from_json_defaults() {
        let json = serde_json::json!({
            "identifier": 26219,
            "created_by": "pipeline",
            "created_on": "2024-03-12",
            "job_name": "bam2fastq",
            "command": "bam2fastq --run 26219",
        });
        let d: FunctionDefinition = serde_json::from_value(json).unwrap();
        assert_eq!(d.cpu_count, 0);
        assert!(d.memory_mb.is_none());
        assert!(!d.excluded);
        assert!(!d.streams_output);
        assert_eq!(d.created_on, date());
    }
}
