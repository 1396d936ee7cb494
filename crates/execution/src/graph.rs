//! The function graph: a validated DAG of pipeline function names.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Errors in the function graph or in how a run plan fits it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    /// The graph has a cycle through these functions
    #[error("Function graph has a cycle through: {}", .0.join(", "))]
    Cycle(Vec<String>),

    /// An edge names a function that is not a node
    #[error("Edge references unknown function: {0}")]
    UnknownFunction(String),

    /// A function is declared twice
    #[error("Function declared more than once: {0}")]
    DuplicateFunction(String),

    /// A function in the graph has no definition list
    #[error("No definitions for function: {0}")]
    MissingDefinitions(String),

    /// An excluded definition is not the only entry of its list
    #[error("Function {0}: an excluded definition must be the only definition")]
    InvalidPlaceholder(String),

    /// A definition belongs to another run
    #[error("Function {function}: definition for run {found} in plan for run {expected}")]
    RunMismatch {
        /// Function at fault
        function: String,
        /// Run of the plan
        expected: u64,
        /// Run of the definition
        found: u64,
    },
}

/// Serialized form of a graph: node names and `(from, to)` edges.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphSpec {
    /// Function names
    pub nodes: Vec<String>,
    /// `(predecessor, function)` pairs
    #[serde(default)]
    pub edges: Vec<(String, String)>,
}

impl GraphSpec {
    /// Validate and build the graph.
    pub fn build(self) -> Result<FunctionGraph, GraphError> {
        FunctionGraph::new(self.nodes, self.edges)
    }
}

/// Directed acyclic graph of function names.
///
/// Acyclicity is checked when the graph is built, and the topological
/// order is computed once and kept.
#[derive(Debug, Clone)]
pub struct FunctionGraph {
    /// function -> [predecessors]
    predecessors: BTreeMap<String, BTreeSet<String>>,
    /// function -> [successors]
    successors: BTreeMap<String, BTreeSet<String>>,
    /// Functions in dependency order
    order: Vec<String>,
}

impl FunctionGraph {
    /// Build a graph from node names and `(predecessor, function)` edges.
    pub fn new<N, E, S>(nodes: N, edges: E) -> Result<Self, GraphError>
    where
        N: IntoIterator<Item = S>,
        E: IntoIterator<Item = (S, S)>,
        S: Into<String>,
    {
        let mut predecessors: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        let mut successors: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

        for node in nodes {
            let node = node.into();
            if predecessors.contains_key(&node) {
                return Err(GraphError::DuplicateFunction(node));
            }
            predecessors.insert(node.clone(), BTreeSet::new());
            successors.insert(node, BTreeSet::new());
        }

        for (from, to) in edges {
            let (from, to) = (from.into(), to.into());
            for name in [&from, &to] {
                if !predecessors.contains_key(name) {
                    return Err(GraphError::UnknownFunction(name.clone()));
                }
            }
            if from == to {
                return Err(GraphError::Cycle(vec![from]));
            }
            successors.entry(from.clone()).or_default().insert(to.clone());
            predecessors.entry(to).or_default().insert(from);
        }

        let order = topological_sort(&predecessors, &successors)?;

        Ok(Self {
            predecessors,
            successors,
            order,
        })
    }

    /// Functions in dependency order, ties broken by name.
    pub fn topological_order(&self) -> &[String] {
        &self.order
    }

    /// Whether the graph has this function.
    pub fn contains(&self, function: &str) -> bool {
        self.predecessors.contains_key(function)
    }

    /// Number of functions.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether the graph has no functions.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Immediate predecessors of a function, sorted by name.
    pub fn predecessors(&self, function: &str) -> impl Iterator<Item = &str> {
        self.predecessors
            .get(function)
            .into_iter()
            .flatten()
            .map(String::as_str)
    }

    /// Immediate successors of a function, sorted by name.
    pub fn successors(&self, function: &str) -> impl Iterator<Item = &str> {
        self.successors
            .get(function)
            .into_iter()
            .flatten()
            .map(String::as_str)
    }

    /// Functions without predecessors.
    pub fn roots(&self) -> impl Iterator<Item = &str> {
        self.predecessors
            .iter()
            .filter(|(_, preds)| preds.is_empty())
            .map(|(name, _)| name.as_str())
    }
}

/// Kahn's algorithm with a name-ordered ready set.
fn topological_sort(
    predecessors: &BTreeMap<String, BTreeSet<String>>,
    successors: &BTreeMap<String, BTreeSet<String>>,
) -> Result<Vec<String>, GraphError> {
    let mut remaining: BTreeMap<&str, usize> = predecessors
        .iter()
        .map(|(name, preds)| (name.as_str(), preds.len()))
        .collect();
    let mut ready: BTreeSet<&str> = remaining
        .iter()
        .filter(|(_, count)| **count == 0)
        .map(|(name, _)| *name)
        .collect();
    let mut sorted = Vec::with_capacity(predecessors.len());

    while let Some(name) = ready.pop_first() {
        remaining.remove(name);
        sorted.push(name.to_string());

        for next in successors.get(name).into_iter().flatten() {
            if let Some(count) = remaining.get_mut(next.as_str()) {
                *count -= 1;
                if *count == 0 {
                    ready.insert(next.as_str());
                }
            }
        }
    }

    if remaining.is_empty() {
        Ok(sorted)
    } else {
        Err(GraphError::Cycle(
            remaining.keys().map(|name| name.to_string()).collect(),
        ))
    }
}
