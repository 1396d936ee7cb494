//! Dependency resolution between the jobs of adjacent functions.
//!
//! For every edge `predecessor -> function` each job of `function` picks the
//! predecessor groups it waits on:
//!
//! - a predecessor with a single definition is waited on through its
//!   generic group;
//! - a split predecessor is waited on through the specific groups of every
//!   definition whose composition equals the job's composition exactly;
//! - when no predecessor definition matches, or the job covers the whole
//!   run, the generic group is used instead.
//!
//! A predecessor that only carries the excluded placeholder emits no job,
//! so its consumers are matched directly against the placeholder's own
//! predecessors.

use crate::graph::{FunctionGraph, GraphError};
use fnflow_core::{FunctionDefinition, FunctionNode, GroupId, RunPlan};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Resolved groups of one definition slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedJob {
    /// Function name
    pub function: String,
    /// Slot index in the function's definition list
    pub slot: usize,
    /// Whether the definition is the excluded placeholder
    pub excluded: bool,
    /// Group shared by all jobs of the function
    pub generic: GroupId,
    /// Group unique to this slot
    pub specific: GroupId,
    /// Groups to wait on, sorted
    pub deps: Vec<GroupId>,
}

impl ResolvedJob {
    /// Rendered own groups, `[generic, specific]`.
    pub fn dep_grps(&self) -> [String; 2] {
        [self.generic.render(), self.specific.render()]
    }

    /// Rendered dependencies.
    pub fn rendered_deps(&self) -> Vec<String> {
        self.deps.iter().map(GroupId::render).collect()
    }
}

/// Resolution result for a whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyPlan {
    /// function -> jobs in slot order
    jobs: BTreeMap<String, Vec<ResolvedJob>>,
}

impl DependencyPlan {
    /// Resolved slots of a function.
    pub fn function(&self, name: &str) -> Option<&[ResolvedJob]> {
        self.jobs.get(name).map(Vec::as_slice)
    }

    /// Resolved slot of a function.
    pub fn job(&self, name: &str, slot: usize) -> Option<&ResolvedJob> {
        self.jobs.get(name).and_then(|jobs| jobs.get(slot))
    }
}

/// Computes the dependency groups of every job in a run.
#[derive(Debug, Clone, Copy, Default)]
pub struct DependencyResolver;

impl DependencyResolver {
    /// Create a new resolver.
    pub fn new() -> Self {
        Self
    }

    /// Check that the plan fits the graph.
    pub fn validate(&self, graph: &FunctionGraph, plan: &RunPlan) -> Result<(), GraphError> {
        for function in graph.topological_order() {
            let node = plan
                .node(function)
                .filter(|node| !node.is_empty())
                .ok_or_else(|| GraphError::MissingDefinitions(function.clone()))?;

            if node.len() > 1 && node.definitions.iter().any(|d| d.excluded) {
                return Err(GraphError::InvalidPlaceholder(function.clone()));
            }

            if let Some(d) = node.definitions.iter().find(|d| d.identifier != plan.id_run) {
                return Err(GraphError::RunMismatch {
                    function: function.clone(),
                    expected: plan.id_run,
                    found: d.identifier,
                });
            }
        }
        Ok(())
    }

    /// Resolve every job's dependencies, visiting functions in dependency order.
    pub fn resolve(
        &self,
        graph: &FunctionGraph,
        plan: &RunPlan,
    ) -> Result<DependencyPlan, GraphError> {
        self.validate(graph, plan)?;

        let mut resolved = DependencyPlan::default();

        for function in graph.topological_order() {
            let node = plan
                .node(function)
                .ok_or_else(|| GraphError::MissingDefinitions(function.clone()))?;

            let jobs = node
                .slots()
                .map(|(slot, definition)| -> Result<ResolvedJob, GraphError> {
                    let mut deps = BTreeSet::new();
                    for predecessor in graph.predecessors(function) {
                        deps.extend(self.groups_for(graph, plan, predecessor, definition)?);
                    }

                    let job = ResolvedJob {
                        function: function.clone(),
                        slot,
                        excluded: definition.excluded,
                        generic: GroupId::generic(function.as_str(), plan.id_run),
                        specific: GroupId::specific(function.as_str(), plan.id_run, slot),
                        deps: deps.into_iter().collect(),
                    };
                    debug!(
                        "Resolved {}[{}] -> {} dependency group(s)",
                        function,
                        slot,
                        job.deps.len()
                    );
                    Ok(job)
                })
                .collect::<Result<Vec<_>, _>>()?;

            resolved.jobs.insert(function.clone(), jobs);
        }

        Ok(resolved)
    }

    /// Groups of one predecessor that `definition` must wait on.
    ///
    /// An excluded placeholder is looked through: its own predecessors are
    /// matched against `definition` instead.
    fn groups_for(
        &self,
        graph: &FunctionGraph,
        plan: &RunPlan,
        predecessor: &str,
        definition: &FunctionDefinition,
    ) -> Result<Vec<GroupId>, GraphError> {
        let upstream = plan
            .node(predecessor)
            .ok_or_else(|| GraphError::MissingDefinitions(predecessor.to_string()))?;

        if upstream.is_placeholder() {
            let mut groups = Vec::new();
            for next in graph.predecessors(predecessor) {
                groups.extend(self.groups_for(graph, plan, next, definition)?);
            }
            return Ok(groups);
        }

        Ok(Self::matching_groups(plan.id_run, upstream, definition))
    }

    /// Groups of a job-bearing predecessor that `definition` must wait on.
    fn matching_groups(
        id_run: u64,
        upstream: FunctionNode<'_>,
        definition: &FunctionDefinition,
    ) -> Vec<GroupId> {
        let generic = || vec![GroupId::generic(upstream.name, id_run)];

        if upstream.len() == 1 {
            return generic();
        }

        let Some(composition) = definition.specific_composition() else {
            return generic();
        };

        let matching: Vec<GroupId> = upstream
            .slots()
            .filter(|(_, d)| d.specific_composition() == Some(composition))
            .map(|(slot, _)| GroupId::specific(upstream.name, id_run, slot))
            .collect();

        if matching.is_empty() {
            generic()
        } else {
            matching
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fnflow_core::{Composition, Date};

    const RUN: u64 = 26219;

    fn def(job_name: &str) -> FunctionDefinition {
        let date = Date::from_ymd_opt(2024, 3, 12).unwrap();
        FunctionDefinition::new(RUN, "pipeline", date, job_name, format!("{}.sh", job_name))
    }

    fn composed(job_name: &str, composition: &str) -> FunctionDefinition {
        def(job_name).with_composition(composition.parse::<Composition>().unwrap())
    }

    fn placeholder(job_name: &str) -> FunctionDefinition {
        let date = Date::from_ymd_opt(2024, 3, 12).unwrap();
        FunctionDefinition::excluded(RUN, "pipeline", date, job_name)
    }

    fn generic(function: &str) -> GroupId {
        GroupId::generic(function, RUN)
    }

    fn specific(function: &str, slot: usize) -> GroupId {
        GroupId::specific(function, RUN, slot)
    }

    fn scenario_graph() -> FunctionGraph {
        FunctionGraph::new(
            ["start", "f1", "f2", "f3", "f4", "f5"],
            [
                ("start", "f1"),
                ("start", "f2"),
                ("f1", "f3"),
                ("f2", "f3"),
                ("f3", "f4"),
                ("f3", "f5"),
                ("f4", "f5"),
            ],
        )
        .unwrap()
    }

    fn scenario_plan() -> RunPlan {
        RunPlan::new(RUN)
            .with_function("start", vec![def("start")])
            .with_function("f1", vec![composed("f1", "26219:1")])
            .with_function(
                "f2",
                vec![composed("f2", "26219:1:1"), composed("f2", "26219:1:2")],
            )
            .with_function(
                "f3",
                vec![composed("f3", "26219:1:1"), composed("f3", "26219:1:2")],
            )
            .with_function(
                "f4",
                vec![
                    composed("f4", "26219:1:1"),
                    composed("f4", "26219:1:2"),
                    composed("f4", "26219:1:3"),
                ],
            )
            .with_function("f5", vec![def("f5")])
    }

    fn resolve(graph: &FunctionGraph, plan: &RunPlan) -> DependencyPlan {
        DependencyResolver::new().resolve(graph, plan).unwrap()
    }

    #[test]
    fn test_root_has_no_deps_but_both_groups() {
        let resolved = resolve(&scenario_graph(), &scenario_plan());
        let start = resolved.job("start", 0).unwrap();
        assert!(start.deps.is_empty());
        assert_eq!(start.generic, generic("start"));
        assert_eq!(start.specific, specific("start", 0));
        assert_eq!(start.dep_grps()[1], format!("{}-0", generic("start").render()));
    }

    #[test]
    fn test_single_definition_predecessor_uses_generic() {
        let resolved = resolve(&scenario_graph(), &scenario_plan());
        for job in resolved.function("f2").unwrap() {
            assert_eq!(job.deps, vec![generic("start")]);
        }
    }

    #[test]
    fn test_mixed_predecessors() {
        let resolved = resolve(&scenario_graph(), &scenario_plan());
        let f3 = resolved.function("f3").unwrap();
        assert_eq!(f3[0].deps, vec![generic("f1"), specific("f2", 0)]);
        assert_eq!(f3[1].deps, vec![generic("f1"), specific("f2", 1)]);
    }

    #[test]
    fn test_unmatched_composition_falls_back_to_generic() {
        let resolved = resolve(&scenario_graph(), &scenario_plan());
        let f4 = resolved.function("f4").unwrap();
        assert_eq!(f4[0].deps, vec![specific("f3", 0)]);
        assert_eq!(f4[1].deps, vec![specific("f3", 1)]);
        assert_eq!(f4[2].deps, vec![generic("f3")]);
    }

    #[test]
    fn test_whole_run_consumer_waits_on_all_generics() {
        let resolved = resolve(&scenario_graph(), &scenario_plan());
        let f5 = resolved.job("f5", 0).unwrap();
        assert_eq!(f5.deps, vec![generic("f3"), generic("f4")]);
    }

    #[test]
    fn test_identical_compositions_wait_on_all() {
        let graph = FunctionGraph::new(["a", "b"], [("a", "b")]).unwrap();
        let plan = RunPlan::new(RUN)
            .with_function(
                "a",
                vec![
                    composed("a", "26219:2").with_chunk(0),
                    composed("a", "26219:3"),
                    composed("a", "26219:2").with_chunk(1),
                ],
            )
            .with_function("b", vec![composed("b", "26219:2")]);

        let resolved = resolve(&graph, &plan);
        assert_eq!(
            resolved.job("b", 0).unwrap().deps,
            vec![specific("a", 0), specific("a", 2)]
        );
    }

    #[test]
    fn test_partial_overlap_is_no_match() {
        let graph = FunctionGraph::new(["a", "b"], [("a", "b")]).unwrap();
        let plan = RunPlan::new(RUN)
            .with_function(
                "a",
                vec![composed("a", "26219:1:1"), composed("a", "26219:1:2")],
            )
            .with_function("b", vec![composed("b", "26219:1:1;26219:1:2")]);

        let resolved = resolve(&graph, &plan);
        assert_eq!(resolved.job("b", 0).unwrap().deps, vec![generic("a")]);
    }

    #[test]
    fn test_whole_run_predecessors_never_match_specifically() {
        let graph = FunctionGraph::new(["a", "b"], [("a", "b")]).unwrap();
        let plan = RunPlan::new(RUN)
            .with_function("a", vec![def("a").with_chunk(0), def("a").with_chunk(1)])
            .with_function("b", vec![def("b")]);

        let resolved = resolve(&graph, &plan);
        assert_eq!(resolved.job("b", 0).unwrap().deps, vec![generic("a")]);
    }

    #[test]
    fn test_excluded_predecessor_passes_through() {
        let graph =
            FunctionGraph::new(["start", "skip", "end"], [("start", "skip"), ("skip", "end")])
                .unwrap();
        let plan = RunPlan::new(RUN)
            .with_function("start", vec![def("start")])
            .with_function("skip", vec![placeholder("skip")])
            .with_function("end", vec![def("end")]);

        let resolved = resolve(&graph, &plan);
        let skip = resolved.job("skip", 0).unwrap();
        assert!(skip.excluded);
        assert_eq!(skip.deps, vec![generic("start")]);
        assert_eq!(resolved.job("end", 0).unwrap().deps, vec![generic("start")]);
    }

    #[test]
    fn test_excluded_root_gives_empty_deps() {
        let graph = FunctionGraph::new(["start", "f1"], [("start", "f1")]).unwrap();
        let plan = RunPlan::new(RUN)
            .with_function("start", vec![placeholder("start")])
            .with_function("f1", vec![def("f1")]);

        let resolved = resolve(&graph, &plan);
        assert!(resolved.job("f1", 0).unwrap().deps.is_empty());
    }

    #[test]
    fn test_excluded_predecessor_matches_consumer_composition() {
        let graph = FunctionGraph::new(["q", "p", "c"], [("q", "p"), ("p", "c")]).unwrap();
        let plan = RunPlan::new(RUN)
            .with_function(
                "q",
                vec![composed("q", "26219:1:1"), composed("q", "26219:1:2")],
            )
            .with_function(
                "p",
                vec![placeholder("p").with_composition("26219:1:1".parse().unwrap())],
            )
            .with_function(
                "c",
                vec![composed("c", "26219:1:2"), composed("c", "26219:1:3")],
            );

        let resolved = resolve(&graph, &plan);
        assert_eq!(resolved.job("p", 0).unwrap().deps, vec![specific("q", 0)]);
        assert_eq!(resolved.job("c", 0).unwrap().deps, vec![specific("q", 1)]);
        assert_eq!(resolved.job("c", 1).unwrap().deps, vec![generic("q")]);
    }

    #[test]
    fn test_chained_excluded_predecessors() {
        let graph = FunctionGraph::new(
            ["q", "p1", "p2", "c"],
            [("q", "p1"), ("p1", "p2"), ("p2", "c")],
        )
        .unwrap();
        let plan = RunPlan::new(RUN)
            .with_function(
                "q",
                vec![composed("q", "26219:1:1"), composed("q", "26219:1:2")],
            )
            .with_function("p1", vec![placeholder("p1")])
            .with_function("p2", vec![placeholder("p2")])
            .with_function("c", vec![composed("c", "26219:1:2")]);

        let resolved = resolve(&graph, &plan);
        assert_eq!(resolved.job("c", 0).unwrap().deps, vec![specific("q", 1)]);
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let graph = scenario_graph();
        let plan = scenario_plan();
        assert_eq!(resolve(&graph, &plan), resolve(&graph, &plan));
    }

    #[test]
    fn test_missing_definitions() {
        let plan = scenario_plan();
        let mut functions = plan.functions.clone();
        functions.remove("f2");
        let plan = RunPlan { functions, ..plan };

        let result = DependencyResolver::new().resolve(&scenario_graph(), &plan);
        assert_eq!(result.unwrap_err(), GraphError::MissingDefinitions("f2".to_string()));

        let plan = scenario_plan().with_function("f2", vec![]);
        let result = DependencyResolver::new().resolve(&scenario_graph(), &plan);
        assert_eq!(result.unwrap_err(), GraphError::MissingDefinitions("f2".to_string()));
    }

    #[test]
    fn test_placeholder_must_be_alone() {
        let plan = scenario_plan().with_function("f1", vec![def("f1"), placeholder("f1")]);
        let result = DependencyResolver::new().resolve(&scenario_graph(), &plan);
        assert_eq!(result.unwrap_err(), GraphError::InvalidPlaceholder("f1".to_string()));
    }

    #[test]
    fn test_run_mismatch() {
        let mut other = def("f1");
        other.identifier = RUN + 1;
        let plan = scenario_plan().with_function("f1", vec![other]);

        let result = DependencyResolver::new().resolve(&scenario_graph(), &plan);
        assert!(matches!(result, Err(GraphError::RunMismatch { found, .. }) if found == RUN + 1));
    }
}
