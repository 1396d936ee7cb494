//! Eligibility hook for the upstream code that materializes definitions.
//!
//! Deciding whether a unit of work should exist at all (release and QC
//! state, customer configuration) happens before a [`RunPlan`] is built.
//! Resolution and submission never consult an oracle.
//!
//! [`RunPlan`]: crate::RunPlan

use crate::FunctionDefinition;

/// Decides whether a candidate definition should become work.
pub trait EligibilityOracle {
    /// Whether `definition` of `function` should be run.
    fn is_eligible(&self, function: &str, definition: &FunctionDefinition) -> bool;
}

impl<F> EligibilityOracle for F
where
    F: Fn(&str, &FunctionDefinition) -> bool,
{
    fn is_eligible(&self, function: &str, definition: &FunctionDefinition) -> bool {
        self(function, definition)
    }
}

/// Filter candidates through the oracle and build a function's definition list.
///
/// When nothing is eligible the list holds only `placeholder`, marked as
/// excluded, so the function keeps its node in the graph.
pub fn materialize_node<O: EligibilityOracle + ?Sized>(
    oracle: &O,
    function: &str,
    candidates: Vec<FunctionDefinition>,
    mut placeholder: FunctionDefinition,
) -> Vec<FunctionDefinition> {
    let eligible: Vec<_> = candidates
        .into_iter()
        .filter(|d| !d.excluded && oracle.is_eligible(function, d))
        .collect();

    if eligible.is_empty() {
        placeholder.excluded = true;
        vec![placeholder]
    } else {
        eligible
    }
}
