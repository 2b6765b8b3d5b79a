//! Tracing types for solver observability.
//!
//! These records capture the solver's step-by-step decisions so external
//! tools can replay a solve. Tracing is opt-in via
//! `Solver::enable_tracing()`; when disabled no steps are recorded.

use serde::Serialize;

/// A single recorded solver step.
#[derive(Debug, Clone, Serialize)]
pub struct SolveStep {
    pub step: usize,
    pub action: SolveAction,
    pub detail: String,
}

/// What the solver did at a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SolveAction {
    /// The equational relaxation was checked for unifiability.
    WeakUnifyCheck,
    /// An equality constraint was unified into the running substitution.
    UnifyEquality,
    /// A constructor/constructor subtype was split into argument subtypes.
    Decompose,
    /// A variable facing a constructor was expanded with fresh arguments.
    ExpandVariable,
    /// A base/base subtype held in the base order and was dropped.
    DiscardBasePair,
    /// A constraint reached atomic form and left the worklist.
    EmitAtomic,
    /// A strongly connected component was unified into one representative.
    CollapseCycle,
    /// A variable was assigned a base type from its bounds.
    AssignBound,
    /// A variable-only component was merged into its representative.
    MergeResidual,
}
