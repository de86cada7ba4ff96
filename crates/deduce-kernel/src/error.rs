//! Error types for kernel operations.
//!
//! Expected outcomes (a rule that no longer applies, a hypothesis action
//! that does nothing, a goal that does not type-check) are not errors: they
//! come back as `Option`/`bool`. The types here cover malformed input from a
//! reasoner or caller, and stale handles into the proof forest.

use crate::confidence::Confidence;
use crate::reasoner::ReasonerFailure;
use crate::tree::{NodeId, TreeId};
use deduce_formula::{FormulaError, Predicate};

/// Programmer or configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum KernelError {
    /// A rule's confidence must lie in `(PENDING, DISCHARGED_MAX]`.
    #[error("invalid rule confidence: {0}")]
    InvalidConfidence(Confidence),

    /// A reasoner with this id is already registered.
    #[error("duplicate reasoner id: {0}")]
    DuplicateReasoner(String),

    /// Replay configuration is malformed or self-contradictory.
    #[error("invalid replay config: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Sequent(#[from] SequentError),
}

/// A sequent could not be constructed because an invariant is violated.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SequentError {
    #[error("goal {goal} does not type-check: {source}")]
    Goal {
        goal: Predicate,
        source: FormulaError,
    },

    #[error("hypothesis {hyp} does not type-check: {source}")]
    Hypothesis {
        hyp: Predicate,
        source: FormulaError,
    },

    #[error("{0} is both hidden and selected")]
    HiddenAndSelected(Predicate),

    #[error("{0} is hidden or selected but is not a hypothesis")]
    NotAHypothesis(Predicate),
}

/// Operations on the proof forest that could not be carried out.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeError {
    #[error("unknown node {0}")]
    UnknownNode(NodeId),

    #[error("unknown tree {0}")]
    UnknownTree(TreeId),

    /// Rules can only be applied to open nodes.
    #[error("node {0} already has a rule applied")]
    NodeNotOpen(NodeId),

    /// The rule's needed hypotheses or goal do not match the node's
    /// sequent, or one of its antecedents failed to produce a child.
    #[error("rule {rule:?} does not apply to node {node}")]
    RuleNotApplicable { node: NodeId, rule: String },

    /// Node slots or tree ids are exhausted.
    #[error("proof forest has run out of ids")]
    CapacityExceeded,
}

/// Running a reasoner against a node and applying the rule it produced.
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error(transparent)]
    Reasoner(#[from] ReasonerFailure),

    #[error(transparent)]
    Tree(#[from] TreeError),
}
