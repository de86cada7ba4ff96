//! Reasoners that discharge a node outright.

use crate::confidence::Confidence;
use crate::reasoner::{ProofMonitor, Reasoner, ReasonerFailure, ReasonerInput};
use crate::rule::ProofRule;
use crate::sequent::Sequent;
use deduce_formula::Predicate;

/// Closes a goal that is also a hypothesis.
#[derive(Debug, Clone, Copy, Default)]
pub struct Hyp;

impl Reasoner for Hyp {
    fn id(&self) -> &str {
        "hyp"
    }

    fn apply(
        &self,
        sequent: &Sequent,
        _input: &ReasonerInput,
        _monitor: &dyn ProofMonitor,
    ) -> Result<ProofRule, ReasonerFailure> {
        let goal = sequent.goal();
        if !sequent.contains_hypothesis(goal) {
            return Err(ReasonerFailure::unsuccessful(self.id(), "goal not in hypotheses"));
        }
        Ok(ProofRule::new(self.id(), "hyp", Confidence::DISCHARGED_MAX)?
            .with_goal(goal.clone())
            .with_needed_hyps([goal.clone()]))
    }
}

/// Closes `⊤`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrueGoal;

impl Reasoner for TrueGoal {
    fn id(&self) -> &str {
        "true_goal"
    }

    fn apply(
        &self,
        sequent: &Sequent,
        _input: &ReasonerInput,
        _monitor: &dyn ProofMonitor,
    ) -> Result<ProofRule, ReasonerFailure> {
        if *sequent.goal() != Predicate::True {
            return Err(ReasonerFailure::unsuccessful(self.id(), "goal is not ⊤"));
        }
        Ok(ProofRule::new(self.id(), "⊤ goal", Confidence::DISCHARGED_MAX)?
            .with_goal(Predicate::True))
    }
}

/// Closes any goal under a `⊥` hypothesis.
#[derive(Debug, Clone, Copy, Default)]
pub struct FalseHyp;

impl Reasoner for FalseHyp {
    fn id(&self) -> &str {
        "false_hyp"
    }

    fn apply(
        &self,
        sequent: &Sequent,
        _input: &ReasonerInput,
        _monitor: &dyn ProofMonitor,
    ) -> Result<ProofRule, ReasonerFailure> {
        if !sequent.contains_hypothesis(&Predicate::False) {
            return Err(ReasonerFailure::unsuccessful(self.id(), "no ⊥ hypothesis"));
        }
        Ok(ProofRule::new(self.id(), "⊥ hyp", Confidence::DISCHARGED_MAX)?
            .with_needed_hyps([Predicate::False]))
    }
}

/// Accepts the goal on a human's word. Depends on the selected hypotheses,
/// since those are what the reviewer looked at.
#[derive(Debug, Clone, Copy, Default)]
pub struct Review;

impl Reasoner for Review {
    fn id(&self) -> &str {
        "review"
    }

    fn apply(
        &self,
        sequent: &Sequent,
        input: &ReasonerInput,
        _monitor: &dyn ProofMonitor,
    ) -> Result<ProofRule, ReasonerFailure> {
        let display = match input {
            ReasonerInput::Empty => "review".to_string(),
            ReasonerInput::Comment(comment) => format!("review: {comment}"),
            other => {
                return Err(ReasonerFailure::malformed(
                    self.id(),
                    format!("expected a comment, got {other:?}"),
                ));
            }
        };
        Ok(ProofRule::new(self.id(), display, Confidence::REVIEWED_MAX)?
            .with_goal(sequent.goal().clone())
            .with_needed_hyps(sequent.selected_hyps().iter().cloned()))
    }
}
