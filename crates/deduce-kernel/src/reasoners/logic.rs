//! Introduction and elimination reasoners.

use crate::confidence::Confidence;
use crate::hyp_action::HypothesisAction;
use crate::reasoner::{ProofMonitor, Reasoner, ReasonerFailure, ReasonerInput};
use crate::rule::{Antecedent, ProofRule};
use crate::sequent::Sequent;
use deduce_formula::{BoundDecl, FreeIdentifier, Predicate, Quantifier};

fn predicate_input<'a>(
    id: &str,
    input: &'a ReasonerInput,
) -> Result<&'a Predicate, ReasonerFailure> {
    match input {
        ReasonerInput::Predicate(pred) => Ok(pred),
        other => Err(ReasonerFailure::malformed(
            id,
            format!("expected a predicate, got {other:?}"),
        )),
    }
}

fn bound_idents(id: &str, decls: &[BoundDecl]) -> Result<Vec<FreeIdentifier>, ReasonerFailure> {
    decls
        .iter()
        .map(|d| {
            FreeIdentifier::new(d.name.clone(), d.ty.clone())
                .map_err(|e| ReasonerFailure::unsuccessful(id, e.to_string()))
        })
        .collect()
}

fn rule(id: &str, display: &str) -> Result<ProofRule, ReasonerFailure> {
    Ok(ProofRule::new(id, display, Confidence::DISCHARGED_MAX)?)
}

/// `H ⊢ P ⇒ Q` becomes `H, P ⊢ Q`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImpI;

impl Reasoner for ImpI {
    fn id(&self) -> &str {
        "imp_i"
    }

    fn apply(
        &self,
        sequent: &Sequent,
        _input: &ReasonerInput,
        _monitor: &dyn ProofMonitor,
    ) -> Result<ProofRule, ReasonerFailure> {
        let goal = sequent.goal();
        let Some((left, right)) = goal.as_implication() else {
            return Err(ReasonerFailure::unsuccessful(self.id(), "goal is not an implication"));
        };
        Ok(rule(self.id(), "⇒ goal")?
            .with_goal(goal.clone())
            .with_antecedent(Antecedent::new(right.clone()).with_hyps([left.clone()])))
    }
}

/// `H ⊢ P ∧ Q` becomes `H ⊢ P` and `H ⊢ Q`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConjI;

impl Reasoner for ConjI {
    fn id(&self) -> &str {
        "conj_i"
    }

    fn apply(
        &self,
        sequent: &Sequent,
        _input: &ReasonerInput,
        _monitor: &dyn ProofMonitor,
    ) -> Result<ProofRule, ReasonerFailure> {
        let goal = sequent.goal();
        let Some((left, right)) = goal.as_conjunction() else {
            return Err(ReasonerFailure::unsuccessful(self.id(), "goal is not a conjunction"));
        };
        Ok(rule(self.id(), "∧ goal")?
            .with_goal(goal.clone())
            .with_antecedent(Antecedent::new(left.clone()))
            .with_antecedent(Antecedent::new(right.clone())))
    }
}

/// `H ⊢ ∀x·P` becomes `H ⊢ P` with `x` free.
///
/// Bound names are reused as they are. If one is already free in the
/// sequent the rule is still proposed, and does not apply.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllI;

impl Reasoner for AllI {
    fn id(&self) -> &str {
        "all_i"
    }

    fn apply(
        &self,
        sequent: &Sequent,
        _input: &ReasonerInput,
        _monitor: &dyn ProofMonitor,
    ) -> Result<ProofRule, ReasonerFailure> {
        let goal = sequent.goal();
        let Predicate::Quantified(Quantifier::Forall, decls, body) = goal else {
            return Err(ReasonerFailure::unsuccessful(self.id(), "goal is not universal"));
        };
        let idents = bound_idents(self.id(), decls)?;
        Ok(rule(self.id(), "∀ goal")?
            .with_goal(goal.clone())
            .with_antecedent(Antecedent::new((**body).clone()).with_free_idents(idents)))
    }
}

/// Cut: prove the given predicate, then use it as a hypothesis.
#[derive(Debug, Clone, Copy, Default)]
pub struct Lemma;

impl Reasoner for Lemma {
    fn id(&self) -> &str {
        "lemma"
    }

    fn apply(
        &self,
        sequent: &Sequent,
        input: &ReasonerInput,
        _monitor: &dyn ProofMonitor,
    ) -> Result<ProofRule, ReasonerFailure> {
        let lemma = predicate_input(self.id(), input)?;
        if let Err(e) = sequent.type_env().check_closed(lemma) {
            return Err(ReasonerFailure::unsuccessful(self.id(), e.to_string()));
        }
        Ok(rule(self.id(), &format!("lemma {lemma}"))?
            .with_antecedent(Antecedent::new(lemma.clone()))
            .with_antecedent(Antecedent::keep_goal().with_hyps([lemma.clone()])))
    }
}

/// Rewrites hypothesis `P ∧ Q` into `P` and `Q`, hiding the conjunction.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConjE;

impl Reasoner for ConjE {
    fn id(&self) -> &str {
        "conj_e"
    }

    fn apply(
        &self,
        sequent: &Sequent,
        input: &ReasonerInput,
        _monitor: &dyn ProofMonitor,
    ) -> Result<ProofRule, ReasonerFailure> {
        let hyp = predicate_input(self.id(), input)?;
        if !sequent.contains_hypothesis(hyp) {
            return Err(ReasonerFailure::unsuccessful(self.id(), format!("{hyp} is not a hypothesis")));
        }
        let Some((left, right)) = hyp.as_conjunction() else {
            return Err(ReasonerFailure::unsuccessful(self.id(), format!("{hyp} is not a conjunction")));
        };
        let rewrite = HypothesisAction::rewrite([hyp.clone()], [left.clone(), right.clone()]);
        Ok(rule(self.id(), "∧ hyp")?
            .with_needed_hyps([hyp.clone()])
            .with_antecedent(Antecedent::keep_goal().with_action(rewrite)))
    }
}

/// Hypothesis `∃x·P` becomes `P` with `x` fresh; the existential is hidden.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExistsE;

impl Reasoner for ExistsE {
    fn id(&self) -> &str {
        "exists_e"
    }

    fn apply(
        &self,
        sequent: &Sequent,
        input: &ReasonerInput,
        _monitor: &dyn ProofMonitor,
    ) -> Result<ProofRule, ReasonerFailure> {
        let hyp = predicate_input(self.id(), input)?;
        if !sequent.contains_hypothesis(hyp) {
            return Err(ReasonerFailure::unsuccessful(self.id(), format!("{hyp} is not a hypothesis")));
        }
        let Predicate::Quantified(Quantifier::Exists, decls, body) = hyp else {
            return Err(ReasonerFailure::unsuccessful(self.id(), format!("{hyp} is not existential")));
        };
        if let Some(taken) = decls.iter().find(|d| sequent.type_env().contains(&d.name)) {
            return Err(ReasonerFailure::unsuccessful(
                self.id(),
                format!("{} is already free", taken.name),
            ));
        }
        let idents = bound_idents(self.id(), decls)?;
        let infer = HypothesisAction::forward_infer([hyp.clone()], idents, [(**body).clone()]);
        Ok(rule(self.id(), "∃ hyp")?
            .with_needed_hyps([hyp.clone()])
            .with_antecedent(
                Antecedent::keep_goal()
                    .with_action(infer)
                    .with_action(HypothesisAction::hide([hyp.clone()])),
            ))
    }
}
