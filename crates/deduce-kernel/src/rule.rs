//! Proof rules and their antecedents.
//!
//! A reasoner claims that a goal follows from some hypotheses provided
//! each antecedent is proved. The kernel does not trust the claim beyond
//! structure: it checks the needed hypotheses and the goal against the
//! sequent, then derives every child sequent itself.
//!
//! ```text
//!   parent ⊢ G ──apply──▶ [ child₁ ⊢ G₁, child₂ ⊢ G₂, ... ]
//!                 │
//!                 ├─ needed_hyps ⊆ hypotheses
//!                 ├─ goal is None or goal = G
//!                 └─ per antecedent: idents → goal → hyps → actions
//! ```
//!
//! Application is all or nothing.

use crate::confidence::Confidence;
use crate::dependencies::ProofDependenciesBuilder;
use crate::error::KernelError;
use crate::hyp_action::HypothesisAction;
use crate::reasoner::ReasonerInput;
use crate::sequent::Sequent;
use deduce_formula::{FreeIdentifier, Predicate, TypeEnvironment};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use tracing::trace;

/// One subgoal of a proof rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Antecedent {
    goal: Option<Predicate>,
    added_hyps: BTreeSet<Predicate>,
    added_free_idents: Vec<FreeIdentifier>,
    hyp_actions: Vec<HypothesisAction>,
}

impl Antecedent {
    /// An antecedent that keeps the parent goal.
    pub fn keep_goal() -> Self {
        Self::default()
    }

    pub fn new(goal: Predicate) -> Self {
        Self {
            goal: Some(goal),
            ..Self::default()
        }
    }

    pub fn with_hyps(mut self, hyps: impl IntoIterator<Item = Predicate>) -> Self {
        self.added_hyps.extend(hyps);
        self
    }

    pub fn with_free_idents(mut self, idents: impl IntoIterator<Item = FreeIdentifier>) -> Self {
        self.added_free_idents.extend(idents);
        self
    }

    pub fn with_action(mut self, action: HypothesisAction) -> Self {
        self.hyp_actions.push(action);
        self
    }

    pub fn goal(&self) -> Option<&Predicate> {
        self.goal.as_ref()
    }

    pub fn added_hyps(&self) -> &BTreeSet<Predicate> {
        &self.added_hyps
    }

    pub fn added_free_idents(&self) -> &[FreeIdentifier] {
        &self.added_free_idents
    }

    pub fn hyp_actions(&self) -> &[HypothesisAction] {
        &self.hyp_actions
    }

    /// Derive the child sequent from its parent.
    ///
    /// `None` on a name clash or when the goal or an added hypothesis does
    /// not type-check.
    pub fn apply(&self, parent: &Sequent) -> Option<Sequent> {
        self.expand(parent).map(|(child, _)| child)
    }

    /// Like [`apply`](Self::apply), also reporting which actions were
    /// skipped, one flag per action.
    pub fn expand(&self, parent: &Sequent) -> Option<(Sequent, Vec<bool>)> {
        let seq = parent.add_free_idents(&self.added_free_idents)?;
        let seq = match &self.goal {
            Some(goal) => seq.replace_goal(goal.clone())?,
            None => seq,
        };
        let mut seq = seq
            .add_hyps(self.added_hyps.iter().cloned())?
            .select_hypotheses(&self.added_hyps);
        let mut skipped = Vec::with_capacity(self.hyp_actions.len());
        for action in &self.hyp_actions {
            let performed = action.execute(&seq);
            skipped.push(performed.skipped);
            seq = performed.sequent;
        }
        Some((seq, skipped))
    }

    /// Undo what this antecedent added, on the dependencies of its child.
    ///
    /// `skipped` holds the flags [`expand`](Self::expand) reported when the
    /// child was derived. Skipped actions contribute nothing.
    pub fn contribute_dependencies(
        &self,
        deps: &mut ProofDependenciesBuilder,
        child_env: &TypeEnvironment,
        skipped: &[bool],
    ) {
        for (index, action) in self.hyp_actions.iter().enumerate().rev() {
            if !skipped.get(index).copied().unwrap_or(false) {
                action.contribute_dependencies(deps, child_env);
            }
        }
        if self.goal.is_some() && deps.goal() == self.goal.as_ref() {
            deps.clear_goal();
        }
        deps.remove_used_hyps(&self.added_hyps);
        deps.introduce(&self.added_free_idents);
    }
}

/// Which hypothesis actions were skipped when a rule was applied, by
/// antecedent then action. Missing entries read as not skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SkippedActions(Vec<Vec<bool>>);

impl SkippedActions {
    pub fn is_skipped(&self, antecedent: usize, action: usize) -> bool {
        self.for_antecedent(antecedent)
            .get(action)
            .copied()
            .unwrap_or(false)
    }

    pub fn for_antecedent(&self, antecedent: usize) -> &[bool] {
        self.0.get(antecedent).map_or(&[], Vec::as_slice)
    }

    pub fn any(&self) -> bool {
        self.0.iter().flatten().any(|s| *s)
    }
}

/// A reasoner's claim, checked and expanded by the kernel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofRule {
    reasoner_id: String,
    #[serde(default)]
    reasoner_input: ReasonerInput,
    display: String,
    goal: Option<Predicate>,
    needed_hyps: BTreeSet<Predicate>,
    confidence: Confidence,
    antecedents: Vec<Antecedent>,
}

impl ProofRule {
    /// A goal-independent rule with no needed hypotheses and no
    /// antecedents. Fails if `confidence` is outside
    /// `(PENDING, DISCHARGED_MAX]`.
    pub fn new(
        reasoner_id: impl Into<String>,
        display: impl Into<String>,
        confidence: Confidence,
    ) -> Result<Self, KernelError> {
        if !confidence.is_valid_for_rule() {
            return Err(KernelError::InvalidConfidence(confidence));
        }
        Ok(Self {
            reasoner_id: reasoner_id.into(),
            reasoner_input: ReasonerInput::Empty,
            display: display.into(),
            goal: None,
            needed_hyps: BTreeSet::new(),
            confidence,
            antecedents: Vec::new(),
        })
    }

    pub fn with_goal(mut self, goal: Predicate) -> Self {
        self.goal = Some(goal);
        self
    }

    pub fn with_needed_hyps(mut self, hyps: impl IntoIterator<Item = Predicate>) -> Self {
        self.needed_hyps.extend(hyps);
        self
    }

    pub fn with_antecedent(mut self, antecedent: Antecedent) -> Self {
        self.antecedents.push(antecedent);
        self
    }

    /// Record the input the reasoner was run with, for replay.
    pub fn with_input(mut self, input: ReasonerInput) -> Self {
        self.reasoner_input = input;
        self
    }

    pub fn reasoner_id(&self) -> &str {
        &self.reasoner_id
    }

    pub fn reasoner_input(&self) -> &ReasonerInput {
        &self.reasoner_input
    }

    pub fn display(&self) -> &str {
        &self.display
    }

    pub fn goal(&self) -> Option<&Predicate> {
        self.goal.as_ref()
    }

    pub fn needed_hyps(&self) -> &BTreeSet<Predicate> {
        &self.needed_hyps
    }

    pub fn confidence(&self) -> Confidence {
        self.confidence
    }

    pub fn antecedents(&self) -> &[Antecedent] {
        &self.antecedents
    }

    /// A rule with no antecedents closes its node outright.
    pub fn is_discharging(&self) -> bool {
        self.antecedents.is_empty()
    }

    /// The child sequents, in antecedent order, or `None` if the rule does
    /// not apply. Pure: the rule is left as it was.
    pub fn apply(&self, seq: &Sequent) -> Option<Vec<Sequent>> {
        self.expand(seq).map(|(children, _)| children)
    }

    /// Like [`apply`](Self::apply), also reporting the skipped actions. The
    /// caller keeps them next to the rule for
    /// [`fold_dependencies`](Self::fold_dependencies).
    pub fn expand(&self, seq: &Sequent) -> Option<(Vec<Sequent>, SkippedActions)> {
        if !seq.contains_hypotheses(&self.needed_hyps) {
            trace!(rule = %self.display, "needed hypotheses missing");
            return None;
        }
        if let Some(goal) = &self.goal {
            if goal != seq.goal() {
                trace!(rule = %self.display, %goal, "goal mismatch");
                return None;
            }
        }
        let expanded: Option<Vec<(Sequent, Vec<bool>)>> =
            self.antecedents.iter().map(|a| a.expand(seq)).collect();
        let Some(expanded) = expanded else {
            trace!(rule = %self.display, "antecedent failed");
            return None;
        };
        let (children, skipped) = expanded.into_iter().unzip();
        Some((children, SkippedActions(skipped)))
    }

    /// Fold the children's dependencies into the dependencies of the node
    /// this rule was applied to.
    ///
    /// `children` pairs each child's builder with the child's type
    /// environment, in antecedent order. `skipped` is what
    /// [`expand`](Self::expand) reported for this node.
    pub fn fold_dependencies<'a>(
        &self,
        children: impl IntoIterator<Item = (ProofDependenciesBuilder, &'a TypeEnvironment)>,
        env: &TypeEnvironment,
        skipped: &SkippedActions,
    ) -> ProofDependenciesBuilder {
        let mut deps = ProofDependenciesBuilder::new();
        let mut kept_goal = None;
        let antecedents = self.antecedents.iter().enumerate().zip(children);
        for ((index, antecedent), (mut child, child_env)) in antecedents {
            antecedent.contribute_dependencies(
                &mut child,
                child_env,
                skipped.for_antecedent(index),
            );
            if kept_goal.is_none() {
                kept_goal = child.goal().cloned();
            }
            deps.merge(child);
        }
        if let Some(goal) = self.goal.clone().or(kept_goal) {
            deps.set_goal(goal, env);
        }
        deps.add_used_hyps(&self.needed_hyps, env);
        deps.add_reasoner(&self.reasoner_id);
        deps
    }
}

impl fmt::Display for ProofRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display)
    }
}
