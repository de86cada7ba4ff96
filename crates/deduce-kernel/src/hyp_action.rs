//! Hypothesis actions: the closed set of transformations an antecedent
//! replays on its child sequent after the goal and hypotheses are in place.
//!
//! Selection actions (`Select`, `Deselect`, `Hide`, `Show`) only touch
//! visibility. `ForwardInfer` and `Rewrite` add hypotheses deduced from
//! others. Performing an action is pure: [`HypothesisAction::execute`]
//! reports whether an inference was skipped, and whoever applied the rule
//! keeps that outcome, since a skipped inference must not contribute to the
//! proof's dependencies.
//!
//! Every constructor collects its input into an owned set, so a caller that
//! keeps mutating its own collection afterwards cannot change the action.

use crate::dependencies::ProofDependenciesBuilder;
use crate::sequent::Sequent;
use deduce_formula::{FreeIdentifier, Predicate, TypeEnvironment};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HypothesisAction {
    Select { hyps: BTreeSet<Predicate> },
    Deselect { hyps: BTreeSet<Predicate> },
    Hide { hyps: BTreeSet<Predicate> },
    Show { hyps: BTreeSet<Predicate> },
    ForwardInfer(ForwardInference),
    Rewrite(Rewrite),
}

impl HypothesisAction {
    pub fn select(hyps: impl IntoIterator<Item = Predicate>) -> Self {
        Self::Select {
            hyps: hyps.into_iter().collect(),
        }
    }

    pub fn deselect(hyps: impl IntoIterator<Item = Predicate>) -> Self {
        Self::Deselect {
            hyps: hyps.into_iter().collect(),
        }
    }

    pub fn hide(hyps: impl IntoIterator<Item = Predicate>) -> Self {
        Self::Hide {
            hyps: hyps.into_iter().collect(),
        }
    }

    pub fn show(hyps: impl IntoIterator<Item = Predicate>) -> Self {
        Self::Show {
            hyps: hyps.into_iter().collect(),
        }
    }

    pub fn forward_infer(
        hyps: impl IntoIterator<Item = Predicate>,
        added_idents: impl IntoIterator<Item = FreeIdentifier>,
        inferred_hyps: impl IntoIterator<Item = Predicate>,
    ) -> Self {
        Self::ForwardInfer(ForwardInference::new(hyps, added_idents, inferred_hyps))
    }

    pub fn rewrite(
        disappearing: impl IntoIterator<Item = Predicate>,
        replacement: impl IntoIterator<Item = Predicate>,
    ) -> Self {
        Self::Rewrite(Rewrite::new(disappearing, replacement))
    }

    /// Short tag naming the kind of action.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Select { .. } => "select",
            Self::Deselect { .. } => "deselect",
            Self::Hide { .. } => "hide",
            Self::Show { .. } => "show",
            Self::ForwardInfer(_) => "forward_infer",
            Self::Rewrite(_) => "rewrite",
        }
    }

    /// The hypotheses this action acts on (the sources, for inferences).
    pub fn hyps(&self) -> &BTreeSet<Predicate> {
        match self {
            Self::Select { hyps }
            | Self::Deselect { hyps }
            | Self::Hide { hyps }
            | Self::Show { hyps } => hyps,
            Self::ForwardInfer(fwd) => fwd.hyps(),
            Self::Rewrite(rewrite) => rewrite.disappearing(),
        }
    }

    /// Apply the action. Total: when it does not apply, the result equals
    /// the input.
    pub fn perform(&self, seq: &Sequent) -> Sequent {
        self.execute(seq).sequent
    }

    /// Apply the action and report whether it was skipped. Selection
    /// actions are never skipped.
    pub fn execute(&self, seq: &Sequent) -> Performed {
        match self {
            Self::Select { hyps } => Performed::done(seq.select_hypotheses(hyps)),
            Self::Deselect { hyps } => Performed::done(seq.deselect_hypotheses(hyps)),
            Self::Hide { hyps } => Performed::done(seq.hide_hypotheses(hyps)),
            Self::Show { hyps } => Performed::done(seq.show_hypotheses(hyps)),
            Self::ForwardInfer(fwd) => fwd.execute(seq),
            Self::Rewrite(rewrite) => rewrite.execute(seq),
        }
    }

    /// Account for this action, performed without being skipped, while
    /// folding dependencies bottom-up.
    ///
    /// `env` is the type environment of the sequent the action produced
    /// its effect in.
    pub fn contribute_dependencies(
        &self,
        deps: &mut ProofDependenciesBuilder,
        env: &TypeEnvironment,
    ) {
        match self {
            Self::Select { .. } | Self::Deselect { .. } | Self::Hide { .. } | Self::Show { .. } => {
            }
            Self::ForwardInfer(fwd) => fwd.contribute_dependencies(deps, env),
            Self::Rewrite(rewrite) => rewrite.contribute_dependencies(deps, env),
        }
    }
}

impl fmt::Display for HypothesisAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.kind())?;
        write_set(f, self.hyps())?;
        match self {
            Self::ForwardInfer(fwd) => {
                write!(f, " ↦ ")?;
                write_set(f, fwd.inferred_hyps())?;
            }
            Self::Rewrite(rewrite) => {
                write!(f, " ↦ ")?;
                write_set(f, rewrite.replacement())?;
            }
            _ => {}
        }
        write!(f, ")")
    }
}

fn write_set(f: &mut fmt::Formatter<'_>, set: &BTreeSet<Predicate>) -> fmt::Result {
    for (i, p) in set.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{p}")?;
    }
    Ok(())
}

/// Outcome of [`HypothesisAction::execute`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Performed {
    pub sequent: Sequent,
    /// The action contributed no hypothesis and must not count towards
    /// dependencies.
    pub skipped: bool,
}

impl Performed {
    fn done(sequent: Sequent) -> Self {
        Self {
            sequent,
            skipped: false,
        }
    }

    fn skipped(sequent: Sequent) -> Self {
        Self {
            sequent,
            skipped: true,
        }
    }
}

// ─── ForwardInference ───────────────────────────────────────────────────────

/// Deduce `inferred_hyps` from `hyps`, binding `added_idents` first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardInference {
    hyps: BTreeSet<Predicate>,
    added_idents: Vec<FreeIdentifier>,
    inferred_hyps: BTreeSet<Predicate>,
}

impl ForwardInference {
    pub fn new(
        hyps: impl IntoIterator<Item = Predicate>,
        added_idents: impl IntoIterator<Item = FreeIdentifier>,
        inferred_hyps: impl IntoIterator<Item = Predicate>,
    ) -> Self {
        Self {
            hyps: hyps.into_iter().collect(),
            added_idents: added_idents.into_iter().collect(),
            inferred_hyps: inferred_hyps.into_iter().collect(),
        }
    }

    pub fn hyps(&self) -> &BTreeSet<Predicate> {
        &self.hyps
    }

    pub fn added_idents(&self) -> &[FreeIdentifier] {
        &self.added_idents
    }

    pub fn inferred_hyps(&self) -> &BTreeSet<Predicate> {
        &self.inferred_hyps
    }

    /// Skipped, leaving the sequent unchanged, unless the sources are
    /// present, the identifiers fresh and the inferred hypotheses new.
    pub fn execute(&self, seq: &Sequent) -> Performed {
        match self.try_perform(seq) {
            Some(out) => Performed::done(out),
            None => Performed::skipped(seq.clone()),
        }
    }

    fn try_perform(&self, seq: &Sequent) -> Option<Sequent> {
        if !seq.contains_hypotheses(&self.hyps) {
            return None;
        }
        if self.added_idents.iter().any(|i| seq.type_env().contains(i.name())) {
            return None;
        }
        if seq.contains_hypotheses(&self.inferred_hyps) {
            return None;
        }
        seq.forward_infer(&self.hyps, &self.added_idents, &self.inferred_hyps)
    }

    pub fn contribute_dependencies(
        &self,
        deps: &mut ProofDependenciesBuilder,
        env: &TypeEnvironment,
    ) {
        deps.fold_forward_inference(&self.hyps, &self.added_idents, &self.inferred_hyps, env);
    }
}

// ─── Rewrite ────────────────────────────────────────────────────────────────

/// Replace `disappearing` hypotheses by `replacement`: the replacement is
/// added (if missing) and selected, and the members of `to_hide` that are
/// among the disappearing hypotheses are hidden.
///
/// Nothing happens unless every disappearing hypothesis is present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rewrite {
    disappearing: BTreeSet<Predicate>,
    replacement: BTreeSet<Predicate>,
    to_hide: BTreeSet<Predicate>,
}

impl Rewrite {
    /// A rewrite that hides every disappearing hypothesis.
    pub fn new(
        disappearing: impl IntoIterator<Item = Predicate>,
        replacement: impl IntoIterator<Item = Predicate>,
    ) -> Self {
        let disappearing: BTreeSet<Predicate> = disappearing.into_iter().collect();
        Self {
            to_hide: disappearing.clone(),
            disappearing,
            replacement: replacement.into_iter().collect(),
        }
    }

    /// Restrict hiding to `to_hide`.
    pub fn hiding(mut self, to_hide: impl IntoIterator<Item = Predicate>) -> Self {
        self.to_hide = to_hide.into_iter().collect();
        self
    }

    pub fn disappearing(&self) -> &BTreeSet<Predicate> {
        &self.disappearing
    }

    pub fn replacement(&self) -> &BTreeSet<Predicate> {
        &self.replacement
    }

    pub fn to_hide(&self) -> &BTreeSet<Predicate> {
        &self.to_hide
    }

    /// Skipped whenever no hypothesis is added: either nothing happens, or
    /// the replacement was already present and only visibility changes.
    pub fn execute(&self, seq: &Sequent) -> Performed {
        if !seq.contains_hypotheses(&self.disappearing) {
            return Performed::skipped(seq.clone());
        }
        let (with_replacement, skipped) = if seq.contains_hypotheses(&self.replacement) {
            (seq.clone(), true)
        } else {
            match seq.forward_infer(&self.disappearing, &[], &self.replacement) {
                Some(inferred) => (inferred, false),
                None => return Performed::skipped(seq.clone()),
            }
        };
        let sequent = with_replacement
            .select_hypotheses(&self.replacement)
            .hide_hypotheses(self.to_hide.intersection(&self.disappearing));
        Performed { sequent, skipped }
    }

    pub fn contribute_dependencies(
        &self,
        deps: &mut ProofDependenciesBuilder,
        env: &TypeEnvironment,
    ) {
        deps.fold_forward_inference(&self.disappearing, &[], &self.replacement, env);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deduce_formula::{Type, parse_predicate};

    fn p(text: &str) -> Predicate {
        parse_predicate(text).unwrap()
    }

    fn env() -> TypeEnvironment {
        ["a", "b", "c"]
            .into_iter()
            .try_fold(TypeEnvironment::new(), |e, n| e.with(n, Type::Integer))
            .unwrap()
    }

    fn seq(hyps: &[&str]) -> Sequent {
        Sequent::new(env(), hyps.iter().map(|h| p(h)), p("⊤")).unwrap()
    }

    fn set(hyps: &[&str]) -> BTreeSet<Predicate> {
        hyps.iter().map(|h| p(h)).collect()
    }

    #[test]
    fn selection_actions_on_absent_hyps_are_identity() {
        let s = seq(&["a=1", "b=2"]);
        let absent = vec![p("c=3"), p("a=2")];
        for action in [
            HypothesisAction::select(absent.clone()),
            HypothesisAction::deselect(absent.clone()),
            HypothesisAction::hide(absent.clone()),
            HypothesisAction::show(absent.clone()),
        ] {
            let out = action.execute(&s);
            assert_eq!(out.sequent, s, "{action}");
            assert!(!out.skipped, "{action}");
        }
    }

    #[test]
    fn constructors_copy_caller_collections() {
        let mut hyps = vec![p("a=1")];
        let mut inferred = BTreeSet::from([p("b=2")]);
        let mut to_hide = vec![p("a=1")];
        let actions = [
            HypothesisAction::select(hyps.clone()),
            HypothesisAction::deselect(hyps.iter().cloned()),
            HypothesisAction::hide(hyps.iter().cloned()),
            HypothesisAction::show(hyps.clone()),
            HypothesisAction::forward_infer(hyps.clone(), [], inferred.clone()),
            HypothesisAction::rewrite(hyps.clone(), inferred.clone()),
        ];
        let restricted = Rewrite::new(hyps.clone(), inferred.clone()).hiding(to_hide.clone());

        hyps.push(p("c=3"));
        inferred.insert(p("c=4"));
        to_hide.push(p("b=2"));

        for action in &actions {
            assert_eq!(action.hyps(), &set(&["a=1"]), "{action}");
        }
        let HypothesisAction::ForwardInfer(fwd) = &actions[4] else {
            panic!("expected forward inference");
        };
        assert_eq!(fwd.inferred_hyps(), &set(&["b=2"]));
        let HypothesisAction::Rewrite(rewrite) = &actions[5] else {
            panic!("expected rewrite");
        };
        assert_eq!(rewrite.replacement(), &set(&["b=2"]));
        assert_eq!(rewrite.to_hide(), &set(&["a=1"]));
        assert_eq!(restricted.disappearing(), &set(&["a=1"]));
        assert_eq!(restricted.replacement(), &set(&["b=2"]));
        assert_eq!(restricted.to_hide(), &set(&["a=1"]));
    }

    #[test]
    fn forward_inference_adds_local_hyps() {
        let s = seq(&["a=1"]);
        let fwd = ForwardInference::new([p("a=1")], [], [p("a>0")]);
        let out = fwd.execute(&s);
        assert!(!out.skipped);
        assert!(out.sequent.local_hyps().contains(&p("a>0")));
        // The source was selected, so the inferred hypothesis is too.
        assert!(out.sequent.is_selected(&p("a>0")));
    }

    #[test]
    fn forward_inference_inherits_hidden_sources() {
        let s = seq(&["a=1"]).hide_hypotheses([&p("a=1")]);
        let fwd = ForwardInference::new([p("a=1")], [], [p("a>0")]);
        let out = fwd.execute(&s).sequent;
        assert!(out.is_hidden(&p("a>0")));
    }

    #[test]
    fn forward_inference_skips_when_not_applicable() {
        let s = seq(&["a=1", "b=2"]);
        let a = FreeIdentifier::new("a", Type::Integer).unwrap();
        for fwd in [
            ForwardInference::new([p("c=1")], [], [p("c>0")]),
            ForwardInference::new([p("a=1")], [], [p("b=2")]),
            ForwardInference::new([p("a=1")], [a], [p("a>0")]),
            ForwardInference::new([p("a=1")], [], [p("z>0")]),
        ] {
            let out = fwd.execute(&s);
            assert_eq!(out.sequent, s);
            assert!(out.skipped);
        }
    }

    #[test]
    fn forward_inference_binds_fresh_identifiers() {
        let s = seq(&["a=1"]);
        let z = FreeIdentifier::new("z", Type::Integer).unwrap();
        let fwd = ForwardInference::new([p("a=1")], [z.clone()], [p("z=a")]);
        let out = fwd.execute(&s).sequent;
        assert!(out.type_env().contains_ident(&z));
        assert!(out.contains_hypothesis(&p("z=a")));
        assert!(!s.type_env().contains("z"));
    }

    #[test]
    fn rewrite_nominal() {
        let rewrite = Rewrite::new([p("a=1"), p("b=2")], [p("c=3")]);
        let out = rewrite.execute(&seq(&["a=1", "b=2"]));
        assert_eq!(out.sequent.hidden_hyps(), &set(&["a=1", "b=2"]));
        assert_eq!(out.sequent.selected_hyps(), &set(&["c=3"]));
        assert!(!out.skipped);
    }

    #[test]
    fn rewrite_not_applicable() {
        let rewrite = Rewrite::new([p("a=1"), p("b=2")], [p("c=3")]);
        let s = seq(&["a=1"]);
        let out = rewrite.execute(&s);
        assert_eq!(out.sequent, s);
        assert!(out.skipped);
    }

    #[test]
    fn rewrite_hide_only() {
        let rewrite = Rewrite::new([p("a=1"), p("b=2")], [p("c=3")]);
        let out = rewrite.execute(&seq(&["a=1", "b=2", "c=3"]));
        assert_eq!(out.sequent.hidden_hyps(), &set(&["a=1", "b=2"]));
        assert_eq!(out.sequent.selected_hyps(), &set(&["c=3"]));
        assert!(out.skipped);
    }

    #[test]
    fn rewrite_restricted_hiding() {
        let rewrite = Rewrite::new([p("a=1"), p("b=2")], [p("c=3")]).hiding([p("a=1"), p("c=9")]);
        let out = rewrite.execute(&seq(&["a=1", "b=2"])).sequent;
        assert_eq!(out.hidden_hyps(), &set(&["a=1"]));
        assert!(out.is_selected(&p("b=2")));
    }

    #[test]
    fn execute_leaves_the_action_untouched() {
        let fwd = ForwardInference::new([p("a=1")], [], [p("a>0")]);
        let before = fwd.clone();
        assert!(fwd.execute(&seq(&["b=2"])).skipped);
        assert!(!fwd.execute(&seq(&["a=1"])).skipped);
        assert_eq!(fwd, before);
    }

    #[test]
    fn display() {
        let action = HypothesisAction::rewrite([p("a=1")], [p("a>0")]);
        assert_eq!(action.to_string(), "rewrite(a=1 ↦ a>0)");
    }
}
