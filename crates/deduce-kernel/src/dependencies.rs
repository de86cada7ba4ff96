//! Proof dependencies: the minimal certificate a finished proof needs from
//! its root sequent.
//!
//! ```text
//!            ┌──────────────┐
//!   root ──▶ │ goal?        │   proof_reusable(deps, edited) checks the
//!            │ used_hyps    │   edited sequent still provides all of this
//!            │ used_idents  │   and binds none of the introduced names
//!            │ introduced   │
//!            │ reasoners    │
//!            └──────────────┘
//! ```
//!
//! Dependencies are computed bottom-up. Each open leaf depends on its goal;
//! each applied rule folds its children's builders through its antecedents
//! (undoing what the antecedent added) and then adds what the rule itself
//! consulted.

use crate::hash::ContentHash;
use crate::sequent::Sequent;
use deduce_formula::{FreeIdentifier, Predicate, TypeEnvironment};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Mutable accumulator used while folding a proof tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProofDependenciesBuilder {
    goal: Option<Predicate>,
    used_hyps: BTreeSet<Predicate>,
    used_free_idents: BTreeSet<FreeIdentifier>,
    introduced_free_idents: BTreeSet<String>,
    used_reasoners: BTreeSet<String>,
}

impl ProofDependenciesBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dependencies of an open node: its goal and the goal's identifiers.
    pub fn open_leaf(sequent: &Sequent) -> Self {
        let mut deps = Self::new();
        deps.set_goal(sequent.goal().clone(), sequent.type_env());
        deps
    }

    pub fn goal(&self) -> Option<&Predicate> {
        self.goal.as_ref()
    }

    /// Depend on `goal`, and on the identifiers it mentions.
    pub fn set_goal(&mut self, goal: Predicate, env: &TypeEnvironment) {
        self.used_free_idents.extend(env.free_identifiers(&goal));
        self.goal = Some(goal);
    }

    pub fn clear_goal(&mut self) {
        self.goal = None;
    }

    pub fn used_hyps(&self) -> &BTreeSet<Predicate> {
        &self.used_hyps
    }

    pub fn used_free_idents(&self) -> &BTreeSet<FreeIdentifier> {
        &self.used_free_idents
    }

    pub fn introduced_free_idents(&self) -> &BTreeSet<String> {
        &self.introduced_free_idents
    }

    pub fn used_reasoners(&self) -> &BTreeSet<String> {
        &self.used_reasoners
    }

    /// Depend on hypotheses, and on the identifiers they mention.
    pub fn add_used_hyps<'a>(
        &mut self,
        hyps: impl IntoIterator<Item = &'a Predicate>,
        env: &TypeEnvironment,
    ) {
        for hyp in hyps {
            self.used_free_idents.extend(env.free_identifiers(hyp));
            self.used_hyps.insert(hyp.clone());
        }
    }

    pub fn remove_used_hyps<'a>(&mut self, hyps: impl IntoIterator<Item = &'a Predicate>) {
        for hyp in hyps {
            self.used_hyps.remove(hyp);
        }
    }

    pub fn add_reasoner(&mut self, id: &str) {
        self.used_reasoners.insert(id.to_string());
    }

    /// Move identifiers from used to introduced.
    pub fn introduce(&mut self, idents: &[FreeIdentifier]) {
        if idents.is_empty() {
            return;
        }
        self.used_free_idents
            .retain(|used| !idents.iter().any(|i| i.name() == used.name()));
        self.introduced_free_idents
            .extend(idents.iter().map(|i| i.name().to_string()));
    }

    /// Whether anything downstream consulted one of `hyps` or `idents`.
    pub fn consults(&self, hyps: &BTreeSet<Predicate>, idents: &[FreeIdentifier]) -> bool {
        !self.used_hyps.is_disjoint(hyps)
            || idents
                .iter()
                .any(|i| self.used_free_idents.iter().any(|u| u.name() == i.name()))
    }

    /// Fold a forward inference that deduced `inferred` from `sources`.
    ///
    /// If nothing downstream consulted the inference's output it contributes
    /// nothing; otherwise the inferred hypotheses are replaced by their
    /// sources and the added identifiers become introduced.
    pub fn fold_forward_inference(
        &mut self,
        sources: &BTreeSet<Predicate>,
        added_idents: &[FreeIdentifier],
        inferred: &BTreeSet<Predicate>,
        env: &TypeEnvironment,
    ) {
        if !self.consults(inferred, added_idents) {
            return;
        }
        self.remove_used_hyps(inferred);
        self.add_used_hyps(sources, env);
        self.introduce(added_idents);
    }

    /// Union everything but the goal, which the caller settles.
    pub fn merge(&mut self, other: ProofDependenciesBuilder) {
        self.used_hyps.extend(other.used_hyps);
        self.used_free_idents.extend(other.used_free_idents);
        self.introduced_free_idents
            .extend(other.introduced_free_idents);
        self.used_reasoners.extend(other.used_reasoners);
    }

    pub fn finish(self) -> ProofDependencies {
        ProofDependencies {
            goal: self.goal,
            used_hyps: self.used_hyps,
            used_free_idents: self.used_free_idents,
            introduced_free_idents: self.introduced_free_idents,
            used_reasoners: self.used_reasoners,
        }
    }
}

/// What a proof consults from its root sequent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofDependencies {
    goal: Option<Predicate>,
    used_hyps: BTreeSet<Predicate>,
    used_free_idents: BTreeSet<FreeIdentifier>,
    introduced_free_idents: BTreeSet<String>,
    used_reasoners: BTreeSet<String>,
}

impl ProofDependencies {
    pub fn goal(&self) -> Option<&Predicate> {
        self.goal.as_ref()
    }

    pub fn used_hyps(&self) -> &BTreeSet<Predicate> {
        &self.used_hyps
    }

    pub fn used_free_idents(&self) -> &BTreeSet<FreeIdentifier> {
        &self.used_free_idents
    }

    pub fn introduced_free_idents(&self) -> &BTreeSet<String> {
        &self.introduced_free_idents
    }

    pub fn used_reasoners(&self) -> &BTreeSet<String> {
        &self.used_reasoners
    }

    /// Whether the proof depends on anything in its root sequent.
    pub fn has_deps(&self) -> bool {
        self.goal.is_some() || !self.used_hyps.is_empty()
    }

    /// Content hash of the certificate, stable across runs.
    pub fn digest(&self) -> ContentHash {
        ContentHash::builder()
            .field_opt("goal", self.goal.as_ref().map(ToString::to_string).as_deref())
            .fields("hyp", &self.used_hyps)
            .fields("ident", &self.used_free_idents)
            .fields("introduced", &self.introduced_free_idents)
            .fields("reasoner", &self.used_reasoners)
            .finish()
    }
}

/// Whether a proof with dependencies `deps` can be replayed on `sequent`.
///
/// The goal (if any) must match, every used hypothesis must be present,
/// every used identifier must be bound with the same type, and no
/// introduced name may already be bound.
pub fn proof_reusable(deps: &ProofDependencies, sequent: &Sequent) -> bool {
    let env = sequent.type_env();
    deps.goal.as_ref().is_none_or(|goal| goal == sequent.goal())
        && sequent.contains_hypotheses(&deps.used_hyps)
        && deps.used_free_idents.iter().all(|i| env.contains_ident(i))
        && !deps.introduced_free_idents.iter().any(|name| env.contains(name))
}
