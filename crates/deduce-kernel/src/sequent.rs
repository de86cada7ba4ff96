//! Persistent sequents.
//!
//! A sequent is a type environment, a set of hypotheses and a goal.
//! Hypotheses are either *global* (given when the sequent was built) or
//! *local* (added while proving). Two visibility sets sit on top:
//! `hidden ⊆ hypotheses` and `selected ⊆ hypotheses`, never overlapping.
//!
//! Sequents are values. Every mutator returns a new sequent and shares the
//! fields it did not touch with the original through `Arc`, so a proof tree
//! with thousands of nodes holds only the differences between them.

use crate::error::SequentError;
use crate::hash::ContentHash;
use deduce_formula::{FreeIdentifier, Predicate, TypeEnvironment};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

type HypSet = BTreeSet<Predicate>;

#[derive(Debug, Clone)]
pub struct Sequent {
    type_env: Arc<TypeEnvironment>,
    global_hyps: Arc<HypSet>,
    local_hyps: Arc<HypSet>,
    hidden: Arc<HypSet>,
    selected: Arc<HypSet>,
    goal: Arc<Predicate>,
}

/// Builds a sequent and checks every invariant once, at the end.
#[derive(Debug, Clone, Default)]
pub struct SequentBuilder {
    type_env: TypeEnvironment,
    global_hyps: HypSet,
    local_hyps: HypSet,
    hidden: HypSet,
    selected: HypSet,
}

impl SequentBuilder {
    pub fn new(type_env: TypeEnvironment) -> Self {
        Self {
            type_env,
            ..Self::default()
        }
    }

    pub fn global_hyps(mut self, hyps: impl IntoIterator<Item = Predicate>) -> Self {
        self.global_hyps.extend(hyps);
        self
    }

    pub fn local_hyps(mut self, hyps: impl IntoIterator<Item = Predicate>) -> Self {
        self.local_hyps.extend(hyps);
        self
    }

    pub fn hidden(mut self, hyps: impl IntoIterator<Item = Predicate>) -> Self {
        self.hidden.extend(hyps);
        self
    }

    pub fn selected(mut self, hyps: impl IntoIterator<Item = Predicate>) -> Self {
        self.selected.extend(hyps);
        self
    }

    pub fn build(self, goal: Predicate) -> Result<Sequent, SequentError> {
        let Self {
            type_env,
            global_hyps,
            mut local_hyps,
            hidden,
            selected,
        } = self;

        if let Err(source) = type_env.check_closed(&goal) {
            return Err(SequentError::Goal { goal, source });
        }
        // A hypothesis given both ways counts as global.
        local_hyps.retain(|h| !global_hyps.contains(h));
        for hyp in global_hyps.iter().chain(local_hyps.iter()) {
            if let Err(source) = type_env.check_closed(hyp) {
                return Err(SequentError::Hypothesis {
                    hyp: hyp.clone(),
                    source,
                });
            }
        }
        let is_hyp = |h: &Predicate| global_hyps.contains(h) || local_hyps.contains(h);
        if let Some(stray) = hidden.iter().chain(selected.iter()).find(|h| !is_hyp(*h)) {
            return Err(SequentError::NotAHypothesis(stray.clone()));
        }
        if let Some(both) = hidden.intersection(&selected).next() {
            return Err(SequentError::HiddenAndSelected(both.clone()));
        }

        Ok(Sequent {
            type_env: Arc::new(type_env),
            global_hyps: Arc::new(global_hyps),
            local_hyps: Arc::new(local_hyps),
            hidden: Arc::new(hidden),
            selected: Arc::new(selected),
            goal: Arc::new(goal),
        })
    }
}

impl Sequent {
    /// A sequent whose hypotheses are all global and all selected.
    pub fn new(
        type_env: TypeEnvironment,
        hyps: impl IntoIterator<Item = Predicate>,
        goal: Predicate,
    ) -> Result<Self, SequentError> {
        let hyps: HypSet = hyps.into_iter().collect();
        SequentBuilder::new(type_env)
            .global_hyps(hyps.iter().cloned())
            .selected(hyps)
            .build(goal)
    }

    pub fn builder(type_env: TypeEnvironment) -> SequentBuilder {
        SequentBuilder::new(type_env)
    }

    // ── Queries ────────────────────────────────────────────────────────

    pub fn type_env(&self) -> &TypeEnvironment {
        &self.type_env
    }

    pub fn goal(&self) -> &Predicate {
        &self.goal
    }

    /// All hypotheses, global first, each in predicate order.
    pub fn hypotheses(&self) -> impl Iterator<Item = &Predicate> {
        self.global_hyps.iter().chain(self.local_hyps.iter())
    }

    pub fn hypothesis_count(&self) -> usize {
        self.global_hyps.len() + self.local_hyps.len()
    }

    pub fn global_hyps(&self) -> &BTreeSet<Predicate> {
        &self.global_hyps
    }

    pub fn local_hyps(&self) -> &BTreeSet<Predicate> {
        &self.local_hyps
    }

    pub fn hidden_hyps(&self) -> &BTreeSet<Predicate> {
        &self.hidden
    }

    pub fn selected_hyps(&self) -> &BTreeSet<Predicate> {
        &self.selected
    }

    /// Hypotheses that are not hidden.
    pub fn visible_hyps(&self) -> impl Iterator<Item = &Predicate> {
        self.hypotheses().filter(|h| !self.hidden.contains(*h))
    }

    pub fn contains_hypothesis(&self, hyp: &Predicate) -> bool {
        self.global_hyps.contains(hyp) || self.local_hyps.contains(hyp)
    }

    pub fn contains_hypotheses<'a>(&self, hyps: impl IntoIterator<Item = &'a Predicate>) -> bool {
        hyps.into_iter().all(|h| self.contains_hypothesis(h))
    }

    pub fn is_hidden(&self, hyp: &Predicate) -> bool {
        self.hidden.contains(hyp)
    }

    pub fn is_selected(&self, hyp: &Predicate) -> bool {
        self.selected.contains(hyp)
    }

    /// Content hash over environment, hypotheses, visibility and goal.
    pub fn fingerprint(&self) -> ContentHash {
        let mut builder = ContentHash::builder().fields("env", self.type_env.idents());
        let hyps: BTreeSet<&Predicate> = self.hypotheses().collect();
        for hyp in hyps {
            let tag = match (self.is_hidden(hyp), self.is_selected(hyp)) {
                (true, _) => "hidden",
                (_, true) => "selected",
                _ => "visible",
            };
            builder = builder.field(tag, &hyp.to_string());
        }
        builder.field("goal", &self.goal.to_string()).finish()
    }

    // ── Copy-on-write mutators ─────────────────────────────────────────

    /// Bind fresh identifiers. `None` if any name is already bound.
    pub fn add_free_idents(&self, idents: &[FreeIdentifier]) -> Option<Sequent> {
        if idents.is_empty() {
            return Some(self.clone());
        }
        let type_env = self.type_env.extend(idents).ok()?;
        Some(Sequent {
            type_env: Arc::new(type_env),
            ..self.clone()
        })
    }

    /// Replace the goal. `None` if it does not type-check closed.
    pub fn replace_goal(&self, goal: Predicate) -> Option<Sequent> {
        if *self.goal == goal {
            return Some(self.clone());
        }
        self.type_env.check_closed(&goal).ok()?;
        Some(Sequent {
            goal: Arc::new(goal),
            ..self.clone()
        })
    }

    /// Add hypotheses as local hypotheses.
    ///
    /// Hypotheses already present are not duplicated, but are shown if they
    /// were hidden. `None` if any of them does not type-check closed.
    pub fn add_hyps(&self, hyps: impl IntoIterator<Item = Predicate>) -> Option<Sequent> {
        let mut local = None::<HypSet>;
        let mut hidden = None::<HypSet>;
        for hyp in hyps {
            self.type_env.check_closed(&hyp).ok()?;
            if self.hidden.contains(&hyp) {
                hidden
                    .get_or_insert_with(|| (*self.hidden).clone())
                    .remove(&hyp);
            }
            if !self.contains_hypothesis(&hyp) {
                local
                    .get_or_insert_with(|| (*self.local_hyps).clone())
                    .insert(hyp);
            }
        }
        Some(Sequent {
            local_hyps: local.map_or_else(|| self.local_hyps.clone(), Arc::new),
            hidden: hidden.map_or_else(|| self.hidden.clone(), Arc::new),
            ..self.clone()
        })
    }

    /// Select hypotheses, showing them if hidden. Others are ignored.
    pub fn select_hypotheses<'a>(&self, hyps: impl IntoIterator<Item = &'a Predicate>) -> Sequent {
        let mut selected = None::<HypSet>;
        let mut hidden = None::<HypSet>;
        for hyp in hyps {
            if !self.contains_hypothesis(hyp) {
                continue;
            }
            if !self.selected.contains(hyp) {
                selected
                    .get_or_insert_with(|| (*self.selected).clone())
                    .insert(hyp.clone());
            }
            if self.hidden.contains(hyp) {
                hidden
                    .get_or_insert_with(|| (*self.hidden).clone())
                    .remove(hyp);
            }
        }
        self.with_visibility(hidden, selected)
    }

    /// Deselect hypotheses. Others are ignored.
    pub fn deselect_hypotheses<'a>(
        &self,
        hyps: impl IntoIterator<Item = &'a Predicate>,
    ) -> Sequent {
        let mut selected = None::<HypSet>;
        for hyp in hyps {
            if self.selected.contains(hyp) {
                selected
                    .get_or_insert_with(|| (*self.selected).clone())
                    .remove(hyp);
            }
        }
        self.with_visibility(None, selected)
    }

    /// Hide hypotheses, deselecting them. Others are ignored.
    pub fn hide_hypotheses<'a>(&self, hyps: impl IntoIterator<Item = &'a Predicate>) -> Sequent {
        let mut selected = None::<HypSet>;
        let mut hidden = None::<HypSet>;
        for hyp in hyps {
            if !self.contains_hypothesis(hyp) {
                continue;
            }
            if !self.hidden.contains(hyp) {
                hidden
                    .get_or_insert_with(|| (*self.hidden).clone())
                    .insert(hyp.clone());
            }
            if self.selected.contains(hyp) {
                selected
                    .get_or_insert_with(|| (*self.selected).clone())
                    .remove(hyp);
            }
        }
        self.with_visibility(hidden, selected)
    }

    /// Show hidden hypotheses. Others are ignored.
    pub fn show_hypotheses<'a>(&self, hyps: impl IntoIterator<Item = &'a Predicate>) -> Sequent {
        let mut hidden = None::<HypSet>;
        for hyp in hyps {
            if self.hidden.contains(hyp) {
                hidden
                    .get_or_insert_with(|| (*self.hidden).clone())
                    .remove(hyp);
            }
        }
        self.with_visibility(hidden, None)
    }

    /// Forward inference: add `inferred` as local hypotheses deduced from
    /// `sources`, binding `added_idents` first.
    ///
    /// New hypotheses take their visibility from the sources: selected if
    /// any source is selected (or there are none), hidden if every source
    /// is hidden. `None` on a name clash or a type error.
    pub(crate) fn forward_infer(
        &self,
        sources: &BTreeSet<Predicate>,
        added_idents: &[FreeIdentifier],
        inferred: &BTreeSet<Predicate>,
    ) -> Option<Sequent> {
        let extended = self.add_free_idents(added_idents)?;
        let fresh: Vec<&Predicate> = inferred
            .iter()
            .filter(|h| !extended.contains_hypothesis(h))
            .collect();
        for hyp in &fresh {
            extended.type_env.check_closed(hyp).ok()?;
        }
        if fresh.is_empty() {
            return Some(extended);
        }

        let mut local = (*extended.local_hyps).clone();
        local.extend(fresh.iter().map(|h| (*h).clone()));
        let with_hyps = Sequent {
            local_hyps: Arc::new(local),
            ..extended
        };

        let select = sources.is_empty() || sources.iter().any(|s| self.is_selected(s));
        let hide = !sources.is_empty() && sources.iter().all(|s| self.is_hidden(s));
        Some(if select {
            with_hyps.select_hypotheses(fresh)
        } else if hide {
            with_hyps.hide_hypotheses(fresh)
        } else {
            with_hyps
        })
    }

    fn with_visibility(&self, hidden: Option<HypSet>, selected: Option<HypSet>) -> Sequent {
        let seq = Sequent {
            hidden: hidden.map_or_else(|| self.hidden.clone(), Arc::new),
            selected: selected.map_or_else(|| self.selected.clone(), Arc::new),
            ..self.clone()
        };
        debug_assert!(seq.hidden.is_disjoint(&seq.selected));
        seq
    }

    /// Whether two sequents share every field by reference.
    pub fn shares_all_fields(&self, other: &Sequent) -> bool {
        Arc::ptr_eq(&self.type_env, &other.type_env)
            && Arc::ptr_eq(&self.global_hyps, &other.global_hyps)
            && Arc::ptr_eq(&self.local_hyps, &other.local_hyps)
            && Arc::ptr_eq(&self.hidden, &other.hidden)
            && Arc::ptr_eq(&self.selected, &other.selected)
            && Arc::ptr_eq(&self.goal, &other.goal)
    }
}

/// Deep equality: same environment, goal, hypotheses and visibility,
/// regardless of which hypotheses are global or local.
impl PartialEq for Sequent {
    fn eq(&self, other: &Self) -> bool {
        if self.shares_all_fields(other) {
            return true;
        }
        self.goal == other.goal
            && self.type_env == other.type_env
            && self.hidden == other.hidden
            && self.selected == other.selected
            && self.hypothesis_count() == other.hypothesis_count()
            && self.hypotheses().all(|h| other.contains_hypothesis(h))
    }
}

impl Eq for Sequent {}

/// `hyp ;; hyp ⊢ goal`, hidden hypotheses left out.
impl fmt::Display for Sequent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, hyp) in self.visible_hyps().enumerate() {
            if i > 0 {
                write!(f, " ;; ")?;
            }
            write!(f, "{hyp}")?;
        }
        if self.visible_hyps().next().is_some() {
            write!(f, " ")?;
        }
        write!(f, "⊢ {}", self.goal)
    }
}
