//! The reasoner contract.
//!
//! A reasoner looks at a sequent and an input and either proposes a
//! [`ProofRule`] or declines. The kernel never trusts the proposal beyond
//! structure: [`ProofForest::apply_reasoner`] still derives the children
//! itself through [`ProofRule::apply`].
//!
//! Reasoners are looked up by id in an explicitly constructed
//! [`ReasonerRegistry`]. A process-wide registry holding the basic
//! reasoners is available through [`default_registry`].

use crate::error::{KernelError, StepError, TreeError};
use crate::reasoners;
use crate::rule::ProofRule;
use crate::sequent::Sequent;
use crate::tree::{NodeId, ProofForest};
use deduce_formula::Predicate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use tracing::debug;

/// Cooperative cancellation, polled by long-running reasoners.
pub trait ProofMonitor {
    fn is_canceled(&self) -> bool;
}

/// A monitor that never cancels.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullMonitor;

impl ProofMonitor for NullMonitor {
    fn is_canceled(&self) -> bool {
        false
    }
}

/// A monitor another thread can trip.
#[derive(Debug, Default)]
pub struct CancelFlag(AtomicBool);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

impl ProofMonitor for CancelFlag {
    fn is_canceled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// What a reasoner is asked to do, beyond the sequent itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ReasonerInput {
    #[default]
    Empty,
    Predicate(Predicate),
    Predicates(Vec<Predicate>),
    Comment(String),
}

/// Why a reasoner produced no rule.
#[derive(Debug, thiserror::Error)]
pub enum ReasonerFailure {
    /// The reasoner does not apply to this sequent. Expected.
    #[error("{reasoner}: {message}")]
    Unsuccessful { reasoner: String, message: String },

    /// The input does not have the shape the reasoner needs.
    #[error("{reasoner}: malformed input: {message}")]
    MalformedInput { reasoner: String, message: String },

    #[error("{reasoner}: canceled")]
    Canceled { reasoner: String },

    /// The reasoner built an invalid rule.
    #[error(transparent)]
    Kernel(#[from] KernelError),
}

impl ReasonerFailure {
    pub fn unsuccessful(reasoner: &str, message: impl Into<String>) -> Self {
        Self::Unsuccessful {
            reasoner: reasoner.to_string(),
            message: message.into(),
        }
    }

    pub fn malformed(reasoner: &str, message: impl Into<String>) -> Self {
        Self::MalformedInput {
            reasoner: reasoner.to_string(),
            message: message.into(),
        }
    }
}

/// A source of proof rules.
///
/// Produced rules must only name hypotheses the reasoner actually
/// consulted in `needed_hyps`; soundness beyond the structural checks of
/// [`ProofRule::apply`] is the reasoner's responsibility.
pub trait Reasoner: Send + Sync {
    fn id(&self) -> &str;

    fn apply(
        &self,
        sequent: &Sequent,
        input: &ReasonerInput,
        monitor: &dyn ProofMonitor,
    ) -> Result<ProofRule, ReasonerFailure>;
}

/// Reasoners by id.
#[derive(Clone, Default)]
pub struct ReasonerRegistry {
    reasoners: BTreeMap<String, Arc<dyn Reasoner>>,
}

impl ReasonerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every basic reasoner.
    pub fn with_basic_reasoners() -> Self {
        let mut registry = Self::new();
        for reasoner in reasoners::basic() {
            registry.insert(reasoner);
        }
        registry
    }

    pub fn register(&mut self, reasoner: Arc<dyn Reasoner>) -> Result<(), KernelError> {
        if self.reasoners.contains_key(reasoner.id()) {
            return Err(KernelError::DuplicateReasoner(reasoner.id().to_string()));
        }
        self.insert(reasoner);
        Ok(())
    }

    fn insert(&mut self, reasoner: Arc<dyn Reasoner>) {
        self.reasoners.insert(reasoner.id().to_string(), reasoner);
    }

    pub fn get(&self, id: &str) -> Option<&dyn Reasoner> {
        self.reasoners.get(id).map(|r| r.as_ref())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.reasoners.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.reasoners.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.reasoners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reasoners.is_empty()
    }
}

impl std::fmt::Debug for ReasonerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.ids()).finish()
    }
}

/// The shared registry of basic reasoners, built on first use.
pub fn default_registry() -> &'static ReasonerRegistry {
    static REGISTRY: OnceLock<ReasonerRegistry> = OnceLock::new();
    REGISTRY.get_or_init(ReasonerRegistry::with_basic_reasoners)
}

impl ProofForest {
    /// Run `reasoner` on an open node and apply the rule it proposes.
    ///
    /// The rule remembers `input`, so the step can be replayed later.
    pub fn apply_reasoner(
        &mut self,
        node: NodeId,
        reasoner: &dyn Reasoner,
        input: &ReasonerInput,
        monitor: &dyn ProofMonitor,
    ) -> Result<(), StepError> {
        let view = self.node(node).ok_or(TreeError::UnknownNode(node))?;
        if !view.is_open() {
            return Err(TreeError::NodeNotOpen(node).into());
        }
        if monitor.is_canceled() {
            return Err(ReasonerFailure::Canceled {
                reasoner: reasoner.id().to_string(),
            }
            .into());
        }
        let rule = reasoner.apply(view.sequent(), input, monitor)?;
        debug!(%node, reasoner = reasoner.id(), "reasoner proposed rule");
        self.apply_rule(node, rule.with_input(input.clone()))?;
        Ok(())
    }
}
