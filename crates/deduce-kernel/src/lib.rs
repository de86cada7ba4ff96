//! # Deduce Kernel
//!
//! The kernel of an interactive prover: it represents a sequent
//! (hypotheses ⊢ goal), applies proof rules to decompose goals into
//! subgoals, tracks which decompositions are still open, and computes the
//! minimal justification that lets a finished proof be reused after the
//! original sequent is edited.
//!
//! The kernel does not decide what is true. Reasoners propose rules; the
//! kernel only re-derives, mechanically and all-or-nothing, the child
//! sequents a rule claims.
//!
//! ## Architecture
//!
//! ```text
//! Sequent               ← Persistent hyps ⊢ goal, copy-on-write
//!     │
//! HypothesisAction      ← Select / Hide / ForwardInfer / Rewrite …
//!     │
//! ProofRule/Antecedent  ← Rule application: sequent → [child sequents]
//!     │
//! ProofForest           ← Arena of proof trees, confidence, deltas
//!     │
//! ProofDependencies     ← Minimal certificate for proof reuse
//!     │
//! replay                ← Reuse / rebuild recorded proofs
//! ```

pub mod confidence;
pub mod dependencies;
pub mod error;
pub mod hash;
pub mod hyp_action;
pub mod reasoner;
pub mod reasoners;
pub mod replay;
pub mod rule;
pub mod sequent;
pub mod tree;

pub use confidence::Confidence;
pub use dependencies::{ProofDependencies, ProofDependenciesBuilder, proof_reusable};
pub use error::{KernelError, SequentError, StepError, TreeError};
pub use hash::ContentHash;
pub use hyp_action::{ForwardInference, HypothesisAction, Performed, Rewrite};
pub use reasoner::{
    CancelFlag, NullMonitor, ProofMonitor, Reasoner, ReasonerFailure, ReasonerInput,
    ReasonerRegistry, default_registry,
};
pub use replay::{ProofSkeleton, ReplayConfig, rebuild, reuse};
pub use rule::{Antecedent, ProofRule, SkippedActions};
pub use sequent::{Sequent, SequentBuilder};
pub use tree::{
    Batch, DeltaFlags, ListenerId, NodeDelta, NodeId, NodeRef, ProofForest, ProofTreeDelta,
    TreeId, TreeRef,
};
