//! Proof trees.
//!
//! All trees live in one [`ProofForest`] arena and are addressed by handles:
//!
//! ```text
//!   ProofForest
//!   ├── nodes: [n0, n1, n2, ...]        NodeData { tree, parent, sequent,
//!   │                                              comment, rule, skipped,
//!   │                                              children, confidence }
//!   ├── free: [slots of removed nodes]
//!   └── trees: { t0 → root n0, ... }    TreeData { origin, root, deltas }
//! ```
//!
//! A node is **open** (no rule) or **applied** (a rule and one child per
//! antecedent). Pruning detaches the children of an applied node; each
//! detached subtree becomes the root of a new tree, keeping its node ids.
//! Detached trees stay in the forest until removed; removal frees their
//! node slots for reuse.
//!
//! Confidence is cached on every node and refreshed upward after each
//! mutation. Mutations are reported to per-tree listeners as deltas, see
//! [`ProofTreeDelta`].

mod delta;
mod forest;

pub use delta::{DeltaFlags, ListenerId, NodeDelta, ProofTreeDelta};
pub use forest::{Batch, NodeRef, ProofForest, TreeRef};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Handle to a node. Stable for the node's lifetime, across pruning.
///
/// Slots of removed nodes are reused under a new generation, so a handle
/// that outlived its node never reaches the slot's next occupant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

impl NodeId {
    const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    fn index(self) -> usize {
        self.index as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.generation {
            0 => write!(f, "n{}", self.index),
            generation => write!(f, "n{}.{generation}", self.index),
        }
    }
}

/// Handle to a tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TreeId(pub(crate) u32);

impl fmt::Display for TreeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}
