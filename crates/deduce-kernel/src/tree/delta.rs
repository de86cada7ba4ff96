//! Change notification for proof trees.
//!
//! Every mutation records a flag set on the node it touched. Records are
//! held while a batch is open and flushed as one tree-shaped delta when the
//! outermost batch closes; the shape mirrors only the paths from the root
//! down to the nodes that changed.
//!
//! ```text
//!   t0
//!   n0 CONFIDENCE
//!     n1
//!       n3 RULE|CHILDREN
//! ```

use super::{NodeId, TreeId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// What changed on a node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeltaFlags(u8);

impl DeltaFlags {
    pub const RULE: Self = Self(1);
    pub const CHILDREN: Self = Self(1 << 1);
    pub const CONFIDENCE: Self = Self(1 << 2);
    pub const COMMENT: Self = Self(1 << 3);

    const NAMES: [(Self, &'static str); 4] = [
        (Self::RULE, "RULE"),
        (Self::CHILDREN, "CHILDREN"),
        (Self::CONFIDENCE, "CONFIDENCE"),
        (Self::COMMENT, "COMMENT"),
    ];

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for DeltaFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for DeltaFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for DeltaFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (flag, name) in Self::NAMES {
            if self.contains(flag) {
                if !first {
                    f.write_str("|")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        Ok(())
    }
}

/// One node of a tree-shaped delta.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeDelta {
    node: NodeId,
    flags: DeltaFlags,
    children: Vec<NodeDelta>,
}

impl NodeDelta {
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Empty for nodes that are only on the path to a change.
    pub fn flags(&self) -> DeltaFlags {
        self.flags
    }

    pub fn children(&self) -> &[NodeDelta] {
        &self.children
    }

    fn find(&self, node: NodeId) -> Option<&NodeDelta> {
        if self.node == node {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(node))
    }

    fn collect_changed(&self, out: &mut Vec<NodeId>) {
        if !self.flags.is_empty() {
            out.push(self.node);
        }
        for child in &self.children {
            child.collect_changed(out);
        }
    }

    fn write_indented(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        write!(f, "\n{:width$}{}", "", self.node, width = depth * 2)?;
        if !self.flags.is_empty() {
            write!(f, " {}", self.flags)?;
        }
        for child in &self.children {
            child.write_indented(f, depth + 1)?;
        }
        Ok(())
    }
}

/// Everything that changed in one tree since the last notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofTreeDelta {
    tree: TreeId,
    root: NodeDelta,
}

impl ProofTreeDelta {
    pub fn tree(&self) -> TreeId {
        self.tree
    }

    pub fn root(&self) -> &NodeDelta {
        &self.root
    }

    pub fn find(&self, node: NodeId) -> Option<&NodeDelta> {
        self.root.find(node)
    }

    /// Flags recorded on `node`, empty if it is absent or only on a path.
    pub fn flags_of(&self, node: NodeId) -> DeltaFlags {
        self.find(node).map_or(DeltaFlags::empty(), NodeDelta::flags)
    }

    /// Nodes carrying at least one flag, in pre-order.
    pub fn changed_nodes(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.root.collect_changed(&mut out);
        out
    }
}

impl fmt::Display for ProofTreeDelta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tree)?;
        self.root.write_indented(f, 0)
    }
}

/// Builds a tree-shaped delta from flat per-node records.
///
/// `children_of` returns the children of a node on the current tree.
pub(crate) fn shape_delta<'a>(
    tree: TreeId,
    root: NodeId,
    records: &BTreeMap<NodeId, DeltaFlags>,
    children_of: impl Fn(NodeId) -> &'a [NodeId] + Copy,
) -> ProofTreeDelta {
    fn build<'a>(
        node: NodeId,
        records: &BTreeMap<NodeId, DeltaFlags>,
        children_of: impl Fn(NodeId) -> &'a [NodeId] + Copy,
    ) -> NodeDelta {
        let children = children_of(node)
            .iter()
            .filter(|c| records.contains_key(c))
            .map(|c| build(*c, records, children_of))
            .collect();
        NodeDelta {
            node,
            flags: records.get(&node).copied().unwrap_or_default(),
            children,
        }
    }

    ProofTreeDelta {
        tree,
        root: build(root, records, children_of),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ListenerId(u32);

type Listener = Box<dyn FnMut(&ProofTreeDelta)>;

/// Per-tree record keeping and listener registry.
#[derive(Default)]
pub(crate) struct DeltaProcessor {
    pending: BTreeMap<NodeId, DeltaFlags>,
    batch_depth: u32,
    listeners: Vec<(ListenerId, Listener)>,
    next_listener: u32,
}

impl DeltaProcessor {
    pub(crate) fn record(&mut self, node: NodeId, flags: DeltaFlags) {
        *self.pending.entry(node).or_default() |= flags;
    }

    pub(crate) fn begin_batch(&mut self) {
        self.batch_depth += 1;
    }

    /// Close one batch level. True when the outermost batch closed with
    /// records waiting to be flushed.
    pub(crate) fn end_batch(&mut self) -> bool {
        self.batch_depth = self.batch_depth.saturating_sub(1);
        self.batch_depth == 0 && !self.pending.is_empty()
    }

    pub(crate) fn take_pending(&mut self) -> BTreeMap<NodeId, DeltaFlags> {
        std::mem::take(&mut self.pending)
    }

    pub(crate) fn add_listener(&mut self, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, listener));
        id
    }

    pub(crate) fn remove_listener(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(l, _)| *l != id);
        self.listeners.len() != before
    }

    pub(crate) fn notify(&mut self, delta: &ProofTreeDelta) {
        for (_, listener) in &mut self.listeners {
            listener(delta);
        }
    }
}

impl fmt::Debug for DeltaProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeltaProcessor")
            .field("pending", &self.pending)
            .field("batch_depth", &self.batch_depth)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
