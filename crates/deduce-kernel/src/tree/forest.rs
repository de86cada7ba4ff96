//! The proof forest arena and its state machine.

use super::delta::{DeltaProcessor, shape_delta};
use super::{DeltaFlags, ListenerId, NodeId, ProofTreeDelta, TreeId};
use crate::confidence::Confidence;
use crate::dependencies::{ProofDependencies, ProofDependenciesBuilder};
use crate::error::TreeError;
use crate::rule::{ProofRule, SkippedActions};
use crate::sequent::Sequent;
use std::collections::BTreeMap;
use std::ops::{Deref, DerefMut};
use tracing::{debug, trace};

#[derive(Debug, Clone)]
struct NodeData {
    tree: TreeId,
    parent: Option<NodeId>,
    sequent: Sequent,
    comment: String,
    rule: Option<ProofRule>,
    /// Actions of `rule` that were skipped when it was applied here.
    skipped: SkippedActions,
    children: Vec<NodeId>,
    confidence: Confidence,
}

impl NodeData {
    fn open(tree: TreeId, parent: Option<NodeId>, sequent: Sequent) -> Self {
        Self {
            tree,
            parent,
            sequent,
            comment: String::new(),
            rule: None,
            skipped: SkippedActions::default(),
            children: Vec::new(),
            confidence: Confidence::UNATTEMPTED,
        }
    }
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    data: Option<NodeData>,
}

#[derive(Debug)]
struct TreeData {
    origin: Option<String>,
    root: NodeId,
    delta: DeltaProcessor,
}

impl TreeData {
    fn new(origin: Option<String>, root: NodeId) -> Self {
        Self {
            origin,
            root,
            delta: DeltaProcessor::default(),
        }
    }
}

/// Arena holding every proof tree and node.
///
/// Single writer: listeners are `FnMut` and run synchronously while the
/// forest is mutably borrowed.
#[derive(Debug, Default)]
pub struct ProofForest {
    nodes: Vec<Slot>,
    /// Empty slots, ready for reuse.
    free: Vec<u32>,
    /// Empty slots whose generations ran out.
    retired: usize,
    trees: BTreeMap<TreeId, TreeData>,
    next_tree: u32,
}

impl ProofForest {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Trees ──────────────────────────────────────────────────────────

    /// Start a new tree whose root is an open node on `sequent`.
    pub fn create_tree(
        &mut self,
        sequent: Sequent,
        origin: Option<String>,
    ) -> Result<TreeId, TreeError> {
        self.ensure_capacity(1)?;
        let tree = self.alloc_tree()?;
        let root = self.alloc_node(NodeData::open(tree, None, sequent))?;
        self.trees.insert(tree, TreeData::new(origin, root));
        debug!(%tree, %root, "created proof tree");
        Ok(tree)
    }

    /// Drop a tree and all of its nodes. Handles into it become stale and
    /// the node slots are reused.
    pub fn remove_tree(&mut self, tree: TreeId) -> bool {
        let Some(data) = self.trees.remove(&tree) else {
            return false;
        };
        let mut stack = vec![data.root];
        let mut freed = 0usize;
        while let Some(id) = stack.pop() {
            if let Some(node) = self.free_node(id) {
                stack.extend(node.children);
                freed += 1;
            }
        }
        debug!(%tree, freed, "removed proof tree");
        true
    }

    /// Number of live nodes across all trees.
    pub fn node_count(&self) -> usize {
        self.nodes.len() - self.free.len() - self.retired
    }

    pub fn trees(&self) -> impl Iterator<Item = TreeId> + '_ {
        self.trees.keys().copied()
    }

    pub fn tree(&self, id: TreeId) -> Option<TreeRef<'_>> {
        let data = self.trees.get(&id)?;
        let root = self.node(data.root)?;
        Some(TreeRef { id, data, root })
    }

    pub fn node(&self, id: NodeId) -> Option<NodeRef<'_>> {
        let data = self.data(id).ok()?;
        Some(NodeRef {
            forest: self,
            id,
            data,
        })
    }

    pub fn root(&self, tree: TreeId) -> Result<NodeId, TreeError> {
        Ok(self.tree_data(tree)?.root)
    }

    pub fn tree_of(&self, node: NodeId) -> Result<TreeId, TreeError> {
        Ok(self.data(node)?.tree)
    }

    /// Confidence of a whole tree: that of its root.
    pub fn confidence(&self, tree: TreeId) -> Result<Confidence, TreeError> {
        let root = self.root(tree)?;
        Ok(self.data(root)?.confidence)
    }

    pub fn is_closed(&self, tree: TreeId) -> Result<bool, TreeError> {
        Ok(self.confidence(tree)?.is_closed())
    }

    // ── Mutation ───────────────────────────────────────────────────────

    /// Apply `rule` to an open node, creating one open child per
    /// antecedent. On failure the node is left untouched.
    pub fn apply_rule(&mut self, node: NodeId, rule: ProofRule) -> Result<(), TreeError> {
        let data = self.data(node)?;
        if data.rule.is_some() {
            return Err(TreeError::NodeNotOpen(node));
        }
        let Some((children, skipped)) = rule.expand(&data.sequent) else {
            debug!(%node, %rule, "rule not applicable");
            return Err(TreeError::RuleNotApplicable {
                node,
                rule: rule.display().to_string(),
            });
        };
        let tree = data.tree;
        self.ensure_capacity(children.len())?;
        debug!(%node, %rule, children = children.len(), "applying rule");
        let mut batch = self.batch(tree)?;
        batch.attach_rule(node, rule, skipped, children)
    }

    /// Undo the rule applied at `node`. Each former child subtree becomes
    /// the root of a new tree; their ids are returned in child order.
    ///
    /// The detached trees belong to the caller: they stay in the forest
    /// until handed to [`remove_tree`](Self::remove_tree). Use
    /// [`prune_and_discard`](Self::prune_and_discard) when they are not
    /// wanted. Pruning an open node does nothing and notifies nobody.
    pub fn prune_children(&mut self, node: NodeId) -> Result<Vec<TreeId>, TreeError> {
        let data = self.data(node)?;
        if data.rule.is_none() {
            return Ok(Vec::new());
        }
        let tree = data.tree;
        let mut batch = self.batch(tree)?;
        batch.detach_children(node)
    }

    /// Prune `node` and remove the detached subtrees, freeing their nodes.
    pub fn prune_and_discard(&mut self, node: NodeId) -> Result<(), TreeError> {
        for tree in self.prune_children(node)? {
            self.remove_tree(tree);
        }
        Ok(())
    }

    /// Deep copy of the subtree rooted at `node`, as a new tree with fresh
    /// node ids.
    pub fn copy_subtree(&mut self, node: NodeId) -> Result<TreeId, TreeError> {
        self.ensure_capacity(self.subtree_size(node)?)?;
        let tree = self.alloc_tree()?;
        let root = self.copy_node(node, None, tree)?;
        self.trees.insert(tree, TreeData::new(None, root));
        debug!(source = %node, %tree, "copied subtree");
        Ok(tree)
    }

    pub fn set_comment(&mut self, node: NodeId, comment: impl Into<String>) -> Result<(), TreeError> {
        let comment = comment.into();
        let data = self.data(node)?;
        if data.comment == comment {
            return Ok(());
        }
        let tree = data.tree;
        let mut batch = self.batch(tree)?;
        batch.data_mut(node)?.comment = comment;
        batch.record(tree, node, DeltaFlags::COMMENT);
        batch.refresh_confidence(node);
        Ok(())
    }

    /// Move the proof held by the root of `source` onto the open `node`.
    ///
    /// Only happens when the two sequents are equal; the source root is left
    /// open. Returns whether anything moved.
    pub fn graft(&mut self, node: NodeId, source: TreeId) -> Result<bool, TreeError> {
        let target = self.data(node)?;
        let donor_id = self.root(source)?;
        let donor = self.data(donor_id)?;
        if target.rule.is_some()
            || donor.rule.is_none()
            || target.tree == source
            || target.sequent != donor.sequent
        {
            return Ok(false);
        }
        let tree = target.tree;
        debug!(%node, %source, "grafting proof");
        let mut batch = self.batch(tree)?;
        let mut source_batch = batch.batch(source)?;
        source_batch.move_proof(donor_id, node)?;
        Ok(true)
    }

    // ── Batching and listeners ─────────────────────────────────────────

    /// Hold notifications for `tree` until the returned guard is dropped.
    ///
    /// Guards nest; one delta is flushed when the outermost guard drops,
    /// also when unwinding.
    pub fn batch(&mut self, tree: TreeId) -> Result<Batch<'_>, TreeError> {
        self.tree_data_mut(tree)?.delta.begin_batch();
        Ok(Batch { forest: self, tree })
    }

    /// Run `f` inside a batch on `tree`.
    pub fn run<T>(
        &mut self,
        tree: TreeId,
        f: impl FnOnce(&mut ProofForest) -> T,
    ) -> Result<T, TreeError> {
        let mut batch = self.batch(tree)?;
        Ok(f(&mut batch))
    }

    pub fn add_change_listener(
        &mut self,
        tree: TreeId,
        listener: impl FnMut(&ProofTreeDelta) + 'static,
    ) -> Result<ListenerId, TreeError> {
        Ok(self
            .tree_data_mut(tree)?
            .delta
            .add_listener(Box::new(listener)))
    }

    pub fn remove_change_listener(&mut self, tree: TreeId, id: ListenerId) -> bool {
        self.trees
            .get_mut(&tree)
            .is_some_and(|data| data.delta.remove_listener(id))
    }

    // ── Queries ────────────────────────────────────────────────────────

    /// Open nodes of the subtree rooted at `node`, in pre-order.
    pub fn open_descendants(&self, node: NodeId) -> Result<Vec<NodeId>, TreeError> {
        let mut open = Vec::new();
        let mut stack = vec![node];
        while let Some(id) = stack.pop() {
            let data = self.data(id)?;
            if data.rule.is_none() {
                open.push(id);
            }
            stack.extend(data.children.iter().rev());
        }
        Ok(open)
    }

    pub fn first_open_descendant(&self, node: NodeId) -> Result<Option<NodeId>, TreeError> {
        let mut stack = vec![node];
        while let Some(id) = stack.pop() {
            let data = self.data(id)?;
            if data.rule.is_none() {
                return Ok(Some(id));
            }
            stack.extend(data.children.iter().rev());
        }
        Ok(None)
    }

    /// Structural equality of two subtrees: sequents, comments,
    /// confidences and rules, recursively. False if either is unknown.
    pub fn deep_equals(&self, a: NodeId, b: NodeId) -> bool {
        let (Ok(x), Ok(y)) = (self.data(a), self.data(b)) else {
            return false;
        };
        x.sequent == y.sequent
            && x.comment == y.comment
            && x.confidence == y.confidence
            && x.rule == y.rule
            && x.children.len() == y.children.len()
            && x
                .children
                .iter()
                .zip(&y.children)
                .all(|(c, d)| self.deep_equals(*c, *d))
    }

    pub fn proof_dependencies(&self, tree: TreeId) -> Result<ProofDependencies, TreeError> {
        self.node_dependencies(self.root(tree)?)
    }

    /// Dependencies of the proof below `node` on `node`'s sequent.
    pub fn node_dependencies(&self, node: NodeId) -> Result<ProofDependencies, TreeError> {
        Ok(self.dependencies_builder(node)?.finish())
    }

    fn dependencies_builder(&self, node: NodeId) -> Result<ProofDependenciesBuilder, TreeError> {
        let data = self.data(node)?;
        let Some(rule) = &data.rule else {
            return Ok(ProofDependenciesBuilder::open_leaf(&data.sequent));
        };
        let children = data
            .children
            .iter()
            .map(|child| -> Result<_, TreeError> {
                let env = self.data(*child)?.sequent.type_env();
                Ok((self.dependencies_builder(*child)?, env))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rule.fold_dependencies(children, data.sequent.type_env(), &data.skipped))
    }

    // ── Internals ──────────────────────────────────────────────────────

    fn data(&self, id: NodeId) -> Result<&NodeData, TreeError> {
        self.nodes
            .get(id.index())
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.data.as_ref())
            .ok_or(TreeError::UnknownNode(id))
    }

    fn data_mut(&mut self, id: NodeId) -> Result<&mut NodeData, TreeError> {
        self.nodes
            .get_mut(id.index())
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.data.as_mut())
            .ok_or(TreeError::UnknownNode(id))
    }

    fn tree_data(&self, id: TreeId) -> Result<&TreeData, TreeError> {
        self.trees.get(&id).ok_or(TreeError::UnknownTree(id))
    }

    fn tree_data_mut(&mut self, id: TreeId) -> Result<&mut TreeData, TreeError> {
        self.trees.get_mut(&id).ok_or(TreeError::UnknownTree(id))
    }

    fn alloc_tree(&mut self) -> Result<TreeId, TreeError> {
        let id = TreeId(self.next_tree);
        self.next_tree = self
            .next_tree
            .checked_add(1)
            .ok_or(TreeError::CapacityExceeded)?;
        Ok(id)
    }

    fn alloc_node(&mut self, data: NodeData) -> Result<NodeId, TreeError> {
        while let Some(index) = self.free.pop() {
            if let Some(slot) = self.nodes.get_mut(index as usize) {
                slot.data = Some(data);
                return Ok(NodeId::new(index, slot.generation));
            }
        }
        let index = u32::try_from(self.nodes.len()).map_err(|_| TreeError::CapacityExceeded)?;
        self.nodes.push(Slot {
            generation: 0,
            data: Some(data),
        });
        Ok(NodeId::new(index, 0))
    }

    /// Empty the slot behind `id`. The slot is reused under the next
    /// generation, or retired once generations run out.
    fn free_node(&mut self, id: NodeId) -> Option<NodeData> {
        let slot = self
            .nodes
            .get_mut(id.index())
            .filter(|slot| slot.generation == id.generation)?;
        let data = slot.data.take()?;
        match slot.generation.checked_add(1) {
            Some(next) => {
                slot.generation = next;
                self.free.push(id.index);
            }
            None => self.retired += 1,
        }
        Some(data)
    }

    /// Fail unless `extra` more nodes can be allocated.
    fn ensure_capacity(&self, extra: usize) -> Result<(), TreeError> {
        let fresh = (u64::from(u32::MAX) + 1).saturating_sub(self.nodes.len() as u64);
        let available = fresh.saturating_add(self.free.len() as u64);
        if (extra as u64) > available {
            return Err(TreeError::CapacityExceeded);
        }
        Ok(())
    }

    fn subtree_size(&self, node: NodeId) -> Result<usize, TreeError> {
        let mut size = 0;
        let mut stack = vec![node];
        while let Some(id) = stack.pop() {
            stack.extend(&self.data(id)?.children);
            size += 1;
        }
        Ok(size)
    }

    fn attach_rule(
        &mut self,
        node: NodeId,
        rule: ProofRule,
        skipped: SkippedActions,
        children: Vec<Sequent>,
    ) -> Result<(), TreeError> {
        let tree = self.data(node)?.tree;
        let child_ids = children
            .into_iter()
            .map(|seq| self.alloc_node(NodeData::open(tree, Some(node), seq)))
            .collect::<Result<Vec<_>, _>>()?;
        let data = self.data_mut(node)?;
        data.rule = Some(rule);
        data.skipped = skipped;
        data.children = child_ids;
        self.record(tree, node, DeltaFlags::RULE | DeltaFlags::CHILDREN);
        self.refresh_confidence(node);
        Ok(())
    }

    fn detach_children(&mut self, node: NodeId) -> Result<Vec<TreeId>, TreeError> {
        let count = self.data(node)?.children.len();
        let new_trees = (0..count)
            .map(|_| self.alloc_tree())
            .collect::<Result<Vec<_>, _>>()?;
        let data = self.data_mut(node)?;
        data.rule = None;
        data.skipped = SkippedActions::default();
        let children = std::mem::take(&mut data.children);
        let tree = data.tree;

        for (child, new_tree) in children.into_iter().zip(&new_trees) {
            self.reparent(child, None, *new_tree)?;
            self.trees.insert(*new_tree, TreeData::new(None, child));
        }
        debug!(%node, detached = new_trees.len(), "pruned children");
        self.record(tree, node, DeltaFlags::RULE | DeltaFlags::CHILDREN);
        self.refresh_confidence(node);
        Ok(new_trees)
    }

    fn move_proof(&mut self, from: NodeId, to: NodeId) -> Result<(), TreeError> {
        let donor = self.data_mut(from)?;
        let rule = donor.rule.take();
        let skipped = std::mem::take(&mut donor.skipped);
        let children = std::mem::take(&mut donor.children);
        let from_tree = donor.tree;
        let to_tree = self.data(to)?.tree;
        for child in &children {
            self.reparent(*child, Some(to), to_tree)?;
        }
        let target = self.data_mut(to)?;
        target.rule = rule;
        target.skipped = skipped;
        target.children = children;

        let flags = DeltaFlags::RULE | DeltaFlags::CHILDREN;
        self.record(from_tree, from, flags);
        self.record(to_tree, to, flags);
        self.refresh_confidence(from);
        self.refresh_confidence(to);
        Ok(())
    }

    fn copy_node(
        &mut self,
        source: NodeId,
        parent: Option<NodeId>,
        tree: TreeId,
    ) -> Result<NodeId, TreeError> {
        let data = self.data(source)?;
        let copy = NodeData {
            tree,
            parent,
            sequent: data.sequent.clone(),
            comment: data.comment.clone(),
            rule: data.rule.clone(),
            skipped: data.skipped.clone(),
            children: Vec::new(),
            confidence: data.confidence,
        };
        let source_children = data.children.clone();
        let id = self.alloc_node(copy)?;
        let children = source_children
            .into_iter()
            .map(|child| self.copy_node(child, Some(id), tree))
            .collect::<Result<Vec<_>, _>>()?;
        self.data_mut(id)?.children = children;
        Ok(id)
    }

    /// Move the subtree rooted at `root` under `parent` in `tree`.
    fn reparent(
        &mut self,
        root: NodeId,
        parent: Option<NodeId>,
        tree: TreeId,
    ) -> Result<(), TreeError> {
        self.data_mut(root)?.parent = parent;
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let data = self.data_mut(id)?;
            data.tree = tree;
            stack.extend(data.children.iter().copied());
        }
        Ok(())
    }

    fn record(&mut self, tree: TreeId, node: NodeId, flags: DeltaFlags) {
        if let Some(data) = self.trees.get_mut(&tree) {
            data.delta.record(node, flags);
        }
    }

    /// Recompute `node`'s confidence, then its ancestors' while they
    /// change. Ancestors that changed record `CONFIDENCE`.
    fn refresh_confidence(&mut self, node: NodeId) {
        if !self.recompute_confidence(node) {
            return;
        }
        let mut current = node;
        while let Some((parent, tree)) = self
            .data(current)
            .ok()
            .and_then(|d| d.parent.map(|p| (p, d.tree)))
        {
            if !self.recompute_confidence(parent) {
                break;
            }
            self.record(tree, parent, DeltaFlags::CONFIDENCE);
            current = parent;
        }
    }

    fn recompute_confidence(&mut self, node: NodeId) -> bool {
        let Ok(data) = self.data(node) else {
            return false;
        };
        let computed = match &data.rule {
            None if data.comment.is_empty() => Confidence::UNATTEMPTED,
            None => Confidence::PENDING,
            Some(rule) => data
                .children
                .iter()
                .filter_map(|c| self.data(*c).ok())
                .map(|c| c.confidence)
                .fold(rule.confidence(), Ord::min),
        };
        if computed == data.confidence {
            return false;
        }
        trace!(%node, from = %data.confidence, to = %computed, "confidence changed");
        if let Ok(data) = self.data_mut(node) {
            data.confidence = computed;
        }
        true
    }

    fn end_batch(&mut self, tree: TreeId) {
        let Some(data) = self.trees.get_mut(&tree) else {
            return;
        };
        if !data.delta.end_batch() {
            return;
        }
        let records = data.delta.take_pending();
        let root = data.root;
        let Some(delta) = self.shape(tree, root, records) else {
            return;
        };
        debug!(%tree, changed = delta.changed_nodes().len(), "flushing proof tree delta");
        if let Some(data) = self.trees.get_mut(&tree) {
            data.delta.notify(&delta);
        }
    }

    /// Lay flat records out along the paths from `root`, dropping nodes
    /// that have since left the tree.
    fn shape(
        &self,
        tree: TreeId,
        root: NodeId,
        records: BTreeMap<NodeId, DeltaFlags>,
    ) -> Option<ProofTreeDelta> {
        let mut paths = BTreeMap::new();
        for (node, flags) in records {
            if !self.data(node).is_ok_and(|d| d.tree == tree) {
                continue;
            }
            *paths.entry(node).or_default() |= flags;
            let mut current = node;
            while let Some(parent) = self.data(current).ok().and_then(|d| d.parent) {
                paths.entry(parent).or_insert_with(DeltaFlags::empty);
                current = parent;
            }
        }
        if paths.is_empty() {
            return None;
        }
        Some(shape_delta(tree, root, &paths, |n| {
            self.data(n).map_or(&[][..], |d| d.children.as_slice())
        }))
    }
}

/// A batch on one tree; derefs to the forest. Dropping it closes the batch.
pub struct Batch<'a> {
    forest: &'a mut ProofForest,
    tree: TreeId,
}

impl Deref for Batch<'_> {
    type Target = ProofForest;

    fn deref(&self) -> &ProofForest {
        self.forest
    }
}

impl DerefMut for Batch<'_> {
    fn deref_mut(&mut self) -> &mut ProofForest {
        self.forest
    }
}

impl Drop for Batch<'_> {
    fn drop(&mut self) {
        self.forest.end_batch(self.tree);
    }
}

/// Read-only view of a node.
#[derive(Debug, Clone, Copy)]
pub struct NodeRef<'a> {
    forest: &'a ProofForest,
    id: NodeId,
    data: &'a NodeData,
}

impl<'a> NodeRef<'a> {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn tree(&self) -> TreeId {
        self.data.tree
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.data.parent
    }

    pub fn is_root(&self) -> bool {
        self.data.parent.is_none()
    }

    pub fn children(&self) -> &'a [NodeId] {
        &self.data.children
    }

    pub fn child(&self, index: usize) -> Option<NodeRef<'a>> {
        let id = *self.data.children.get(index)?;
        self.forest.node(id)
    }

    pub fn has_children(&self) -> bool {
        !self.data.children.is_empty()
    }

    pub fn sequent(&self) -> &'a Sequent {
        &self.data.sequent
    }

    pub fn comment(&self) -> &'a str {
        &self.data.comment
    }

    pub fn rule(&self) -> Option<&'a ProofRule> {
        self.data.rule.as_ref()
    }

    /// Which of the rule's actions were skipped when it was applied here.
    pub fn skipped_actions(&self) -> &'a SkippedActions {
        &self.data.skipped
    }

    pub fn is_open(&self) -> bool {
        self.data.rule.is_none()
    }

    pub fn confidence(&self) -> Confidence {
        self.data.confidence
    }

    pub fn is_closed(&self) -> bool {
        self.data.confidence.is_closed()
    }
}

/// Read-only view of a tree.
#[derive(Debug, Clone, Copy)]
pub struct TreeRef<'a> {
    id: TreeId,
    data: &'a TreeData,
    root: NodeRef<'a>,
}

impl<'a> TreeRef<'a> {
    pub fn id(&self) -> TreeId {
        self.id
    }

    /// Opaque tag given at creation; copies and pruned subtrees have none.
    pub fn origin(&self) -> Option<&'a str> {
        self.data.origin.as_deref()
    }

    pub fn root(&self) -> NodeRef<'a> {
        self.root
    }

    pub fn confidence(&self) -> Confidence {
        self.root.confidence()
    }

    pub fn is_closed(&self) -> bool {
        self.root.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::Antecedent;
    use deduce_formula::{FreeIdentifier, Predicate, Type, TypeEnvironment, parse_predicate};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn p(text: &str) -> Predicate {
        parse_predicate(text).unwrap()
    }

    fn sequent(hyps: &[&str], goal: &str) -> Sequent {
        let x = FreeIdentifier::new("x", Type::Integer).unwrap();
        let env = TypeEnvironment::from_idents([&x]).unwrap();
        Sequent::new(env, hyps.iter().map(|h| p(h)), p(goal)).unwrap()
    }

    /// Splits the goal into two copies of itself.
    fn split(level: Confidence) -> ProofRule {
        ProofRule::new("split", "split", level)
            .unwrap()
            .with_antecedent(Antecedent::keep_goal())
            .with_antecedent(Antecedent::keep_goal())
    }

    fn close(level: Confidence) -> ProofRule {
        ProofRule::new("close", "close", level).unwrap()
    }

    fn recorder(forest: &mut ProofForest, tree: TreeId) -> Rc<RefCell<Vec<ProofTreeDelta>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        forest
            .add_change_listener(tree, move |delta| sink.borrow_mut().push(delta.clone()))
            .unwrap();
        seen
    }

    #[test]
    fn new_tree_is_unattempted() {
        let mut forest = ProofForest::new();
        let tree = forest.create_tree(sequent(&[], "x=1"), Some("lemma".into())).unwrap();
        let view = forest.tree(tree).unwrap();
        assert_eq!(view.origin(), Some("lemma"));
        assert!(view.root().is_open());
        assert_eq!(view.confidence(), Confidence::UNATTEMPTED);
        assert!(!forest.is_closed(tree).unwrap());
    }

    #[test]
    fn applying_to_an_applied_node_fails_and_changes_nothing() {
        let mut forest = ProofForest::new();
        let tree = forest.create_tree(sequent(&[], "x=1"), None).unwrap();
        let root = forest.root(tree).unwrap();
        forest.apply_rule(root, split(Confidence::DISCHARGED_MAX)).unwrap();
        let err = forest.apply_rule(root, close(Confidence::DISCHARGED_MAX));
        assert_eq!(err, Err(TreeError::NodeNotOpen(root)));
        assert_eq!(forest.node(root).unwrap().children().len(), 2);
    }

    #[test]
    fn inapplicable_rule_leaves_node_open() {
        let mut forest = ProofForest::new();
        let tree = forest.create_tree(sequent(&[], "x=1"), None).unwrap();
        let root = forest.root(tree).unwrap();
        let rule = close(Confidence::DISCHARGED_MAX).with_needed_hyps([p("x=2")]);
        assert!(matches!(
            forest.apply_rule(root, rule),
            Err(TreeError::RuleNotApplicable { .. })
        ));
        assert!(forest.node(root).unwrap().is_open());
    }

    #[test]
    fn confidence_is_minimum_of_rule_and_children() {
        let mut forest = ProofForest::new();
        let tree = forest.create_tree(sequent(&[], "x=1"), None).unwrap();
        let root = forest.root(tree).unwrap();
        forest.apply_rule(root, split(Confidence::DISCHARGED_MAX)).unwrap();
        let children = forest.node(root).unwrap().children().to_vec();

        forest.apply_rule(children[0], close(Confidence::DISCHARGED_MAX)).unwrap();
        assert_eq!(forest.confidence(tree).unwrap(), Confidence::UNATTEMPTED);

        forest.apply_rule(children[1], close(Confidence::new(300))).unwrap();
        assert_eq!(forest.confidence(tree).unwrap(), Confidence::new(300));
        assert!(forest.is_closed(tree).unwrap());
    }

    #[test]
    fn partial_proofs_are_pending_only_when_every_open_leaf_is_commented() {
        let mut forest = ProofForest::new();
        let tree = forest.create_tree(sequent(&[], "x=1"), None).unwrap();
        let root = forest.root(tree).unwrap();
        forest.apply_rule(root, split(Confidence::DISCHARGED_MAX)).unwrap();
        let children = forest.node(root).unwrap().children().to_vec();
        forest.set_comment(children[0], "later").unwrap();
        assert_eq!(forest.confidence(tree).unwrap(), Confidence::UNATTEMPTED);

        forest.set_comment(children[1], "later too").unwrap();
        assert_eq!(forest.confidence(tree).unwrap(), Confidence::PENDING);
        assert!(!forest.is_closed(tree).unwrap());
    }

    #[test]
    fn comments_move_open_nodes_to_pending() {
        let mut forest = ProofForest::new();
        let tree = forest.create_tree(sequent(&[], "x=1"), None).unwrap();
        let root = forest.root(tree).unwrap();
        forest.set_comment(root, "look at x").unwrap();
        assert_eq!(forest.confidence(tree).unwrap(), Confidence::PENDING);
        forest.set_comment(root, "").unwrap();
        assert_eq!(forest.confidence(tree).unwrap(), Confidence::UNATTEMPTED);
    }

    #[test]
    fn prune_detaches_children_into_new_trees() {
        let mut forest = ProofForest::new();
        let tree = forest.create_tree(sequent(&[], "x=1"), None).unwrap();
        let root = forest.root(tree).unwrap();
        forest.apply_rule(root, split(Confidence::DISCHARGED_MAX)).unwrap();
        let children = forest.node(root).unwrap().children().to_vec();
        forest.apply_rule(children[1], split(Confidence::DISCHARGED_MAX)).unwrap();
        let grandchild = forest.node(children[1]).unwrap().children()[0];

        let detached = forest.prune_children(root).unwrap();
        assert_eq!(detached.len(), 2);
        assert!(forest.node(root).unwrap().is_open());
        assert_eq!(forest.root(detached[1]).unwrap(), children[1]);
        assert_eq!(forest.tree_of(grandchild).unwrap(), detached[1]);
        assert!(forest.node(children[0]).unwrap().is_root());
        assert_eq!(forest.tree(detached[0]).unwrap().origin(), None);
    }

    #[test]
    fn prune_on_open_node_is_silent() {
        let mut forest = ProofForest::new();
        let tree = forest.create_tree(sequent(&[], "x=1"), None).unwrap();
        let root = forest.root(tree).unwrap();
        let seen = recorder(&mut forest, tree);
        assert_eq!(forest.prune_children(root).unwrap(), Vec::new());
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn apply_emits_rule_and_children_then_confidence_upward() {
        let mut forest = ProofForest::new();
        let tree = forest.create_tree(sequent(&[], "x=1"), None).unwrap();
        let root = forest.root(tree).unwrap();
        forest.apply_rule(root, split(Confidence::DISCHARGED_MAX)).unwrap();
        let children = forest.node(root).unwrap().children().to_vec();
        forest.apply_rule(children[0], close(Confidence::DISCHARGED_MAX)).unwrap();

        let seen = recorder(&mut forest, tree);
        forest.apply_rule(children[1], close(Confidence::DISCHARGED_MAX)).unwrap();
        let seen = seen.borrow();
        assert_eq!(seen.len(), 1);
        insta::assert_snapshot!(seen[0].to_string(), @r"
        t0
        n0 CONFIDENCE
          n2 RULE|CHILDREN
        ");
    }

    #[test]
    fn batches_coalesce_into_one_delta() {
        let mut forest = ProofForest::new();
        let tree = forest.create_tree(sequent(&[], "x=1"), None).unwrap();
        let root = forest.root(tree).unwrap();
        let seen = recorder(&mut forest, tree);
        forest
            .run(tree, |forest| {
                forest.set_comment(root, "start")?;
                forest.apply_rule(root, split(Confidence::DISCHARGED_MAX))?;
                let first = forest.node(root).map(|n| n.children()[0]);
                if let Some(first) = first {
                    forest.apply_rule(first, close(Confidence::DISCHARGED_MAX))?;
                }
                Ok::<_, TreeError>(())
            })
            .unwrap()
            .unwrap();
        let seen = seen.borrow();
        assert_eq!(seen.len(), 1);
        assert_eq!(
            seen[0].flags_of(root),
            DeltaFlags::COMMENT | DeltaFlags::RULE | DeltaFlags::CHILDREN
        );
    }

    #[test]
    fn batch_guard_flushes_on_early_return() {
        fn failing(forest: &mut ProofForest, tree: TreeId, root: NodeId) -> Result<(), TreeError> {
            let mut batch = forest.batch(tree)?;
            batch.set_comment(root, "tried")?;
            batch.apply_rule(root, close(Confidence::DISCHARGED_MAX).with_needed_hyps([p("x=5")]))?;
            Ok(())
        }

        let mut forest = ProofForest::new();
        let tree = forest.create_tree(sequent(&[], "x=1"), None).unwrap();
        let root = forest.root(tree).unwrap();
        let seen = recorder(&mut forest, tree);
        assert!(failing(&mut forest, tree, root).is_err());
        let seen = seen.borrow();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].flags_of(root), DeltaFlags::COMMENT);
    }

    #[test]
    fn removed_listener_hears_nothing() {
        let mut forest = ProofForest::new();
        let tree = forest.create_tree(sequent(&[], "x=1"), None).unwrap();
        let root = forest.root(tree).unwrap();
        let hits = Rc::new(RefCell::new(0));
        let sink = Rc::clone(&hits);
        let id = forest
            .add_change_listener(tree, move |_| *sink.borrow_mut() += 1)
            .unwrap();
        assert!(forest.remove_change_listener(tree, id));
        assert!(!forest.remove_change_listener(tree, id));
        forest.set_comment(root, "x").unwrap();
        assert_eq!(*hits.borrow(), 0);
    }

    #[test]
    fn copies_are_deep_and_independent() {
        let mut forest = ProofForest::new();
        let tree = forest.create_tree(sequent(&[], "x=1"), None).unwrap();
        let root = forest.root(tree).unwrap();
        forest.apply_rule(root, split(Confidence::DISCHARGED_MAX)).unwrap();

        let copy = forest.copy_subtree(root).unwrap();
        let copy_root = forest.root(copy).unwrap();
        assert_ne!(copy_root, root);
        assert!(forest.deep_equals(root, copy_root));

        forest.prune_children(copy_root).unwrap();
        assert!(!forest.deep_equals(root, copy_root));
        assert_eq!(forest.node(root).unwrap().children().len(), 2);
    }

    #[test]
    fn graft_moves_matching_proofs_only() {
        let mut forest = ProofForest::new();
        let donor = forest.create_tree(sequent(&[], "x=1"), None).unwrap();
        let donor_root = forest.root(donor).unwrap();
        forest.apply_rule(donor_root, close(Confidence::DISCHARGED_MAX)).unwrap();

        let other = forest.create_tree(sequent(&[], "x=2"), None).unwrap();
        let other_root = forest.root(other).unwrap();
        assert!(!forest.graft(other_root, donor).unwrap());

        let target = forest.create_tree(sequent(&[], "x=1"), None).unwrap();
        let target_root = forest.root(target).unwrap();
        assert!(forest.graft(target_root, donor).unwrap());
        assert!(forest.is_closed(target).unwrap());
        assert!(forest.node(donor_root).unwrap().is_open());
        assert!(!forest.is_closed(donor).unwrap());
    }

    #[test]
    fn open_descendants_in_preorder() {
        let mut forest = ProofForest::new();
        let tree = forest.create_tree(sequent(&[], "x=1"), None).unwrap();
        let root = forest.root(tree).unwrap();
        forest.apply_rule(root, split(Confidence::DISCHARGED_MAX)).unwrap();
        let children = forest.node(root).unwrap().children().to_vec();
        forest.apply_rule(children[0], split(Confidence::DISCHARGED_MAX)).unwrap();
        let grandchildren = forest.node(children[0]).unwrap().children().to_vec();

        assert_eq!(
            forest.open_descendants(root).unwrap(),
            vec![grandchildren[0], grandchildren[1], children[1]]
        );
        assert_eq!(forest.first_open_descendant(root).unwrap(), Some(grandchildren[0]));
    }

    #[test]
    fn removed_trees_invalidate_handles() {
        let mut forest = ProofForest::new();
        let tree = forest.create_tree(sequent(&[], "x=1"), None).unwrap();
        let root = forest.root(tree).unwrap();
        assert!(forest.remove_tree(tree));
        assert!(forest.node(root).is_none());
        assert_eq!(forest.set_comment(root, "gone"), Err(TreeError::UnknownNode(root)));
        assert_eq!(forest.batch(tree).err(), Some(TreeError::UnknownTree(tree)));
    }

    #[test]
    fn discarding_pruned_subtrees_reuses_their_slots() {
        let mut forest = ProofForest::new();
        let tree = forest.create_tree(sequent(&[], "x=1"), None).unwrap();
        let root = forest.root(tree).unwrap();
        for _ in 0..1000 {
            forest.apply_rule(root, split(Confidence::DISCHARGED_MAX)).unwrap();
            forest.prune_and_discard(root).unwrap();
        }
        assert_eq!(forest.trees().count(), 1);
        assert_eq!(forest.node_count(), 1);
        assert!(forest.nodes.len() <= 3);
    }

    #[test]
    fn detached_trees_stay_until_removed() {
        let mut forest = ProofForest::new();
        let tree = forest.create_tree(sequent(&[], "x=1"), None).unwrap();
        let root = forest.root(tree).unwrap();
        let step = ProofRule::new("step", "step", Confidence::DISCHARGED_MAX)
            .unwrap()
            .with_antecedent(Antecedent::keep_goal());
        let mut detached = Vec::new();
        for _ in 0..1000 {
            forest.apply_rule(root, step.clone()).unwrap();
            detached.extend(forest.prune_children(root).unwrap());
        }
        assert_eq!(forest.trees().count(), 1001);
        assert_eq!(forest.node_count(), 1001);

        for tree in detached {
            assert!(forest.remove_tree(tree));
        }
        assert_eq!(forest.node_count(), 1);
        let next = forest.create_tree(sequent(&[], "x=2"), None).unwrap();
        assert!(forest.root(next).unwrap().index() < 1001);
        assert_eq!(forest.nodes.len(), 1001);
    }

    #[test]
    fn stale_handles_miss_reused_slots() {
        let mut forest = ProofForest::new();
        let tree = forest.create_tree(sequent(&[], "x=1"), None).unwrap();
        let root = forest.root(tree).unwrap();
        forest.apply_rule(root, split(Confidence::DISCHARGED_MAX)).unwrap();
        let old = forest.node(root).unwrap().children().to_vec();
        forest.prune_and_discard(root).unwrap();

        forest.apply_rule(root, split(Confidence::DISCHARGED_MAX)).unwrap();
        let new = forest.node(root).unwrap().children().to_vec();
        assert_eq!(new[0].to_string(), "n2.1");
        assert_eq!(new[1].to_string(), "n1.1");
        for stale in &old {
            assert!(!new.contains(stale));
            assert!(forest.node(*stale).is_none());
            assert_eq!(forest.set_comment(*stale, "gone"), Err(TreeError::UnknownNode(*stale)));
        }
        assert!(forest.node(new[0]).unwrap().is_open());
    }

    #[test]
    fn exhausted_slots_are_retired() {
        let mut forest = ProofForest::new();
        let tree = forest.create_tree(sequent(&[], "x=1"), None).unwrap();
        let worn = NodeId::new(0, u32::MAX);
        forest.nodes[0].generation = u32::MAX;
        forest.trees.get_mut(&tree).unwrap().root = worn;

        assert!(forest.remove_tree(tree));
        assert!(forest.free.is_empty());
        assert_eq!(forest.node_count(), 0);
        let next = forest.create_tree(sequent(&[], "x=1"), None).unwrap();
        assert_eq!(forest.root(next).unwrap(), NodeId::new(1, 0));
        assert!(forest.node(worn).is_none());
    }

    #[test]
    fn running_out_of_ids_is_an_error() {
        let mut forest = ProofForest {
            next_tree: u32::MAX,
            ..ProofForest::default()
        };
        assert_eq!(
            forest.create_tree(sequent(&[], "x=1"), None),
            Err(TreeError::CapacityExceeded)
        );
        assert_eq!(forest.node_count(), 0);
        assert_eq!(forest.trees().count(), 0);

        assert!(forest.ensure_capacity(1).is_ok());
        let too_many = usize::try_from(u64::from(u32::MAX) + 2).unwrap_or(usize::MAX);
        assert_eq!(forest.ensure_capacity(too_many), Err(TreeError::CapacityExceeded));
    }

    #[test]
    fn applied_rules_keep_their_skipped_actions() {
        use crate::hyp_action::HypothesisAction;

        let mut forest = ProofForest::new();
        let tree = forest.create_tree(sequent(&["x=1"], "x=1"), None).unwrap();
        let root = forest.root(tree).unwrap();
        let rule = close(Confidence::DISCHARGED_MAX).with_antecedent(
            Antecedent::keep_goal()
                .with_action(HypothesisAction::forward_infer([p("x=5")], [], [p("x>4")])),
        );
        forest.apply_rule(root, rule).unwrap();
        assert!(forest.node(root).unwrap().skipped_actions().is_skipped(0, 0));

        let copy = forest.copy_subtree(root).unwrap();
        let copy_root = forest.root(copy).unwrap();
        assert!(forest.node(copy_root).unwrap().skipped_actions().is_skipped(0, 0));

        forest.prune_children(root).unwrap();
        assert!(!forest.node(root).unwrap().skipped_actions().any());
    }
}
