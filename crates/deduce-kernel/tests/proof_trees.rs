//! Integration tests: proof tree state machine, confidence caching and
//! change deltas, driven through the basic reasoners.

use deduce_formula::{Predicate, Type, TypeEnvironment, parse_predicate};
use deduce_kernel::{
    Confidence, DeltaFlags, NodeId, NullMonitor, ProofForest, ProofTreeDelta, ReasonerInput,
    Sequent, TreeError, TreeId, default_registry,
};
use std::cell::RefCell;
use std::rc::Rc;

fn p(text: &str) -> Predicate {
    parse_predicate(text).unwrap()
}

fn env() -> TypeEnvironment {
    TypeEnvironment::new()
        .with("x", Type::Integer)
        .and_then(|e| e.with("y", Type::Integer))
        .unwrap()
}

fn sequent(hyps: &[&str], goal: &str) -> Sequent {
    Sequent::new(env(), hyps.iter().map(|h| p(h)), p(goal)).unwrap()
}

fn step(forest: &mut ProofForest, node: NodeId, reasoner: &str) {
    let reasoner = default_registry().get(reasoner).unwrap();
    forest
        .apply_reasoner(node, reasoner, &ReasonerInput::Empty, &NullMonitor)
        .unwrap();
}

fn child(forest: &ProofForest, node: NodeId, index: usize) -> NodeId {
    forest.node(node).unwrap().children()[index]
}

fn listen(forest: &mut ProofForest, tree: TreeId) -> Rc<RefCell<Vec<ProofTreeDelta>>> {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    forest
        .add_change_listener(tree, move |delta| sink.borrow_mut().push(delta.clone()))
        .unwrap();
    seen
}

/// Confidence recomputed from scratch, ignoring the per-node cache.
fn fresh_confidence(forest: &ProofForest, node: NodeId) -> Confidence {
    let view = forest.node(node).unwrap();
    match view.rule() {
        None if view.comment().is_empty() => Confidence::UNATTEMPTED,
        None => Confidence::PENDING,
        Some(rule) => view
            .children()
            .iter()
            .map(|c| fresh_confidence(forest, *c))
            .fold(rule.confidence(), Ord::min),
    }
}

fn assert_consistent(forest: &ProofForest, tree: TreeId) {
    let root = forest.root(tree).unwrap();
    let confidence = forest.confidence(tree).unwrap();
    assert_eq!(confidence, fresh_confidence(forest, root));
    assert_eq!(forest.is_closed(tree).unwrap(), confidence > Confidence::PENDING);
}

#[test]
fn closedness_tracks_root_confidence_through_apply_and_prune() {
    let mut forest = ProofForest::new();
    let tree = forest.create_tree(sequent(&[], "⊤ ⇒ ⊤ ∧ ⊥"), None).unwrap();
    let root = forest.root(tree).unwrap();
    assert_consistent(&forest, tree);

    step(&mut forest, root, "imp_i");
    assert_consistent(&forest, tree);
    let imp = child(&forest, root, 0);
    step(&mut forest, imp, "conj_i");
    assert_consistent(&forest, tree);
    let next = child(&forest, imp, 0);
    step(&mut forest, next, "hyp");
    assert_consistent(&forest, tree);
    let next = child(&forest, imp, 1);
    step(&mut forest, next, "review");
    assert_consistent(&forest, tree);
    assert!(forest.is_closed(tree).unwrap());

    forest.prune_children(imp).unwrap();
    assert_consistent(&forest, tree);
    assert!(!forest.is_closed(tree).unwrap());

    forest.set_comment(imp, "retry").unwrap();
    assert_consistent(&forest, tree);
    step(&mut forest, imp, "conj_i");
    assert_consistent(&forest, tree);
}

#[test]
fn copy_is_deep_equal_until_pruned() {
    let mut forest = ProofForest::new();
    let tree = forest.create_tree(sequent(&[], "⊤ ⇒ ⊤"), Some("origin".into())).unwrap();
    let root = forest.root(tree).unwrap();
    step(&mut forest, root, "imp_i");
    let next = child(&forest, root, 0);
    step(&mut forest, next, "hyp");

    let copy = forest.copy_subtree(root).unwrap();
    let copy_root = forest.root(copy).unwrap();
    assert!(forest.deep_equals(root, copy_root));
    assert_eq!(forest.tree(copy).unwrap().origin(), None);

    let detached = forest.prune_children(copy_root).unwrap();
    assert_eq!(detached.len(), 1);
    assert!(!forest.deep_equals(root, copy_root));
    assert!(forest.is_closed(tree).unwrap());
    assert!(!forest.is_closed(copy).unwrap());
    assert!(forest.is_closed(detached[0]).unwrap());
}

#[test]
fn pruning_an_open_node_fires_nothing() {
    let mut forest = ProofForest::new();
    let tree = forest.create_tree(sequent(&["x=1"], "x=1"), None).unwrap();
    let root = forest.root(tree).unwrap();
    let seen = listen(&mut forest, tree);
    assert!(forest.prune_children(root).unwrap().is_empty());
    assert!(seen.borrow().is_empty());
    assert!(forest.node(root).unwrap().is_open());
}

#[test]
fn failed_application_leaves_node_open_and_silent() {
    let mut forest = ProofForest::new();
    let tree = forest.create_tree(sequent(&["y=2"], "x=1"), None).unwrap();
    let root = forest.root(tree).unwrap();
    let seen = listen(&mut forest, tree);
    let hyp = default_registry().get("hyp").unwrap();
    assert!(
        forest
            .apply_reasoner(root, hyp, &ReasonerInput::Empty, &NullMonitor)
            .is_err()
    );
    assert!(forest.node(root).unwrap().is_open());
    assert!(seen.borrow().is_empty());
}

#[test]
fn clashing_antecedent_identifier_fails_whole_application() {
    let mut forest = ProofForest::new();
    let tree = forest.create_tree(sequent(&[], "∀x:ℤ·x=x"), None).unwrap();
    let root = forest.root(tree).unwrap();
    let all_i = default_registry().get("all_i").unwrap();
    let err = forest
        .apply_reasoner(root, all_i, &ReasonerInput::Empty, &NullMonitor)
        .unwrap_err();
    assert!(matches!(
        err,
        deduce_kernel::StepError::Tree(TreeError::RuleNotApplicable { .. })
    ));
    assert!(forest.node(root).unwrap().is_open());
}

#[test]
fn batched_run_emits_one_tree_shaped_delta() {
    let mut forest = ProofForest::new();
    let tree = forest.create_tree(sequent(&[], "⊤ ⇒ ⊤"), None).unwrap();
    let root = forest.root(tree).unwrap();
    let seen = listen(&mut forest, tree);

    forest
        .run(tree, |forest| {
            step(forest, root, "imp_i");
            let next = child(forest, root, 0);
            step(forest, next, "hyp");
        })
        .unwrap();

    let seen = seen.borrow();
    assert_eq!(seen.len(), 1);
    insta::assert_snapshot!(seen[0].to_string(), @r"
    t0
    n0 RULE|CHILDREN|CONFIDENCE
      n1 RULE|CHILDREN
    ");
}

#[test]
fn unbatched_steps_emit_one_delta_each() {
    let mut forest = ProofForest::new();
    let tree = forest.create_tree(sequent(&[], "⊤ ⇒ ⊤"), None).unwrap();
    let root = forest.root(tree).unwrap();
    let seen = listen(&mut forest, tree);

    step(&mut forest, root, "imp_i");
    let leaf = child(&forest, root, 0);
    step(&mut forest, leaf, "hyp");

    let seen = seen.borrow();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].flags_of(root), DeltaFlags::RULE | DeltaFlags::CHILDREN);
    assert_eq!(seen[1].flags_of(root), DeltaFlags::CONFIDENCE);
    assert_eq!(seen[1].flags_of(leaf), DeltaFlags::RULE | DeltaFlags::CHILDREN);
}

#[test]
fn comment_on_a_leaf_bubbles_confidence_only_while_it_changes() {
    let mut forest = ProofForest::new();
    let tree = forest.create_tree(sequent(&[], "⊤ ⇒ ⊤"), None).unwrap();
    let root = forest.root(tree).unwrap();
    step(&mut forest, root, "imp_i");
    let leaf = child(&forest, root, 0);
    let seen = listen(&mut forest, tree);

    forest.set_comment(leaf, "later").unwrap();
    forest.set_comment(leaf, "later").unwrap();

    let seen = seen.borrow();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].flags_of(leaf), DeltaFlags::COMMENT);
    assert_eq!(seen[0].flags_of(root), DeltaFlags::CONFIDENCE);
    assert_eq!(forest.confidence(tree).unwrap(), Confidence::PENDING);
}

#[test]
fn pruned_subtrees_keep_their_ids_and_listeners_stay_put() {
    let mut forest = ProofForest::new();
    let tree = forest.create_tree(sequent(&[], "⊤ ⇒ ⊤"), None).unwrap();
    let root = forest.root(tree).unwrap();
    step(&mut forest, root, "imp_i");
    let leaf = child(&forest, root, 0);
    let seen = listen(&mut forest, tree);

    let detached = forest.prune_children(root).unwrap();
    assert_eq!(forest.root(detached[0]).unwrap(), leaf);
    assert_eq!(forest.tree_of(leaf).unwrap(), detached[0]);

    step(&mut forest, leaf, "hyp");
    assert!(forest.is_closed(detached[0]).unwrap());
    assert_eq!(seen.borrow().len(), 1, "only the prune reached the old tree");
}

#[test]
fn graft_reattaches_a_pruned_proof() {
    let mut forest = ProofForest::new();
    let tree = forest.create_tree(sequent(&[], "⊤ ⇒ ⊤"), None).unwrap();
    let root = forest.root(tree).unwrap();
    step(&mut forest, root, "imp_i");
    let next = child(&forest, root, 0);
    step(&mut forest, next, "hyp");

    let saved = forest.copy_subtree(root).unwrap();
    forest.prune_children(root).unwrap();
    assert!(!forest.is_closed(tree).unwrap());

    assert!(forest.graft(root, saved).unwrap());
    assert!(forest.is_closed(tree).unwrap());
    assert!(forest.node(forest.root(saved).unwrap()).unwrap().is_open());
    assert!(!forest.graft(root, saved).unwrap());
}
