//! Proof replay.
//!
//! A [`ProofSkeleton`] records the rules and comments of a subtree without
//! its sequents. Replaying it onto a node, typically after the node's
//! sequent was edited, rebuilds as much of the proof as still holds:
//!
//! ```text
//!   skeleton ──reuse──▶ re-apply each recorded rule where it still applies
//!            ──rebuild─▶ re-apply, else re-run the recorded reasoner with
//!                        the recorded input and apply its fresh rule
//! ```
//!
//! Nodes that cannot be replayed stay open. A replay runs inside one batch,
//! so listeners see a single delta.

use crate::error::{KernelError, StepError, TreeError};
use crate::reasoner::{ProofMonitor, ReasonerRegistry};
use crate::rule::ProofRule;
use crate::tree::{NodeId, ProofForest};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Rules and comments of a subtree, without sequents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofSkeleton {
    #[serde(default)]
    comment: String,
    rule: Option<ProofRule>,
    #[serde(default)]
    children: Vec<ProofSkeleton>,
}

impl ProofSkeleton {
    pub fn comment(&self) -> &str {
        &self.comment
    }

    pub fn rule(&self) -> Option<&ProofRule> {
        self.rule.as_ref()
    }

    pub fn children(&self) -> &[ProofSkeleton] {
        &self.children
    }

    /// Number of rules recorded in the whole skeleton.
    pub fn rule_count(&self) -> usize {
        usize::from(self.rule.is_some())
            + self.children.iter().map(ProofSkeleton::rule_count).sum::<usize>()
    }
}

impl ProofForest {
    /// Record the proof below `node`.
    pub fn skeleton(&self, node: NodeId) -> Result<ProofSkeleton, TreeError> {
        let view = self.node(node).ok_or(TreeError::UnknownNode(node))?;
        let children = view
            .children()
            .iter()
            .map(|child| self.skeleton(*child))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ProofSkeleton {
            comment: view.comment().to_string(),
            rule: view.rule().cloned(),
            children,
        })
    }
}

/// How [`rebuild`] goes about each node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReplayConfig {
    /// Try the recorded rule before re-running its reasoner.
    pub reuse_first: bool,
    /// Re-run the recorded reasoner when the recorded rule does not apply.
    pub rerun_reasoners: bool,
    /// Copy recorded comments onto the replayed nodes.
    pub keep_comments: bool,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            reuse_first: true,
            rerun_reasoners: true,
            keep_comments: true,
        }
    }
}

impl ReplayConfig {
    /// Parse from TOML text. Missing keys take their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, KernelError> {
        let config: Self =
            toml::from_str(text).map_err(|e| KernelError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), KernelError> {
        if !self.reuse_first && !self.rerun_reasoners {
            return Err(KernelError::InvalidConfig(
                "reuse_first and rerun_reasoners cannot both be off".to_string(),
            ));
        }
        Ok(())
    }
}

/// Re-apply the recorded rules below `node` wherever they still apply.
///
/// Returns whether `node` ends up closed.
pub fn reuse(
    forest: &mut ProofForest,
    node: NodeId,
    skeleton: &ProofSkeleton,
) -> Result<bool, TreeError> {
    let tree = forest.tree_of(node)?;
    let mut batch = forest.batch(tree)?;
    reuse_node(&mut batch, node, skeleton, true)?;
    Ok(batch.node(node).is_some_and(|n| n.is_closed()))
}

/// Replay `skeleton` onto `node`, re-running reasoners from `registry`
/// where the recorded rules no longer apply.
///
/// Returns whether `node` ends up closed.
pub fn rebuild(
    forest: &mut ProofForest,
    node: NodeId,
    skeleton: &ProofSkeleton,
    registry: &ReasonerRegistry,
    monitor: &dyn ProofMonitor,
    config: &ReplayConfig,
) -> Result<bool, TreeError> {
    let tree = forest.tree_of(node)?;
    let mut batch = forest.batch(tree)?;
    let replay = Rebuild {
        registry,
        monitor,
        config,
    };
    replay.node(&mut batch, node, skeleton)?;
    Ok(batch.node(node).is_some_and(|n| n.is_closed()))
}

fn restore_comment(
    forest: &mut ProofForest,
    node: NodeId,
    skeleton: &ProofSkeleton,
) -> Result<(), TreeError> {
    if skeleton.comment.is_empty() {
        return Ok(());
    }
    forest.set_comment(node, skeleton.comment.clone())
}

fn is_open(forest: &ProofForest, node: NodeId) -> Result<bool, TreeError> {
    forest
        .node(node)
        .map(|n| n.is_open())
        .ok_or(TreeError::UnknownNode(node))
}

fn children_of(forest: &ProofForest, node: NodeId) -> Vec<NodeId> {
    forest
        .node(node)
        .map(|n| n.children().to_vec())
        .unwrap_or_default()
}

/// Apply `rule`, treating "does not apply" as a plain `false`.
fn try_apply(forest: &mut ProofForest, node: NodeId, rule: &ProofRule) -> Result<bool, TreeError> {
    match forest.apply_rule(node, rule.clone()) {
        Ok(()) => Ok(true),
        Err(TreeError::RuleNotApplicable { .. }) => {
            debug!(%node, %rule, "recorded rule no longer applies");
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

fn reuse_node(
    forest: &mut ProofForest,
    node: NodeId,
    skeleton: &ProofSkeleton,
    keep_comments: bool,
) -> Result<(), TreeError> {
    if keep_comments {
        restore_comment(forest, node, skeleton)?;
    }
    let Some(rule) = &skeleton.rule else {
        return Ok(());
    };
    if !is_open(forest, node)? || !try_apply(forest, node, rule)? {
        return Ok(());
    }
    for (child, recorded) in children_of(forest, node).into_iter().zip(&skeleton.children) {
        reuse_node(forest, child, recorded, keep_comments)?;
    }
    Ok(())
}

struct Rebuild<'a> {
    registry: &'a ReasonerRegistry,
    monitor: &'a dyn ProofMonitor,
    config: &'a ReplayConfig,
}

impl Rebuild<'_> {
    fn node(
        &self,
        forest: &mut ProofForest,
        node: NodeId,
        skeleton: &ProofSkeleton,
    ) -> Result<(), TreeError> {
        if self.config.keep_comments {
            restore_comment(forest, node, skeleton)?;
        }
        let Some(rule) = &skeleton.rule else {
            return Ok(());
        };
        if !is_open(forest, node)? {
            return Ok(());
        }
        let applied = (self.config.reuse_first && try_apply(forest, node, rule)?)
            || (self.config.rerun_reasoners && self.rerun(forest, node, rule)?);
        if !applied {
            return Ok(());
        }
        // A re-run reasoner may produce a different number of children;
        // extra ones stay open.
        for (child, recorded) in children_of(forest, node).into_iter().zip(&skeleton.children) {
            self.node(forest, child, recorded)?;
        }
        Ok(())
    }

    fn rerun(
        &self,
        forest: &mut ProofForest,
        node: NodeId,
        rule: &ProofRule,
    ) -> Result<bool, TreeError> {
        if self.monitor.is_canceled() {
            return Ok(false);
        }
        let Some(reasoner) = self.registry.get(rule.reasoner_id()) else {
            debug!(%node, reasoner = rule.reasoner_id(), "reasoner not registered");
            return Ok(false);
        };
        match forest.apply_reasoner(node, reasoner, rule.reasoner_input(), self.monitor) {
            Ok(()) => Ok(true),
            Err(StepError::Reasoner(failure)) => {
                debug!(%node, %failure, "reasoner failed on replay");
                Ok(false)
            }
            Err(StepError::Tree(TreeError::RuleNotApplicable { .. })) => Ok(false),
            Err(StepError::Tree(e)) => Err(e),
        }
    }
}
