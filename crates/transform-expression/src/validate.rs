//! Static checks run once over a parse tree before it is lowered.

use rustpython_parser::ast as py;

use crate::parser::permitted_children;
use crate::{EvaluationError, EvaluatorLimits};

/// Shape of a tree that passed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeStats {
    pub nodes: usize,
    pub depth: usize,
}

/// Rejects forbidden node kinds anywhere in the tree, then enforces the node
/// and depth ceilings. Forbidden constructs win over size so that escape
/// attempts are always reported as such. The walk keeps its own stack.
pub(crate) fn validate(
    tree: &py::Expr,
    limits: &EvaluatorLimits,
) -> Result<TreeStats, EvaluationError> {
    let mut stats = TreeStats { nodes: 0, depth: 0 };
    let mut pending = vec![(tree, 1usize)];
    while let Some((node, depth)) = pending.pop() {
        let children = permitted_children(node)?;
        stats.nodes += 1;
        stats.depth = stats.depth.max(depth);
        pending.extend(children.into_iter().map(|child| (child, depth + 1)));
    }
    if stats.nodes > limits.max_nodes {
        return Err(EvaluationError::too_complex(format!(
            "{} nodes exceeds maximum of {}",
            stats.nodes, limits.max_nodes
        )));
    }
    if stats.depth > limits.max_depth {
        return Err(EvaluationError::too_complex(format!(
            "nesting depth {} exceeds maximum of {}",
            stats.depth, limits.max_depth
        )));
    }
    Ok(stats)
}
