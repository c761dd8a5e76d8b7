//! The model's boolean tree over prepped solids.

use std::fmt;

use crate::comb::BoolOp;
use crate::seg::SolidId;

/// Node of the evaluated CSG tree.
#[derive(Debug, Clone, PartialEq)]
pub enum TreeNode {
    /// A prepped solid.
    Leaf(SolidId),
    /// Boolean operation.
    Op {
        /// Operator.
        op: BoolOp,
        /// Left operand.
        left: Box<TreeNode>,
        /// Right operand.
        right: Box<TreeNode>,
    },
}

impl TreeNode {
    /// Leaf for one solid.
    pub fn leaf(id: SolidId) -> Self {
        TreeNode::Leaf(id)
    }

    /// Combine two possibly empty operands, folding away empty sides.
    ///
    /// `None` stands for the empty set.
    pub fn combine(op: BoolOp, left: Option<TreeNode>, right: Option<TreeNode>) -> Option<TreeNode> {
        match (op, left, right) {
            (_, Some(l), Some(r)) => Some(TreeNode::Op {
                op,
                left: Box::new(l),
                right: Box::new(r),
            }),
            (BoolOp::Union, l, None) => l,
            (BoolOp::Union, None, r) => r,
            (BoolOp::Subtract, l, None) => l,
            (BoolOp::Intersect, _, None) | (_, None, _) => None,
        }
    }

    /// `left u right`.
    pub fn union(left: TreeNode, right: TreeNode) -> Self {
        TreeNode::Op {
            op: BoolOp::Union,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// `left + right`.
    pub fn intersect(left: TreeNode, right: TreeNode) -> Self {
        TreeNode::Op {
            op: BoolOp::Intersect,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// `left - right`.
    pub fn subtract(left: TreeNode, right: TreeNode) -> Self {
        TreeNode::Op {
            op: BoolOp::Subtract,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Every solid referenced, left to right, with repeats.
    pub fn solids(&self) -> Vec<SolidId> {
        let mut out = Vec::new();
        self.collect(&mut out);
        out
    }

    fn collect(&self, out: &mut Vec<SolidId>) {
        match self {
            TreeNode::Leaf(id) => out.push(*id),
            TreeNode::Op { left, right, .. } => {
                left.collect(out);
                right.collect(out);
            }
        }
    }

    /// Height of the tree; a leaf has depth 1.
    pub fn depth(&self) -> usize {
        match self {
            TreeNode::Leaf(_) => 1,
            TreeNode::Op { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }
}

impl fmt::Display for TreeNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TreeNode::Leaf(id) => write!(f, "{id}"),
            TreeNode::Op { op, left, right } => write!(f, "({left} {} {right})", op.symbol()),
        }
    }
}
