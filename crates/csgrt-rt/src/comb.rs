//! Combinations: boolean trees of named members.
//!
//! A combination record body is a flags byte, a presence byte, then the
//! tree in preorder. Each node starts with a tag: `0` for a member leaf
//! (name, matrix-present byte, optional 16 matrix values), `1`..`3` for
//! union, intersect and subtract followed by both operands.

use std::fmt;

use csgrt_db::codec::COMB_FLAG_REGION;
use csgrt_db::directory::validate_name;
use csgrt_db::{BodyReader, BodyWriter, CodecError};
use csgrt_math::Transform;

/// Deepest tree accepted when decoding.
pub const MAX_TREE_DEPTH: usize = 1024;

const TAG_LEAF: u8 = 0;
const TAG_UNION: u8 = 1;
const TAG_INTERSECT: u8 = 2;
const TAG_SUBTRACT: u8 = 3;

/// Boolean operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoolOp {
    /// Inside either operand.
    Union,
    /// Inside both operands.
    Intersect,
    /// Inside the left operand and outside the right.
    Subtract,
}

impl BoolOp {
    fn tag(self) -> u8 {
        match self {
            BoolOp::Union => TAG_UNION,
            BoolOp::Intersect => TAG_INTERSECT,
            BoolOp::Subtract => TAG_SUBTRACT,
        }
    }

    /// Whether a point is inside the result given its membership in each
    /// operand.
    #[inline]
    pub fn eval(self, left: bool, right: bool) -> bool {
        match self {
            BoolOp::Union => left || right,
            BoolOp::Intersect => left && right,
            BoolOp::Subtract => left && !right,
        }
    }

    /// Operator symbol as written in combination listings.
    pub fn symbol(self) -> char {
        match self {
            BoolOp::Union => 'u',
            BoolOp::Intersect => '+',
            BoolOp::Subtract => '-',
        }
    }
}

/// Node of a combination's boolean tree.
#[derive(Debug, Clone, PartialEq)]
pub enum CombTree {
    /// Reference to another object, optionally placed by a matrix.
    Leaf {
        /// Member name.
        name: String,
        /// Member placement relative to the combination.
        matrix: Option<Transform>,
    },
    /// Boolean operation on two subtrees.
    Op {
        /// Operator.
        op: BoolOp,
        /// Left operand.
        left: Box<CombTree>,
        /// Right operand.
        right: Box<CombTree>,
    },
}

impl CombTree {
    /// Member without a matrix.
    pub fn leaf(name: impl Into<String>) -> Self {
        CombTree::Leaf {
            name: name.into(),
            matrix: None,
        }
    }

    /// Member placed by `matrix`.
    pub fn leaf_with_matrix(name: impl Into<String>, matrix: Transform) -> Self {
        CombTree::Leaf {
            name: name.into(),
            matrix: Some(matrix),
        }
    }

    /// Combine two subtrees.
    pub fn op(op: BoolOp, left: CombTree, right: CombTree) -> Self {
        CombTree::Op {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Build the left-deep tree for a member list such as `a u b - c`.
    /// The first member's operator is ignored.
    pub fn from_members<'a>(members: impl IntoIterator<Item = (BoolOp, &'a str)>) -> Option<Self> {
        members.into_iter().fold(None, |acc, (op, name)| match acc {
            None => Some(CombTree::leaf(name)),
            Some(tree) => Some(CombTree::op(op, tree, CombTree::leaf(name))),
        })
    }

    /// Call `f` on every leaf, left to right.
    pub fn for_each_leaf<'a>(&'a self, f: &mut impl FnMut(&'a str, Option<&'a Transform>)) {
        match self {
            CombTree::Leaf { name, matrix } => f(name, matrix.as_ref()),
            CombTree::Op { left, right, .. } => {
                left.for_each_leaf(f);
                right.for_each_leaf(f);
            }
        }
    }

    /// Pre-multiply every member matrix by `xform`.
    pub fn transform(&self, xform: &Transform) -> Self {
        match self {
            CombTree::Leaf { name, matrix } => CombTree::Leaf {
                name: name.clone(),
                matrix: Some(match matrix {
                    Some(m) => xform.then(m),
                    None => *xform,
                }),
            },
            CombTree::Op { op, left, right } => {
                CombTree::op(*op, left.transform(xform), right.transform(xform))
            }
        }
    }

    fn encode(&self, w: &mut BodyWriter) {
        match self {
            CombTree::Leaf { name, matrix } => {
                w.put_u8(TAG_LEAF).put_str(name);
                match matrix {
                    Some(m) => {
                        w.put_u8(1).put_matrix(m);
                    }
                    None => {
                        w.put_u8(0);
                    }
                }
            }
            CombTree::Op { op, left, right } => {
                w.put_u8(op.tag());
                left.encode(w);
                right.encode(w);
            }
        }
    }

    fn decode(r: &mut BodyReader<'_>, depth: usize) -> Result<Self, CodecError> {
        if depth > MAX_TREE_DEPTH {
            return Err(CodecError::InvalidValue {
                field: "tree depth",
                value: depth.to_string(),
            });
        }
        let tag = r.get_u8()?;
        let op = match tag {
            TAG_LEAF => {
                let name = r.get_str()?;
                let matrix = match r.get_u8()? {
                    0 => None,
                    1 => Some(r.get_matrix()?),
                    other => {
                        return Err(CodecError::InvalidValue {
                            field: "matrix flag",
                            value: other.to_string(),
                        })
                    }
                };
                return Ok(CombTree::Leaf { name, matrix });
            }
            TAG_UNION => BoolOp::Union,
            TAG_INTERSECT => BoolOp::Intersect,
            TAG_SUBTRACT => BoolOp::Subtract,
            other => {
                return Err(CodecError::InvalidValue {
                    field: "tree tag",
                    value: other.to_string(),
                })
            }
        };
        let left = Self::decode(r, depth + 1)?;
        let right = Self::decode(r, depth + 1)?;
        Ok(CombTree::op(op, left, right))
    }
}

impl fmt::Display for CombTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CombTree::Leaf { name, matrix } => {
                write!(f, "{name}")?;
                if matrix.is_some() {
                    write!(f, "[M]")?;
                }
                Ok(())
            }
            CombTree::Op { op, left, right } => write!(f, "({left} {} {right})", op.symbol()),
        }
    }
}

/// A combination object.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Comb {
    /// Marks the combination as a region.
    pub region: bool,
    /// Boolean tree; `None` for an empty combination.
    pub tree: Option<CombTree>,
}

impl Comb {
    /// Plain combination.
    pub fn new(tree: CombTree) -> Self {
        Self {
            region: false,
            tree: Some(tree),
        }
    }

    /// Region combination.
    pub fn region(tree: CombTree) -> Self {
        Self {
            region: true,
            tree: Some(tree),
        }
    }

    /// Decode a record body.
    pub fn import(body: &[u8]) -> Result<Self, CodecError> {
        let mut r = BodyReader::new(body);
        let flags = r.get_u8()?;
        let tree = match r.get_u8()? {
            0 => None,
            1 => Some(CombTree::decode(&mut r, 0)?),
            other => {
                return Err(CodecError::InvalidValue {
                    field: "tree flag",
                    value: other.to_string(),
                })
            }
        };
        r.finish()?;
        Ok(Self {
            region: flags & COMB_FLAG_REGION != 0,
            tree,
        })
    }

    /// Encode into a record body.
    pub fn export(&self) -> Vec<u8> {
        let mut w = BodyWriter::new();
        w.put_u8(if self.region { COMB_FLAG_REGION } else { 0 });
        match &self.tree {
            Some(tree) => {
                w.put_u8(1);
                tree.encode(&mut w);
            }
            None => {
                w.put_u8(0);
            }
        }
        w.finish()
    }

    /// Check that every member name could live in a directory.
    pub fn validate_members(&self) -> Result<(), String> {
        let mut bad = None;
        if let Some(tree) = &self.tree {
            tree.for_each_leaf(&mut |name, _| {
                if bad.is_none() {
                    if let Err(e) = validate_name(name) {
                        bad = Some(e.to_string());
                    }
                }
            });
        }
        bad.map_or(Ok(()), Err)
    }

    /// Member names, left to right.
    pub fn members(&self) -> Vec<&str> {
        let mut out = Vec::new();
        if let Some(tree) = &self.tree {
            tree.for_each_leaf(&mut |name, _| out.push(name));
        }
        out
    }

    /// Pre-multiply every member matrix by `xform`.
    pub fn transform(&self, xform: &Transform) -> Self {
        Self {
            region: self.region,
            tree: self.tree.as_ref().map(|t| t.transform(xform)),
        }
    }
}
