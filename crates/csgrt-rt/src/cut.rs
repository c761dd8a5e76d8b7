//! Spatial subdivision of the model's solids.
//!
//! The cut tree is built once from the solids' bounding boxes. Each split
//! divides a node at the median of its members' box centers along the
//! node's longest axis (the mean of the two middle centers for an even
//! count); solids straddling the plane are referenced from both children.
//! Unbounded solids bypass the tree and are offered to every ray.

use crate::bbox::Aabb3;
use crate::config::CutConfig;
use crate::ray::Ray;
use crate::seg::SolidId;

/// A node of the cut tree.
#[derive(Debug, Clone)]
pub enum CutNode {
    /// Terminal node listing candidate solids.
    Leaf {
        /// Union of the members' boxes.
        bounds: Aabb3,
        /// Solids whose boxes reach into this node.
        solids: Vec<SolidId>,
        /// Splitting stopped before the size threshold was met.
        overflow: bool,
    },
    /// Node divided by an axis-aligned plane.
    Split {
        /// Union of the members' boxes.
        bounds: Aabb3,
        /// Split axis (0 = x, 1 = y, 2 = z).
        axis: usize,
        /// Plane position along `axis`.
        plane: f64,
        /// Solids reaching below the plane.
        left: Box<CutNode>,
        /// Solids reaching above the plane.
        right: Box<CutNode>,
    },
}

impl CutNode {
    /// Bounding box of the node.
    pub fn bounds(&self) -> &Aabb3 {
        match self {
            CutNode::Leaf { bounds, .. } | CutNode::Split { bounds, .. } => bounds,
        }
    }
}

/// Shape of a built cut tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CutStats {
    /// All nodes, split and leaf.
    pub nodes: usize,
    /// Leaf nodes.
    pub leaves: usize,
    /// Depth of the deepest leaf; the root is depth 0.
    pub max_depth: usize,
    /// Leaves left above the size threshold.
    pub overflow_leaves: usize,
    /// Solids tested on every ray.
    pub infinite: usize,
    /// Sum of leaf list lengths.
    pub total_refs: usize,
}

/// Cut tree over a model's solids.
#[derive(Debug, Clone)]
pub struct CutTree {
    root: Option<CutNode>,
    infinite: Vec<SolidId>,
    bounds: Aabb3,
    stats: CutStats,
}

impl CutTree {
    /// Build from per-solid boxes; `boxes[i]` belongs to `SolidId(i)`.
    pub fn build(boxes: &[Aabb3], config: &CutConfig) -> Self {
        let mut stats = CutStats::default();
        let mut finite = Vec::new();
        let mut infinite = Vec::new();
        for (i, b) in boxes.iter().enumerate() {
            let id = SolidId(i as u32);
            if b.is_finite() && !b.is_degenerate() {
                finite.push(id);
            } else {
                infinite.push(id);
            }
        }
        stats.infinite = infinite.len();

        let root = if finite.is_empty() {
            None
        } else {
            Some(build_node(boxes, finite, 0, config, &mut stats))
        };
        let bounds = root.as_ref().map_or_else(Aabb3::empty, |r| *r.bounds());

        Self {
            root,
            infinite,
            bounds,
            stats,
        }
    }

    /// Offer every solid whose box the ray may reach to `visit`, nearest
    /// nodes first. Unbounded solids come first. A solid referenced from
    /// several leaves is offered once per leaf.
    ///
    /// Returns the number of nodes whose boxes the ray reached.
    pub fn traverse(&self, ray: &Ray, visit: &mut impl FnMut(SolidId)) -> usize {
        for &id in &self.infinite {
            visit(id);
        }
        match &self.root {
            Some(root) if ray.intersect_aabb(root.bounds()).is_some() => {
                traverse_node(root, ray, visit)
            }
            _ => 0,
        }
    }

    /// Root node, `None` when every solid is unbounded.
    pub fn root(&self) -> Option<&CutNode> {
        self.root.as_ref()
    }

    /// Solids outside the tree.
    pub fn infinite(&self) -> &[SolidId] {
        &self.infinite
    }

    /// Union of all finite solid boxes.
    pub fn bounds(&self) -> &Aabb3 {
        &self.bounds
    }

    /// Construction statistics.
    pub fn stats(&self) -> &CutStats {
        &self.stats
    }
}

fn union_of(boxes: &[Aabb3], ids: &[SolidId]) -> Aabb3 {
    let mut b = Aabb3::empty();
    for id in ids {
        b.include_box(&boxes[id.index()]);
    }
    b
}

fn make_leaf(
    bounds: Aabb3,
    solids: Vec<SolidId>,
    overflow: bool,
    depth: usize,
    stats: &mut CutStats,
) -> CutNode {
    stats.nodes += 1;
    stats.leaves += 1;
    stats.max_depth = stats.max_depth.max(depth);
    stats.total_refs += solids.len();
    if overflow {
        stats.overflow_leaves += 1;
    }
    CutNode::Leaf {
        bounds,
        solids,
        overflow,
    }
}

fn build_node(
    boxes: &[Aabb3],
    ids: Vec<SolidId>,
    depth: usize,
    config: &CutConfig,
    stats: &mut CutStats,
) -> CutNode {
    let bounds = union_of(boxes, &ids);
    if ids.len() <= config.max_leaf_solids {
        return make_leaf(bounds, ids, false, depth, stats);
    }
    if depth >= config.max_depth {
        return make_leaf(bounds, ids, true, depth, stats);
    }

    let axis = bounds.longest_axis();
    let mut centers: Vec<f64> = ids.iter().map(|id| boxes[id.index()].center_on(axis)).collect();
    centers.sort_by(f64::total_cmp);
    let mid = centers.len() / 2;
    let plane = if centers.len() % 2 == 0 {
        0.5 * (centers[mid - 1] + centers[mid])
    } else {
        centers[mid]
    };

    let mut left = Vec::new();
    let mut right = Vec::new();
    for &id in &ids {
        let b = &boxes[id.index()];
        if b.max[axis] <= plane {
            left.push(id);
        } else if b.min[axis] >= plane {
            right.push(id);
        } else {
            left.push(id);
            right.push(id);
        }
    }

    if left.len() == ids.len() || right.len() == ids.len() {
        return make_leaf(bounds, ids, true, depth, stats);
    }

    stats.nodes += 1;
    let left = build_node(boxes, left, depth + 1, config, stats);
    let right = build_node(boxes, right, depth + 1, config, stats);
    CutNode::Split {
        bounds,
        axis,
        plane,
        left: Box::new(left),
        right: Box::new(right),
    }
}

/// Caller has already checked that the ray reaches `node`.
fn traverse_node(node: &CutNode, ray: &Ray, visit: &mut impl FnMut(SolidId)) -> usize {
    match node {
        CutNode::Leaf { solids, .. } => {
            for &id in solids {
                visit(id);
            }
            1
        }
        CutNode::Split { left, right, .. } => {
            let lt = ray.intersect_aabb(left.bounds()).map(|(t, _)| t);
            let rt = ray.intersect_aabb(right.bounds()).map(|(t, _)| t);
            let mut visited = 1;
            match (lt, rt) {
                (Some(l), Some(r)) => {
                    let (near, far) = if l <= r { (left, right) } else { (right, left) };
                    visited += traverse_node(near, ray, visit);
                    visited += traverse_node(far, ray, visit);
                }
                (Some(_), None) => visited += traverse_node(left, ray, visit),
                (None, Some(_)) => visited += traverse_node(right, ray, visit),
                (None, None) => {}
            }
            visited
        }
    }
}
