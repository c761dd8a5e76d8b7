//! Building a frozen, shootable model from database objects.
//!
//! [`ModelBuilder::gettree`] walks a named object down through its
//! combinations, accumulating member matrices, and instantiates each solid
//! it reaches once per distinct placement. [`ModelBuilder::prep`] then
//! builds the cut tree and freezes the result into a [`Model`], which is
//! read concurrently by every worker.

use std::collections::HashMap;

use csgrt_db::{Database, DbError, DirKey, ObjectKind};
use csgrt_math::{Tolerance, Transform};
use tracing::{debug, warn};

use crate::bbox::Aabb3;
use crate::comb::CombTree;
use crate::config::RtConfig;
use crate::cut::{CutStats, CutTree};
use crate::error::{Result, RtError};
use crate::internal::{get_internal, Internal};
use crate::primitives::{PreppedSolid, Solid};
use crate::seg::SolidId;
use crate::tree::TreeNode;

/// One instantiated solid.
#[derive(Debug)]
pub struct Soltab {
    id: SolidId,
    name: String,
    matrix: Transform,
    solid: Solid,
    prepped: PreppedSolid,
    bounds: Aabb3,
    infinite: bool,
}

impl Soltab {
    /// Index in the model's solid table.
    pub fn id(&self) -> SolidId {
        self.id
    }

    /// Database name of the solid.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Accumulated placement matrix.
    pub fn matrix(&self) -> &Transform {
        &self.matrix
    }

    /// Solid in model coordinates.
    pub fn solid(&self) -> &Solid {
        &self.solid
    }

    /// Prepped form used for shooting.
    pub fn prepped(&self) -> &PreppedSolid {
        &self.prepped
    }

    /// Bounding box, padded by the distance tolerance when finite.
    pub fn bounds(&self) -> &Aabb3 {
        &self.bounds
    }

    /// True for unbounded solids.
    pub fn is_infinite(&self) -> bool {
        self.infinite
    }
}

/// What happened while building a model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildStats {
    /// Solids instantiated.
    pub solids: usize,
    /// Solids dropped because prep rejected them.
    pub prep_failures: usize,
    /// References resolved to an already instantiated solid.
    pub shared: usize,
    /// Combination members naming nothing in the database.
    pub missing_members: usize,
    /// Top-level objects walked.
    pub trees: usize,
}

type InstanceKey = (String, [u64; 16]);

fn instance_key(name: &str, matrix: &Transform) -> InstanceKey {
    (name.to_string(), matrix.to_row_array().map(f64::to_bits))
}

/// Accumulates solids and trees before prep.
#[derive(Debug)]
pub struct ModelBuilder {
    config: RtConfig,
    tol: Tolerance,
    solids: Vec<Soltab>,
    instances: HashMap<InstanceKey, Option<SolidId>>,
    roots: Vec<TreeNode>,
    stats: BuildStats,
}

impl ModelBuilder {
    /// Start an empty model. The configuration is validated.
    pub fn new(config: RtConfig) -> Result<Self> {
        config.validate()?;
        let tol = config.tolerance();
        Ok(Self {
            config,
            tol,
            solids: Vec::new(),
            instances: HashMap::new(),
            roots: Vec::new(),
            stats: BuildStats::default(),
        })
    }

    /// Counters so far.
    pub fn stats(&self) -> &BuildStats {
        &self.stats
    }

    /// Prep and add a solid directly, without a database.
    pub fn add_solid(&mut self, name: &str, solid: Solid) -> Result<SolidId> {
        let prepped = solid.prep(&self.tol).map_err(|source| RtError::Prep {
            name: name.to_string(),
            source,
        })?;
        Ok(self.push_solid(name, Transform::identity(), solid, prepped))
    }

    #[cfg(test)]
    pub(crate) fn add_prepped(&mut self, name: &str, solid: Solid, prepped: PreppedSolid) -> SolidId {
        self.push_solid(name, Transform::identity(), solid, prepped)
    }

    /// Add a tree over solids already added. Trees are unioned at prep.
    pub fn add_tree(&mut self, tree: TreeNode) {
        self.roots.push(tree);
    }

    fn push_solid(
        &mut self,
        name: &str,
        matrix: Transform,
        solid: Solid,
        prepped: PreppedSolid,
    ) -> SolidId {
        let id = SolidId(self.solids.len() as u32);
        let mut bounds = *prepped.bounds();
        let infinite = !bounds.is_finite();
        if !infinite {
            bounds.expand(self.tol.dist);
        }
        if self.config.debug.verbose() {
            debug!(%id, name, kind = solid.type_name(), ?bounds, "solid prepped");
        }
        self.solids.push(Soltab {
            id,
            name: name.to_string(),
            matrix,
            solid,
            prepped,
            bounds,
            infinite,
        });
        self.stats.solids += 1;
        id
    }

    /// Walk the object `name` and add its tree.
    ///
    /// Members that do not exist are logged and treated as empty. A
    /// combination that contains itself fails with
    /// [`RtError::CyclicCombination`]; records that cannot be decoded fail
    /// with [`RtError::Import`].
    pub fn gettree(&mut self, db: &Database, name: &str) -> Result<()> {
        let key = db.find(name)?;
        let mut path = Vec::new();
        let tree = self.walk(db, key, &Transform::identity(), &mut path)?;
        self.stats.trees += 1;
        if self.config.debug.basic() {
            debug!(name, solids = self.solids.len(), empty = tree.is_none(), "gettree");
        }
        if let Some(tree) = tree {
            self.roots.push(tree);
        }
        Ok(())
    }

    fn walk(
        &mut self,
        db: &Database,
        key: DirKey,
        matrix: &Transform,
        path: &mut Vec<String>,
    ) -> Result<Option<TreeNode>> {
        let entry = db.entry(key).ok_or(DbError::StaleEntry)?;
        let name = entry.name.clone();
        match entry.kind {
            ObjectKind::Solid { .. } => self.instantiate(db, key, name, matrix),
            ObjectKind::Comb => {
                if path.contains(&name) {
                    return Err(RtError::CyclicCombination(name));
                }
                let comb = match get_internal(db, key, None)? {
                    Internal::Comb(comb) => comb,
                    Internal::Solid(_) => {
                        return Err(RtError::WrongKind {
                            name,
                            expected: "combination",
                        })
                    }
                };
                let Some(tree) = comb.tree else {
                    return Ok(None);
                };
                path.push(name);
                let result = self.walk_members(db, &tree, matrix, path);
                path.pop();
                result
            }
            ObjectKind::Ident => Err(RtError::WrongKind {
                name,
                expected: "solid or combination",
            }),
        }
    }

    fn walk_members(
        &mut self,
        db: &Database,
        node: &CombTree,
        matrix: &Transform,
        path: &mut Vec<String>,
    ) -> Result<Option<TreeNode>> {
        match node {
            CombTree::Leaf { name, matrix: member } => {
                let Some(key) = db.lookup(name) else {
                    warn!(
                        member = %name,
                        parent = path.last().map(String::as_str),
                        "member not found, treated as empty"
                    );
                    self.stats.missing_members += 1;
                    return Ok(None);
                };
                let placed = match member {
                    Some(m) => matrix.then(m),
                    None => *matrix,
                };
                self.walk(db, key, &placed, path)
            }
            CombTree::Op { op, left, right } => {
                let left = self.walk_members(db, left, matrix, path)?;
                let right = self.walk_members(db, right, matrix, path)?;
                Ok(TreeNode::combine(*op, left, right))
            }
        }
    }

    fn instantiate(
        &mut self,
        db: &Database,
        key: DirKey,
        name: String,
        matrix: &Transform,
    ) -> Result<Option<TreeNode>> {
        let ikey = instance_key(&name, matrix);
        if let Some(found) = self.instances.get(&ikey) {
            if found.is_some() {
                self.stats.shared += 1;
            }
            return Ok(found.map(TreeNode::Leaf));
        }

        let xform = (!matrix.is_identity(0.0)).then_some(matrix);
        let solid = match get_internal(db, key, xform)? {
            Internal::Solid(solid) => solid,
            Internal::Comb(_) => {
                return Err(RtError::WrongKind {
                    name,
                    expected: "solid",
                })
            }
        };

        let id = match solid.prep(&self.tol) {
            Ok(prepped) => Some(self.push_solid(&name, *matrix, solid, prepped)),
            Err(source) => {
                let err = RtError::Prep {
                    name: name.clone(),
                    source,
                };
                warn!(error = %err, "solid dropped");
                self.stats.prep_failures += 1;
                None
            }
        };
        self.instances.insert(ikey, id);
        Ok(id.map(TreeNode::Leaf))
    }

    /// Freeze the model: union every tree and build the cut tree.
    pub fn prep(self) -> Model {
        let tree = balanced_union(self.roots);
        let boxes: Vec<Aabb3> = self.solids.iter().map(|s| s.bounds).collect();
        let cut = CutTree::build(&boxes, &self.config.cut);
        let bounds = *cut.bounds();
        if self.config.debug.basic() {
            let cs = cut.stats();
            debug!(
                solids = self.solids.len(),
                nodes = cs.nodes,
                leaves = cs.leaves,
                max_depth = cs.max_depth,
                overflow = cs.overflow_leaves,
                infinite = cs.infinite,
                "model prepped"
            );
        }
        Model {
            config: self.config,
            tol: self.tol,
            solids: self.solids,
            tree,
            cut,
            bounds,
            build_stats: self.stats,
        }
    }
}

/// Union trees pairwise so the result stays shallow.
fn balanced_union(mut trees: Vec<TreeNode>) -> Option<TreeNode> {
    while trees.len() > 1 {
        let mut next = Vec::with_capacity(trees.len().div_ceil(2));
        let mut it = trees.into_iter();
        while let Some(a) = it.next() {
            next.push(match it.next() {
                Some(b) => TreeNode::union(a, b),
                None => a,
            });
        }
        trees = next;
    }
    trees.pop()
}

/// A prepped model: solids, boolean tree and cut tree.
#[derive(Debug)]
pub struct Model {
    config: RtConfig,
    tol: Tolerance,
    solids: Vec<Soltab>,
    tree: Option<TreeNode>,
    cut: CutTree,
    bounds: Aabb3,
    build_stats: BuildStats,
}

impl Model {
    /// Build a model from top-level objects of `db`.
    pub fn load(db: &Database, names: &[&str], config: RtConfig) -> Result<Self> {
        let mut builder = ModelBuilder::new(config)?;
        for name in names {
            builder.gettree(db, name)?;
        }
        Ok(builder.prep())
    }

    /// Solid table, indexed by [`SolidId`].
    pub fn solids(&self) -> &[Soltab] {
        &self.solids
    }

    /// One solid.
    pub fn solid(&self, id: SolidId) -> Option<&Soltab> {
        self.solids.get(id.index())
    }

    /// Boolean tree, `None` for an empty model.
    pub fn tree(&self) -> Option<&TreeNode> {
        self.tree.as_ref()
    }

    /// Cut tree.
    pub fn cut(&self) -> &CutTree {
        &self.cut
    }

    /// Tolerances in effect.
    pub fn tolerance(&self) -> &Tolerance {
        &self.tol
    }

    /// Configuration the model was built with.
    pub fn config(&self) -> &RtConfig {
        &self.config
    }

    /// Union of the finite solid boxes.
    pub fn bounds(&self) -> &Aabb3 {
        &self.bounds
    }

    /// Build counters.
    pub fn build_stats(&self) -> &BuildStats {
        &self.build_stats
    }

    /// Cut tree counters.
    pub fn cut_stats(&self) -> &CutStats {
        self.cut.stats()
    }
}
