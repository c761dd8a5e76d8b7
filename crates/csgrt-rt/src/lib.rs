#![warn(missing_docs)]

//! CSG ray tracing for the csgrt kernel.
//!
//! Objects are read from a [`csgrt_db::Database`], decoded into typed
//! [`Solid`]s and [`Comb`]inations, and assembled into a frozen [`Model`]:
//! a table of prepped solids, the boolean tree over them and a [`CutTree`]
//! that limits which solids each ray is tested against.
//!
//! # Architecture
//!
//! - [`primitives`] - the per-type solid contract and the supported types
//! - [`internal`] - record decoding, encoding and mirroring
//! - [`diff`] - tolerance-aware comparison of objects and databases
//! - [`model`] - walking combinations and prepping solids
//! - [`cut`] - spatial subdivision over solid boxes
//! - [`shoot()`] - one ray through the model, producing partitions
//! - [`fire_batch`] - many rays on a worker pool
//!
//! # Example
//!
//! ```no_run
//! use csgrt_db::{Database, OpenMode};
//! use csgrt_math::{Point3, Vec3};
//! use csgrt_rt::{shoot, Model, Ray, Resource, RtConfig};
//!
//! let mut db = Database::open("model.g", OpenMode::ReadOnly)?;
//! db.scan()?;
//! let model = Model::load(&db, &["all.g"], RtConfig::default())?;
//!
//! let mut res = Resource::new(0);
//! let ray = Ray::new(Point3::new(-100.0, 0.0, 0.0), Vec3::x())?;
//! for part in &shoot(&ray, &model, &mut res) {
//!     println!("{part}");
//! }
//! # Ok::<(), csgrt_rt::RtError>(())
//! ```

pub mod bbox;
mod boolweave;
pub mod comb;
pub mod config;
pub mod cut;
pub mod diff;
pub mod error;
pub mod internal;
pub mod model;
mod poly;
pub mod primitives;
mod ray;
pub mod resource;
pub mod seg;
mod shoot;
pub mod tree;
pub mod worker;

pub use bbox::Aabb3;
pub use comb::{BoolOp, Comb, CombTree};
pub use config::{CutConfig, RtConfig, ToleranceConfig};
pub use cut::{CutNode, CutStats, CutTree};
pub use diff::{diff_databases, ObjectChange, ParamChange};
pub use error::{GeomError, Result, RtError};
pub use internal::{add_internal, copy_mirrored, get_internal, put_internal, Internal};
pub use model::{BuildStats, Model, ModelBuilder, Soltab};
pub use primitives::{Arb8, Ell, Half, PreppedSolid, Primitive, Rcc, Solid, Tor};
pub use ray::Ray;
pub use resource::{Resource, ResourcePool, ShotStats};
pub use seg::{Hit, Partition, PartitionList, Segment, SolidId};
pub use shoot::shoot;
pub use tree::TreeNode;
pub use worker::{fire_batch, BatchReport};

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use csgrt_db::{Database, OpenMode};
    use csgrt_math::{Point3, Vec3};
    use std::path::PathBuf;
    use std::sync::atomic::AtomicBool;

    fn temp_db(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("csgrt_rt_{}_{}.g", name, std::process::id()))
    }

    fn spans(parts: &PartitionList) -> Vec<(f64, f64)> {
        parts.iter().map(|p| (p.inhit.dist, p.outhit.dist)).collect()
    }

    fn build(solids: Vec<Solid>, tree: impl Fn(&[SolidId]) -> TreeNode, config: RtConfig) -> Model {
        let mut builder = ModelBuilder::new(config).unwrap();
        let ids: Vec<_> = solids
            .into_iter()
            .enumerate()
            .map(|(i, s)| builder.add_solid(&format!("s{i}.s"), s).unwrap())
            .collect();
        builder.add_tree(tree(&ids));
        builder.prep()
    }

    fn unit_sphere() -> Solid {
        Solid::Ell(Ell::sphere(Point3::origin(), 1.0))
    }

    #[test]
    fn test_unit_sphere_partition() {
        let model = build(vec![unit_sphere()], |ids| TreeNode::leaf(ids[0]), RtConfig::default());
        let mut res = Resource::new(0);
        let ray = Ray::new(Point3::new(-5.0, 0.0, 0.0), Vec3::x()).unwrap();
        let parts = shoot(&ray, &model, &mut res);
        assert_eq!(parts.len(), 1);
        assert_relative_eq!(parts.as_slice()[0].inhit.dist, 4.0, epsilon = 1e-9);
        assert_relative_eq!(parts.as_slice()[0].outhit.dist, 6.0, epsilon = 1e-9);
    }

    #[test]
    fn test_box_minus_enclosing_sphere_is_empty() {
        let cube = Solid::Arb8(Arb8::from_rpp(Point3::new(-1.0, -1.0, -1.0), Point3::new(1.0, 1.0, 1.0)));
        let ball = Solid::Ell(Ell::sphere(Point3::origin(), 1.5));
        let model = build(
            vec![cube, ball],
            |ids| TreeNode::subtract(TreeNode::leaf(ids[0]), TreeNode::leaf(ids[1])),
            RtConfig::default(),
        );
        let mut res = Resource::new(0);
        for dir in [Vec3::x(), Vec3::y(), Vec3::z()] {
            let ray = Ray::new(Point3::origin() - dir * 10.0, dir).unwrap();
            assert!(shoot(&ray, &model, &mut res).is_empty());
        }
    }

    #[test]
    fn test_union_of_identical_solids_is_idempotent() {
        let single = build(vec![unit_sphere()], |ids| TreeNode::leaf(ids[0]), RtConfig::default());
        let doubled = build(
            vec![unit_sphere(), unit_sphere()],
            |ids| TreeNode::union(TreeNode::leaf(ids[0]), TreeNode::leaf(ids[1])),
            RtConfig::default(),
        );
        let mut res = Resource::new(0);
        for k in 0..20 {
            let y = -1.2 + 0.12 * k as f64;
            let ray = Ray::new(Point3::new(-5.0, y, 0.3), Vec3::x()).unwrap();
            assert_eq!(
                spans(&shoot(&ray, &single, &mut res)),
                spans(&shoot(&ray, &doubled, &mut res)),
                "y = {y}"
            );
        }
    }

    #[test]
    fn test_solid_combined_with_itself() {
        let single = build(vec![unit_sphere()], |ids| TreeNode::leaf(ids[0]), RtConfig::default());
        let twice = |op: fn(TreeNode, TreeNode) -> TreeNode| {
            build(
                vec![unit_sphere()],
                move |ids| op(TreeNode::leaf(ids[0]), TreeNode::leaf(ids[0])),
                RtConfig::default(),
            )
        };
        let union = twice(TreeNode::union);
        let intersect = twice(TreeNode::intersect);
        let subtract = twice(TreeNode::subtract);

        let mut res = Resource::new(0);
        let ray = Ray::new(Point3::new(-5.0, 0.25, 0.0), Vec3::x()).unwrap();
        let alone = shoot(&ray, &single, &mut res);
        assert_eq!(alone.len(), 1);
        let p = alone.first().unwrap();
        assert_eq!((p.insolid, p.outsolid), (SolidId(0), SolidId(0)));
        assert!(!p.inflip && !p.outflip);

        assert_eq!(shoot(&ray, &union, &mut res).as_slice(), alone.as_slice());
        assert_eq!(shoot(&ray, &intersect, &mut res).as_slice(), alone.as_slice());
        assert!(shoot(&ray, &subtract, &mut res).is_empty());
    }

    /// Deterministic pseudo-random values in [0, 1).
    struct Lcg(u64);

    impl Lcg {
        fn next(&mut self) -> f64 {
            self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            (self.0 >> 11) as f64 / (1u64 << 53) as f64
        }
    }

    #[test]
    fn test_cut_tree_matches_brute_force() {
        let mut rng = Lcg(7);
        let mut solids = Vec::new();
        for _ in 0..60 {
            let c = Point3::new(rng.next() * 40.0, rng.next() * 40.0, rng.next() * 10.0);
            solids.push(Solid::Ell(Ell::sphere(c, 0.5 + rng.next() * 2.0)));
        }
        let union_all = |ids: &[SolidId]| {
            ids[1..]
                .iter()
                .fold(TreeNode::leaf(ids[0]), |t, id| TreeNode::union(t, TreeNode::leaf(*id)))
        };
        let fine = RtConfig {
            cut: CutConfig {
                max_leaf_solids: 2,
                max_depth: 16,
            },
            ..RtConfig::default()
        };
        let flat = RtConfig {
            cut: CutConfig {
                max_leaf_solids: 1000,
                max_depth: 0,
            },
            ..RtConfig::default()
        };
        let cut_model = build(solids.clone(), union_all, fine);
        let brute = build(solids, union_all, flat);
        assert!(cut_model.cut_stats().leaves > 1);
        assert_eq!(brute.cut_stats().leaves, 1);

        let mut res = Resource::new(0);
        for _ in 0..300 {
            let origin = Point3::new(rng.next() * 60.0 - 10.0, rng.next() * 60.0 - 10.0, -20.0);
            let target = Point3::new(rng.next() * 40.0, rng.next() * 40.0, rng.next() * 10.0);
            let ray = Ray::toward(origin, target).unwrap();
            let a = spans(&shoot(&ray, &cut_model, &mut res));
            let b = spans(&shoot(&ray, &brute, &mut res));
            assert_eq!(a, b, "ray {ray:?}");
        }
        assert!(res.stats().hits > 0);
    }

    #[test]
    fn test_origin_on_surface_is_deterministic() {
        let cube = Solid::Arb8(Arb8::from_rpp(Point3::new(-1.0, -1.0, -1.0), Point3::new(1.0, 1.0, 1.0)));
        let model = build(
            vec![unit_sphere(), cube],
            |ids| TreeNode::union(TreeNode::leaf(ids[0]), TreeNode::leaf(ids[1])),
            RtConfig::default(),
        );
        let mut res = Resource::new(0);
        for (origin, dir) in [
            (Point3::new(1.0, 0.0, 0.0), Vec3::x()),
            (Point3::new(1.0, 0.0, 0.0), -Vec3::x()),
            (Point3::new(0.6, 0.8, 0.0), Vec3::new(0.3, -1.0, 0.2)),
        ] {
            let ray = Ray::new(origin, dir).unwrap();
            let first = shoot(&ray, &model, &mut res);
            for _ in 0..10 {
                assert_eq!(shoot(&ray, &model, &mut res), first);
            }
        }
        // Leaving through the surface the ray starts on hits nothing.
        let out = Ray::new(Point3::new(1.0, 0.0, 0.0), Vec3::x()).unwrap();
        assert!(shoot(&out, &model, &mut res).is_empty());
    }

    #[test]
    fn test_create_then_open_has_only_ident() {
        let path = temp_db("ident");
        Database::create(&path).unwrap().close().unwrap();
        let mut db = Database::open(&path, OpenMode::ReadWrite).unwrap();
        assert_eq!(db.scan().unwrap(), 1);
        assert_eq!(db.len(), 1);
        assert!(db.lookup(csgrt_db::GLOBAL_NAME).is_some());
        db.close().unwrap();
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_database_to_partitions() {
        let path = temp_db("pipeline");
        let mut db = Database::create(&path).unwrap();
        db.scan().unwrap();
        let cube = Arb8::from_rpp(Point3::new(-1.0, -1.0, -1.0), Point3::new(1.0, 1.0, 1.0));
        add_internal(&mut db, "box.s", &Internal::Solid(Solid::Arb8(cube))).unwrap();
        add_internal(
            &mut db,
            "hole.s",
            &Internal::Solid(Solid::Rcc(Rcc::new(Point3::new(0.0, 0.0, -2.0), Vec3::new(0.0, 0.0, 4.0), 0.5))),
        )
        .unwrap();
        let part = Comb::region(CombTree::op(BoolOp::Subtract, CombTree::leaf("box.s"), CombTree::leaf("hole.s")));
        add_internal(&mut db, "part.r", &Internal::Comb(part)).unwrap();
        copy_mirrored(&mut db, "part.r", "part.m", &Point3::new(0.0, 0.0, 5.0), &Vec3::z()).unwrap();
        add_internal(
            &mut db,
            "all.g",
            &Internal::Comb(Comb::new(CombTree::op(BoolOp::Union, CombTree::leaf("part.r"), CombTree::leaf("part.m")))),
        )
        .unwrap();
        db.close().unwrap();

        let mut db = Database::open(&path, OpenMode::ReadOnly).unwrap();
        db.scan().unwrap();
        let model = Model::load(&db, &["all.g"], RtConfig::default()).unwrap();
        assert_eq!(model.solids().len(), 4);

        let mut res = Resource::new(0);
        let ray = Ray::new(Point3::new(-5.0, 0.0, 0.0), Vec3::x()).unwrap();
        assert_eq!(spans(&shoot(&ray, &model, &mut res)).len(), 2);

        let down = Ray::new(Point3::new(0.75, 0.0, 20.0), -Vec3::z()).unwrap();
        let got = spans(&shoot(&down, &model, &mut res));
        assert_eq!(got.len(), 2);
        assert_relative_eq!(got[0].0, 9.0, epsilon = 1e-9);
        assert_relative_eq!(got[0].1, 11.0, epsilon = 1e-9);
        assert_relative_eq!(got[1].0, 19.0, epsilon = 1e-9);
        assert_relative_eq!(got[1].1, 21.0, epsilon = 1e-9);

        let mut pool = ResourcePool::new(2);
        let report = fire_batch(
            &model,
            &mut pool,
            16,
            |i| Ray::new(Point3::new(-5.0, -1.5 + 0.2 * i as f64, 0.0), Vec3::x()),
            |_, parts| parts.len(),
            &AtomicBool::new(false),
        )
        .unwrap();
        assert_eq!(report.completed, 16);
        assert!(report.results.iter().any(|(_, n)| *n == 2));

        db.close().unwrap();
        std::fs::remove_file(&path).unwrap();
    }
}
