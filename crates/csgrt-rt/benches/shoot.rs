//! Benchmarks for ray shooting and batch firing

use std::sync::atomic::AtomicBool;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use csgrt_math::{Point3, Vec3};
use csgrt_rt::{
    fire_batch, shoot, Arb8, CutConfig, Ell, ModelBuilder, Model, Ray, Rcc, Resource, ResourcePool,
    RtConfig, Solid, Tor, TreeNode,
};

fn single(solid: Solid) -> Model {
    let mut builder = ModelBuilder::new(RtConfig::default()).unwrap();
    let id = builder.add_solid("bench.s", solid).unwrap();
    builder.add_tree(TreeNode::leaf(id));
    builder.prep()
}

/// A grid of spheres minus cylinders, `n * n` pairs.
fn grid(n: usize, max_leaf_solids: usize) -> Model {
    let config = RtConfig {
        cut: CutConfig {
            max_leaf_solids,
            ..CutConfig::default()
        },
        ..RtConfig::default()
    };
    let mut builder = ModelBuilder::new(config).unwrap();
    for i in 0..n {
        for j in 0..n {
            let c = Point3::new(i as f64 * 3.0, j as f64 * 3.0, 0.0);
            let ball = builder
                .add_solid(&format!("b{i}_{j}.s"), Solid::Ell(Ell::sphere(c, 1.2)))
                .unwrap();
            let bore = Rcc::new(c - Vec3::z() * 2.0, Vec3::z() * 4.0, 0.4);
            let hole = builder.add_solid(&format!("h{i}_{j}.s"), Solid::Rcc(bore)).unwrap();
            builder.add_tree(TreeNode::subtract(TreeNode::leaf(ball), TreeNode::leaf(hole)));
        }
    }
    builder.prep()
}

fn grid_ray(n: usize, k: usize) -> csgrt_rt::Result<Ray> {
    let span = n as f64 * 3.0;
    let x = (k % 64) as f64 / 64.0 * span - 1.5;
    let y = (k / 64) as f64 / 64.0 * span - 1.5;
    Ray::new(Point3::new(x, y, 50.0), -Vec3::z())
}

fn bench_primitives(c: &mut Criterion) {
    let mut group = c.benchmark_group("primitives");

    let cases = [
        ("ell", Solid::Ell(Ell::sphere(Point3::origin(), 1.0))),
        (
            "arb8",
            Solid::Arb8(Arb8::from_rpp(Point3::new(-1.0, -1.0, -1.0), Point3::new(1.0, 1.0, 1.0))),
        ),
        ("rcc", Solid::Rcc(Rcc::new(Point3::new(0.0, 0.0, -1.0), Vec3::z() * 2.0, 1.0))),
        ("tor", Solid::Tor(Tor::new(Point3::origin(), Vec3::z(), 1.0, 0.3))),
    ];
    let ray = Ray::new(Point3::new(-5.0, 0.1, 0.05), Vec3::x()).unwrap();
    for (name, solid) in cases {
        let model = single(solid);
        let mut res = Resource::new(0);
        group.bench_function(name, |b| {
            b.iter(|| {
                let parts = shoot(black_box(&ray), &model, &mut res);
                res.recycle(parts);
            })
        });
    }

    group.finish();
}

fn bench_cut_tree(c: &mut Criterion) {
    let mut group = c.benchmark_group("cut_tree");
    let n = 16;

    for max_leaf in [4, 32, usize::MAX] {
        let model = grid(n, max_leaf);
        let mut res = Resource::new(0);
        let label = if max_leaf == usize::MAX { "flat".to_string() } else { max_leaf.to_string() };
        group.throughput(Throughput::Elements(256));
        group.bench_with_input(BenchmarkId::new("grid_256_rays", label), &model, |b, model| {
            b.iter(|| {
                for k in 0..256 {
                    let ray = grid_ray(n, k * 16).unwrap();
                    let parts = shoot(&ray, model, &mut res);
                    res.recycle(parts);
                }
            })
        });
    }

    group.finish();
}

fn bench_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("fire_batch");
    let n = 16;
    let model = grid(n, 8);
    let cancel = AtomicBool::new(false);

    for workers in [1, 4] {
        let mut pool = ResourcePool::new(workers);
        group.throughput(Throughput::Elements(4096));
        group.bench_with_input(BenchmarkId::new("grid_4096_rays", workers), &workers, |b, _| {
            b.iter(|| {
                fire_batch(&model, &mut pool, 4096, |k| grid_ray(n, k), |_, parts| parts.len(), &cancel)
                    .unwrap()
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_primitives, bench_cut_tree, bench_batch);
criterion_main!(benches);
