//! Parallel ray batches.
//!
//! A batch runs on a rayon pool with one thread per free resource. Workers
//! pull chunks of ray indices from a shared counter, so fast workers keep
//! taking work while slow ones finish theirs.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tracing::{debug, warn};

use crate::error::{Result, RtError};
use crate::model::Model;
use crate::ray::Ray;
use crate::resource::{Resource, ResourcePool, ShotStats};
use crate::seg::PartitionList;
use crate::shoot::shoot;

/// Outcome of [`fire_batch`].
#[derive(Debug)]
pub struct BatchReport<T> {
    /// `on_hit` results keyed by ray index, in index order.
    pub results: Vec<(usize, T)>,
    /// Rays shot.
    pub completed: usize,
    /// Indices whose ray could not be built.
    pub invalid_rays: usize,
    /// The batch stopped early.
    pub cancelled: bool,
    /// Counters of this batch.
    pub stats: ShotStats,
}

struct WorkerOutput<T> {
    res: Resource,
    results: Vec<(usize, T)>,
    completed: usize,
    invalid: usize,
}

/// Shoot rays `0..count` in parallel.
///
/// `make_ray(i)` builds ray `i`; `on_hit(i, parts)` turns its partitions
/// into a result. Setting `cancel` stops every worker before its next ray.
/// All free resources of `pool` are used and returned afterwards.
pub fn fire_batch<T, R, H>(
    model: &Model,
    pool: &mut ResourcePool,
    count: usize,
    make_ray: R,
    on_hit: H,
    cancel: &AtomicBool,
) -> Result<BatchReport<T>>
where
    T: Send,
    R: Fn(usize) -> Result<Ray> + Sync,
    H: Fn(usize, &PartitionList) -> T + Sync,
{
    let mut resources = Vec::with_capacity(pool.available());
    while let Some(res) = pool.acquire() {
        resources.push(res);
    }
    if resources.is_empty() {
        return Err(RtError::ThreadPool("no free resources".into()));
    }

    let threads = resources.len();
    let thread_pool = match rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("csgrt-worker-{i}"))
        .build()
    {
        Ok(p) => p,
        Err(e) => {
            for res in resources {
                pool.release(res);
            }
            return Err(RtError::ThreadPool(e.to_string()));
        }
    };

    let debug_level = model.config().debug;
    let chunk = model.config().chunk_size.max(1);
    let next = AtomicUsize::new(0);
    if debug_level.basic() {
        debug!(count, threads, chunk, "batch start");
    }

    let mut outputs: Vec<Option<WorkerOutput<T>>> = (0..threads).map(|_| None).collect();
    thread_pool.scope(|s| {
        for (mut res, slot) in resources.into_iter().zip(outputs.iter_mut()) {
            let (next, make_ray, on_hit) = (&next, &make_ray, &on_hit);
            s.spawn(move |_| {
                let mut results = Vec::new();
                let mut completed = 0;
                let mut invalid = 0;
                'work: loop {
                    let start = next.fetch_add(chunk, Ordering::Relaxed);
                    if start >= count {
                        break;
                    }
                    for i in start..(start + chunk).min(count) {
                        if cancel.load(Ordering::Relaxed) {
                            break 'work;
                        }
                        match make_ray(i) {
                            Ok(ray) => {
                                let parts = shoot(&ray, model, &mut res);
                                results.push((i, on_hit(i, &parts)));
                                res.recycle(parts);
                                completed += 1;
                            }
                            Err(e) => {
                                invalid += 1;
                                if debug_level.basic() {
                                    warn!(index = i, error = %e, "ray skipped");
                                }
                            }
                        }
                    }
                }
                *slot = Some(WorkerOutput {
                    res,
                    results,
                    completed,
                    invalid,
                });
            });
        }
    });

    let mut report = BatchReport {
        results: Vec::new(),
        completed: 0,
        invalid_rays: 0,
        cancelled: cancel.load(Ordering::Relaxed),
        stats: ShotStats::default(),
    };
    for out in outputs.into_iter().flatten() {
        report.results.extend(out.results);
        report.completed += out.completed;
        report.invalid_rays += out.invalid;
        report.stats.merge(out.res.stats());
        pool.release(out.res);
    }
    report.results.sort_by_key(|(i, _)| *i);

    if debug_level.basic() {
        debug!(
            completed = report.completed,
            invalid = report.invalid_rays,
            cancelled = report.cancelled,
            hits = report.stats.hits,
            prim_errors = report.stats.prim_errors,
            "batch done"
        );
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RtConfig;
    use crate::model::ModelBuilder;
    use crate::primitives::{Ell, Solid};
    use crate::tree::TreeNode;
    use csgrt_math::{Point3, Vec3};

    fn sphere_model(workers: usize) -> Model {
        let config = RtConfig {
            workers,
            chunk_size: 3,
            ..RtConfig::default()
        };
        let mut builder = ModelBuilder::new(config).unwrap();
        let id = builder
            .add_solid("ball", Solid::Ell(Ell::sphere(Point3::origin(), 1.0)))
            .unwrap();
        builder.add_tree(TreeNode::leaf(id));
        builder.prep()
    }

    fn scan_ray(i: usize) -> Result<Ray> {
        let y = -1.5 + 3.0 * (i as f64) / 49.0;
        Ray::new(Point3::new(-5.0, y, 0.0), Vec3::x())
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let model = sphere_model(4);
        let mut pool = ResourcePool::from_config(model.config());
        assert_eq!(pool.len(), 4);
        let cancel = AtomicBool::new(false);
        let report = fire_batch(&model, &mut pool, 50, scan_ray, |_, parts| parts.len(), &cancel).unwrap();

        let mut res = Resource::new(0);
        let expect: Vec<(usize, usize)> = (0..50)
            .map(|i| (i, shoot(&scan_ray(i).unwrap(), &model, &mut res).len()))
            .collect();
        assert_eq!(report.results, expect);
        assert_eq!(report.completed, 50);
        assert!(!report.cancelled);
        assert_eq!(report.stats.shots, 50);
        assert_eq!(report.stats.hits + report.stats.misses, 50);
        assert_eq!(pool.available(), 4);
        assert_eq!(pool.total_stats().shots, 50);
    }

    #[test]
    fn test_invalid_rays_counted() {
        let model = sphere_model(2);
        let mut pool = ResourcePool::new(2);
        let cancel = AtomicBool::new(false);
        let report = fire_batch(
            &model,
            &mut pool,
            10,
            |i| {
                if i % 2 == 0 {
                    scan_ray(i)
                } else {
                    Ray::new(Point3::origin(), Vec3::zeros())
                }
            },
            |i, _| i,
            &cancel,
        )
        .unwrap();
        assert_eq!(report.completed, 5);
        assert_eq!(report.invalid_rays, 5);
        assert!(report.results.iter().all(|(i, v)| i % 2 == 0 && i == v));
    }

    #[test]
    fn test_cancelled_before_start() {
        let model = sphere_model(2);
        let mut pool = ResourcePool::new(2);
        let cancel = AtomicBool::new(true);
        let report = fire_batch(&model, &mut pool, 100, scan_ray, |_, p| p.len(), &cancel).unwrap();
        assert!(report.cancelled);
        assert_eq!(report.completed, 0);
        assert!(report.results.is_empty());
        assert_eq!(pool.available(), 2);
    }

    #[test]
    fn test_no_free_resources() {
        let model = sphere_model(1);
        let mut pool = ResourcePool::new(1);
        let held = pool.acquire().unwrap();
        let cancel = AtomicBool::new(false);
        assert!(matches!(
            fire_batch(&model, &mut pool, 1, scan_ray, |_, p| p.len(), &cancel),
            Err(RtError::ThreadPool(_))
        ));
        pool.release(held);
    }
}
