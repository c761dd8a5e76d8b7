//! Firing one ray through a model.

use tracing::{debug, trace, warn};

use crate::boolweave;
use crate::error::RtError;
use crate::model::Model;
use crate::ray::Ray;
use crate::resource::Resource;
use crate::seg::PartitionList;

/// Intersect `ray` with `model`, returning the partitions in ray order.
///
/// Scratch storage and counters live in `res`. A primitive that fails on
/// this ray is logged and contributes nothing; the shot continues.
/// Partitions thinner than the distance tolerance and those ending behind
/// the origin are dropped.
pub fn shoot(ray: &Ray, model: &Model, res: &mut Resource) -> PartitionList {
    let tol = *model.tolerance();
    let verbose = model.config().debug.verbose();
    res.begin_ray(model.solids().len());
    res.stats.shots += 1;

    let visited = model.cut().traverse(ray, &mut |id| {
        if res.mark(id) {
            res.candidates.push(id);
        }
    });
    res.stats.nodes_visited += visited as u64;
    res.stats.candidates += res.candidates.len() as u64;
    if verbose {
        trace!(
            origin = ?ray.origin,
            dir = ?ray.dir(),
            candidates = res.candidates.len(),
            nodes = visited,
            "shoot"
        );
    }

    let candidates = std::mem::take(&mut res.candidates);
    for &id in &candidates {
        let Some(st) = model.solid(id) else {
            continue;
        };
        if !st.is_infinite() && ray.intersect_aabb(st.bounds()).is_none() {
            continue;
        }
        res.stats.solids_shot += 1;
        let start = res.segs.len();
        match st.prepped().shoot(ray, &tol, id, &mut res.segs) {
            Ok(()) => {
                let end = res.segs.len();
                res.stats.segments += (end - start) as u64;
                res.set_segments(id, start..end);
            }
            Err(source) => {
                res.segs.truncate(start);
                res.stats.prim_errors += 1;
                let err = RtError::GeometricDegeneracy {
                    name: st.name().to_string(),
                    source,
                };
                warn!(error = %err, "solid skipped on this ray");
            }
        }
    }
    res.candidates = candidates;

    let mut parts = match model.tree() {
        Some(tree) => boolweave::eval(tree, res, &tol),
        None => res.take_parts(),
    };
    parts.retain(|p| p.thickness() >= tol.dist && p.outhit.dist >= tol.dist);

    if parts.is_empty() {
        res.stats.misses += 1;
    } else {
        res.stats.hits += 1;
    }
    let list = PartitionList::from_vec(parts);
    if verbose {
        for p in &list {
            debug!(partition = %p, "shoot result");
        }
    }
    list
}
