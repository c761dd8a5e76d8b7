//! Per-worker scratch state and statistics.
//!
//! A [`Resource`] holds everything a shot mutates: visited stamps,
//! the segment buffer, recycled partition storage and counters. Each worker
//! owns one for the length of a batch, so the model itself is only ever
//! read.

use std::mem;
use std::ops::Range;

use crate::boolweave::Event;
use crate::seg::{Partition, PartitionList, Segment, SolidId};

/// Counters accumulated while shooting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShotStats {
    /// Rays fired.
    pub shots: u64,
    /// Rays with at least one partition.
    pub hits: u64,
    /// Rays with none.
    pub misses: u64,
    /// Distinct solids offered by the cut tree.
    pub candidates: u64,
    /// Solids whose own box the ray reached and that were intersected.
    pub solids_shot: u64,
    /// Segments produced by primitives.
    pub segments: u64,
    /// Cut tree nodes entered.
    pub nodes_visited: u64,
    /// Primitive intersections that failed.
    pub prim_errors: u64,
    /// Partition buffers allocated because the free list was empty.
    pub lists_allocated: u64,
}

impl ShotStats {
    /// Add `other` into `self`.
    pub fn merge(&mut self, other: &ShotStats) {
        self.shots += other.shots;
        self.hits += other.hits;
        self.misses += other.misses;
        self.candidates += other.candidates;
        self.solids_shot += other.solids_shot;
        self.segments += other.segments;
        self.nodes_visited += other.nodes_visited;
        self.prim_errors += other.prim_errors;
        self.lists_allocated += other.lists_allocated;
    }
}

#[derive(Debug, Clone, Default)]
struct SegSlot {
    seq: u32,
    range: Range<usize>,
}

/// Scratch state owned by one worker.
#[derive(Debug)]
pub struct Resource {
    cpu: usize,
    ray_seq: u32,
    stamps: Vec<u32>,
    slots: Vec<SegSlot>,
    pub(crate) segs: Vec<Segment>,
    pub(crate) candidates: Vec<SolidId>,
    pub(crate) events: Vec<Event>,
    part_free: Vec<Vec<Partition>>,
    pub(crate) stats: ShotStats,
}

impl Resource {
    /// Fresh resource for worker `cpu`.
    pub fn new(cpu: usize) -> Self {
        Self {
            cpu,
            ray_seq: 0,
            stamps: Vec::new(),
            slots: Vec::new(),
            segs: Vec::new(),
            candidates: Vec::new(),
            events: Vec::new(),
            part_free: Vec::new(),
            stats: ShotStats::default(),
        }
    }

    /// Worker index this resource was created for.
    pub fn cpu(&self) -> usize {
        self.cpu
    }

    /// Counters since the last [`Resource::take_stats`].
    pub fn stats(&self) -> &ShotStats {
        &self.stats
    }

    /// Return the counters and reset them.
    pub fn take_stats(&mut self) -> ShotStats {
        mem::take(&mut self.stats)
    }

    /// Hand a finished partition list back for reuse.
    pub fn recycle(&mut self, list: PartitionList) {
        self.give_parts(list.into_vec());
    }

    /// Start a new ray over a model of `nsolids` solids.
    pub(crate) fn begin_ray(&mut self, nsolids: usize) {
        if self.stamps.len() < nsolids {
            self.stamps.resize(nsolids, 0);
            self.slots.resize(nsolids, SegSlot::default());
        }
        self.ray_seq = self.ray_seq.wrapping_add(1);
        if self.ray_seq == 0 {
            // Stale stamps could equal the restarted sequence.
            self.stamps.iter_mut().for_each(|s| *s = 0);
            self.slots.iter_mut().for_each(|s| s.seq = 0);
            self.ray_seq = 1;
        }
        self.segs.clear();
        self.candidates.clear();
    }

    /// Stamp `id` for the current ray. False if it was already stamped.
    pub(crate) fn mark(&mut self, id: SolidId) -> bool {
        let stamp = &mut self.stamps[id.index()];
        if *stamp == self.ray_seq {
            return false;
        }
        *stamp = self.ray_seq;
        true
    }

    /// Record that `range` of the segment buffer belongs to `id`.
    pub(crate) fn set_segments(&mut self, id: SolidId, range: Range<usize>) {
        self.slots[id.index()] = SegSlot {
            seq: self.ray_seq,
            range,
        };
    }

    /// Segments `id` produced on the current ray.
    pub(crate) fn segments_of(&self, id: SolidId) -> &[Segment] {
        match self.slots.get(id.index()) {
            Some(slot) if slot.seq == self.ray_seq => &self.segs[slot.range.clone()],
            _ => &[],
        }
    }

    /// An empty partition buffer, recycled when possible.
    pub(crate) fn take_parts(&mut self) -> Vec<Partition> {
        match self.part_free.pop() {
            Some(v) => v,
            None => {
                self.stats.lists_allocated += 1;
                Vec::new()
            }
        }
    }

    /// Return a partition buffer to the free list.
    pub(crate) fn give_parts(&mut self, mut parts: Vec<Partition>) {
        parts.clear();
        self.part_free.push(parts);
    }
}

/// Fixed set of resources handed out to workers.
#[derive(Debug)]
pub struct ResourcePool {
    free: Vec<Resource>,
    total: usize,
    totals: ShotStats,
}

impl ResourcePool {
    /// Pool of `n` resources (at least one).
    pub fn new(n: usize) -> Self {
        let total = n.max(1);
        Self {
            free: (0..total).rev().map(Resource::new).collect(),
            total,
            totals: ShotStats::default(),
        }
    }

    /// Pool sized to the configured worker count.
    pub fn from_config(config: &crate::config::RtConfig) -> Self {
        Self::new(config.worker_count())
    }

    /// Take a free resource.
    pub fn acquire(&mut self) -> Option<Resource> {
        self.free.pop()
    }

    /// Return a resource, folding its counters into the pool totals.
    pub fn release(&mut self, mut res: Resource) {
        self.totals.merge(&res.take_stats());
        self.free.push(res);
    }

    /// Number of resources the pool was created with.
    pub fn len(&self) -> usize {
        self.total
    }

    /// Always false; a pool holds at least one resource.
    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Resources currently free.
    pub fn available(&self) -> usize {
        self.free.len()
    }

    /// Counters of every released resource.
    pub fn total_stats(&self) -> &ShotStats {
        &self.totals
    }
}
