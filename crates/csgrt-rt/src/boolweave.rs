//! Boolean evaluation of segments into partitions.
//!
//! Each tree leaf turns its solid's segments into sorted, merged
//! partitions. Operator nodes sweep the boundaries of both operands in ray
//! order and emit the intervals where the operator holds. Boundaries closer
//! than the distance tolerance to the first boundary of their group are
//! taken together, so coincident surfaces never produce slivers.

use csgrt_math::Tolerance;

use crate::comb::BoolOp;
use crate::resource::Resource;
use crate::seg::{Hit, Partition, SolidId};
use crate::tree::TreeNode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Left,
    Right,
}

/// One operand boundary during a sweep.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Event {
    t: f64,
    /// Position within the operand's boundary sequence.
    seq: usize,
    side: Side,
    enter: bool,
    hit: Hit,
    solid: SolidId,
    flip: bool,
}

/// Evaluate `node` for the current ray.
///
/// The returned buffer comes from the resource free list.
pub(crate) fn eval(node: &TreeNode, res: &mut Resource, tol: &Tolerance) -> Vec<Partition> {
    match node {
        TreeNode::Leaf(id) => leaf_partitions(*id, res, tol),
        TreeNode::Op { op, left, right } => {
            let l = eval(left, res, tol);
            if l.is_empty() && *op != BoolOp::Union {
                return l;
            }
            let r = eval(right, res, tol);
            if r.is_empty() {
                return match op {
                    BoolOp::Union | BoolOp::Subtract => {
                        res.give_parts(r);
                        l
                    }
                    BoolOp::Intersect => {
                        res.give_parts(l);
                        r
                    }
                };
            }
            if l.is_empty() {
                res.give_parts(l);
                return r;
            }
            let out = weave(*op, &l, &r, res, tol);
            res.give_parts(l);
            res.give_parts(r);
            out
        }
    }
}

/// Sorted, merged partitions of one solid. Segments wholly behind the ray
/// origin are dropped.
fn leaf_partitions(id: SolidId, res: &mut Resource, tol: &Tolerance) -> Vec<Partition> {
    let mut out = res.take_parts();
    out.extend(
        res.segments_of(id)
            .iter()
            .filter(|s| s.outhit.dist >= -tol.dist)
            .map(Partition::from_segment),
    );
    out.sort_by(|a, b| a.inhit.dist.total_cmp(&b.inhit.dist));

    let mut merged = 0;
    for i in 0..out.len() {
        if merged > 0 && out[i].inhit.dist <= out[merged - 1].outhit.dist + tol.dist {
            if out[i].outhit.dist > out[merged - 1].outhit.dist {
                out[merged - 1].outhit = out[i].outhit;
                out[merged - 1].outsolid = out[i].outsolid;
                out[merged - 1].outflip = out[i].outflip;
            }
        } else {
            out[merged] = out[i];
            merged += 1;
        }
    }
    out.truncate(merged);
    out
}

fn push_events(events: &mut Vec<Event>, side: Side, parts: &[Partition]) {
    for (i, p) in parts.iter().enumerate() {
        events.push(Event {
            t: p.inhit.dist,
            seq: 2 * i,
            side,
            enter: true,
            hit: p.inhit,
            solid: p.insolid,
            flip: p.inflip,
        });
        events.push(Event {
            t: p.outhit.dist,
            seq: 2 * i + 1,
            side,
            enter: false,
            hit: p.outhit,
            solid: p.outsolid,
            flip: p.outflip,
        });
    }
}

/// (side, entering, toggle flip) in order of preference.
type Prefs = [(Side, bool, bool); 2];

const PLAIN_OPEN: Prefs = [(Side::Left, true, false), (Side::Right, true, false)];
const PLAIN_CLOSE: Prefs = [(Side::Left, false, false), (Side::Right, false, false)];
// A subtracted solid's exit starts the result and its entry ends it.
const SUBTRACT_OPEN: Prefs = [(Side::Left, true, false), (Side::Right, false, true)];
const SUBTRACT_CLOSE: Prefs = [(Side::Left, false, false), (Side::Right, true, true)];

/// Pick the boundary that supplies a partition edge from a group, in
/// order of preference. The returned flag says whether the flip must be
/// toggled.
fn pick<'a>(group: &'a [Event], prefs: &[(Side, bool, bool)]) -> (&'a Event, bool) {
    for &(side, enter, toggle) in prefs {
        if let Some(e) = group.iter().find(|e| e.side == side && e.enter == enter) {
            return (e, toggle);
        }
    }
    (&group[0], false)
}

/// Merge two operand lists under `op`.
pub(crate) fn weave(
    op: BoolOp,
    left: &[Partition],
    right: &[Partition],
    res: &mut Resource,
    tol: &Tolerance,
) -> Vec<Partition> {
    let mut events = std::mem::take(&mut res.events);
    events.clear();
    push_events(&mut events, Side::Left, left);
    push_events(&mut events, Side::Right, right);
    events.sort_by(|a, b| a.t.total_cmp(&b.t).then(a.seq.cmp(&b.seq)));

    let (open_prefs, close_prefs) = match op {
        BoolOp::Subtract => (&SUBTRACT_OPEN, &SUBTRACT_CLOSE),
        BoolOp::Union | BoolOp::Intersect => (&PLAIN_OPEN, &PLAIN_CLOSE),
    };

    let mut out = res.take_parts();
    let mut in_left = false;
    let mut in_right = false;
    let mut open: Option<(Hit, SolidId, bool)> = None;

    let mut i = 0;
    while i < events.len() {
        let t0 = events[i].t;
        let mut j = i + 1;
        while j < events.len() && (events[j].t == t0 || events[j].t - t0 <= tol.dist) {
            j += 1;
        }
        let group = &events[i..j];

        let before = op.eval(in_left, in_right);
        for e in group {
            match e.side {
                Side::Left => in_left = e.enter,
                Side::Right => in_right = e.enter,
            }
        }
        let after = op.eval(in_left, in_right);

        if !before && after {
            let (e, toggle) = pick(group, open_prefs);
            open = Some((e.hit, e.solid, e.flip ^ toggle));
        } else if before && !after {
            let (e, toggle) = pick(group, close_prefs);
            if let Some((inhit, insolid, inflip)) = open.take() {
                out.push(Partition {
                    inhit,
                    outhit: e.hit,
                    insolid,
                    outsolid: e.solid,
                    inflip,
                    outflip: e.flip ^ toggle,
                });
            }
        }
        i = j;
    }

    res.events = events;
    out
}
