//! Hits, segments and partitions.
//!
//! A primitive's shot produces [`Segment`]s: one entry and one exit hit on
//! a single solid. Boolean evaluation merges segments into
//! [`Partition`]s, the "inside" intervals of the whole model along a ray.

use std::fmt;

use csgrt_math::Vec3;

/// Index of a prepped solid in the model's solid table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SolidId(pub u32);

impl SolidId {
    /// Position in the solid table.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for SolidId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A ray/surface crossing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    /// Ray parameter of the crossing.
    pub dist: f64,
    /// Outward unit normal of the surface that was crossed.
    pub normal: Vec3,
    /// Primitive-specific surface number.
    pub surfno: u32,
}

impl Hit {
    /// Create a hit.
    pub fn new(dist: f64, normal: Vec3, surfno: u32) -> Self {
        Self {
            dist,
            normal,
            surfno,
        }
    }
}

/// The part of a ray inside one solid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    /// Solid that produced the segment.
    pub solid: SolidId,
    /// Where the ray enters.
    pub inhit: Hit,
    /// Where the ray leaves.
    pub outhit: Hit,
}

impl Segment {
    /// Create a segment, `inhit.dist <= outhit.dist`.
    pub fn new(solid: SolidId, inhit: Hit, outhit: Hit) -> Self {
        Self {
            solid,
            inhit,
            outhit,
        }
    }

    /// Length along the ray.
    pub fn thickness(&self) -> f64 {
        self.outhit.dist - self.inhit.dist
    }
}

/// An interval along the ray where the evaluated model is solid.
///
/// A flip flag is set when the boundary came from a subtracted solid, so the
/// stored outward normal of that solid points into the result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Partition {
    /// Entry hit.
    pub inhit: Hit,
    /// Exit hit.
    pub outhit: Hit,
    /// Solid supplying the entry surface.
    pub insolid: SolidId,
    /// Solid supplying the exit surface.
    pub outsolid: SolidId,
    /// Entry normal must be negated.
    pub inflip: bool,
    /// Exit normal must be negated.
    pub outflip: bool,
}

impl Partition {
    /// Partition covering exactly one segment.
    pub fn from_segment(seg: &Segment) -> Self {
        Self {
            inhit: seg.inhit,
            outhit: seg.outhit,
            insolid: seg.solid,
            outsolid: seg.solid,
            inflip: false,
            outflip: false,
        }
    }

    /// Length along the ray.
    pub fn thickness(&self) -> f64 {
        self.outhit.dist - self.inhit.dist
    }

    /// Entry normal of the result, flip applied.
    pub fn in_normal(&self) -> Vec3 {
        if self.inflip {
            -self.inhit.normal
        } else {
            self.inhit.normal
        }
    }

    /// Exit normal of the result, flip applied.
    pub fn out_normal(&self) -> Vec3 {
        if self.outflip {
            -self.outhit.normal
        } else {
            self.outhit.normal
        }
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:.6}, {:.6}] in {} surf {}{} out {} surf {}{}",
            self.inhit.dist,
            self.outhit.dist,
            self.insolid,
            self.inhit.surfno,
            if self.inflip { " (flip)" } else { "" },
            self.outsolid,
            self.outhit.surfno,
            if self.outflip { " (flip)" } else { "" },
        )
    }
}

/// Ordered, non-overlapping partitions produced by one shot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartitionList {
    parts: Vec<Partition>,
}

impl PartitionList {
    /// Wrap partitions that are already ordered.
    pub fn from_vec(parts: Vec<Partition>) -> Self {
        Self { parts }
    }

    /// Number of partitions.
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    /// True if the ray hit nothing.
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Partitions in ray order.
    pub fn iter(&self) -> std::slice::Iter<'_, Partition> {
        self.parts.iter()
    }

    /// Nearest partition.
    pub fn first(&self) -> Option<&Partition> {
        self.parts.first()
    }

    /// Partitions as a slice.
    pub fn as_slice(&self) -> &[Partition] {
        &self.parts
    }

    /// Release the storage, e.g. to hand it back to a resource.
    pub fn into_vec(self) -> Vec<Partition> {
        self.parts
    }
}

impl<'a> IntoIterator for &'a PartitionList {
    type Item = &'a Partition;
    type IntoIter = std::slice::Iter<'a, Partition>;

    fn into_iter(self) -> Self::IntoIter {
        self.parts.iter()
    }
}

impl fmt::Display for PartitionList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.parts.is_empty() {
            return write!(f, "(miss)");
        }
        for (i, p) in self.parts.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{p}")?;
        }
        Ok(())
    }
}
