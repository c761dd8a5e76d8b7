//! Axis-aligned bounding boxes.
//!
//! Every prepped solid reports one; the cut tree is built from them.

use csgrt_math::{Point3, Vec3};

/// Box between two corners. `min > max` on any axis means empty.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb3 {
    /// Lower corner.
    pub min: Point3,
    /// Upper corner.
    pub max: Point3,
}

impl Aabb3 {
    /// Box between `min` and `max`.
    pub fn new(min: Point3, max: Point3) -> Self {
        Self { min, max }
    }

    /// Inverted box that any inclusion replaces.
    pub fn empty() -> Self {
        Self::new(Point3::from(Vec3::repeat(f64::INFINITY)), Point3::from(Vec3::repeat(f64::NEG_INFINITY)))
    }

    /// All of space, reported by unbounded solids.
    pub fn infinite() -> Self {
        Self::new(Point3::from(Vec3::repeat(f64::NEG_INFINITY)), Point3::from(Vec3::repeat(f64::INFINITY)))
    }

    /// Grow to cover `p`.
    pub fn include_point(&mut self, p: &Point3) {
        self.min = self.min.inf(p);
        self.max = self.max.sup(p);
    }

    /// Grow to cover `other`. Empty boxes change nothing.
    pub fn include_box(&mut self, other: &Aabb3) {
        if !other.is_empty() {
            self.include_point(&other.min);
            self.include_point(&other.max);
        }
    }

    /// Pad every face outward by `pad`.
    pub fn expand(&mut self, pad: f64) {
        let v = Vec3::repeat(pad);
        self.min -= v;
        self.max += v;
    }

    /// Nothing included yet.
    pub fn is_empty(&self) -> bool {
        (0..3).any(|k| self.min[k] > self.max[k])
    }

    /// No infinite or NaN bound.
    pub fn is_finite(&self) -> bool {
        self.min.coords.iter().chain(self.max.coords.iter()).all(|v| v.is_finite())
    }

    /// Empty, or flat along at least one axis.
    pub fn is_degenerate(&self) -> bool {
        (0..3).any(|k| self.max[k] - self.min[k] <= 0.0)
    }

    /// Midpoint along `axis`.
    pub fn center_on(&self, axis: usize) -> f64 {
        0.5 * (self.min[axis] + self.max[axis])
    }

    /// Index of the widest axis; ties go to the lower index.
    pub fn longest_axis(&self) -> usize {
        let size = self.max - self.min;
        (1..3).fold(0, |best, k| if size[k] > size[best] { k } else { best })
    }
}

impl Default for Aabb3 {
    fn default() -> Self {
        Self::empty()
    }
}
