//! Rays and box clipping.

use csgrt_math::{Point3, Vec3};

use crate::bbox::Aabb3;
use crate::error::{Result, RtError};

/// Origin and unit direction of one shot.
#[derive(Debug, Clone, Copy)]
pub struct Ray {
    /// Start point; distances along the ray are measured from here.
    pub origin: Point3,
    dir: Vec3,
    /// Componentwise reciprocal of `dir`.
    recip: Vec3,
}

impl Ray {
    /// Ray from `origin` along `direction`, which is normalized.
    ///
    /// Fails with [`RtError::InvalidRay`] on non-finite input or a
    /// direction too short to normalize.
    pub fn new(origin: Point3, direction: Vec3) -> Result<Self> {
        if origin.coords.iter().any(|v| !v.is_finite()) {
            return Err(RtError::InvalidRay("origin is not finite"));
        }
        if direction.iter().any(|v| !v.is_finite()) {
            return Err(RtError::InvalidRay("direction is not finite"));
        }
        let dir = direction
            .try_normalize(1e-12)
            .ok_or(RtError::InvalidRay("direction has zero length"))?;
        Ok(Self {
            origin,
            dir,
            recip: dir.map(|v| 1.0 / v),
        })
    }

    /// Ray from `from` through `to`.
    pub fn toward(from: Point3, to: Point3) -> Result<Self> {
        Self::new(from, to - from)
    }

    /// Unit direction.
    #[inline]
    pub fn dir(&self) -> &Vec3 {
        &self.dir
    }

    /// Point at distance `t`.
    #[inline]
    pub fn at(&self, t: f64) -> Point3 {
        self.origin + self.dir * t
    }

    /// Distances where the ray is inside `aabb`, starting no earlier than
    /// the origin. Boundaries count as inside.
    #[inline]
    pub fn intersect_aabb(&self, aabb: &Aabb3) -> Option<(f64, f64)> {
        let mut near = 0.0_f64;
        let mut far = f64::INFINITY;
        for k in 0..3 {
            if self.dir[k] == 0.0 {
                // Parallel to this slab: inside it everywhere or nowhere.
                if self.origin[k] < aabb.min[k] || self.origin[k] > aabb.max[k] {
                    return None;
                }
                continue;
            }
            let a = (aabb.min[k] - self.origin[k]) * self.recip[k];
            let b = (aabb.max[k] - self.origin[k]) * self.recip[k];
            near = near.max(a.min(b));
            far = far.min(a.max(b));
        }
        (near <= far).then_some((near, far))
    }
}
