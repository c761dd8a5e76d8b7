//! Torus: center, axis normal, sweep radius `r1` and tube radius `r2`.

use csgrt_db::{BodyReader, BodyWriter, CodecError};
use csgrt_math::{Point3, Tolerance, Transform, Vec3};

use super::{check_finite, Primitive, ID_TOR};
use crate::bbox::Aabb3;
use crate::error::GeomError;
use crate::poly::solve_quartic;
use crate::ray::Ray;
use crate::seg::{Hit, Segment, SolidId};

/// Torus.
#[derive(Debug, Clone, PartialEq)]
pub struct Tor {
    /// Center.
    pub v: Point3,
    /// Axis normal; need not be unit length.
    pub n: Vec3,
    /// Distance from the center to the middle of the tube.
    pub r1: f64,
    /// Tube radius.
    pub r2: f64,
}

impl Tor {
    /// Create a torus.
    pub fn new(v: Point3, n: Vec3, r1: f64, r2: f64) -> Self {
        Self { v, n, r1, r2 }
    }
}

/// Prepped torus.
#[derive(Debug)]
pub struct TorSpecific {
    v: Point3,
    axis: Vec3,
    r1: f64,
    r2: f64,
}

impl TorSpecific {
    /// Outward normal: from the nearest point on the core circle.
    fn normal_at(&self, p: &Point3) -> Vec3 {
        let w = p - self.v;
        let radial = w - w.dot(&self.axis) * self.axis;
        let core = radial
            .try_normalize(f64::EPSILON)
            .map(|u| u * self.r1)
            .unwrap_or_else(Vec3::zeros);
        (w - core).try_normalize(f64::EPSILON).unwrap_or(self.axis)
    }
}

impl Primitive for Tor {
    const TYPE_ID: u32 = ID_TOR;
    const NAME: &'static str = "tor";
    type Specific = TorSpecific;

    fn import(r: &mut BodyReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            v: r.get_point()?,
            n: r.get_vec()?,
            r1: r.get_f64()?,
            r2: r.get_f64()?,
        })
    }

    fn export(&self, w: &mut BodyWriter) {
        w.put_point(&self.v)
            .put_vec(&self.n)
            .put_f64(self.r1)
            .put_f64(self.r2);
    }

    fn transform(&self, xform: &Transform) -> Result<Self, GeomError> {
        let scale = xform
            .uniform_scale(1e-9)
            .ok_or(GeomError::Transform { kind: Self::NAME })?;
        Ok(Self {
            v: xform.apply_point(&self.v),
            n: xform.apply_vec(&self.n) / scale,
            r1: self.r1 * scale,
            r2: self.r2 * scale,
        })
    }

    fn prep(&self, tol: &Tolerance) -> Result<(TorSpecific, Aabb3), GeomError> {
        check_finite(Self::NAME, self.v.coords.as_slice())?;
        check_finite(Self::NAME, self.n.as_slice())?;
        check_finite(Self::NAME, &[self.r1, self.r2])?;
        let axis = self
            .n
            .try_normalize(tol.dist_sq)
            .ok_or_else(|| GeomError::invalid(Self::NAME, "zero-length normal"))?;
        if self.r1 < tol.dist || self.r2 < tol.dist {
            return Err(GeomError::invalid(Self::NAME, "radius too small"));
        }
        if self.r2 > self.r1 {
            return Err(GeomError::invalid(Self::NAME, "tube radius exceeds sweep radius"));
        }

        let mut half = Vec3::zeros();
        for k in 0..3 {
            half[k] = self.r1 * (1.0 - axis[k] * axis[k]).max(0.0).sqrt() + self.r2;
        }
        let bounds = Aabb3::new(self.v - half, self.v + half);

        Ok((
            TorSpecific {
                v: self.v,
                axis,
                r1: self.r1,
                r2: self.r2,
            },
            bounds,
        ))
    }

    fn shoot(
        sp: &TorSpecific,
        ray: &Ray,
        tol: &Tolerance,
        id: SolidId,
        segs: &mut Vec<Segment>,
    ) -> Result<(), GeomError> {
        let d = ray.dir();
        // Move the origin to the point of closest approach to the center so
        // the quartic is well conditioned for distant rays.
        let shift = (sp.v - ray.origin).dot(d);
        let o = ray.at(shift) - sp.v;

        let r2 = sp.r1 * sp.r1;
        let a2 = sp.r2 * sp.r2;
        let od = o.dot(d);
        let oa = o.dot(&sp.axis);
        let da = d.dot(&sp.axis);
        let k = o.norm_squared() - (r2 + a2);

        // (|x|^2 - R^2 - a^2)^2 - 4R^2 (a^2 - h^2) = 0 along the unit-speed ray.
        let c4 = 1.0;
        let c3 = 4.0 * od;
        let c2 = 2.0 * k + 4.0 * od * od + 4.0 * r2 * da * da;
        let c1 = 4.0 * k * od + 8.0 * r2 * oa * da;
        let c0 = k * k - 4.0 * r2 * (a2 - oa * oa);

        let mut roots = solve_quartic(c4, c3, c2, c1, c0);
        roots.retain(|t| t.is_finite());
        roots.sort_by(f64::total_cmp);

        // A double root is a tangency: drop both crossings.
        let mut kept: Vec<f64> = Vec::with_capacity(4);
        let mut i = 0;
        while i < roots.len() {
            if i + 1 < roots.len() && roots[i + 1] - roots[i] < tol.dist * 1e-3 {
                i += 2;
                continue;
            }
            kept.push(roots[i]);
            i += 1;
        }

        if kept.len() % 2 != 0 {
            return Err(GeomError::degenerate(
                Self::NAME,
                format!("odd number of roots ({})", kept.len()),
            ));
        }

        for pair in kept.chunks_exact(2) {
            let (t_in, t_out) = (pair[0] + shift, pair[1] + shift);
            segs.push(Segment::new(
                id,
                Hit::new(t_in, sp.normal_at(&ray.at(t_in)), 0),
                Hit::new(t_out, sp.normal_at(&ray.at(t_out)), 0),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn shoot(tor: &Tor, origin: Point3, dir: Vec3) -> Vec<Segment> {
        let tol = Tolerance::default();
        let (sp, _) = tor.prep(&tol).unwrap();
        let ray = Ray::new(origin, dir).unwrap();
        let mut segs = Vec::new();
        Tor::shoot(&sp, &ray, &tol, SolidId(0), &mut segs).unwrap();
        segs
    }

    #[test]
    fn test_ray_through_center() {
        let tor = Tor::new(Point3::origin(), Vec3::z(), 10.0, 3.0);
        let segs = shoot(&tor, Point3::new(-20.0, 0.0, 0.0), Vec3::x());
        assert_eq!(segs.len(), 2);
        assert_relative_eq!(segs[0].inhit.dist, 7.0, epsilon = 1e-8);
        assert_relative_eq!(segs[0].outhit.dist, 13.0, epsilon = 1e-8);
        assert_relative_eq!(segs[1].inhit.dist, 27.0, epsilon = 1e-8);
        assert_relative_eq!(segs[1].outhit.dist, 33.0, epsilon = 1e-8);
        assert_relative_eq!(segs[0].inhit.normal, -Vec3::x(), epsilon = 1e-9);
        assert_relative_eq!(segs[0].outhit.normal, Vec3::x(), epsilon = 1e-9);
    }

    #[test]
    fn test_ray_off_axis_plane() {
        // Ray through the tube at height 1 and offset in y; the x-crossings
        // follow from ((sqrt(x^2 + y^2) - R)^2 + z^2 = r^2).
        let tor = Tor::new(Point3::origin(), Vec3::z(), 4.0, 2.0);
        let (y, z) = (1.0f64, 1.0f64);
        let segs = shoot(&tor, Point3::new(-20.0, y, z), Vec3::x());
        let w = (4.0f64 - z * z).sqrt();
        let outer = ((4.0 + w).powi(2) - y * y).sqrt();
        let inner = ((4.0 - w).powi(2) - y * y).sqrt();
        assert_eq!(segs.len(), 2);
        assert_relative_eq!(segs[0].inhit.dist, 20.0 - outer, epsilon = 1e-7);
        assert_relative_eq!(segs[0].outhit.dist, 20.0 - inner, epsilon = 1e-7);
        assert_relative_eq!(segs[1].inhit.dist, 20.0 + inner, epsilon = 1e-7);
        assert_relative_eq!(segs[1].outhit.dist, 20.0 + outer, epsilon = 1e-7);
    }

    #[test]
    fn test_ray_along_axis_through_hole() {
        let tor = Tor::new(Point3::origin(), Vec3::z(), 10.0, 3.0);
        assert!(shoot(&tor, Point3::new(0.0, 0.0, -20.0), Vec3::z()).is_empty());
    }

    #[test]
    fn test_ray_through_tube_vertically() {
        let tor = Tor::new(Point3::new(1.0, 1.0, 1.0), Vec3::z(), 10.0, 3.0);
        let segs = shoot(&tor, Point3::new(11.0, 1.0, -9.0), Vec3::z());
        assert_eq!(segs.len(), 1);
        assert_relative_eq!(segs[0].inhit.dist, 7.0, epsilon = 1e-7);
        assert_relative_eq!(segs[0].outhit.dist, 13.0, epsilon = 1e-7);
        assert_relative_eq!(segs[0].inhit.normal, -Vec3::z(), epsilon = 1e-6);
    }

    #[test]
    fn test_oblique_hits_lie_on_surface() {
        let tor = Tor::new(Point3::new(0.5, -0.5, 0.0), Vec3::new(0.0, 0.3, 1.0), 4.0, 1.0);
        let (sp, _) = tor.prep(&Tolerance::default()).unwrap();
        let ray = Ray::new(Point3::new(-12.0, 1.0, -2.0), Vec3::new(1.0, -0.1, 0.2)).unwrap();
        let mut segs = Vec::new();
        Tor::shoot(&sp, &ray, &Tolerance::default(), SolidId(0), &mut segs).unwrap();
        assert!(!segs.is_empty());
        for s in &segs {
            assert!(s.inhit.dist < s.outhit.dist);
            for t in [s.inhit.dist, s.outhit.dist] {
                let w = ray.at(t) - sp.v;
                let h = w.dot(&sp.axis);
                let rho = (w.norm_squared() - h * h).sqrt();
                let f = (rho - sp.r1).powi(2) + h * h - sp.r2 * sp.r2;
                assert!(f.abs() < 1e-6, "t = {t}, f = {f}");
            }
        }
    }

    #[test]
    fn test_miss_above() {
        let tor = Tor::new(Point3::origin(), Vec3::z(), 10.0, 3.0);
        assert!(shoot(&tor, Point3::new(-20.0, 0.0, 10.0), Vec3::x()).is_empty());
    }

    #[test]
    fn test_prep_and_bounds() {
        let tol = Tolerance::default();
        let tor = Tor::new(Point3::origin(), Vec3::new(0.0, 0.0, 2.0), 10.0, 3.0);
        let (_, b) = tor.prep(&tol).unwrap();
        assert_relative_eq!(b.max, Point3::new(13.0, 13.0, 3.0), epsilon = 1e-12);
        assert!(Tor::new(Point3::origin(), Vec3::z(), 1.0, 2.0).prep(&tol).is_err());
        assert!(Tor::new(Point3::origin(), Vec3::zeros(), 2.0, 1.0).prep(&tol).is_err());
    }

    #[test]
    fn test_transform_rejects_stretch() {
        let tor = Tor::new(Point3::origin(), Vec3::z(), 10.0, 3.0);
        assert!(tor.transform(&Transform::scale(1.0, 1.0, 3.0)).is_err());
        let t = tor.transform(&Transform::scale(0.5, 0.5, 0.5)).unwrap();
        assert_relative_eq!(t.r1, 5.0);
        assert_relative_eq!(t.r2, 1.5);
        assert_relative_eq!(t.n, Vec3::z());
    }
}
