//! Right circular cylinder: base center, height vector and radius.

use csgrt_db::{BodyReader, BodyWriter, CodecError};
use csgrt_math::{Point3, Tolerance, Transform, Vec3};

use super::{check_finite, Primitive, ID_RCC};
use crate::bbox::Aabb3;
use crate::error::GeomError;
use crate::ray::Ray;
use crate::seg::{Hit, Segment, SolidId};

/// Surface number of the curved side.
pub const RCC_BODY: u32 = 1;
/// Surface number of the base cap.
pub const RCC_BOTTOM: u32 = 2;
/// Surface number of the top cap.
pub const RCC_TOP: u32 = 3;

/// Right circular cylinder.
#[derive(Debug, Clone, PartialEq)]
pub struct Rcc {
    /// Center of the base.
    pub v: Point3,
    /// Axis from base center to top center.
    pub h: Vec3,
    /// Radius.
    pub r: f64,
}

impl Rcc {
    /// Create a cylinder.
    pub fn new(v: Point3, h: Vec3, r: f64) -> Self {
        Self { v, h, r }
    }
}

/// Prepped cylinder.
#[derive(Debug)]
pub struct RccSpecific {
    v: Point3,
    axis: Vec3,
    height: f64,
    r: f64,
}

impl RccSpecific {
    fn normal_at(&self, p: &Point3, surf: u32) -> Vec3 {
        match surf {
            RCC_BOTTOM => -self.axis,
            RCC_TOP => self.axis,
            _ => {
                let w = p - self.v;
                let radial = w - w.dot(&self.axis) * self.axis;
                radial.try_normalize(f64::EPSILON).unwrap_or(self.axis)
            }
        }
    }
}

impl Primitive for Rcc {
    const TYPE_ID: u32 = ID_RCC;
    const NAME: &'static str = "rcc";
    type Specific = RccSpecific;

    fn import(r: &mut BodyReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            v: r.get_point()?,
            h: r.get_vec()?,
            r: r.get_f64()?,
        })
    }

    fn export(&self, w: &mut BodyWriter) {
        w.put_point(&self.v).put_vec(&self.h).put_f64(self.r);
    }

    fn transform(&self, xform: &Transform) -> Result<Self, GeomError> {
        let scale = xform
            .uniform_scale(1e-9)
            .ok_or(GeomError::Transform { kind: Self::NAME })?;
        Ok(Self {
            v: xform.apply_point(&self.v),
            h: xform.apply_vec(&self.h),
            r: self.r * scale,
        })
    }

    fn prep(&self, tol: &Tolerance) -> Result<(RccSpecific, Aabb3), GeomError> {
        check_finite(Self::NAME, self.v.coords.as_slice())?;
        check_finite(Self::NAME, self.h.as_slice())?;
        check_finite(Self::NAME, &[self.r])?;
        let height = self.h.norm();
        if height < tol.dist {
            return Err(GeomError::invalid(Self::NAME, "zero-length height vector"));
        }
        if self.r < tol.dist {
            return Err(GeomError::invalid(Self::NAME, "radius too small"));
        }
        let axis = self.h / height;

        // A disk perpendicular to `axis` extends r*sqrt(1 - axis_k^2) along k.
        let mut half = Vec3::zeros();
        for k in 0..3 {
            half[k] = self.r * (1.0 - axis[k] * axis[k]).max(0.0).sqrt();
        }
        let top = self.v + self.h;
        let mut bounds = Aabb3::empty();
        for p in [self.v - half, self.v + half, top - half, top + half] {
            bounds.include_point(&p);
        }

        Ok((
            RccSpecific {
                v: self.v,
                axis,
                height,
                r: self.r,
            },
            bounds,
        ))
    }

    fn shoot(
        sp: &RccSpecific,
        ray: &Ray,
        _tol: &Tolerance,
        id: SolidId,
        segs: &mut Vec<Segment>,
    ) -> Result<(), GeomError> {
        let o = ray.origin - sp.v;
        let oz = o.dot(&sp.axis);
        let dz = ray.dir().dot(&sp.axis);

        // Slab between the caps.
        let (mut t_lo, mut t_hi) = (f64::NEG_INFINITY, f64::INFINITY);
        let (mut lo_surf, mut hi_surf) = (RCC_BODY, RCC_BODY);
        if dz.abs() < 1e-12 {
            if oz < 0.0 || oz > sp.height {
                return Ok(());
            }
        } else {
            let t_bottom = -oz / dz;
            let t_top = (sp.height - oz) / dz;
            if t_bottom < t_top {
                (t_lo, t_hi, lo_surf, hi_surf) = (t_bottom, t_top, RCC_BOTTOM, RCC_TOP);
            } else {
                (t_lo, t_hi, lo_surf, hi_surf) = (t_top, t_bottom, RCC_TOP, RCC_BOTTOM);
            }
        }

        // Infinite cylinder about the axis.
        let d_perp = ray.dir() - dz * sp.axis;
        let o_perp = o - oz * sp.axis;
        let a = d_perp.norm_squared();
        let c = o_perp.norm_squared() - sp.r * sp.r;
        let (mut t_in, mut t_out) = (t_lo, t_hi);
        let (mut in_surf, mut out_surf) = (lo_surf, hi_surf);
        if a < 1e-12 {
            if c > 0.0 {
                return Ok(());
            }
        } else {
            let b = 2.0 * o_perp.dot(&d_perp);
            let disc = b * b - 4.0 * a * c;
            if disc <= 0.0 {
                return Ok(());
            }
            let root = disc.sqrt();
            let c_lo = (-b - root) / (2.0 * a);
            let c_hi = (-b + root) / (2.0 * a);
            if c_lo > t_in {
                t_in = c_lo;
                in_surf = RCC_BODY;
            }
            if c_hi < t_out {
                t_out = c_hi;
                out_surf = RCC_BODY;
            }
        }

        if t_in >= t_out {
            return Ok(());
        }
        if !t_in.is_finite() || !t_out.is_finite() {
            return Err(GeomError::degenerate(Self::NAME, "unbounded intersection"));
        }
        segs.push(Segment::new(
            id,
            Hit::new(t_in, sp.normal_at(&ray.at(t_in), in_surf), in_surf),
            Hit::new(t_out, sp.normal_at(&ray.at(t_out), out_surf), out_surf),
        ));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit_rcc() -> Rcc {
        Rcc::new(Point3::origin(), Vec3::new(0.0, 0.0, 2.0), 1.0)
    }

    fn shoot(rcc: &Rcc, origin: Point3, dir: Vec3) -> Vec<Segment> {
        let tol = Tolerance::default();
        let (sp, _) = rcc.prep(&tol).unwrap();
        let ray = Ray::new(origin, dir).unwrap();
        let mut segs = Vec::new();
        Rcc::shoot(&sp, &ray, &tol, SolidId(0), &mut segs).unwrap();
        segs
    }

    #[test]
    fn test_side_shot() {
        let segs = shoot(&unit_rcc(), Point3::new(-5.0, 0.0, 1.0), Vec3::x());
        assert_eq!(segs.len(), 1);
        assert_relative_eq!(segs[0].inhit.dist, 4.0, epsilon = 1e-12);
        assert_relative_eq!(segs[0].outhit.dist, 6.0, epsilon = 1e-12);
        assert_eq!(segs[0].inhit.surfno, RCC_BODY);
        assert_relative_eq!(segs[0].inhit.normal, -Vec3::x(), epsilon = 1e-12);
    }

    #[test]
    fn test_axial_shot() {
        let segs = shoot(&unit_rcc(), Point3::new(0.5, 0.0, -3.0), Vec3::z());
        assert_relative_eq!(segs[0].inhit.dist, 3.0, epsilon = 1e-12);
        assert_relative_eq!(segs[0].outhit.dist, 5.0, epsilon = 1e-12);
        assert_eq!(segs[0].inhit.surfno, RCC_BOTTOM);
        assert_eq!(segs[0].outhit.surfno, RCC_TOP);
        assert_relative_eq!(segs[0].inhit.normal, -Vec3::z());
        assert_relative_eq!(segs[0].outhit.normal, Vec3::z());

        // Downward ray enters through the top.
        let segs = shoot(&unit_rcc(), Point3::new(0.0, 0.5, 10.0), -Vec3::z());
        assert_eq!(segs[0].inhit.surfno, RCC_TOP);
        assert_relative_eq!(segs[0].inhit.dist, 8.0, epsilon = 1e-12);
    }

    #[test]
    fn test_oblique_cap_to_side() {
        // Enters the bottom cap at the axis, leaves through the side.
        let dir = Vec3::new(1.0, 0.0, 1.0);
        let segs = shoot(&unit_rcc(), Point3::new(-1.0, 0.0, -1.0), dir);
        let s2 = 2f64.sqrt();
        assert_eq!(segs[0].inhit.surfno, RCC_BOTTOM);
        assert_relative_eq!(segs[0].inhit.dist, s2, epsilon = 1e-12);
        assert_eq!(segs[0].outhit.surfno, RCC_BODY);
        assert_relative_eq!(segs[0].outhit.dist, 2.0 * s2, epsilon = 1e-12);
    }

    #[test]
    fn test_misses() {
        let c = unit_rcc();
        assert!(shoot(&c, Point3::new(-5.0, 0.0, 3.0), Vec3::x()).is_empty());
        assert!(shoot(&c, Point3::new(2.0, 0.0, -3.0), Vec3::z()).is_empty());
        assert!(shoot(&c, Point3::new(-5.0, 2.0, 1.0), Vec3::x()).is_empty());
    }

    #[test]
    fn test_bounds_tilted() {
        let c = Rcc::new(Point3::origin(), Vec3::new(2.0, 0.0, 0.0), 0.5);
        let (_, b) = c.prep(&Tolerance::default()).unwrap();
        assert_relative_eq!(b.min, Point3::new(0.0, -0.5, -0.5), epsilon = 1e-12);
        assert_relative_eq!(b.max, Point3::new(2.0, 0.5, 0.5), epsilon = 1e-12);
    }

    #[test]
    fn test_transform() {
        let c = unit_rcc();
        let scaled = c.transform(&Transform::scale(2.0, 2.0, 2.0)).unwrap();
        assert_relative_eq!(scaled.r, 2.0);
        assert_relative_eq!(scaled.h, Vec3::new(0.0, 0.0, 4.0));
        assert!(matches!(
            c.transform(&Transform::scale(1.0, 2.0, 1.0)),
            Err(GeomError::Transform { kind: "rcc" })
        ));
    }

    #[test]
    fn test_prep_rejects_degenerate() {
        let tol = Tolerance::default();
        assert!(Rcc::new(Point3::origin(), Vec3::zeros(), 1.0).prep(&tol).is_err());
        assert!(Rcc::new(Point3::origin(), Vec3::z(), 0.0).prep(&tol).is_err());
    }
}
