//! Ellipsoid given by a center and three mutually perpendicular semi-axes.

use csgrt_db::{BodyReader, BodyWriter, CodecError};
use csgrt_math::{Point3, Tolerance, Transform, Vec3};
use nalgebra::Matrix3;

use super::{check_finite, Primitive, ID_ELL};
use crate::bbox::Aabb3;
use crate::error::GeomError;
use crate::ray::Ray;
use crate::seg::{Hit, Segment, SolidId};

/// Cosine above which two semi-axes are not accepted as perpendicular.
const AXIS_DOT_TOL: f64 = 0.001;

/// Ellipsoid with center `v` and semi-axes `a`, `b`, `c`.
#[derive(Debug, Clone, PartialEq)]
pub struct Ell {
    /// Center.
    pub v: Point3,
    /// First semi-axis.
    pub a: Vec3,
    /// Second semi-axis.
    pub b: Vec3,
    /// Third semi-axis.
    pub c: Vec3,
}

impl Ell {
    /// Create an ellipsoid from its center and semi-axes.
    pub fn new(v: Point3, a: Vec3, b: Vec3, c: Vec3) -> Self {
        Self { v, a, b, c }
    }

    /// Sphere of radius `r` centered at `center`.
    pub fn sphere(center: Point3, r: f64) -> Self {
        Self::new(center, Vec3::x() * r, Vec3::y() * r, Vec3::z() * r)
    }
}

/// Prepped ellipsoid.
#[derive(Debug)]
pub struct EllSpecific {
    v: Point3,
    /// Maps `p - v` into the unit sphere frame.
    to_unit: Matrix3<f64>,
    /// `to_unit^T * to_unit`, for normals.
    normal_map: Matrix3<f64>,
}

impl Primitive for Ell {
    const TYPE_ID: u32 = ID_ELL;
    const NAME: &'static str = "ell";
    type Specific = EllSpecific;

    fn import(r: &mut BodyReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            v: r.get_point()?,
            a: r.get_vec()?,
            b: r.get_vec()?,
            c: r.get_vec()?,
        })
    }

    fn export(&self, w: &mut BodyWriter) {
        w.put_point(&self.v)
            .put_vec(&self.a)
            .put_vec(&self.b)
            .put_vec(&self.c);
    }

    fn transform(&self, xform: &Transform) -> Result<Self, GeomError> {
        Ok(Self {
            v: xform.apply_point(&self.v),
            a: xform.apply_vec(&self.a),
            b: xform.apply_vec(&self.b),
            c: xform.apply_vec(&self.c),
        })
    }

    fn prep(&self, tol: &Tolerance) -> Result<(EllSpecific, Aabb3), GeomError> {
        check_finite(Self::NAME, self.v.coords.as_slice())?;
        for axis in [&self.a, &self.b, &self.c] {
            check_finite(Self::NAME, axis.as_slice())?;
            if axis.norm() < tol.dist {
                return Err(GeomError::invalid(Self::NAME, "zero-length semi-axis"));
            }
        }
        let (ua, ub, uc) = (self.a.normalize(), self.b.normalize(), self.c.normalize());
        if ua.dot(&ub).abs() > AXIS_DOT_TOL
            || ub.dot(&uc).abs() > AXIS_DOT_TOL
            || ua.dot(&uc).abs() > AXIS_DOT_TOL
        {
            return Err(GeomError::invalid(Self::NAME, "semi-axes are not perpendicular"));
        }

        let to_unit = Matrix3::from_rows(&[
            (self.a / self.a.norm_squared()).transpose(),
            (self.b / self.b.norm_squared()).transpose(),
            (self.c / self.c.norm_squared()).transpose(),
        ]);
        let normal_map = to_unit.transpose() * to_unit;

        let mut half = Vec3::zeros();
        for k in 0..3 {
            half[k] = (self.a[k] * self.a[k] + self.b[k] * self.b[k] + self.c[k] * self.c[k]).sqrt();
        }
        let bounds = Aabb3::new(self.v - half, self.v + half);

        Ok((
            EllSpecific {
                v: self.v,
                to_unit,
                normal_map,
            },
            bounds,
        ))
    }

    fn shoot(
        sp: &EllSpecific,
        ray: &Ray,
        _tol: &Tolerance,
        id: SolidId,
        segs: &mut Vec<Segment>,
    ) -> Result<(), GeomError> {
        // |P + tD|^2 = 1 in the unit sphere frame.
        let p = sp.to_unit * (ray.origin - sp.v);
        let d = sp.to_unit * ray.dir();

        let a = d.norm_squared();
        let b = 2.0 * p.dot(&d);
        let c = p.norm_squared() - 1.0;
        let disc = b * b - 4.0 * a * c;
        if disc <= 0.0 {
            // Tangent rays miss.
            return Ok(());
        }
        let root = disc.sqrt();
        let t_in = (-b - root) / (2.0 * a);
        let t_out = (-b + root) / (2.0 * a);

        let normal = |t: f64| -> Vec3 {
            let n = sp.normal_map * (ray.at(t) - sp.v);
            n.try_normalize(f64::EPSILON).unwrap_or_else(|| -ray.dir())
        };
        segs.push(Segment::new(
            id,
            Hit::new(t_in, normal(t_in), 0),
            Hit::new(t_out, normal(t_out), 0),
        ));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn shoot(ell: &Ell, origin: Point3, dir: Vec3) -> Vec<Segment> {
        let tol = Tolerance::default();
        let (sp, _) = ell.prep(&tol).unwrap();
        let ray = Ray::new(origin, dir).unwrap();
        let mut segs = Vec::new();
        Ell::shoot(&sp, &ray, &tol, SolidId(0), &mut segs).unwrap();
        segs
    }

    #[test]
    fn test_sphere_hit() {
        let segs = shoot(&Ell::sphere(Point3::origin(), 1.0), Point3::new(-5.0, 0.0, 0.0), Vec3::x());
        assert_eq!(segs.len(), 1);
        assert_relative_eq!(segs[0].inhit.dist, 4.0, epsilon = 1e-12);
        assert_relative_eq!(segs[0].outhit.dist, 6.0, epsilon = 1e-12);
        assert_relative_eq!(segs[0].inhit.normal, -Vec3::x(), epsilon = 1e-12);
        assert_relative_eq!(segs[0].outhit.normal, Vec3::x(), epsilon = 1e-12);
    }

    #[test]
    fn test_sphere_miss_and_tangent() {
        let s = Ell::sphere(Point3::origin(), 1.0);
        assert!(shoot(&s, Point3::new(-5.0, 2.0, 0.0), Vec3::x()).is_empty());
        assert!(shoot(&s, Point3::new(-5.0, 1.0, 0.0), Vec3::x()).is_empty());
    }

    #[test]
    fn test_origin_inside() {
        let segs = shoot(&Ell::sphere(Point3::origin(), 2.0), Point3::origin(), Vec3::y());
        assert_eq!(segs.len(), 1);
        assert_relative_eq!(segs[0].inhit.dist, -2.0, epsilon = 1e-12);
        assert_relative_eq!(segs[0].outhit.dist, 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_ellipsoid_along_long_axis() {
        let e = Ell::new(
            Point3::new(1.0, 0.0, 0.0),
            Vec3::new(3.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(0.0, 0.0, 0.5),
        );
        let segs = shoot(&e, Point3::new(-10.0, 0.0, 0.0), Vec3::x());
        assert_relative_eq!(segs[0].inhit.dist, 8.0, epsilon = 1e-9);
        assert_relative_eq!(segs[0].outhit.dist, 14.0, epsilon = 1e-9);
        let (_, bounds) = e.prep(&Tolerance::default()).unwrap();
        assert_relative_eq!(bounds.min, Point3::new(-2.0, -1.0, -0.5), epsilon = 1e-12);
        assert_relative_eq!(bounds.max, Point3::new(4.0, 1.0, 0.5), epsilon = 1e-12);
    }

    #[test]
    fn test_prep_rejects_bad_axes() {
        let tol = Tolerance::default();
        let flat = Ell::new(Point3::origin(), Vec3::x(), Vec3::y(), Vec3::zeros());
        assert!(flat.prep(&tol).is_err());
        let skew = Ell::new(Point3::origin(), Vec3::x(), Vec3::new(1.0, 1.0, 0.0), Vec3::z());
        assert!(skew.prep(&tol).is_err());
        let nan = Ell::new(Point3::new(f64::NAN, 0.0, 0.0), Vec3::x(), Vec3::y(), Vec3::z());
        assert!(nan.prep(&tol).is_err());
    }

    #[test]
    fn test_transform_scales_axes() {
        let s = Ell::sphere(Point3::origin(), 1.0);
        let t = s.transform(&Transform::translation(1.0, 2.0, 3.0).then(&Transform::scale(2.0, 1.0, 1.0))).unwrap();
        assert_relative_eq!(t.v, Point3::new(1.0, 2.0, 3.0));
        assert_relative_eq!(t.a, Vec3::new(2.0, 0.0, 0.0));
        assert!(t.prep(&Tolerance::default()).is_ok());
    }
}
