//! Half-space `{ p : n . p <= d }`.

use csgrt_db::{BodyReader, BodyWriter, CodecError};
use csgrt_math::{Point3, Tolerance, Transform, Vec3};

use super::{check_finite, Primitive, ID_HALF};
use crate::bbox::Aabb3;
use crate::error::GeomError;
use crate::ray::Ray;
use crate::seg::{Hit, Segment, SolidId};

/// Half-space bounded by the plane `n . p = d`; `n` points out of the solid.
#[derive(Debug, Clone, PartialEq)]
pub struct Half {
    /// Outward plane normal.
    pub n: Vec3,
    /// Signed distance of the plane from the origin along `n`.
    pub d: f64,
}

impl Half {
    /// Create a half-space.
    pub fn new(n: Vec3, d: f64) -> Self {
        Self { n, d }
    }
}

/// Prepped half-space.
#[derive(Debug)]
pub struct HalfSpecific {
    normal: Vec3,
    d: f64,
}

impl Primitive for Half {
    const TYPE_ID: u32 = ID_HALF;
    const NAME: &'static str = "half";
    type Specific = HalfSpecific;

    fn import(r: &mut BodyReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            n: r.get_vec()?,
            d: r.get_f64()?,
        })
    }

    fn export(&self, w: &mut BodyWriter) {
        w.put_vec(&self.n).put_f64(self.d);
    }

    fn transform(&self, xform: &Transform) -> Result<Self, GeomError> {
        let len = self.n.norm();
        if len == 0.0 {
            return Err(GeomError::invalid(Self::NAME, "zero-length normal"));
        }
        let unit = self.n / len;
        let on_plane = Point3::from(unit * (self.d / len));
        let n = xform
            .apply_normal(&unit)
            .try_normalize(f64::EPSILON)
            .ok_or(GeomError::Transform { kind: Self::NAME })?;
        let d = n.dot(&xform.apply_point(&on_plane).coords);
        Ok(Self { n, d })
    }

    fn prep(&self, tol: &Tolerance) -> Result<(HalfSpecific, Aabb3), GeomError> {
        check_finite(Self::NAME, self.n.as_slice())?;
        check_finite(Self::NAME, &[self.d])?;
        let len = self.n.norm();
        if len < tol.dist_sq {
            return Err(GeomError::invalid(Self::NAME, "zero-length normal"));
        }
        Ok((
            HalfSpecific {
                normal: self.n / len,
                d: self.d / len,
            },
            Aabb3::infinite(),
        ))
    }

    fn shoot(
        sp: &HalfSpecific,
        ray: &Ray,
        _tol: &Tolerance,
        id: SolidId,
        segs: &mut Vec<Segment>,
    ) -> Result<(), GeomError> {
        let dn = sp.normal.dot(ray.dir());
        // Positive outside.
        let side = sp.normal.dot(&ray.origin.coords) - sp.d;
        let n = sp.normal;

        if dn.abs() < 1e-12 {
            // Parallel: all in or all out.
            if side > 0.0 {
                return Ok(());
            }
            segs.push(Segment::new(
                id,
                Hit::new(f64::NEG_INFINITY, -n, 0),
                Hit::new(f64::INFINITY, n, 0),
            ));
            return Ok(());
        }

        let t = -side / dn;
        let seg = if dn < 0.0 {
            Segment::new(id, Hit::new(t, n, 0), Hit::new(f64::INFINITY, n, 0))
        } else {
            Segment::new(id, Hit::new(f64::NEG_INFINITY, n, 0), Hit::new(t, n, 0))
        };
        segs.push(seg);
        Ok(())
    }
}
