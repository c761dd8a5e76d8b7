//! Convex polyhedron with eight vertices.
//!
//! Vertices 0..4 form one quadrilateral face and 4..8 the opposite face.
//! Coincident vertices collapse faces, so wedges, pyramids and tetrahedra
//! are all expressed as an arb8. Each face plane is oriented outward and a
//! ray is clipped against all of them.

use csgrt_db::{BodyReader, BodyWriter, CodecError};
use csgrt_math::{Point3, Tolerance, Transform, Vec3};

use super::{check_finite, Primitive, ID_ARB8};
use crate::bbox::Aabb3;
use crate::error::GeomError;
use crate::ray::Ray;
use crate::seg::{Hit, Segment, SolidId};

/// Vertex indices of the six faces.
pub const ARB8_FACES: [[usize; 4]; 6] = [
    [0, 1, 2, 3],
    [7, 6, 5, 4],
    [0, 3, 7, 4],
    [1, 5, 6, 2],
    [0, 4, 5, 1],
    [3, 2, 6, 7],
];

/// Arbitrary convex polyhedron with eight vertices.
#[derive(Debug, Clone, PartialEq)]
pub struct Arb8 {
    /// Vertices.
    pub pts: [Point3; 8],
}

impl Arb8 {
    /// Create from eight vertices.
    pub fn new(pts: [Point3; 8]) -> Self {
        Self { pts }
    }

    /// Axis-aligned box ("rpp") between `min` and `max`.
    pub fn from_rpp(min: Point3, max: Point3) -> Self {
        Self::new([
            Point3::new(max.x, min.y, min.z),
            Point3::new(max.x, max.y, min.z),
            Point3::new(max.x, max.y, max.z),
            Point3::new(max.x, min.y, max.z),
            Point3::new(min.x, min.y, min.z),
            Point3::new(min.x, max.y, min.z),
            Point3::new(min.x, max.y, max.z),
            Point3::new(min.x, min.y, max.z),
        ])
    }
}

/// One outward-facing face plane: `normal . p = dist` on the surface.
#[derive(Debug, Clone, Copy)]
struct FacePlane {
    normal: Vec3,
    dist: f64,
    face: u32,
}

/// Prepped arb8.
#[derive(Debug)]
pub struct ArbSpecific {
    planes: Vec<FacePlane>,
}

/// Newell's method; robust for nearly planar and partly collapsed quads.
fn newell_normal(pts: &[Point3; 8], face: &[usize; 4]) -> Vec3 {
    let mut n = Vec3::zeros();
    for i in 0..4 {
        let p = pts[face[i]];
        let q = pts[face[(i + 1) % 4]];
        n.x += (p.y - q.y) * (p.z + q.z);
        n.y += (p.z - q.z) * (p.x + q.x);
        n.z += (p.x - q.x) * (p.y + q.y);
    }
    n
}

impl Primitive for Arb8 {
    const TYPE_ID: u32 = ID_ARB8;
    const NAME: &'static str = "arb8";
    type Specific = ArbSpecific;

    fn import(r: &mut BodyReader<'_>) -> Result<Self, CodecError> {
        let mut pts = [Point3::origin(); 8];
        for p in pts.iter_mut() {
            *p = r.get_point()?;
        }
        Ok(Self { pts })
    }

    fn export(&self, w: &mut BodyWriter) {
        for p in &self.pts {
            w.put_point(p);
        }
    }

    fn transform(&self, xform: &Transform) -> Result<Self, GeomError> {
        Ok(Self {
            pts: self.pts.map(|p| xform.apply_point(&p)),
        })
    }

    fn prep(&self, tol: &Tolerance) -> Result<(ArbSpecific, Aabb3), GeomError> {
        for p in &self.pts {
            check_finite(Self::NAME, p.coords.as_slice())?;
        }

        let centroid = Point3::from(
            self.pts.iter().fold(Vec3::zeros(), |acc, p| acc + p.coords) / 8.0,
        );

        let mut planes = Vec::with_capacity(6);
        for (fi, face) in ARB8_FACES.iter().enumerate() {
            let n = newell_normal(&self.pts, face);
            let len = n.norm();
            // Twice the face area; collapsed faces drop out.
            if len < tol.dist_sq {
                continue;
            }
            let mut normal = n / len;
            let center = face.iter().fold(Vec3::zeros(), |acc, &i| acc + self.pts[i].coords) / 4.0;
            let mut dist = normal.dot(&center);
            let side = normal.dot(&centroid.coords) - dist;
            if side.abs() < tol.dist {
                return Err(GeomError::invalid(Self::NAME, "solid has no volume"));
            }
            if side > 0.0 {
                normal = -normal;
                dist = -dist;
            }
            planes.push(FacePlane {
                normal,
                dist,
                face: fi as u32,
            });
        }
        if planes.len() < 4 {
            return Err(GeomError::invalid(Self::NAME, "fewer than four faces"));
        }
        for plane in &planes {
            for p in &self.pts {
                if plane.normal.dot(&p.coords) - plane.dist > tol.dist {
                    return Err(GeomError::invalid(
                        Self::NAME,
                        format!("face {} is not planar or the solid is not convex", plane.face),
                    ));
                }
            }
        }

        let mut bounds = Aabb3::empty();
        for p in &self.pts {
            bounds.include_point(p);
        }
        Ok((ArbSpecific { planes }, bounds))
    }

    fn shoot(
        sp: &ArbSpecific,
        ray: &Ray,
        _tol: &Tolerance,
        id: SolidId,
        segs: &mut Vec<Segment>,
    ) -> Result<(), GeomError> {
        let mut t_in = f64::NEG_INFINITY;
        let mut t_out = f64::INFINITY;
        let mut in_plane = None;
        let mut out_plane = None;

        for plane in &sp.planes {
            let dn = plane.normal.dot(ray.dir());
            // Positive when the origin is outside this plane.
            let side = plane.normal.dot(&ray.origin.coords) - plane.dist;
            if dn.abs() < 1e-12 {
                if side > 0.0 {
                    return Ok(());
                }
                continue;
            }
            let t = -side / dn;
            if dn < 0.0 {
                if t > t_in {
                    t_in = t;
                    in_plane = Some(plane);
                }
            } else if t < t_out {
                t_out = t;
                out_plane = Some(plane);
            }
            if t_in >= t_out {
                return Ok(());
            }
        }

        match (in_plane, out_plane) {
            (Some(a), Some(b)) => {
                segs.push(Segment::new(
                    id,
                    Hit::new(t_in, a.normal, a.face),
                    Hit::new(t_out, b.normal, b.face),
                ));
                Ok(())
            }
            _ => Err(GeomError::degenerate(Self::NAME, "ray is not bounded by the face planes")),
        }
    }
}
