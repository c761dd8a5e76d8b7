//! Primitive solids.
//!
//! Every solid type implements [`Primitive`]: decoding from and encoding to a
//! record body, transformation, validation into a prepped form with a
//! bounding box, and ray intersection producing [`Segment`]s. Releasing a
//! solid is its `Drop`.
//!
//! [`Solid`] is the closed set of supported types. The kernel dispatches
//! through it with a `match` and never special-cases a type.

mod arb8;
mod ell;
mod half;
mod rcc;
mod tor;

pub use arb8::{Arb8, ArbSpecific, ARB8_FACES};
pub use ell::{Ell, EllSpecific};
pub use half::{Half, HalfSpecific};
pub use rcc::{Rcc, RccSpecific};
pub use tor::{Tor, TorSpecific};

use std::fmt;

use csgrt_db::{BodyReader, BodyWriter, CodecError};
use csgrt_math::{Tolerance, Transform};

use crate::bbox::Aabb3;
use crate::error::GeomError;
use crate::ray::Ray;
use crate::seg::{Segment, SolidId};

/// Record type id of [`Tor`].
pub const ID_TOR: u32 = 1;
/// Record type id of [`Ell`].
pub const ID_ELL: u32 = 3;
/// Record type id of [`Arb8`].
pub const ID_ARB8: u32 = 4;
/// Record type id of [`Half`].
pub const ID_HALF: u32 = 6;
/// Record type id of [`Rcc`].
pub const ID_RCC: u32 = 7;

/// The per-type solid contract.
pub trait Primitive: Sized + Clone + PartialEq + fmt::Debug {
    /// Type id stored in the record header.
    const TYPE_ID: u32;
    /// Short type name used in messages.
    const NAME: &'static str;

    /// Data derived once at prep time and read by every shot.
    type Specific: fmt::Debug + Send + Sync;

    /// Decode from a record body.
    fn import(body: &mut BodyReader<'_>) -> Result<Self, CodecError>;

    /// Encode into a record body.
    fn export(&self, body: &mut BodyWriter);

    /// Apply an affine transform.
    fn transform(&self, xform: &Transform) -> Result<Self, GeomError>;

    /// Validate and precompute shot data and the bounding box.
    fn prep(&self, tol: &Tolerance) -> Result<(Self::Specific, Aabb3), GeomError>;

    /// Intersect `ray` with the prepped solid, appending at most a few
    /// segments tagged with `id`. A miss appends nothing.
    fn shoot(
        sp: &Self::Specific,
        ray: &Ray,
        tol: &Tolerance,
        id: SolidId,
        segs: &mut Vec<Segment>,
    ) -> Result<(), GeomError>;
}

/// Reject non-finite parameters before any geometry is derived from them.
pub(crate) fn check_finite(kind: &'static str, values: &[f64]) -> Result<(), GeomError> {
    if values.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(GeomError::invalid(kind, "non-finite parameter"))
    }
}

/// A decoded solid of any supported type.
#[derive(Debug, Clone, PartialEq)]
pub enum Solid {
    /// Ellipsoid.
    Ell(Ell),
    /// Convex eight-vertex polyhedron.
    Arb8(Arb8),
    /// Right circular cylinder.
    Rcc(Rcc),
    /// Torus.
    Tor(Tor),
    /// Half-space.
    Half(Half),
}

impl Solid {
    /// Type id stored in the record header.
    pub fn type_id(&self) -> u32 {
        match self {
            Solid::Ell(_) => Ell::TYPE_ID,
            Solid::Arb8(_) => Arb8::TYPE_ID,
            Solid::Rcc(_) => Rcc::TYPE_ID,
            Solid::Tor(_) => Tor::TYPE_ID,
            Solid::Half(_) => Half::TYPE_ID,
        }
    }

    /// Short type name.
    pub fn type_name(&self) -> &'static str {
        match self {
            Solid::Ell(_) => Ell::NAME,
            Solid::Arb8(_) => Arb8::NAME,
            Solid::Rcc(_) => Rcc::NAME,
            Solid::Tor(_) => Tor::NAME,
            Solid::Half(_) => Half::NAME,
        }
    }

    /// Type name for a record type id, if supported.
    pub fn name_of_type(type_id: u32) -> Option<&'static str> {
        match type_id {
            ID_ELL => Some(Ell::NAME),
            ID_ARB8 => Some(Arb8::NAME),
            ID_RCC => Some(Rcc::NAME),
            ID_TOR => Some(Tor::NAME),
            ID_HALF => Some(Half::NAME),
            _ => None,
        }
    }

    /// Decode a record body of the given type.
    pub fn import(type_id: u32, body: &[u8]) -> Result<Self, CodecError> {
        let mut r = BodyReader::new(body);
        let solid = match type_id {
            ID_ELL => Solid::Ell(Ell::import(&mut r)?),
            ID_ARB8 => Solid::Arb8(Arb8::import(&mut r)?),
            ID_RCC => Solid::Rcc(Rcc::import(&mut r)?),
            ID_TOR => Solid::Tor(Tor::import(&mut r)?),
            ID_HALF => Solid::Half(Half::import(&mut r)?),
            other => {
                return Err(CodecError::InvalidValue {
                    field: "type_id",
                    value: other.to_string(),
                })
            }
        };
        r.finish()?;
        Ok(solid)
    }

    /// Encode into a record body.
    pub fn export(&self) -> Vec<u8> {
        let mut w = BodyWriter::new();
        match self {
            Solid::Ell(s) => s.export(&mut w),
            Solid::Arb8(s) => s.export(&mut w),
            Solid::Rcc(s) => s.export(&mut w),
            Solid::Tor(s) => s.export(&mut w),
            Solid::Half(s) => s.export(&mut w),
        }
        w.finish()
    }

    /// Apply an affine transform.
    pub fn transform(&self, xform: &Transform) -> Result<Self, GeomError> {
        Ok(match self {
            Solid::Ell(s) => Solid::Ell(s.transform(xform)?),
            Solid::Arb8(s) => Solid::Arb8(s.transform(xform)?),
            Solid::Rcc(s) => Solid::Rcc(s.transform(xform)?),
            Solid::Tor(s) => Solid::Tor(s.transform(xform)?),
            Solid::Half(s) => Solid::Half(s.transform(xform)?),
        })
    }

    /// Validate and precompute everything a shot needs.
    pub fn prep(&self, tol: &Tolerance) -> Result<PreppedSolid, GeomError> {
        let (specific, bounds) = match self {
            Solid::Ell(s) => s.prep(tol).map(|(sp, b)| (Specific::Ell(sp), b))?,
            Solid::Arb8(s) => s.prep(tol).map(|(sp, b)| (Specific::Arb8(sp), b))?,
            Solid::Rcc(s) => s.prep(tol).map(|(sp, b)| (Specific::Rcc(sp), b))?,
            Solid::Tor(s) => s.prep(tol).map(|(sp, b)| (Specific::Tor(sp), b))?,
            Solid::Half(s) => s.prep(tol).map(|(sp, b)| (Specific::Half(sp), b))?,
        };
        Ok(PreppedSolid { specific, bounds })
    }
}

#[derive(Debug)]
enum Specific {
    Ell(EllSpecific),
    Arb8(ArbSpecific),
    Rcc(RccSpecific),
    Tor(TorSpecific),
    Half(HalfSpecific),
    #[cfg(test)]
    Failing,
}

/// A validated solid ready to be shot.
#[derive(Debug)]
pub struct PreppedSolid {
    specific: Specific,
    bounds: Aabb3,
}

impl PreppedSolid {
    /// Bounding box; infinite for unbounded solids.
    pub fn bounds(&self) -> &Aabb3 {
        &self.bounds
    }

    /// Short type name.
    pub fn type_name(&self) -> &'static str {
        match self.specific {
            Specific::Ell(_) => Ell::NAME,
            Specific::Arb8(_) => Arb8::NAME,
            Specific::Rcc(_) => Rcc::NAME,
            Specific::Tor(_) => Tor::NAME,
            Specific::Half(_) => Half::NAME,
            #[cfg(test)]
            Specific::Failing => "failing",
        }
    }

    /// Intersect a ray, appending segments tagged with `id`.
    pub fn shoot(
        &self,
        ray: &Ray,
        tol: &Tolerance,
        id: SolidId,
        segs: &mut Vec<Segment>,
    ) -> Result<(), GeomError> {
        match &self.specific {
            Specific::Ell(sp) => Ell::shoot(sp, ray, tol, id, segs),
            Specific::Arb8(sp) => Arb8::shoot(sp, ray, tol, id, segs),
            Specific::Rcc(sp) => Rcc::shoot(sp, ray, tol, id, segs),
            Specific::Tor(sp) => Tor::shoot(sp, ray, tol, id, segs),
            Specific::Half(sp) => Half::shoot(sp, ray, tol, id, segs),
            #[cfg(test)]
            Specific::Failing => Err(GeomError::degenerate("failing", "every ray")),
        }
    }

    /// A solid whose every shot fails, for exercising error isolation.
    #[cfg(test)]
    pub(crate) fn failing(bounds: Aabb3) -> Self {
        Self {
            specific: Specific::Failing,
            bounds,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use csgrt_math::{Point3, Vec3};

    fn samples() -> Vec<Solid> {
        vec![
            Solid::Ell(Ell::sphere(Point3::new(1.0, 2.0, 3.0), 1.5)),
            Solid::Arb8(Arb8::from_rpp(Point3::new(-1.0, -2.0, -3.0), Point3::new(1.0, 2.0, 3.0))),
            Solid::Rcc(Rcc::new(Point3::origin(), Vec3::new(0.0, 0.0, 4.0), 0.5)),
            Solid::Tor(Tor::new(Point3::origin(), Vec3::z(), 4.0, 1.0)),
            Solid::Half(Half::new(Vec3::x(), 2.0)),
        ]
    }

    #[test]
    fn test_import_export_every_type() {
        for solid in samples() {
            let body = solid.export();
            let back = Solid::import(solid.type_id(), &body).unwrap();
            assert_eq!(back, solid, "{}", solid.type_name());
        }
    }

    #[test]
    fn test_import_unknown_type() {
        let err = Solid::import(99, &[]).unwrap_err();
        assert!(matches!(err, CodecError::InvalidValue { field: "type_id", .. }));
        assert_eq!(Solid::name_of_type(99), None);
        assert_eq!(Solid::name_of_type(ID_TOR), Some("tor"));
    }

    #[test]
    fn test_import_truncated_and_trailing() {
        let body = samples()[0].export();
        assert!(matches!(
            Solid::import(ID_ELL, &body[..body.len() - 1]),
            Err(CodecError::Truncated { .. })
        ));
        let mut long = body.clone();
        long.push(0);
        assert!(matches!(
            Solid::import(ID_ELL, &long),
            Err(CodecError::Trailing(1))
        ));
    }

    #[test]
    fn test_prep_every_type() {
        let tol = Tolerance::default();
        for solid in samples() {
            let prepped = solid.prep(&tol).unwrap();
            assert_eq!(prepped.type_name(), solid.type_name());
            if matches!(solid, Solid::Half(_)) {
                assert!(!prepped.bounds().is_finite());
            } else {
                assert!(prepped.bounds().is_finite());
            }
        }
    }

    #[test]
    fn test_mirror_every_type() {
        let tol = Tolerance::default();
        let m = Transform::mirror(&Point3::new(5.0, 0.0, 0.0), &csgrt_math::Dir3::new_normalize(Vec3::x()));
        for solid in samples() {
            let mirrored = solid.transform(&m).unwrap();
            assert!(mirrored.prep(&tol).is_ok(), "{}", solid.type_name());
            // Mirroring twice restores the solid.
            let back = mirrored.transform(&m).unwrap();
            let a = solid.prep(&tol).unwrap();
            let b = back.prep(&tol).unwrap();
            if a.bounds().is_finite() {
                assert!((a.bounds().min - b.bounds().min).norm() < 1e-9);
                assert!((a.bounds().max - b.bounds().max).norm() < 1e-9);
            }
        }
    }
}
