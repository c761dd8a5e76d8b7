//! Decoding database records into typed objects and writing them back.

use csgrt_db::{BodyReader, Database, DbError, DirKey, ExternalRecord, RecordKind};
use csgrt_math::{Dir3, Point3, Transform, Vec3};
use tracing::debug;

use crate::comb::Comb;
use crate::error::{Result, RtError};
use crate::primitives::Solid;

/// Largest deviation from unit length accepted for a mirror normal.
const MIRROR_UNIT_TOL: f64 = 1e-6;

/// An object in internal form.
#[derive(Debug, Clone, PartialEq)]
pub enum Internal {
    /// A primitive solid.
    Solid(Solid),
    /// A combination.
    Comb(Comb),
}

impl Internal {
    /// Short kind name used in messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Internal::Solid(s) => s.type_name(),
            Internal::Comb(_) => "comb",
        }
    }

    /// Reflect about the plane through `point` with unit normal `normal`.
    pub fn mirror(&self, point: &Point3, normal: &Vec3) -> Result<Self> {
        if !point.coords.iter().chain(normal.iter()).all(|v| v.is_finite()) {
            return Err(RtError::InvalidMirror("plane is not finite"));
        }
        if (normal.norm() - 1.0).abs() > MIRROR_UNIT_TOL {
            return Err(RtError::InvalidMirror("normal is not unit length"));
        }
        let xform = Transform::mirror(point, &Dir3::new_normalize(*normal));
        match self {
            Internal::Solid(s) => s.transform(&xform).map(Internal::Solid).map_err(|source| {
                RtError::Prep {
                    name: s.type_name().to_string(),
                    source,
                }
            }),
            Internal::Comb(c) => Ok(Internal::Comb(c.transform(&xform))),
        }
    }

    fn to_record(&self, name: &str) -> std::result::Result<ExternalRecord, String> {
        match self {
            Internal::Solid(s) => {
                let body = s.export();
                if !body_is_finite(&body) {
                    return Err("non-finite parameter".into());
                }
                Ok(ExternalRecord::solid(name, s.type_id(), body))
            }
            Internal::Comb(c) => {
                c.validate_members()?;
                Ok(ExternalRecord::comb(name, c.export()))
            }
        }
    }
}

/// Solid bodies are plain sequences of f64.
fn body_is_finite(body: &[u8]) -> bool {
    let mut r = BodyReader::new(body);
    while r.remaining() >= 8 {
        match r.get_f64() {
            Ok(v) if v.is_finite() => {}
            _ => return false,
        }
    }
    true
}

/// Read and decode the object at `key`, applying `matrix` if given.
///
/// Nothing is returned on failure; a solid type that cannot represent the
/// matrix fails with [`RtError::Import`].
pub fn get_internal(db: &Database, key: DirKey, matrix: Option<&Transform>) -> Result<Internal> {
    let rec = db.get_external(key)?;
    if db.debug().verbose() {
        debug!(name = %rec.name, kind = ?rec.kind, type_id = rec.type_id, "get_internal");
    }
    match rec.kind {
        RecordKind::Solid => {
            let solid =
                Solid::import(rec.type_id, &rec.body).map_err(|e| RtError::import(&rec.name, e))?;
            let solid = match matrix {
                Some(m) => solid.transform(m).map_err(|e| RtError::import(&rec.name, e))?,
                None => solid,
            };
            Ok(Internal::Solid(solid))
        }
        RecordKind::Comb => {
            let comb = Comb::import(&rec.body).map_err(|e| RtError::import(&rec.name, e))?;
            Ok(Internal::Comb(match matrix {
                Some(m) => comb.transform(m),
                None => comb,
            }))
        }
        RecordKind::Ident => Err(RtError::WrongKind {
            name: rec.name,
            expected: "solid or combination",
        }),
    }
}

/// Encode `rep` and write it as the record of `key`.
///
/// On failure the stored record is unchanged.
pub fn put_internal(db: &mut Database, key: DirKey, rep: &Internal) -> Result<()> {
    let name = db.entry(key).ok_or(DbError::StaleEntry)?.name.clone();
    let rec = rep
        .to_record(&name)
        .map_err(|reason| RtError::Export { name: name.clone(), reason })?;
    if db.debug().verbose() {
        debug!(name = %name, kind = rep.kind_name(), len = rec.body.len(), "put_internal");
    }
    db.put_external(key, &rec)?;
    Ok(())
}

/// Create a new object `name` holding `rep`.
pub fn add_internal(db: &mut Database, name: &str, rep: &Internal) -> Result<DirKey> {
    let rec = rep.to_record(name).map_err(|reason| RtError::Export {
        name: name.to_string(),
        reason,
    })?;
    Ok(db.insert(&rec)?)
}

/// Write a mirrored copy of `src` as the new object `dst`.
pub fn copy_mirrored(
    db: &mut Database,
    src: &str,
    dst: &str,
    point: &Point3,
    normal: &Vec3,
) -> Result<DirKey> {
    let key = db.find(src)?;
    let mirrored = get_internal(db, key, None)?.mirror(point, normal)?;
    add_internal(db, dst, &mirrored)
}
