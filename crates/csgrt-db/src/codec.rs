//! On-disk record layout.
//!
//! A database file is a sequence of variable-length records:
//!
//! ```text
//! 0      magic1 (0x76)
//! 1      kind (1 = ident, 2 = solid, 3 = combination)
//! 2      flags (bit 0 = free)
//! 3      reserved
//! 4..8   name length, u32 big-endian
//! 8..12  body length, u32 big-endian
//! 12..16 type id, u32 big-endian (solids only)
//! ...    name bytes (UTF-8)
//! ...    body bytes
//! last   magic2 (0x35)
//! ```
//!
//! All multi-byte body fields are big-endian as well.

use csgrt_math::{Point3, Transform, Vec3};

use crate::error::CodecError;

/// First byte of every record.
pub const MAGIC1: u8 = 0x76;
/// Last byte of every record.
pub const MAGIC2: u8 = 0x35;
/// Fixed header size in bytes.
pub const HEADER_LEN: usize = 16;
/// Record flag: the slot has been released and is skipped by scans.
pub const FLAG_FREE: u8 = 0x01;
/// Combination body flag byte: the combination is a region.
pub const COMB_FLAG_REGION: u8 = 0x01;
/// Name given to the ident record in the directory.
pub const GLOBAL_NAME: &str = "_GLOBAL";
/// Ident record format version.
pub const IDENT_VERSION: u32 = 1;

/// What a record holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    /// Database header: version, units, title.
    Ident,
    /// A primitive solid; the header's type id says which.
    Solid,
    /// A boolean combination of other objects.
    Comb,
}

impl RecordKind {
    fn code(self) -> u8 {
        match self {
            RecordKind::Ident => 1,
            RecordKind::Solid => 2,
            RecordKind::Comb => 3,
        }
    }

    fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(RecordKind::Ident),
            2 => Some(RecordKind::Solid),
            3 => Some(RecordKind::Comb),
            _ => None,
        }
    }
}

/// Fixed-size record header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    /// Record kind.
    pub kind: RecordKind,
    /// Flag bits.
    pub flags: u8,
    /// Name length in bytes.
    pub name_len: u32,
    /// Body length in bytes.
    pub body_len: u32,
    /// Solid type id, zero for other kinds.
    pub type_id: u32,
}

impl RecordHeader {
    /// Serialize header to bytes.
    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut bytes = [0u8; HEADER_LEN];
        bytes[0] = MAGIC1;
        bytes[1] = self.kind.code();
        bytes[2] = self.flags;
        bytes[4..8].copy_from_slice(&self.name_len.to_be_bytes());
        bytes[8..12].copy_from_slice(&self.body_len.to_be_bytes());
        bytes[12..16].copy_from_slice(&self.type_id.to_be_bytes());
        bytes
    }

    /// Parse header from bytes.
    pub fn from_bytes(bytes: &[u8; HEADER_LEN]) -> Result<Self, String> {
        if bytes[0] != MAGIC1 {
            return Err(format!("bad magic byte 0x{:02x}", bytes[0]));
        }
        let kind = RecordKind::from_code(bytes[1])
            .ok_or_else(|| format!("unknown record kind {}", bytes[1]))?;
        let word = |at: usize| u32::from_be_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);
        Ok(Self {
            kind,
            flags: bytes[2],
            name_len: word(4),
            body_len: word(8),
            type_id: word(12),
        })
    }

    /// True if the slot has been released.
    pub fn is_free(&self) -> bool {
        self.flags & FLAG_FREE != 0
    }

    /// Total record length on disk, trailer included.
    pub fn record_len(&self) -> u64 {
        HEADER_LEN as u64 + self.name_len as u64 + self.body_len as u64 + 1
    }
}

/// One object's record in external (on-disk) form.
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalRecord {
    /// Record kind.
    pub kind: RecordKind,
    /// Solid type id, zero for idents and combinations.
    pub type_id: u32,
    /// Object name.
    pub name: String,
    /// Type-specific body.
    pub body: Vec<u8>,
}

impl ExternalRecord {
    /// Create a solid record.
    pub fn solid(name: impl Into<String>, type_id: u32, body: Vec<u8>) -> Self {
        Self {
            kind: RecordKind::Solid,
            type_id,
            name: name.into(),
            body,
        }
    }

    /// Create a combination record.
    pub fn comb(name: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            kind: RecordKind::Comb,
            type_id: 0,
            name: name.into(),
            body,
        }
    }

    /// Header describing this record.
    pub fn header(&self) -> RecordHeader {
        RecordHeader {
            kind: self.kind,
            flags: 0,
            name_len: self.name.len() as u32,
            body_len: self.body.len() as u32,
            type_id: self.type_id,
        }
    }

    /// Length of the encoded record.
    pub fn encoded_len(&self) -> u64 {
        self.header().record_len()
    }

    /// Encode to on-disk bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len() as usize);
        out.extend_from_slice(&self.header().to_bytes());
        out.extend_from_slice(self.name.as_bytes());
        out.extend_from_slice(&self.body);
        out.push(MAGIC2);
        out
    }

    /// Decode a complete record.
    pub fn decode(bytes: &[u8]) -> Result<Self, String> {
        if bytes.len() < HEADER_LEN + 1 {
            return Err(format!("record too short ({} bytes)", bytes.len()));
        }
        let mut head = [0u8; HEADER_LEN];
        head.copy_from_slice(&bytes[..HEADER_LEN]);
        let header = RecordHeader::from_bytes(&head)?;
        if header.record_len() != bytes.len() as u64 {
            return Err(format!(
                "record length mismatch: header says {}, have {}",
                header.record_len(),
                bytes.len()
            ));
        }
        if bytes[bytes.len() - 1] != MAGIC2 {
            return Err("missing record trailer".to_string());
        }
        let name_end = HEADER_LEN + header.name_len as usize;
        let name = std::str::from_utf8(&bytes[HEADER_LEN..name_end])
            .map_err(|_| "object name is not valid UTF-8".to_string())?
            .to_string();
        let body = bytes[name_end..bytes.len() - 1].to_vec();
        Ok(Self {
            kind: header.kind,
            type_id: header.type_id,
            name,
            body,
        })
    }
}

/// Builds a record body.
#[derive(Debug, Default)]
pub struct BodyWriter {
    buf: Vec<u8>,
}

impl BodyWriter {
    /// Empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a byte.
    pub fn put_u8(&mut self, v: u8) -> &mut Self {
        self.buf.push(v);
        self
    }

    /// Append a big-endian u32.
    pub fn put_u32(&mut self, v: u32) -> &mut Self {
        self.buf.extend_from_slice(&v.to_be_bytes());
        self
    }

    /// Append a big-endian f64.
    pub fn put_f64(&mut self, v: f64) -> &mut Self {
        self.buf.extend_from_slice(&v.to_be_bytes());
        self
    }

    /// Append a length-prefixed UTF-8 string.
    pub fn put_str(&mut self, s: &str) -> &mut Self {
        self.put_u32(s.len() as u32);
        self.buf.extend_from_slice(s.as_bytes());
        self
    }

    /// Append a point as three f64.
    pub fn put_point(&mut self, p: &Point3) -> &mut Self {
        self.put_f64(p.x).put_f64(p.y).put_f64(p.z)
    }

    /// Append a vector as three f64.
    pub fn put_vec(&mut self, v: &Vec3) -> &mut Self {
        self.put_f64(v.x).put_f64(v.y).put_f64(v.z)
    }

    /// Append a matrix as 16 row-major f64.
    pub fn put_matrix(&mut self, m: &Transform) -> &mut Self {
        for v in m.to_row_array() {
            self.put_f64(v);
        }
        self
    }

    /// Finish and return the body bytes.
    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

/// Reads fields back out of a record body.
#[derive(Debug)]
pub struct BodyReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> BodyReader<'a> {
    /// Start reading at the beginning of `buf`.
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        if self.buf.len() - self.pos < n {
            return Err(CodecError::Truncated {
                need: n,
                at: self.pos,
                have: self.buf.len(),
            });
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    /// Read a byte.
    pub fn get_u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.take(1)?[0])
    }

    /// Read a big-endian u32.
    pub fn get_u32(&mut self) -> Result<u32, CodecError> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Read a big-endian f64.
    pub fn get_f64(&mut self) -> Result<f64, CodecError> {
        let b = self.take(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(b);
        Ok(f64::from_be_bytes(raw))
    }

    /// Read a length-prefixed UTF-8 string.
    pub fn get_str(&mut self) -> Result<String, CodecError> {
        let len = self.get_u32()? as usize;
        let at = self.pos;
        let bytes = self.take(len)?;
        std::str::from_utf8(bytes)
            .map(str::to_string)
            .map_err(|_| CodecError::InvalidUtf8(at))
    }

    /// Read a point.
    pub fn get_point(&mut self) -> Result<Point3, CodecError> {
        Ok(Point3::new(self.get_f64()?, self.get_f64()?, self.get_f64()?))
    }

    /// Read a vector.
    pub fn get_vec(&mut self) -> Result<Vec3, CodecError> {
        Ok(Vec3::new(self.get_f64()?, self.get_f64()?, self.get_f64()?))
    }

    /// Read a 16-value row-major matrix.
    pub fn get_matrix(&mut self) -> Result<Transform, CodecError> {
        let mut values = [0.0; 16];
        for v in values.iter_mut() {
            *v = self.get_f64()?;
        }
        Ok(Transform::from_row_slice(&values))
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Fail if anything is left unread.
    pub fn finish(self) -> Result<(), CodecError> {
        match self.remaining() {
            0 => Ok(()),
            n => Err(CodecError::Trailing(n)),
        }
    }
}

/// Contents of the ident record.
#[derive(Debug, Clone, PartialEq)]
pub struct Ident {
    /// Format version.
    pub version: u32,
    /// Unit code, see [`crate::Units`].
    pub units: u32,
    /// Database title.
    pub title: String,
}

impl Ident {
    /// Encode as the `_GLOBAL` record.
    pub fn to_record(&self) -> ExternalRecord {
        let mut w = BodyWriter::new();
        w.put_u32(self.version).put_u32(self.units).put_str(&self.title);
        ExternalRecord {
            kind: RecordKind::Ident,
            type_id: 0,
            name: GLOBAL_NAME.to_string(),
            body: w.finish(),
        }
    }

    /// Decode an ident body.
    pub fn from_body(body: &[u8]) -> Result<Self, CodecError> {
        let mut r = BodyReader::new(body);
        let ident = Self {
            version: r.get_u32()?,
            units: r.get_u32()?,
            title: r.get_str()?,
        };
        r.finish()?;
        Ok(ident)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        let rec = ExternalRecord::solid("s1", 3, vec![1, 2, 3]);
        let bytes = rec.encode();
        assert_eq!(bytes.len(), HEADER_LEN + 2 + 3 + 1);
        assert_eq!(bytes[0], MAGIC1);
        assert_eq!(*bytes.last().unwrap(), MAGIC2);
        // type id is big-endian at 12..16
        assert_eq!(&bytes[12..16], &[0, 0, 0, 3]);
        assert_eq!(ExternalRecord::decode(&bytes).unwrap(), rec);
    }

    #[test]
    fn test_decode_rejects_bad_magic() {
        let mut bytes = ExternalRecord::comb("c", vec![]).encode();
        bytes[0] = 0;
        assert!(ExternalRecord::decode(&bytes).is_err());
    }

    #[test]
    fn test_decode_rejects_missing_trailer() {
        let mut bytes = ExternalRecord::comb("c", vec![9]).encode();
        let last = bytes.len() - 1;
        bytes[last] = 0;
        assert!(ExternalRecord::decode(&bytes).is_err());
    }

    #[test]
    fn test_body_reader_truncation() {
        let mut w = BodyWriter::new();
        w.put_f64(1.5);
        let body = w.finish();
        let mut r = BodyReader::new(&body[..5]);
        assert!(matches!(r.get_f64(), Err(CodecError::Truncated { need: 8, .. })));
    }

    #[test]
    fn test_body_reader_trailing() {
        let mut w = BodyWriter::new();
        w.put_u32(7).put_u8(1);
        let body = w.finish();
        let mut r = BodyReader::new(&body);
        assert_eq!(r.get_u32().unwrap(), 7);
        assert_eq!(r.finish(), Err(CodecError::Trailing(1)));
    }

    #[test]
    fn test_ident_body() {
        let ident = Ident {
            version: IDENT_VERSION,
            units: 4,
            title: "bracket".to_string(),
        };
        let rec = ident.to_record();
        assert_eq!(rec.name, GLOBAL_NAME);
        assert_eq!(Ident::from_body(&rec.body).unwrap(), ident);
    }
}
