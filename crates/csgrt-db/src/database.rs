//! Database instances: open, create, scan, read and write records.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use tracing::{debug, warn};

use crate::codec::{
    ExternalRecord, Ident, RecordHeader, RecordKind, COMB_FLAG_REGION, FLAG_FREE, GLOBAL_NAME,
    HEADER_LEN, IDENT_VERSION,
};
use crate::debug::DebugLevel;
use crate::directory::{DirEntry, DirKey, Directory, ObjectKind, RecordAddr};
use crate::error::{DbError, Result};
use crate::units::Units;

/// Read-only databases up to this size are held in memory.
pub const INMEM_LIMIT: u64 = 8 * 1024 * 1024;

/// Title written by [`Database::create`].
pub const DEFAULT_TITLE: &str = "Untitled csgrt Database";

/// Access mode for [`Database::open`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Shared, no mutation.
    ReadOnly,
    /// Exclusive, records may be written.
    ReadWrite,
}

impl OpenMode {
    /// Parse `"r"` or `"rw"` / `"r+w"`.
    pub fn parse(mode: &str) -> Option<Self> {
        match mode {
            "r" => Some(OpenMode::ReadOnly),
            "rw" | "r+w" => Some(OpenMode::ReadWrite),
            _ => None,
        }
    }
}

#[derive(Debug)]
enum Backing {
    Memory(Vec<u8>),
    File(Mutex<File>),
}

/// An open geometry database.
///
/// Reads take `&self` and may be shared between threads; writes take
/// `&mut self`. [`Database::close`] consumes the handle.
#[derive(Debug)]
pub struct Database {
    path: PathBuf,
    mode: OpenMode,
    backing: Backing,
    dir: Directory,
    eof: Option<u64>,
    units: Units,
    local2base: f64,
    base2local: f64,
    title: Option<String>,
    usable: bool,
    debug: DebugLevel,
    /// Writes at or past this offset fail.
    #[cfg(test)]
    fail_writes_from: Option<u64>,
}

impl Database {
    /// Open an existing database file.
    pub fn open(path: impl AsRef<Path>, mode: OpenMode) -> Result<Self> {
        Self::open_with_debug(path, mode, DebugLevel::None)
    }

    /// Open an existing database file, logging at `debug`.
    pub fn open_with_debug(path: impl AsRef<Path>, mode: OpenMode, debug: DebugLevel) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if debug.basic() {
            debug!(path = %path.display(), ?mode, "db_open");
        }

        let meta = match fs::metadata(&path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(DbError::FileNotFound { path });
            }
            Err(source) => return Err(DbError::Io { op: "stat", path, source }),
        };

        let backing = match mode {
            OpenMode::ReadOnly => {
                let mut file = File::open(&path).map_err(|source| DbError::Io {
                    op: "open",
                    path: path.clone(),
                    source,
                })?;
                if meta.len() <= INMEM_LIMIT {
                    let mut buf = Vec::with_capacity(meta.len() as usize);
                    file.read_to_end(&mut buf).map_err(|source| DbError::Io {
                        op: "read",
                        path: path.clone(),
                        source,
                    })?;
                    Backing::Memory(buf)
                } else {
                    Backing::File(Mutex::new(file))
                }
            }
            OpenMode::ReadWrite => {
                let file = OpenOptions::new()
                    .read(true)
                    .write(true)
                    .open(&path)
                    .map_err(|source| DbError::Io {
                        op: "open",
                        path: path.clone(),
                        source,
                    })?;
                Backing::File(Mutex::new(file))
            }
        };

        Ok(Self {
            path,
            mode,
            backing,
            dir: Directory::new(),
            eof: None,
            units: Units::Mm,
            local2base: 1.0,
            base2local: 1.0,
            title: None,
            usable: true,
            debug,
            #[cfg(test)]
            fail_writes_from: None,
        })
    }

    /// Create (or truncate) a database holding only an ident record, and
    /// open it read-write.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        Self::create_with_debug(path, DebugLevel::None)
    }

    /// [`Database::create`] with logging at `debug`.
    pub fn create_with_debug(path: impl AsRef<Path>, debug: DebugLevel) -> Result<Self> {
        let path = path.as_ref();
        if debug.basic() {
            debug!(path = %path.display(), "db_create");
        }
        let ident = Ident {
            version: IDENT_VERSION,
            units: Units::Mm.code(),
            title: DEFAULT_TITLE.to_string(),
        };
        fs::write(path, ident.to_record().encode()).map_err(|source| DbError::Io {
            op: "create",
            path: path.to_path_buf(),
            source,
        })?;
        Self::open_with_debug(path, OpenMode::ReadWrite, debug)
    }

    /// Flush and close the database, releasing every directory entry.
    pub fn close(self) -> Result<()> {
        let Database {
            path,
            mode,
            backing,
            dir,
            debug,
            ..
        } = self;
        if debug.basic() {
            debug!(path = %path.display(), entries = dir.len(), "db_close");
        }
        if let Backing::File(file) = backing {
            let file = file.into_inner().unwrap_or_else(PoisonError::into_inner);
            if mode == OpenMode::ReadWrite {
                file.sync_all()
                    .map_err(|source| DbError::Io { op: "sync", path, source })?;
            }
        }
        Ok(())
    }

    /// Walk every record and build the directory.
    ///
    /// Returns the number of entries. On failure the handle is left
    /// unusable and must be closed.
    pub fn scan(&mut self) -> Result<usize> {
        self.check_usable()?;
        match self.scan_records() {
            Ok(n) => Ok(n),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "db_scan failed");
                self.usable = false;
                self.dir.clear();
                Err(e)
            }
        }
    }

    fn scan_records(&mut self) -> Result<usize> {
        self.dir.clear();
        let total = self.file_len()?;
        let mut offset = 0u64;

        while offset < total {
            if total - offset < HEADER_LEN as u64 + 1 {
                return Err(DbError::Corrupt {
                    offset,
                    reason: "truncated record header".to_string(),
                });
            }
            let mut head = [0u8; HEADER_LEN];
            head.copy_from_slice(&self.read_at(offset, HEADER_LEN)?);
            let header =
                RecordHeader::from_bytes(&head).map_err(|reason| DbError::Corrupt { offset, reason })?;
            let len = header.record_len();
            if len > total - offset {
                return Err(DbError::Corrupt {
                    offset,
                    reason: "record extends past end of file".to_string(),
                });
            }

            if !header.is_free() {
                let bytes = self.read_at(offset, len as usize)?;
                let rec = ExternalRecord::decode(&bytes)
                    .map_err(|reason| DbError::Corrupt { offset, reason })?;
                let kind = match rec.kind {
                    RecordKind::Ident => {
                        self.apply_ident(&rec.body, offset)?;
                        ObjectKind::Ident
                    }
                    RecordKind::Solid => ObjectKind::Solid {
                        type_id: rec.type_id,
                    },
                    RecordKind::Comb => ObjectKind::Comb,
                };
                let mut entry = DirEntry::on_disk(rec.name, kind, RecordAddr { offset, len });
                entry.flags.region = is_region(kind, &rec.body);
                if self.debug.verbose() {
                    debug!(name = %entry.name, offset, len, "db_diradd");
                }
                self.dir.insert(entry)?;
            }
            offset += len;
        }

        self.eof = Some(offset);
        if self.debug.basic() {
            debug!(path = %self.path.display(), entries = self.dir.len(), eof = offset, "db_scan");
        }
        Ok(self.dir.len())
    }

    fn apply_ident(&mut self, body: &[u8], offset: u64) -> Result<()> {
        let ident = Ident::from_body(body).map_err(|e| DbError::Corrupt {
            offset,
            reason: format!("ident record: {e}"),
        })?;
        let units = Units::from_code(ident.units).ok_or_else(|| DbError::Corrupt {
            offset,
            reason: format!("unknown unit code {}", ident.units),
        })?;
        self.set_units_fields(units);
        self.title = Some(ident.title);
        Ok(())
    }

    fn set_units_fields(&mut self, units: Units) {
        self.units = units;
        self.local2base = units.to_mm();
        self.base2local = 1.0 / self.local2base;
    }

    /// Read an object's record.
    pub fn get_external(&self, key: DirKey) -> Result<ExternalRecord> {
        self.check_usable()?;
        let entry = self.dir.get(key).ok_or(DbError::StaleEntry)?;
        let addr = entry.addr.ok_or_else(|| DbError::Phony(entry.name.clone()))?;
        let bytes = self.read_at(addr.offset, addr.len as usize)?;
        let rec = ExternalRecord::decode(&bytes).map_err(|reason| DbError::Corrupt {
            offset: addr.offset,
            reason,
        })?;
        if rec.name != entry.name {
            return Err(DbError::Corrupt {
                offset: addr.offset,
                reason: format!("record name {:?} does not match entry {:?}", rec.name, entry.name),
            });
        }
        Ok(rec)
    }

    /// Write an object's record.
    ///
    /// The record is stored under the entry's name. A record whose length
    /// changes is appended at end of file and its old slot released.
    pub fn put_external(&mut self, key: DirKey, rec: &ExternalRecord) -> Result<()> {
        self.check_writable("put_external")?;
        self.check_usable()?;
        let entry = self.dir.get(key).ok_or(DbError::StaleEntry)?;
        let bytes = ExternalRecord {
            name: entry.name.clone(),
            ..rec.clone()
        }
        .encode();
        let new_len = bytes.len() as u64;
        let old = entry.addr;

        let eof = self.eof_or_len()?;
        let offset = match old {
            Some(addr) if addr.len == new_len => addr.offset,
            _ => eof,
        };
        // Free the old slot first; at most one live record carries the name.
        let released = match old {
            Some(addr) if addr.offset != offset => {
                let flags = self.read_at(addr.offset + 2, 1)?[0];
                self.write_at(addr.offset + 2, &[flags | FLAG_FREE])?;
                Some((addr.offset + 2, flags))
            }
            _ => None,
        };
        if let Err(e) = self.write_at(offset, &bytes) {
            if let Some((at, flags)) = released {
                if let Err(restore) = self.write_at(at, &[flags]) {
                    warn!(error = %restore, "could not restore released record");
                }
            }
            return Err(e);
        }
        if offset == eof {
            self.eof = Some(eof + new_len);
        }

        let kind = object_kind(rec);
        let region = is_region(kind, &rec.body);
        if let Some(entry) = self.dir.get_mut(key) {
            if self.debug.verbose() {
                debug!(name = %entry.name, offset, len = new_len, "db_put_external");
            }
            entry.addr = Some(RecordAddr {
                offset,
                len: new_len,
            });
            entry.kind = kind;
            entry.flags.phony = false;
            entry.flags.region = region;
        }
        Ok(())
    }

    /// Add a placeholder entry. Duplicate names are rejected.
    pub fn add(&mut self, name: &str, kind: ObjectKind) -> Result<DirKey> {
        self.check_writable("add")?;
        self.check_usable()?;
        self.dir.insert(DirEntry::phony(name, kind))
    }

    /// Add an entry for `rec` and write it.
    pub fn insert(&mut self, rec: &ExternalRecord) -> Result<DirKey> {
        self.check_writable("insert")?;
        let key = self.add(&rec.name, object_kind(rec))?;
        if let Err(e) = self.put_external(key, rec) {
            self.dir.remove(key);
            return Err(e);
        }
        Ok(key)
    }

    /// Release an object's record and remove its entry.
    pub fn delete(&mut self, key: DirKey) -> Result<DirEntry> {
        self.check_writable("delete")?;
        self.check_usable()?;
        let entry = self.dir.get(key).ok_or(DbError::StaleEntry)?;
        if entry.kind == ObjectKind::Ident {
            return Err(DbError::InvalidName {
                name: entry.name.clone(),
                reason: "the ident record cannot be deleted",
            });
        }
        let addr = entry.addr;
        if let Some(addr) = addr {
            self.write_at(addr.offset + 2, &[FLAG_FREE])?;
        }
        let entry = self.dir.remove(key).ok_or(DbError::StaleEntry)?;
        if self.debug.verbose() {
            debug!(name = %entry.name, "db_delete");
        }
        Ok(entry)
    }

    /// Change the database title.
    pub fn set_title(&mut self, title: &str) -> Result<()> {
        self.write_ident(self.units, title)?;
        self.title = Some(title.to_string());
        Ok(())
    }

    /// Change the database units.
    pub fn set_units(&mut self, units: Units) -> Result<()> {
        let title = self.title.clone().unwrap_or_default();
        self.write_ident(units, &title)?;
        self.set_units_fields(units);
        Ok(())
    }

    fn write_ident(&mut self, units: Units, title: &str) -> Result<()> {
        self.check_writable("update ident")?;
        let key = self.find(GLOBAL_NAME)?;
        let ident = Ident {
            version: IDENT_VERSION,
            units: units.code(),
            title: title.to_string(),
        };
        self.put_external(key, &ident.to_record())
    }

    /// Find an entry by name.
    pub fn lookup(&self, name: &str) -> Option<DirKey> {
        self.dir.lookup(name)
    }

    /// Find an entry by name, failing with `NotFound`.
    pub fn find(&self, name: &str) -> Result<DirKey> {
        self.lookup(name)
            .ok_or_else(|| DbError::NotFound(name.to_string()))
    }

    /// Borrow an entry.
    pub fn entry(&self, key: DirKey) -> Option<&DirEntry> {
        self.dir.get(key)
    }

    /// The directory.
    pub fn directory(&self) -> &Directory {
        &self.dir
    }

    /// Iterate entries in bucket order.
    pub fn iter(&self) -> impl Iterator<Item = (DirKey, &DirEntry)> + '_ {
        self.dir.iter()
    }

    /// Number of directory entries, the ident record included.
    pub fn len(&self) -> usize {
        self.dir.len()
    }

    /// True before a scan.
    pub fn is_empty(&self) -> bool {
        self.dir.is_empty()
    }

    /// Backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True if opened read-only.
    pub fn is_read_only(&self) -> bool {
        self.mode == OpenMode::ReadOnly
    }

    /// True if the whole file is held in memory.
    pub fn is_in_memory(&self) -> bool {
        matches!(self.backing, Backing::Memory(_))
    }

    /// Title from the ident record, once scanned.
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Database units.
    pub fn units(&self) -> Units {
        self.units
    }

    /// Local units to millimeters.
    pub fn local2base(&self) -> f64 {
        self.local2base
    }

    /// Millimeters to local units.
    pub fn base2local(&self) -> f64 {
        self.base2local
    }

    /// End of the last record, once scanned.
    pub fn eof(&self) -> Option<u64> {
        self.eof
    }

    /// Logging level for this handle.
    pub fn debug(&self) -> DebugLevel {
        self.debug
    }

    /// Change the logging level.
    pub fn set_debug(&mut self, debug: DebugLevel) {
        self.debug = debug;
    }

    fn check_usable(&self) -> Result<()> {
        if self.usable {
            Ok(())
        } else {
            Err(DbError::Unusable)
        }
    }

    fn check_writable(&self, op: &'static str) -> Result<()> {
        match self.mode {
            OpenMode::ReadWrite => Ok(()),
            OpenMode::ReadOnly => Err(DbError::ReadOnly { op }),
        }
    }

    fn eof_or_len(&self) -> Result<u64> {
        match self.eof {
            Some(eof) => Ok(eof),
            None => self.file_len(),
        }
    }

    fn file_len(&self) -> Result<u64> {
        match &self.backing {
            Backing::Memory(buf) => Ok(buf.len() as u64),
            Backing::File(file) => {
                let file = file.lock().unwrap_or_else(PoisonError::into_inner);
                file.metadata().map(|m| m.len()).map_err(|source| DbError::Io {
                    op: "stat",
                    path: self.path.clone(),
                    source,
                })
            }
        }
    }

    fn read_at(&self, offset: u64, len: usize) -> Result<Vec<u8>> {
        let past_end = || DbError::Corrupt {
            offset,
            reason: "read past end of file".to_string(),
        };
        match &self.backing {
            Backing::Memory(buf) => {
                let start = usize::try_from(offset).map_err(|_| past_end())?;
                let end = start.checked_add(len).ok_or_else(past_end)?;
                buf.get(start..end).map(<[u8]>::to_vec).ok_or_else(past_end)
            }
            Backing::File(file) => {
                let mut file = file.lock().unwrap_or_else(PoisonError::into_inner);
                let io = |source| DbError::Io {
                    op: "read",
                    path: self.path.clone(),
                    source,
                };
                file.seek(SeekFrom::Start(offset)).map_err(io)?;
                let mut buf = vec![0u8; len];
                file.read_exact(&mut buf).map_err(|e| {
                    if e.kind() == ErrorKind::UnexpectedEof {
                        past_end()
                    } else {
                        io(e)
                    }
                })?;
                Ok(buf)
            }
        }
    }

    fn write_at(&mut self, offset: u64, bytes: &[u8]) -> Result<()> {
        #[cfg(test)]
        if self.fail_writes_from.is_some_and(|from| offset >= from) {
            return Err(DbError::Io {
                op: "write",
                path: self.path.clone(),
                source: std::io::Error::other("injected write failure"),
            });
        }
        let path = &self.path;
        match &mut self.backing {
            Backing::File(file) => {
                let file = file.get_mut().unwrap_or_else(PoisonError::into_inner);
                let io = |source| DbError::Io {
                    op: "write",
                    path: path.clone(),
                    source,
                };
                file.seek(SeekFrom::Start(offset)).map_err(io)?;
                file.write_all(bytes).map_err(io)?;
                file.flush().map_err(io)
            }
            Backing::Memory(_) => Err(DbError::ReadOnly { op: "write" }),
        }
    }
}

fn object_kind(rec: &ExternalRecord) -> ObjectKind {
    match rec.kind {
        RecordKind::Ident => ObjectKind::Ident,
        RecordKind::Solid => ObjectKind::Solid {
            type_id: rec.type_id,
        },
        RecordKind::Comb => ObjectKind::Comb,
    }
}

fn is_region(kind: ObjectKind, body: &[u8]) -> bool {
    kind == ObjectKind::Comb && body.first().is_some_and(|f| f & COMB_FLAG_REGION != 0)
}
