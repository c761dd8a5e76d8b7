//! Name-keyed object directory.
//!
//! Entries live in a generation-checked slot map; a fixed table of hash
//! buckets chains the keys by name. Iteration walks the buckets in order.

use slotmap::{new_key_type, SlotMap};

use crate::error::{DbError, Result};

/// Number of hash buckets. Must be a power of two.
pub const DIR_HASH_BUCKETS: usize = 128;

/// Longest accepted object name in bytes.
pub const MAX_NAME_LEN: usize = 255;

new_key_type! {
    /// Handle to a directory entry. Becomes stale when the entry is removed.
    pub struct DirKey;
}

/// What kind of object an entry names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    /// The database ident record.
    Ident,
    /// A primitive solid with the given type id.
    Solid {
        /// Solid type id carried in the record header.
        type_id: u32,
    },
    /// A boolean combination.
    Comb,
}

/// Location of a record in the backing file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordAddr {
    /// Byte offset of the record header.
    pub offset: u64,
    /// Total record length.
    pub len: u64,
}

/// Entry flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirFlags {
    /// Placeholder without an on-disk record.
    pub phony: bool,
    /// Not listed to users (the ident record).
    pub hidden: bool,
    /// Combination marked as a region.
    pub region: bool,
}

/// One named object.
#[derive(Debug, Clone, PartialEq)]
pub struct DirEntry {
    /// Unique object name.
    pub name: String,
    /// Object kind.
    pub kind: ObjectKind,
    /// Flags.
    pub flags: DirFlags,
    /// On-disk location, `None` while phony.
    pub addr: Option<RecordAddr>,
}

impl DirEntry {
    /// Entry for a record that exists on disk.
    pub fn on_disk(name: impl Into<String>, kind: ObjectKind, addr: RecordAddr) -> Self {
        Self {
            name: name.into(),
            kind,
            flags: DirFlags {
                hidden: kind == ObjectKind::Ident,
                ..DirFlags::default()
            },
            addr: Some(addr),
        }
    }

    /// Placeholder entry not yet written.
    pub fn phony(name: impl Into<String>, kind: ObjectKind) -> Self {
        Self {
            name: name.into(),
            kind,
            flags: DirFlags {
                phony: true,
                ..DirFlags::default()
            },
            addr: None,
        }
    }

    /// True for primitive solids.
    pub fn is_solid(&self) -> bool {
        matches!(self.kind, ObjectKind::Solid { .. })
    }

    /// True for combinations.
    pub fn is_comb(&self) -> bool {
        self.kind == ObjectKind::Comb
    }
}

/// Hash an object name into a bucket index.
///
/// Position-weighted byte sum, masked to the bucket count.
pub fn dir_hash(name: &str) -> usize {
    let mut sum: usize = 0;
    for (i, b) in name.bytes().enumerate() {
        sum = sum.wrapping_add(b as usize * (i + 1));
    }
    sum & (DIR_HASH_BUCKETS - 1)
}

/// Reject names the record format or the directory cannot hold.
pub fn validate_name(name: &str) -> Result<()> {
    let reason = if name.is_empty() {
        "empty name"
    } else if name.len() > MAX_NAME_LEN {
        "name too long"
    } else if name.contains('\0') || name.contains('/') {
        "name contains '/' or NUL"
    } else {
        return Ok(());
    };
    Err(DbError::InvalidName {
        name: name.to_string(),
        reason,
    })
}

/// In-memory directory of a database.
#[derive(Debug, Clone)]
pub struct Directory {
    entries: SlotMap<DirKey, DirEntry>,
    buckets: Vec<Vec<DirKey>>,
}

impl Default for Directory {
    fn default() -> Self {
        Self::new()
    }
}

impl Directory {
    /// Empty directory.
    pub fn new() -> Self {
        Self {
            entries: SlotMap::with_key(),
            buckets: vec![Vec::new(); DIR_HASH_BUCKETS],
        }
    }

    /// Find an entry by name.
    pub fn lookup(&self, name: &str) -> Option<DirKey> {
        self.buckets[dir_hash(name)]
            .iter()
            .copied()
            .find(|&key| self.entries[key].name == name)
    }

    /// Borrow an entry.
    pub fn get(&self, key: DirKey) -> Option<&DirEntry> {
        self.entries.get(key)
    }

    /// Mutably borrow an entry. The name must not be changed through this.
    pub(crate) fn get_mut(&mut self, key: DirKey) -> Option<&mut DirEntry> {
        self.entries.get_mut(key)
    }

    /// Insert a new entry. Duplicate names are rejected.
    pub fn insert(&mut self, entry: DirEntry) -> Result<DirKey> {
        validate_name(&entry.name)?;
        if self.lookup(&entry.name).is_some() {
            return Err(DbError::Duplicate(entry.name));
        }
        let bucket = dir_hash(&entry.name);
        let key = self.entries.insert(entry);
        // Newest first, matching head insertion into a chain
        self.buckets[bucket].insert(0, key);
        Ok(key)
    }

    /// Remove an entry, returning it.
    pub fn remove(&mut self, key: DirKey) -> Option<DirEntry> {
        let entry = self.entries.remove(key)?;
        let bucket = &mut self.buckets[dir_hash(&entry.name)];
        bucket.retain(|&k| k != key);
        Some(entry)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
        for bucket in &mut self.buckets {
            bucket.clear();
        }
    }

    /// Iterate entries bucket by bucket.
    pub fn iter(&self) -> impl Iterator<Item = (DirKey, &DirEntry)> + '_ {
        self.buckets
            .iter()
            .flat_map(move |bucket| bucket.iter().map(move |&key| (key, &self.entries[key])))
    }

    /// Keys of one bucket, newest first.
    pub fn bucket(&self, index: usize) -> &[DirKey] {
        &self.buckets[index]
    }
}
