#![warn(missing_docs)]

//! Geometry database access for the csgrt kernel.
//!
//! A database is a file of named, typed records. Opening it yields a
//! [`Database`] handle; [`Database::scan`] builds the in-memory
//! [`Directory`] that maps object names to record locations. Records are
//! read and written in external form ([`ExternalRecord`]); decoding them into
//! typed solids is the ray tracer's job.
//!
//! # Example
//!
//! ```no_run
//! use csgrt_db::{Database, OpenMode};
//!
//! let mut db = Database::open("model.g", OpenMode::ReadOnly)?;
//! db.scan()?;
//! for (_, entry) in db.iter() {
//!     println!("{}", entry.name);
//! }
//! db.close()?;
//! # Ok::<(), csgrt_db::DbError>(())
//! ```

pub mod codec;
mod database;
pub mod debug;
pub mod directory;
pub mod error;
mod units;

pub use codec::{BodyReader, BodyWriter, ExternalRecord, RecordKind, GLOBAL_NAME};
pub use database::{Database, OpenMode, DEFAULT_TITLE, INMEM_LIMIT};
pub use debug::DebugLevel;
pub use directory::{DirEntry, DirFlags, DirKey, Directory, ObjectKind, RecordAddr};
pub use error::{CodecError, DbError, Result};
pub use units::Units;
