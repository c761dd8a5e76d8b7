//! Error types for model building and ray tracing.

use csgrt_db::DbError;
use thiserror::Error;

/// Errors raised by a single primitive while validating or intersecting.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeomError {
    /// Solid parameters do not describe a valid solid.
    #[error("invalid {kind}: {reason}")]
    InvalidShape {
        /// Primitive type name.
        kind: &'static str,
        /// What is wrong with it.
        reason: String,
    },

    /// The intersection could not be computed reliably.
    #[error("{kind} intersection degenerate: {reason}")]
    Degeneracy {
        /// Primitive type name.
        kind: &'static str,
        /// What went wrong.
        reason: String,
    },

    /// The primitive cannot represent the requested transform.
    #[error("{kind} cannot represent a non-uniform transform")]
    Transform {
        /// Primitive type name.
        kind: &'static str,
    },
}

impl GeomError {
    pub(crate) fn invalid(kind: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidShape {
            kind,
            reason: reason.into(),
        }
    }

    pub(crate) fn degenerate(kind: &'static str, reason: impl Into<String>) -> Self {
        Self::Degeneracy {
            kind,
            reason: reason.into(),
        }
    }
}

/// Errors raised by model building and ray tracing.
#[derive(Error, Debug)]
pub enum RtError {
    /// Database access failed.
    #[error(transparent)]
    Db(#[from] DbError),

    /// A record could not be decoded into an internal representation.
    #[error("import of {name} failed: {reason}")]
    Import {
        /// Object name.
        name: String,
        /// Why decoding failed.
        reason: String,
    },

    /// An internal representation could not be encoded.
    #[error("export of {name} failed: {reason}")]
    Export {
        /// Object name.
        name: String,
        /// Why encoding failed.
        reason: String,
    },

    /// Ray origin or direction is unusable.
    #[error("invalid ray: {0}")]
    InvalidRay(&'static str),

    /// A primitive failed while intersecting a ray.
    #[error("shot at {name} failed: {source}")]
    GeometricDegeneracy {
        /// Solid name.
        name: String,
        /// Primitive failure.
        #[source]
        source: GeomError,
    },

    /// A solid failed validation during prep.
    #[error("prep of {name} failed: {source}")]
    Prep {
        /// Solid name.
        name: String,
        /// Primitive failure.
        #[source]
        source: GeomError,
    },

    /// A combination refers back to itself.
    #[error("combination {0} references itself")]
    CyclicCombination(String),

    /// The object exists but is the wrong kind for the operation.
    #[error("{name} is not a {expected}")]
    WrongKind {
        /// Object name.
        name: String,
        /// Kind that was required.
        expected: &'static str,
    },

    /// Mirror plane is unusable.
    #[error("invalid mirror plane: {0}")]
    InvalidMirror(&'static str),

    /// Configuration is invalid or unreadable.
    #[error("configuration error: {0}")]
    Config(String),

    /// Worker pool could not be started.
    #[error("thread pool: {0}")]
    ThreadPool(String),
}

impl RtError {
    pub(crate) fn import(name: &str, reason: impl ToString) -> Self {
        Self::Import {
            name: name.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Result type for ray tracing operations.
pub type Result<T> = std::result::Result<T, RtError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_carry_name() {
        let e = RtError::Prep {
            name: "ball.s".into(),
            source: GeomError::invalid("ell", "zero-length axis"),
        };
        let msg = e.to_string();
        assert!(msg.contains("ball.s"));
        assert!(msg.contains("zero-length axis"));

        let e = RtError::from(DbError::NotFound("gone".into()));
        assert_eq!(e.to_string(), "object not found: gone");
    }
}
