//! Injected debug level for kernel logging.

use serde::{Deserialize, Serialize};

/// How much the kernel logs through `tracing`.
///
/// Passed explicitly to the database and to the ray-tracing model instead of
/// living in process-wide state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DebugLevel {
    /// Nothing beyond warnings.
    #[default]
    None,
    /// Lifecycle events: open, close, scan, model build.
    Basic,
    /// Per-object and per-ray detail.
    Verbose,
}

impl DebugLevel {
    /// Lifecycle logging enabled.
    #[inline]
    pub fn basic(self) -> bool {
        self >= DebugLevel::Basic
    }

    /// Per-ray logging enabled.
    #[inline]
    pub fn verbose(self) -> bool {
        self >= DebugLevel::Verbose
    }
}
