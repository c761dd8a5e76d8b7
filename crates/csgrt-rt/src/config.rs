//! Ray tracer configuration, loadable from TOML.
//!
//! ```toml
//! workers = 4
//! chunk_size = 32
//! debug = "basic"
//!
//! [tolerance]
//! dist = 0.005
//! perp = 1e-6
//!
//! [cut]
//! max_leaf_solids = 8
//! max_depth = 24
//! ```

use std::path::Path;

use csgrt_db::DebugLevel;
use csgrt_math::Tolerance;
use serde::{Deserialize, Serialize};

use crate::error::{Result, RtError};

/// Distance and angle tolerances.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToleranceConfig {
    /// Distance below which two ray parameters are equal (mm).
    pub dist: f64,
    /// Cosine below which two directions are perpendicular.
    pub perp: f64,
}

impl Default for ToleranceConfig {
    fn default() -> Self {
        Self {
            dist: Tolerance::DEFAULT.dist,
            perp: Tolerance::DEFAULT.perp,
        }
    }
}

/// Cut tree construction limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CutConfig {
    /// A node holding more solids than this is split.
    pub max_leaf_solids: usize,
    /// Nodes at this depth are never split.
    pub max_depth: usize,
}

impl Default for CutConfig {
    fn default() -> Self {
        Self {
            max_leaf_solids: 8,
            max_depth: 24,
        }
    }
}

/// Top-level configuration for model building and shooting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RtConfig {
    /// Worker threads for batches; 0 uses the available parallelism.
    pub workers: usize,
    /// Rays handed to a worker per scheduling step.
    pub chunk_size: usize,
    /// Logging level.
    pub debug: DebugLevel,
    /// Tolerances.
    pub tolerance: ToleranceConfig,
    /// Cut tree limits.
    pub cut: CutConfig,
}

impl Default for RtConfig {
    fn default() -> Self {
        Self {
            workers: 0,
            chunk_size: 16,
            debug: DebugLevel::None,
            tolerance: ToleranceConfig::default(),
            cut: CutConfig::default(),
        }
    }
}

impl RtConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|e| RtError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| RtError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Serialize to TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| RtError::Config(e.to_string()))
    }

    /// Reject values no model could be built with.
    pub fn validate(&self) -> Result<()> {
        let t = &self.tolerance;
        if !(t.dist.is_finite() && t.dist > 0.0) {
            return Err(RtError::Config(format!("tolerance.dist must be positive, got {}", t.dist)));
        }
        if !(t.perp.is_finite() && t.perp > 0.0 && t.perp < 1.0) {
            return Err(RtError::Config(format!("tolerance.perp must be in (0, 1), got {}", t.perp)));
        }
        if self.cut.max_leaf_solids == 0 {
            return Err(RtError::Config("cut.max_leaf_solids must be at least 1".into()));
        }
        if self.chunk_size == 0 {
            return Err(RtError::Config("chunk_size must be at least 1".into()));
        }
        Ok(())
    }

    /// Tolerance model built from the configured values.
    pub fn tolerance(&self) -> Tolerance {
        Tolerance::new(self.tolerance.dist, self.tolerance.perp)
    }

    /// Number of workers to start.
    pub fn worker_count(&self) -> usize {
        if self.workers > 0 {
            return self.workers;
        }
        std::thread::available_parallelism().map_or(1, |n| n.get())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_document() {
        let config = RtConfig::from_toml_str("").unwrap();
        assert_eq!(config, RtConfig::default());
        assert_eq!(config.tolerance(), Tolerance::DEFAULT);
        assert!(config.worker_count() >= 1);
    }

    #[test]
    fn test_partial_document() {
        let config = RtConfig::from_toml_str(
            r#"
            workers = 3
            debug = "verbose"

            [cut]
            max_depth = 6
            "#,
        )
        .unwrap();
        assert_eq!(config.workers, 3);
        assert_eq!(config.worker_count(), 3);
        assert_eq!(config.debug, DebugLevel::Verbose);
        assert_eq!(config.cut.max_depth, 6);
        assert_eq!(config.cut.max_leaf_solids, 8);
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            RtConfig::from_toml_str("[tolerance]\ndist = -1.0"),
            Err(RtError::Config(_))
        ));
        assert!(matches!(
            RtConfig::from_toml_str("chunk_size = 0"),
            Err(RtError::Config(_))
        ));
        assert!(matches!(
            RtConfig::from_toml_str("debug = \"loud\""),
            Err(RtError::Config(_))
        ));
    }

    #[test]
    fn test_round_trip_and_load() {
        let mut config = RtConfig::default();
        config.cut.max_leaf_solids = 2;
        config.debug = DebugLevel::Basic;
        let text = config.to_toml_string().unwrap();
        assert_eq!(RtConfig::from_toml_str(&text).unwrap(), config);

        let path = std::env::temp_dir().join(format!("csgrt_config_{}.toml", std::process::id()));
        std::fs::write(&path, text).unwrap();
        assert_eq!(RtConfig::load(&path).unwrap(), config);
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(RtConfig::load(&path), Err(RtError::Config(_))));
    }
}
