//! Engine configuration
//!
//! Limits and numeric tolerances shared by every operation. The defaults
//! are what the free functions in the crate root use.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{MathError, MathResult};

/// Limits and tolerances for the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum tree depth accepted by the parser and every tree operation
    pub max_depth: usize,
    /// Node visits allowed per evaluate / simplify / rationalize call
    pub max_operations: usize,
    /// Pivots with a smaller magnitude make the matrix singular
    pub pivot_epsilon: f64,
    /// Solution entries within this distance of an integer are snapped to it
    pub snap_tolerance: f64,
    /// Largest integer power of a sum the rationalizer expands
    pub max_expand_power: u32,
}

impl EngineConfig {
    pub const DEFAULT_MAX_DEPTH: usize = 200;
    pub const DEFAULT_MAX_OPERATIONS: usize = 1_000_000;

    pub fn new(max_depth: usize, max_operations: usize) -> Self {
        Self {
            max_depth,
            max_operations,
            ..Self::default()
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_max_operations(mut self, max_operations: usize) -> Self {
        self.max_operations = max_operations;
        self
    }

    /// Parse a configuration from JSON; missing fields keep their defaults.
    pub fn from_json_str(json: &str) -> MathResult<Self> {
        let config: EngineConfig =
            serde_json::from_str(json).map_err(|e| MathError::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON configuration file
    pub fn load(path: impl AsRef<Path>) -> MathResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| MathError::config(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> MathResult<()> {
        if self.max_depth == 0 {
            return Err(MathError::config("max_depth must be at least 1"));
        }
        if self.max_operations == 0 {
            return Err(MathError::config("max_operations must be at least 1"));
        }
        if !(self.pivot_epsilon >= 0.0 && self.snap_tolerance >= 0.0) {
            return Err(MathError::config("tolerances must be non-negative numbers"));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_depth: Self::DEFAULT_MAX_DEPTH,
            max_operations: Self::DEFAULT_MAX_OPERATIONS,
            pivot_epsilon: 1e-12,
            snap_tolerance: 1e-10,
            max_expand_power: 8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = EngineConfig::from_json_str(r#"{ "max_depth": 50 }"#).unwrap();
        assert_eq!(config.max_depth, 50);
        assert_eq!(config.max_operations, EngineConfig::DEFAULT_MAX_OPERATIONS);
        assert_eq!(config.pivot_epsilon, 1e-12);
    }

    #[test]
    fn test_rejects_zero_depth() {
        let err = EngineConfig::from_json_str(r#"{ "max_depth": 0 }"#).unwrap_err();
        assert_eq!(err.kind(), "ConfigError");
    }

    #[test]
    fn test_rejects_malformed_json() {
        assert!(EngineConfig::from_json_str("{ max_depth: ").is_err());
    }
}
