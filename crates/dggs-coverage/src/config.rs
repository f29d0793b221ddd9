//! Configuration for resampling.

use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::CoverageError;

/// Configuration of a [`crate::ResampledResource`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResampleConfig {
    /// Evaluate target cells on the rayon pool, one evaluator per worker.
    pub parallel: bool,

    /// Pre-fill value of floating point bands. Serialized as `null` when NaN.
    #[serde(deserialize_with = "nan_if_null")]
    pub fill_value: f64,

    /// Extent multiplier used when a regular grid is synthesized from an
    /// envelope and a resolution.
    pub oversampling: f64,

    /// Largest target coverage a single read may allocate.
    pub max_cells: usize,

    /// Source evaluator returns no value outside its coverage.
    pub null_if_outside: bool,

    /// Source evaluator wraps longitudes into its coverage.
    pub wraparound: bool,
}

impl Default for ResampleConfig {
    fn default() -> Self {
        Self {
            parallel: true,
            fill_value: f64::NAN,
            oversampling: 2.0,
            max_cells: 50_000_000,
            null_if_outside: true,
            wraparound: true,
        }
    }
}

fn nan_if_null<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
}

fn parse_flag(val: &str) -> bool {
    val.to_lowercase() == "true" || val == "1"
}

impl ResampleConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("DGGS_RESAMPLE_PARALLEL") {
            config.parallel = parse_flag(&val);
        }

        if let Ok(val) = std::env::var("DGGS_FILL_VALUE") {
            if let Ok(fill) = val.parse() {
                config.fill_value = fill;
            }
        }

        if let Ok(val) = std::env::var("DGGS_OVERSAMPLING") {
            if let Ok(factor) = val.parse() {
                config.oversampling = factor;
            }
        }

        if let Ok(val) = std::env::var("DGGS_MAX_CELLS") {
            if let Ok(cells) = val.parse() {
                config.max_cells = cells;
            }
        }

        if let Ok(val) = std::env::var("DGGS_NULL_IF_OUTSIDE") {
            config.null_if_outside = parse_flag(&val);
        }

        if let Ok(val) = std::env::var("DGGS_WRAPAROUND") {
            config.wraparound = parse_flag(&val);
        }

        config
    }

    /// Load and validate configuration from a JSON file. Missing keys keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> crate::error::Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate().map_err(CoverageError::config)?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if !(self.oversampling > 0.0) || !self.oversampling.is_finite() {
            return Err("oversampling must be > 0".to_string());
        }

        if self.max_cells == 0 {
            return Err("max_cells must be > 0".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = ResampleConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.fill_value.is_nan());
        assert!(config.parallel);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = ResampleConfig {
            oversampling: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        config.oversampling = 1.5;
        config.max_cells = 0;
        assert_eq!(config.validate().unwrap_err(), "max_cells must be > 0");
    }

    #[test]
    fn test_from_env() {
        std::env::set_var("DGGS_RESAMPLE_PARALLEL", "false");
        std::env::set_var("DGGS_FILL_VALUE", "-9999");
        std::env::set_var("DGGS_MAX_CELLS", "not a number");

        let config = ResampleConfig::from_env();
        assert!(!config.parallel);
        assert_eq!(config.fill_value, -9999.0);
        assert_eq!(config.max_cells, 50_000_000);

        std::env::remove_var("DGGS_RESAMPLE_PARALLEL");
        std::env::remove_var("DGGS_FILL_VALUE");
        std::env::remove_var("DGGS_MAX_CELLS");
    }

    #[test]
    fn test_json_roundtrip_keeps_nan_fill() {
        let json = serde_json::to_string(&ResampleConfig::default()).unwrap();
        assert!(json.contains("\"fill_value\":null"));
        let config: ResampleConfig = serde_json::from_str(&json).unwrap();
        assert!(config.fill_value.is_nan());
    }

    #[test]
    fn test_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "parallel": false, "fill_value": 0.0 }}"#).unwrap();

        let config = ResampleConfig::from_json_file(file.path()).unwrap();
        assert!(!config.parallel);
        assert_eq!(config.fill_value, 0.0);
        assert_eq!(config.oversampling, 2.0);
    }

    #[test]
    fn test_from_json_file_rejects_invalid() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "max_cells": 0 }}"#).unwrap();

        let err = ResampleConfig::from_json_file(file.path()).unwrap_err();
        assert!(matches!(err, CoverageError::Config(_)));
    }
}
