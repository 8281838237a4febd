//! Tracker configuration.
//!
//! [`TrackerConfig`] gathers the scoring coefficients, the assignment
//! strategy, and the tracker's bookkeeping switches. It can be built in code
//! or loaded from TOML:
//!
//! ```
//! use clumptree_engine::config::TrackerConfig;
//! use clumptree_match::prelude::*;
//!
//! let config = TrackerConfig::from_toml_str(r#"
//!     strategy = "optimal"
//!     record_first_snapshot = true
//!
//!     [scoring]
//!     drift_coefficient = 0.25
//!     mass_term = "legacy_radius"
//! "#).unwrap();
//!
//! assert_eq!(config.strategy, AssignmentStrategy::Optimal);
//! assert_eq!(config.scoring.mass_term, MassTerm::LegacyRadius);
//! assert_eq!(config.scoring.radius_coefficient, 0.3);
//! ```
//!
//! Missing keys take their defaults, so an empty document is the default
//! configuration.

use std::path::Path;

use clumptree_match::assign::AssignmentStrategy;
use clumptree_match::quality::ScoringParams;
use clumptree_match::MatchError;
use serde::{Deserialize, Serialize};

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(#[from] MatchError),
}

/// Settings for a [`Tracker`](crate::tracker::Tracker).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Greedy (default) or optimal assignment.
    pub strategy: AssignmentStrategy,
    /// Whether the first snapshot contributes the initial sample of each
    /// track. Off by default: the first snapshot only numbers clumps.
    pub record_first_snapshot: bool,
    /// Warn when a snapshot is not in descending-mass order.
    pub check_mass_order: bool,
    /// Quality heuristic coefficients and mass-term variant.
    pub scoring: ScoringParams,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            strategy: AssignmentStrategy::Greedy,
            record_first_snapshot: false,
            check_mass_order: true,
            scoring: ScoringParams::default(),
        }
    }
}

impl TrackerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid TOML, or
    /// holds invalid values.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_toml_file(path)
    }

    /// Loads configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Parses and validates configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the scoring coefficients.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.scoring.validate()?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use clumptree_match::quality::MassTerm;

    #[test]
    fn empty_document_is_default() {
        let config = TrackerConfig::from_toml_str("").unwrap();
        assert_eq!(config, TrackerConfig::default());
        assert_eq!(config.strategy, AssignmentStrategy::Greedy);
        assert_eq!(config.scoring.mass_term, MassTerm::Mass);
        assert!(!config.record_first_snapshot);
        assert!(config.check_mass_order);
    }

    #[test]
    fn invalid_coefficient_is_rejected() {
        let err = TrackerConfig::from_toml_str(
            r#"
            [scoring]
            mass_coefficient = 0.0
            "#,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid(MatchError::InvalidParameter {
                name: "mass_coefficient",
                ..
            })
        ));
    }

    #[test]
    fn unknown_strategy_is_a_parse_error() {
        let err = TrackerConfig::from_toml_str(r#"strategy = "hungry""#).unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)));
    }

    #[test]
    fn missing_file_is_io_error_and_falls_back_to_default() {
        let result = TrackerConfig::load("/nonexistent/clumptree.toml");
        assert!(matches!(result, Err(ConfigError::Io(_))));
        let config = TrackerConfig::load("/nonexistent/clumptree.toml").unwrap_or_default();
        assert_eq!(config, TrackerConfig::default());
    }

    #[test]
    fn config_round_trips_through_toml() {
        let mut config = TrackerConfig::new();
        config.strategy = AssignmentStrategy::Optimal;
        config.check_mass_order = false;
        let text = toml::to_string(&config).unwrap();
        assert_eq!(TrackerConfig::from_toml_str(&text).unwrap(), config);
    }
}
