//! Engine configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Optional
//! - `RECEPTION_WEIGHT_TOLERANCE` - Allowed drift of a (product, lot) net weight
//!   total while in partial-edit mode (default: 0.01)
//! - `RECEPTION_PARTIAL_EDIT_KEYWORDS` - Comma-separated words that, when found in a
//!   `cannotEditReason`, downgrade a refusal to partial editing
//!   (default: box,boxes,caja,cajas,production,producción,consumed)

use std::str::FromStr;

use rust_decimal::Decimal;
use thiserror::Error;

/// Allowed drift of a per-lot weight total, in weight units.
pub const DEFAULT_WEIGHT_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

const DEFAULT_PARTIAL_EDIT_KEYWORDS: &[&str] = &[
    "box",
    "boxes",
    "caja",
    "cajas",
    "production",
    "producción",
    "consumed",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Consistency engine configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Maximum accepted difference between original and proposed per-lot totals.
    pub weight_tolerance: Decimal,
    /// Words marking a refusal reason as "boxes in use".
    pub partial_edit_keywords: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            weight_tolerance: DEFAULT_WEIGHT_TOLERANCE,
            partial_edit_keywords: DEFAULT_PARTIAL_EDIT_KEYWORDS
                .iter()
                .map(|s| (*s).to_owned())
                .collect(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set but cannot be parsed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup("RECEPTION_WEIGHT_TOLERANCE") {
            let tolerance = Decimal::from_str(raw.trim()).map_err(|e| {
                ConfigError::InvalidEnvVar("RECEPTION_WEIGHT_TOLERANCE".to_string(), e.to_string())
            })?;
            if tolerance.is_sign_negative() {
                return Err(ConfigError::InvalidEnvVar(
                    "RECEPTION_WEIGHT_TOLERANCE".to_string(),
                    "must not be negative".to_string(),
                ));
            }
            config.weight_tolerance = tolerance;
        }

        if let Some(raw) = lookup("RECEPTION_PARTIAL_EDIT_KEYWORDS") {
            let keywords: Vec<String> = raw
                .split(',')
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(str::to_owned)
                .collect();
            if keywords.is_empty() {
                return Err(ConfigError::InvalidEnvVar(
                    "RECEPTION_PARTIAL_EDIT_KEYWORDS".to_string(),
                    "must list at least one keyword".to_string(),
                ));
            }
            config.partial_edit_keywords = keywords;
        }

        Ok(config)
    }
}
