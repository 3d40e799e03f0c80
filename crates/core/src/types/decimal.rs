//! Canonical decimal handling for weights, prices and amounts.
//!
//! Weights and prices reach the engine as JSON numbers, JSON strings or raw
//! form text. Comparisons must not care whether a value was written `3`,
//! `3.0` or `3.000`, so every value is normalized before it is compared.

use core::fmt;
use core::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`DecimalText`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DecimalTextError {
    /// The input string is empty or whitespace.
    #[error("number cannot be empty")]
    Empty,
    /// The input is not a decimal number.
    #[error("'{value}' is not a valid number")]
    Invalid {
        /// The rejected input.
        value: String,
    },
}

/// A decimal number parsed from user-entered text.
///
/// Accepts an optional sign, surrounding whitespace, and either `.` or `,`
/// as the decimal separator (never both).
///
/// ## Examples
///
/// ```
/// use reception_core::DecimalText;
///
/// assert_eq!(DecimalText::parse("3.0").unwrap().to_string(), "3");
/// assert_eq!(DecimalText::parse(" 12,50 ").unwrap().to_string(), "12.5");
/// assert!(DecimalText::parse("").is_err());
/// assert!(DecimalText::parse("12kg").is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DecimalText(Decimal);

impl DecimalText {
    /// Parse a decimal from form text.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is blank or not a decimal number.
    pub fn parse(s: &str) -> Result<Self, DecimalTextError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(DecimalTextError::Empty);
        }

        let candidate = if trimmed.contains(',') && !trimmed.contains('.') {
            trimmed.replace(',', ".")
        } else {
            trimmed.to_owned()
        };

        Decimal::from_str(&candidate)
            .map(|value| Self(value.normalize()))
            .map_err(|_| DecimalTextError::Invalid {
                value: trimmed.to_owned(),
            })
    }

    /// Returns the parsed value.
    #[must_use]
    pub const fn value(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for DecimalText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", canonical_decimal(self.0))
    }
}

impl FromStr for DecimalText {
    type Err = DecimalTextError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<DecimalText> for Decimal {
    fn from(value: DecimalText) -> Self {
        value.0
    }
}

/// Canonical string form of a decimal: no trailing zeros, no negative zero.
#[must_use]
pub fn canonical_decimal(value: Decimal) -> String {
    value.normalize().to_string()
}

/// Canonical string form of an optional decimal; `None` becomes `""`.
#[must_use]
pub fn canonical_optional_decimal(value: Option<Decimal>) -> String {
    value.map(canonical_decimal).unwrap_or_default()
}
