//! Core types for receptions.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod decimal;
pub mod id;
pub mod lot;

pub use decimal::{DecimalText, DecimalTextError, canonical_decimal, canonical_optional_decimal};
pub use id::*;
pub use lot::LotKey;
