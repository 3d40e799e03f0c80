//! Unified error handling for the reception engine.
//!
//! Every error here is meant to reach the user as a message. A rejected
//! operation never leaves the in-memory reception half-modified.

use rust_decimal::Decimal;
use thiserror::Error;

use reception_core::{DecimalTextError, LotKey};

use crate::model::ReceptionMode;

/// Required-field and numeric-format problems found before saving.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// No supplier selected.
    #[error("a supplier is required")]
    MissingSupplier,

    /// No reception date.
    #[error("a reception date is required")]
    MissingDate,

    /// Lines mode with no usable line.
    #[error("at least one line with a product and a positive net weight is required")]
    EmptyLines,

    /// Lines mode line with zero boxes.
    #[error("line {line} must have at least one box")]
    InvalidBoxCount {
        /// Zero-based line position.
        line: usize,
    },

    /// Negative price on a line or price entry.
    #[error("price for {key} cannot be negative")]
    NegativePrice {
        /// Key carrying the price.
        key: LotKey,
    },

    /// Pallets mode with no pallets.
    #[error("at least one pallet is required")]
    EmptyPallets,

    /// A pallet without boxes.
    #[error("pallet {pallet} has no boxes")]
    EmptyPallet {
        /// Zero-based pallet position.
        pallet: usize,
    },

    /// A box without a product.
    #[error("box {position} on pallet {pallet} has no product")]
    BoxMissingProduct {
        /// Zero-based pallet position.
        pallet: usize,
        /// Zero-based box position.
        position: usize,
    },

    /// A box without a usable net weight.
    #[error("box {position} on pallet {pallet} needs a net weight of zero or more")]
    BoxInvalidNetWeight {
        /// Zero-based pallet position.
        pallet: usize,
        /// Zero-based box position.
        position: usize,
    },

    /// A numeric text field failed to parse.
    #[error("{field}: {source}")]
    InvalidNumber {
        /// Field being edited.
        field: &'static str,
        /// Parse failure.
        source: DecimalTextError,
    },
}

/// Violations of the partial-edit rules that apply once any box is used.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConstraintViolation {
    /// The net weight total of a (product, lot) pair drifted.
    #[error(
        "net weight for {key} must stay at {original} but is {proposed} (difference {difference})"
    )]
    WeightMismatch {
        /// Offending product and lot.
        key: LotKey,
        /// Total before editing.
        original: Decimal,
        /// Total after editing.
        proposed: Decimal,
        /// Absolute difference.
        difference: Decimal,
    },

    /// A box without a persisted ID exists.
    #[error("new box not permitted on pallet {pallet}: boxes of this reception are already in use")]
    NewBoxNotPermitted {
        /// Zero-based pallet position.
        pallet: usize,
    },

    /// A brand-new pallet was requested.
    #[error("new pallet not permitted: boxes of this reception are already in use")]
    NewPalletNotPermitted,
}

/// Application-level error type for reception editing.
#[derive(Debug, Error)]
pub enum ReceptionError {
    /// Required fields missing or malformed.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Partial-edit rules broken.
    #[error("Constraint violation: {0}")]
    Constraint(#[from] ConstraintViolation),

    /// The persistence collaborator rejected the save.
    #[error("Save failed: {0}")]
    Persistence(String),

    /// The reception cannot be edited at all.
    #[error("Editing blocked: {reason}")]
    EditingBlocked {
        /// Reason reported at load time.
        reason: String,
    },

    /// A save is already pending.
    #[error("a save is already in progress")]
    SaveInProgress,

    /// A save result arrived with no save pending.
    #[error("no save is in progress")]
    NotSaving,

    /// The session was discarded.
    #[error("the edit session was discarded")]
    SessionClosed,

    /// Operation targets the other reception mode.
    #[error("operation requires a {expected} reception")]
    WrongMode {
        /// Mode the operation needs.
        expected: ReceptionMode,
    },

    /// Pallet position out of range.
    #[error("pallet {0} not found")]
    PalletNotFound(usize),

    /// Box position out of range.
    #[error("box {position} not found on pallet {pallet}")]
    BoxNotFound {
        /// Zero-based pallet position.
        pallet: usize,
        /// Zero-based box position.
        position: usize,
    },

    /// Line position out of range.
    #[error("line {0} not found")]
    LineNotFound(usize),

    /// JSON encoding or decoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
