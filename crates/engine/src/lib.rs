//! Reception Engine - Consistency engine for raw material receptions.
//!
//! A reception records inbound raw material from a supplier, either as flat
//! lines or as pallets of individually weighed boxes. This crate keeps an
//! edited reception consistent while it is open:
//!
//! - prices are owned by one reception-wide index and projected onto pallets
//! - change detection compares canonical forms, not insertion order
//! - once boxes are used downstream, per-lot net weight totals are frozen
//! - the editing model converts to and from the persistence wire shapes
//!
//! # Modules
//!
//! - [`model`] - Reception, pallets, boxes, lines and edit permission
//! - [`price_index`] - Authoritative prices and pallet synchronization
//! - [`canonical`] - Order-independent canonical form
//! - [`change`] - Unsaved-change detection against a baseline
//! - [`constraint`] - Partial-edit weight and new-box rules
//! - [`validation`] - Required-field checks before save
//! - [`wire`] / [`transform`] - Persistence payloads and conversions
//! - [`session`] - The edit session state machine
//! - [`summary`] - Derived totals
//! - [`config`] - Environment-driven settings
//! - [`error`] - Error types
//!
//! # Example
//!
//! ```
//! use reception_engine::{EditSession, EngineConfig, ReceptionMode};
//!
//! let session = EditSession::create(ReceptionMode::Pallets, EngineConfig::default());
//! assert!(!session.has_unsaved_changes());
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod canonical;
pub mod change;
pub mod config;
pub mod constraint;
pub mod error;
pub mod model;
pub mod price_index;
pub mod session;
pub mod summary;
pub mod transform;
pub mod validation;
pub mod wire;

pub use canonical::{CanonicalForm, canonicalize};
pub use change::ChangeDetector;
pub use config::{ConfigError, EngineConfig};
pub use constraint::{ConstraintValidator, OriginalSnapshot};
pub use error::{ConstraintViolation, ReceptionError, ValidationError};
pub use model::{
    EditPermission, Line, Pallet, PalletBox, PriceEntry, Reception, ReceptionBody,
    ReceptionHeader, ReceptionMode,
};
pub use price_index::{PriceIndex, synchronize};
pub use session::{BoxEdit, EditSession, SessionState};
pub use summary::ReceptionSummary;
pub use transform::{LoadedReception, build_save_payload, wire_to_domain};
pub use wire::{ReceptionResponse, SavePayload};
