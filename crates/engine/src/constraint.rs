//! Partial-edit rules for receptions whose boxes are already in use.
//!
//! Once any box has left stock or been consumed by production:
//! 1. every (product, lot) net weight total present at load time is frozen,
//!    within [`EngineConfig::weight_tolerance`](crate::EngineConfig);
//! 2. no box without a persisted ID may exist anywhere in the reception.

use std::collections::{BTreeMap, HashSet};

use rust_decimal::Decimal;
use tracing::{debug, warn};

use reception_core::{BoxId, LotKey, PalletId};

use crate::error::ConstraintViolation;
use crate::model::{Pallet, PalletBox};

/// Net weight totals per (product, lot), ignoring boxes without a product.
#[must_use]
pub fn totals_by_key(pallets: &[Pallet]) -> BTreeMap<LotKey, Decimal> {
    let mut totals: BTreeMap<LotKey, Decimal> = BTreeMap::new();
    for b in pallets.iter().flat_map(|p| &p.boxes) {
        if let Some(key) = b.key() {
            *totals.entry(key).or_default() += b.net_weight_or_zero();
        }
    }
    totals
}

/// Whether any box in the reception is used.
#[must_use]
pub fn has_used_boxes(pallets: &[Pallet]) -> bool {
    pallets.iter().flat_map(|p| &p.boxes).any(PalletBox::is_used)
}

/// State captured at load time that partial-edit validation compares against.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OriginalSnapshot {
    /// Net weight totals per key before editing.
    pub totals_by_key: BTreeMap<LotKey, Decimal>,
    /// IDs assigned by persistence to boxes.
    pub box_ids: HashSet<BoxId>,
    /// IDs assigned by persistence to pallets.
    pub pallet_ids: HashSet<PalletId>,
    /// Whether any box was used at load time.
    pub has_used_boxes: bool,
}

impl OriginalSnapshot {
    /// Capture a snapshot from freshly loaded pallets.
    #[must_use]
    pub fn capture(pallets: &[Pallet]) -> Self {
        Self {
            totals_by_key: totals_by_key(pallets),
            box_ids: pallets
                .iter()
                .flat_map(|p| &p.boxes)
                .filter_map(|b| b.id)
                .collect(),
            pallet_ids: pallets.iter().filter_map(|p| p.id).collect(),
            has_used_boxes: has_used_boxes(pallets),
        }
    }

    /// Whether `b` was assigned its ID by persistence.
    ///
    /// Boxes carrying a locally fabricated ID count as new.
    #[must_use]
    pub fn is_persisted(&self, b: &PalletBox) -> bool {
        b.id.is_some_and(|id| self.box_ids.contains(&id))
    }
}

/// Gate for saves and interactive additions in partial-edit mode.
#[derive(Debug, Clone, Copy)]
pub struct ConstraintValidator<'a> {
    snapshot: &'a OriginalSnapshot,
    tolerance: Decimal,
}

impl<'a> ConstraintValidator<'a> {
    /// Create a validator over a load-time snapshot.
    #[must_use]
    pub const fn new(snapshot: &'a OriginalSnapshot, tolerance: Decimal) -> Self {
        Self {
            snapshot,
            tolerance,
        }
    }

    /// Whether partial-edit rules apply at all.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.snapshot.has_used_boxes
    }

    /// Validate a proposed pallets body.
    ///
    /// # Errors
    ///
    /// Returns the first violation found: a drifted total (reported before
    /// any new box), then a box lacking a persisted ID.
    pub fn validate(&self, proposed: &[Pallet]) -> Result<(), ConstraintViolation> {
        if !self.is_active() {
            return Ok(());
        }

        let proposed_totals = totals_by_key(proposed);
        for (key, original) in &self.snapshot.totals_by_key {
            let current = proposed_totals.get(key).copied().unwrap_or(Decimal::ZERO);
            let difference = (*original - current).abs();
            if difference > self.tolerance {
                warn!(
                    product = %key.product_id,
                    lot = %key.lot,
                    %original,
                    proposed = %current,
                    "Net weight total drifted in partial-edit mode"
                );
                return Err(ConstraintViolation::WeightMismatch {
                    key: key.clone(),
                    original: *original,
                    proposed: current,
                    difference,
                });
            }
        }

        for (index, pallet) in proposed.iter().enumerate() {
            if pallet.boxes.iter().any(|b| !self.snapshot.is_persisted(b)) {
                warn!(pallet = index, "New box found in partial-edit mode");
                return Err(ConstraintViolation::NewBoxNotPermitted { pallet: index });
            }
        }

        debug!(
            keys = self.snapshot.totals_by_key.len(),
            "Partial-edit constraints satisfied"
        );
        Ok(())
    }

    /// Check, at the moment of the attempt, that a box may be added.
    ///
    /// # Errors
    ///
    /// Returns [`ConstraintViolation::NewBoxNotPermitted`] in partial-edit mode.
    pub const fn ensure_can_add_box(&self, pallet: usize) -> Result<(), ConstraintViolation> {
        if self.is_active() {
            Err(ConstraintViolation::NewBoxNotPermitted { pallet })
        } else {
            Ok(())
        }
    }

    /// Check, at the moment of the attempt, that a pallet may be added.
    ///
    /// # Errors
    ///
    /// Returns [`ConstraintViolation::NewPalletNotPermitted`] in partial-edit mode.
    pub const fn ensure_can_add_pallet(&self) -> Result<(), ConstraintViolation> {
        if self.is_active() {
            Err(ConstraintViolation::NewPalletNotPermitted)
        } else {
            Ok(())
        }
    }
}
