//! A single reception edit session.
//!
//! ```text
//! Loaded ──mutation──▶ Editing ──begin_save──▶ Validating ──ok──▶ Saving
//!    ▲                   ▲  │                      │                 │
//!    │                   │  └──discard──▶ Discarded │ error           │
//!    │                   └──────────────────────────┘                 │
//!    │                   ◀──────────────complete_save(Err)────────────┤
//!    └──────────────────────────────────complete_save(Ok)─────────────┘
//! ```
//!
//! Every mutation is checked before it is applied, so a rejected mutation
//! leaves the reception exactly as it was.
//!
//! Pallets and boxes created in the session get negative local IDs. They are
//! never sent to persistence, but they let a save that completes after
//! further edits hand the persisted IDs back to the right entities.

use std::collections::HashMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::{debug, info, instrument, warn};

use reception_core::{BoxId, LotKey, PalletId, ProductId, ProductionId, SupplierId};

use crate::change::ChangeDetector;
use crate::config::EngineConfig;
use crate::constraint::{ConstraintValidator, OriginalSnapshot};
use crate::error::{ReceptionError, ValidationError};
use crate::model::{
    EditPermission, Line, Pallet, PalletBox, Reception, ReceptionBody, ReceptionMode,
};
use crate::price_index::{PriceIndex, synchronize};
use crate::summary::ReceptionSummary;
use crate::transform::{LoadedReception, build_save_payload, wire_to_domain};
use crate::validation::{parse_optional_number, validate_for_save};
use crate::wire::{ReceptionResponse, SavePayload};

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Freshly loaded or saved; matches the baseline.
    Loaded,
    /// At least one mutation since the last load or save.
    Editing,
    /// Running save checks.
    Validating,
    /// Payload handed to persistence; awaiting the result.
    Saving,
    /// Edits thrown away; the session accepts nothing further.
    Discarded,
}

/// Field changes for one box. `None` leaves a field as it is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoxEdit {
    pub product_id: Option<ProductId>,
    pub lot: Option<String>,
    pub gross_weight: Option<Option<Decimal>>,
    pub net_weight: Option<Option<Decimal>>,
    pub barcode: Option<Option<String>>,
}

impl BoxEdit {
    fn apply(self, b: &mut PalletBox) {
        if let Some(product) = self.product_id {
            b.product_id = Some(product);
        }
        if let Some(lot) = self.lot {
            b.lot = lot;
        }
        if let Some(gross) = self.gross_weight {
            b.gross_weight = gross;
        }
        if let Some(net) = self.net_weight {
            b.net_weight = net;
        }
        if let Some(barcode) = self.barcode {
            b.barcode = barcode;
        }
    }

    const fn changes_key(&self) -> bool {
        self.product_id.is_some() || self.lot.is_some()
    }
}

/// Editing state for one reception.
#[derive(Debug, Clone)]
pub struct EditSession {
    reception: Reception,
    prices: PriceIndex,
    baseline_reception: Reception,
    baseline_prices: PriceIndex,
    snapshot: OriginalSnapshot,
    permission: EditPermission,
    detector: ChangeDetector,
    config: EngineConfig,
    state: SessionState,
    lines_dirty: bool,
    revision: u64,
    local_id_floor: i64,
    pending: Option<PendingSave>,
}

/// The save handed to persistence and the reception it was built from.
#[derive(Debug, Clone)]
struct PendingSave {
    revision: u64,
    submitted: Reception,
}

/// Persisted IDs for entities that only had local IDs when submitted.
#[derive(Debug, Default)]
struct AssignedIds {
    pallets: HashMap<PalletId, PalletId>,
    boxes: HashMap<BoxId, BoxId>,
}

impl AssignedIds {
    /// Pair submitted pallets and boxes with the saved ones.
    ///
    /// Persistence returns pallets and boxes in the order they were sent, minus
    /// boxes without a product. Returns `None` when the shapes disagree.
    fn align(submitted: &[Pallet], saved: &[Pallet]) -> Option<Self> {
        if submitted.len() != saved.len() {
            return None;
        }
        let mut ids = Self::default();
        for (sent, persisted) in submitted.iter().zip(saved) {
            if let (Some(local), Some(assigned)) = (sent.id, persisted.id) {
                ids.pallets.insert(local, assigned);
            }
            let sent_boxes: Vec<&PalletBox> = sent
                .boxes
                .iter()
                .filter(|b| b.product_id.is_some())
                .collect();
            if sent_boxes.len() != persisted.boxes.len() {
                return None;
            }
            for (b, saved_box) in sent_boxes.into_iter().zip(&persisted.boxes) {
                if let (Some(local), Some(assigned)) = (b.id, saved_box.id) {
                    ids.boxes.insert(local, assigned);
                }
            }
        }
        Some(ids)
    }

    /// Swap local IDs for persisted ones and refresh usage from `saved`.
    fn apply(&self, pallets: &mut [Pallet], saved: &[Pallet]) {
        let usage: HashMap<BoxId, (bool, Option<ProductionId>)> = saved
            .iter()
            .flat_map(|p| &p.boxes)
            .filter_map(|b| b.id.map(|id| (id, (b.is_available, b.consumed_by))))
            .collect();
        for pallet in pallets {
            if let Some(assigned) = pallet.id.and_then(|id| self.pallets.get(&id)) {
                pallet.id = Some(*assigned);
            }
            for b in &mut pallet.boxes {
                if let Some(assigned) = b.id.and_then(|id| self.boxes.get(&id)) {
                    b.id = Some(*assigned);
                }
                if let Some((is_available, consumed_by)) = b.id.and_then(|id| usage.get(&id)) {
                    b.is_available = *is_available;
                    b.consumed_by = *consumed_by;
                }
            }
        }
    }
}

fn lowest_id(reception: &Reception) -> i64 {
    let Some(pallets) = reception.pallets() else {
        return 0;
    };
    let pallet_ids = pallets.iter().filter_map(|p| p.id).map(i64::from);
    let box_ids = pallets
        .iter()
        .flat_map(|p| &p.boxes)
        .filter_map(|b| b.id)
        .map(i64::from);
    pallet_ids.chain(box_ids).min().unwrap_or(0).min(0)
}

impl EditSession {
    /// Start a session on a reception that does not exist yet.
    #[must_use]
    pub fn create(mode: ReceptionMode, config: EngineConfig) -> Self {
        let reception = Reception::new(mode);
        Self::from_parts(
            LoadedReception {
                reception,
                prices: PriceIndex::new(),
                snapshot: OriginalSnapshot::default(),
                permission: EditPermission::Full,
            },
            config,
        )
    }

    /// Start a session on a persisted reception.
    #[instrument(skip(response, config), fields(reception_id = ?response.id))]
    #[must_use]
    pub fn load(response: &ReceptionResponse, config: EngineConfig) -> Self {
        let loaded = wire_to_domain(response, &config);
        info!(
            mode = %loaded.reception.mode(),
            permission = ?loaded.permission,
            "Loaded reception for editing"
        );
        Self::from_parts(loaded, config)
    }

    fn from_parts(loaded: LoadedReception, config: EngineConfig) -> Self {
        let LoadedReception {
            reception,
            prices,
            snapshot,
            permission,
        } = loaded;
        Self {
            detector: ChangeDetector::capture(&reception),
            local_id_floor: lowest_id(&reception),
            baseline_reception: reception.clone(),
            baseline_prices: prices.clone(),
            reception,
            prices,
            snapshot,
            permission,
            config,
            state: SessionState::Loaded,
            lines_dirty: false,
            revision: 0,
            pending: None,
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Current reception state.
    #[must_use]
    pub const fn reception(&self) -> &Reception {
        &self.reception
    }

    /// Authoritative prices.
    #[must_use]
    pub const fn prices(&self) -> &PriceIndex {
        &self.prices
    }

    /// Load-time snapshot.
    #[must_use]
    pub const fn snapshot(&self) -> &OriginalSnapshot {
        &self.snapshot
    }

    /// Edit permission resolved at load.
    #[must_use]
    pub const fn permission(&self) -> &EditPermission {
        &self.permission
    }

    /// Lifecycle state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Whether partial-edit rules are in force.
    #[must_use]
    pub const fn is_partial_edit(&self) -> bool {
        self.snapshot.has_used_boxes
    }

    /// Whether the reception differs from the last loaded or saved state.
    #[must_use]
    pub fn has_unsaved_changes(&self) -> bool {
        self.detector.has_changes(&self.reception, self.lines_dirty)
    }

    /// Derived totals for display.
    #[must_use]
    pub fn summary(&self) -> ReceptionSummary {
        ReceptionSummary::compute(&self.reception, &self.prices)
    }

    fn validator(&self) -> ConstraintValidator<'_> {
        ConstraintValidator::new(&self.snapshot, self.config.weight_tolerance)
    }

    // =========================================================================
    // Mutation plumbing
    // =========================================================================

    fn ensure_editable(&self) -> Result<(), ReceptionError> {
        if self.state == SessionState::Discarded {
            return Err(ReceptionError::SessionClosed);
        }
        if let EditPermission::Blocked { reason } = &self.permission {
            warn!(%reason, "Rejected mutation on blocked reception");
            return Err(ReceptionError::EditingBlocked {
                reason: reason.clone(),
            });
        }
        Ok(())
    }

    fn touched(&mut self) {
        self.revision += 1;
        if self.state == SessionState::Loaded {
            self.state = SessionState::Editing;
        }
    }

    fn pallets_mut(&mut self) -> Result<&mut Vec<Pallet>, ReceptionError> {
        match &mut self.reception.body {
            ReceptionBody::Pallets(pallets) => Ok(pallets),
            ReceptionBody::Lines(_) => Err(ReceptionError::WrongMode {
                expected: ReceptionMode::Pallets,
            }),
        }
    }

    fn lines_mut(&mut self) -> Result<&mut Vec<Line>, ReceptionError> {
        match &mut self.reception.body {
            ReceptionBody::Lines(lines) => Ok(lines),
            ReceptionBody::Pallets(_) => Err(ReceptionError::WrongMode {
                expected: ReceptionMode::Lines,
            }),
        }
    }

    fn pallet_mut(&mut self, pallet: usize) -> Result<&mut Pallet, ReceptionError> {
        self.pallets_mut()?
            .get_mut(pallet)
            .ok_or(ReceptionError::PalletNotFound(pallet))
    }

    const fn allocate_local_id(&mut self) -> i64 {
        self.local_id_floor -= 1;
        self.local_id_floor
    }

    fn reproject(&mut self, pallet: usize) {
        if let ReceptionBody::Pallets(pallets) = &mut self.reception.body {
            if let Some(p) = pallets.get_mut(pallet) {
                p.prices = self.prices.prices_for(p);
            }
        }
    }

    // =========================================================================
    // Header
    // =========================================================================

    /// Set or clear the supplier.
    ///
    /// # Errors
    ///
    /// Returns an error if the session is closed or editing is blocked.
    pub fn set_supplier(&mut self, supplier: Option<SupplierId>) -> Result<(), ReceptionError> {
        self.ensure_editable()?;
        self.reception.header.supplier_id = supplier;
        self.touched();
        Ok(())
    }

    /// Set or clear the reception date.
    ///
    /// # Errors
    ///
    /// Returns an error if the session is closed or editing is blocked.
    pub fn set_date(&mut self, date: Option<NaiveDate>) -> Result<(), ReceptionError> {
        self.ensure_editable()?;
        self.reception.header.date = date;
        self.touched();
        Ok(())
    }

    /// Replace the notes.
    ///
    /// # Errors
    ///
    /// Returns an error if the session is closed or editing is blocked.
    pub fn set_notes(&mut self, notes: impl Into<String>) -> Result<(), ReceptionError> {
        self.ensure_editable()?;
        self.reception.header.notes = notes.into();
        self.touched();
        Ok(())
    }

    /// Set the declared total amount from form text; blank clears it.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a number, the session is closed or
    /// editing is blocked.
    pub fn set_declared_total_amount(&mut self, raw: &str) -> Result<(), ReceptionError> {
        self.ensure_editable()?;
        let value = parse_optional_number("declared total amount", raw)?;
        self.reception.header.declared_total_amount = value;
        self.touched();
        Ok(())
    }

    /// Set the declared total net weight from form text; blank clears it.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a number, the session is closed or
    /// editing is blocked.
    pub fn set_declared_total_net_weight(&mut self, raw: &str) -> Result<(), ReceptionError> {
        self.ensure_editable()?;
        let value = parse_optional_number("declared total net weight", raw)?;
        self.reception.header.declared_total_net_weight = value;
        self.touched();
        Ok(())
    }

    // =========================================================================
    // Lines
    // =========================================================================

    /// Append a line, returning its position.
    ///
    /// # Errors
    ///
    /// Returns an error outside lines mode, if the session is closed or
    /// editing is blocked.
    pub fn add_line(&mut self, line: Line) -> Result<usize, ReceptionError> {
        self.ensure_editable()?;
        let lines = self.lines_mut()?;
        lines.push(line);
        let position = lines.len() - 1;
        self.lines_dirty = true;
        self.touched();
        Ok(position)
    }

    /// Replace the line at `position`.
    ///
    /// # Errors
    ///
    /// Returns an error if the line does not exist, outside lines mode, if the
    /// session is closed or editing is blocked.
    pub fn update_line(&mut self, position: usize, line: Line) -> Result<(), ReceptionError> {
        self.ensure_editable()?;
        let slot = self
            .lines_mut()?
            .get_mut(position)
            .ok_or(ReceptionError::LineNotFound(position))?;
        *slot = line;
        self.lines_dirty = true;
        self.touched();
        Ok(())
    }

    /// Remove the line at `position`.
    ///
    /// # Errors
    ///
    /// Returns an error if the line does not exist, outside lines mode, if the
    /// session is closed or editing is blocked.
    pub fn remove_line(&mut self, position: usize) -> Result<Line, ReceptionError> {
        self.ensure_editable()?;
        let lines = self.lines_mut()?;
        if position >= lines.len() {
            return Err(ReceptionError::LineNotFound(position));
        }
        let removed = lines.remove(position);
        self.lines_dirty = true;
        self.touched();
        Ok(removed)
    }

    // =========================================================================
    // Pallets and boxes
    // =========================================================================

    /// Append an empty pallet, returning its position.
    ///
    /// # Errors
    ///
    /// Returns an error in partial-edit mode, outside pallets mode, if the
    /// session is closed or editing is blocked.
    pub fn add_pallet(&mut self) -> Result<usize, ReceptionError> {
        self.ensure_editable()?;
        if let Err(violation) = self.validator().ensure_can_add_pallet() {
            warn!("Rejected new pallet in partial-edit mode");
            return Err(violation.into());
        }
        let id = PalletId::new(self.allocate_local_id());
        let pallets = self.pallets_mut()?;
        pallets.push(Pallet {
            id: Some(id),
            ..Pallet::new()
        });
        let position = pallets.len() - 1;
        self.touched();
        Ok(position)
    }

    /// Remove the pallet at `pallet`, boxes included.
    ///
    /// # Errors
    ///
    /// Returns an error if the pallet does not exist, outside pallets mode, if
    /// the session is closed or editing is blocked.
    pub fn remove_pallet(&mut self, pallet: usize) -> Result<Pallet, ReceptionError> {
        self.ensure_editable()?;
        let pallets = self.pallets_mut()?;
        if pallet >= pallets.len() {
            return Err(ReceptionError::PalletNotFound(pallet));
        }
        let removed = pallets.remove(pallet);
        self.touched();
        Ok(removed)
    }

    /// Replace a pallet's observations.
    ///
    /// # Errors
    ///
    /// Returns an error if the pallet does not exist, outside pallets mode, if
    /// the session is closed or editing is blocked.
    pub fn set_observations(
        &mut self,
        pallet: usize,
        observations: impl Into<String>,
    ) -> Result<(), ReceptionError> {
        self.ensure_editable()?;
        self.pallet_mut(pallet)?.observations = observations.into();
        self.touched();
        Ok(())
    }

    /// Add a new box to a pallet, returning its position.
    ///
    /// The box's pallet-local price is taken from the price index. A box
    /// without a persisted ID gets a local one.
    ///
    /// # Errors
    ///
    /// Returns an error in partial-edit mode, if the pallet does not exist,
    /// outside pallets mode, if the session is closed or editing is blocked.
    pub fn add_box(
        &mut self,
        pallet: usize,
        mut new_box: PalletBox,
    ) -> Result<usize, ReceptionError> {
        self.ensure_editable()?;
        if let Err(violation) = self.validator().ensure_can_add_box(pallet) {
            warn!(pallet, "Rejected new box in partial-edit mode");
            return Err(violation.into());
        }
        if !self.snapshot.is_persisted(&new_box) {
            new_box.id = Some(BoxId::new(self.allocate_local_id()));
        }
        let target = self.pallet_mut(pallet)?;
        target.boxes.push(new_box);
        let position = target.boxes.len() - 1;
        self.reproject(pallet);
        self.touched();
        Ok(position)
    }

    /// Edit fields of an existing box.
    ///
    /// # Errors
    ///
    /// Returns an error if the box does not exist, outside pallets mode, if the
    /// session is closed or editing is blocked.
    pub fn update_box(
        &mut self,
        pallet: usize,
        position: usize,
        edit: BoxEdit,
    ) -> Result<(), ReceptionError> {
        self.ensure_editable()?;
        let rekeyed = edit.changes_key();
        let b = self
            .pallet_mut(pallet)?
            .boxes
            .get_mut(position)
            .ok_or(ReceptionError::BoxNotFound { pallet, position })?;
        edit.apply(b);
        if rekeyed {
            self.reproject(pallet);
        }
        self.touched();
        Ok(())
    }

    /// Remove a box from a pallet.
    ///
    /// # Errors
    ///
    /// Returns an error if the box does not exist, outside pallets mode, if the
    /// session is closed or editing is blocked.
    pub fn remove_box(
        &mut self,
        pallet: usize,
        position: usize,
    ) -> Result<PalletBox, ReceptionError> {
        self.ensure_editable()?;
        let boxes = &mut self.pallet_mut(pallet)?.boxes;
        if position >= boxes.len() {
            return Err(ReceptionError::BoxNotFound { pallet, position });
        }
        let removed = boxes.remove(position);
        self.reproject(pallet);
        self.touched();
        Ok(removed)
    }

    /// Move a box between pallets, keeping its identity.
    ///
    /// Allowed in partial-edit mode: redistribution leaves per-lot totals
    /// unchanged.
    ///
    /// # Errors
    ///
    /// Returns an error if either pallet or the box does not exist, outside
    /// pallets mode, if the session is closed or editing is blocked.
    pub fn move_box(
        &mut self,
        from: usize,
        position: usize,
        to: usize,
    ) -> Result<usize, ReceptionError> {
        self.ensure_editable()?;
        let pallets = self.pallets_mut()?;
        if to >= pallets.len() {
            return Err(ReceptionError::PalletNotFound(to));
        }
        let source = pallets
            .get_mut(from)
            .ok_or(ReceptionError::PalletNotFound(from))?;
        if position >= source.boxes.len() {
            return Err(ReceptionError::BoxNotFound {
                pallet: from,
                position,
            });
        }
        let moved = source.boxes.remove(position);
        let target = pallets.get_mut(to).ok_or(ReceptionError::PalletNotFound(to))?;
        target.boxes.push(moved);
        let new_position = target.boxes.len() - 1;
        self.reproject(from);
        self.reproject(to);
        self.touched();
        Ok(new_position)
    }

    // =========================================================================
    // Prices
    // =========================================================================

    /// Set or clear the price of a (product, lot) pair across the reception.
    ///
    /// Updates the index, then every pallet carrying the pair.
    ///
    /// # Errors
    ///
    /// Returns an error for a negative price, outside pallets mode, if the
    /// session is closed or editing is blocked.
    #[instrument(skip(self), fields(product = %key.product_id, lot = %key.lot))]
    pub fn set_price(
        &mut self,
        key: &LotKey,
        price: Option<Decimal>,
    ) -> Result<usize, ReceptionError> {
        self.ensure_editable()?;
        if price.is_some_and(|p| p < Decimal::ZERO) {
            return Err(ValidationError::NegativePrice { key: key.clone() }.into());
        }
        let touched = synchronize(key, price, self.pallets_mut()?);
        self.prices.set(key.clone(), price);
        self.touched();
        debug!(pallets = touched, "Price applied");
        Ok(touched)
    }

    /// Set a price from form text; blank clears it.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a number or [`Self::set_price`] fails.
    pub fn set_price_text(&mut self, key: &LotKey, raw: &str) -> Result<usize, ReceptionError> {
        let price = parse_optional_number("price per kg", raw)?;
        self.set_price(key, price)
    }

    // =========================================================================
    // Save lifecycle
    // =========================================================================

    /// Validate the reception and produce the payload for persistence.
    ///
    /// On success the session enters [`SessionState::Saving`]; on failure it
    /// returns to [`SessionState::Editing`] with nothing changed.
    ///
    /// # Errors
    ///
    /// Returns a constraint violation, a validation error, or a lifecycle
    /// error if a save is already pending, the session is closed or editing is
    /// blocked.
    #[instrument(skip(self), fields(reception_id = ?self.reception.id, revision = self.revision))]
    pub fn begin_save(&mut self) -> Result<SavePayload, ReceptionError> {
        if self.state == SessionState::Saving {
            return Err(ReceptionError::SaveInProgress);
        }
        self.ensure_editable()?;

        self.state = SessionState::Validating;
        match self.prepare_payload() {
            Ok(payload) => {
                self.state = SessionState::Saving;
                self.pending = Some(PendingSave {
                    revision: self.revision,
                    submitted: self.reception.clone(),
                });
                info!(mode = %payload.mode(), "Save payload ready");
                Ok(payload)
            }
            Err(e) => {
                self.state = SessionState::Editing;
                warn!(error = %e, "Save rejected");
                Err(e)
            }
        }
    }

    fn prepare_payload(&self) -> Result<SavePayload, ReceptionError> {
        if let Some(pallets) = self.reception.pallets() {
            self.validator().validate(pallets)?;
        }
        validate_for_save(&self.reception)?;
        Ok(build_save_payload(&self.reception, &self.snapshot)?)
    }

    /// Apply the persistence result of the pending save.
    ///
    /// Success reloads from the persisted reception and captures a new
    /// baseline. If the reception was edited while the save was pending, the
    /// edits are kept on top of the new baseline: pallets and boxes created
    /// locally take their persisted IDs and the session stays in
    /// [`SessionState::Editing`] with unsaved changes. Failure keeps the local
    /// state and the old baseline.
    ///
    /// # Errors
    ///
    /// Returns [`ReceptionError::NotSaving`] if no save is pending and
    /// [`ReceptionError::Persistence`] when the save failed.
    #[instrument(skip(self, result), fields(reception_id = ?self.reception.id))]
    pub fn complete_save(
        &mut self,
        result: Result<ReceptionResponse, String>,
    ) -> Result<(), ReceptionError> {
        if self.state != SessionState::Saving {
            return Err(ReceptionError::NotSaving);
        }
        let pending = self.pending.take();

        match result {
            Ok(response) => {
                let loaded = wire_to_domain(&response, &self.config);
                match pending {
                    Some(pending) if pending.revision != self.revision => {
                        self.rebase_onto(loaded, &pending.submitted);
                        info!(
                            revision = self.revision,
                            "Reception saved; keeping edits made while saving"
                        );
                    }
                    _ => {
                        *self = Self::from_parts(loaded, self.config.clone());
                        info!("Reception saved");
                    }
                }
                Ok(())
            }
            Err(message) => {
                self.state = SessionState::Editing;
                warn!(error = %message, "Save failed; keeping local edits");
                Err(ReceptionError::Persistence(message))
            }
        }
    }

    fn rebase_onto(&mut self, loaded: LoadedReception, submitted: &Reception) {
        let LoadedReception {
            reception: saved,
            prices,
            snapshot,
            permission,
        } = loaded;

        if let (Some(sent), Some(persisted)) = (submitted.pallets(), saved.pallets()) {
            match AssignedIds::align(sent, persisted) {
                Some(ids) => {
                    if let ReceptionBody::Pallets(current) = &mut self.reception.body {
                        ids.apply(current, persisted);
                    }
                }
                None => warn!("Saved reception does not match the submitted pallets"),
            }
        }
        self.reception.id = saved.id;

        self.detector.rebase(&saved);
        self.baseline_reception = saved;
        self.baseline_prices = prices;
        self.snapshot = snapshot;
        self.permission = permission;
        self.state = SessionState::Editing;
    }

    /// Throw away every edit since the last load or save.
    ///
    /// # Errors
    ///
    /// Returns an error if a save is pending or the session is already closed.
    pub fn discard(&mut self) -> Result<(), ReceptionError> {
        match self.state {
            SessionState::Saving => return Err(ReceptionError::SaveInProgress),
            SessionState::Discarded => return Err(ReceptionError::SessionClosed),
            _ => {}
        }
        self.reception = self.baseline_reception.clone();
        self.prices = self.baseline_prices.clone();
        self.lines_dirty = false;
        self.state = SessionState::Discarded;
        info!(revision = self.revision, "Discarded edits");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use rust_decimal_macros::dec;
    use serde_json::json;

    use reception_core::BoxId;

    use super::*;
    use crate::error::ConstraintViolation;

    fn response(used: bool) -> ReceptionResponse {
        let available = !used;
        serde_json::from_value(json!({
            "id": 1,
            "supplier": { "id": 3 },
            "date": "2024-02-10",
            "prices": [{ "product": { "id": 5 }, "lot": "L1", "price": "2" }],
            "pallets": [
                { "id": 10, "boxes": [
                    { "id": 100, "product": { "id": 5 }, "lot": "L1", "grossWeight": 11, "netWeight": 10, "isAvailable": available }
                ]},
                { "id": 11, "boxes": [
                    { "id": 101, "product": { "id": 5 }, "lot": "L1", "grossWeight": 6, "netWeight": 5 },
                    { "id": 102, "product": { "id": 6 }, "lot": "", "grossWeight": 2, "netWeight": 1 }
                ]}
            ]
        }))
        .unwrap()
    }

    fn key(product: i64, lot: &str) -> LotKey {
        LotKey::new(ProductId::new(product), lot)
    }

    fn net(value: Decimal) -> BoxEdit {
        BoxEdit {
            net_weight: Some(Some(value)),
            ..BoxEdit::default()
        }
    }

    #[test]
    fn test_load_is_clean() {
        let session = EditSession::load(&response(false), EngineConfig::default());
        assert_eq!(session.state(), SessionState::Loaded);
        assert!(!session.has_unsaved_changes());
        assert!(!session.is_partial_edit());
    }

    #[test]
    fn test_mutation_enters_editing_and_marks_changes() {
        let mut session = EditSession::load(&response(false), EngineConfig::default());
        session.update_box(1, 0, net(dec!(5.5))).unwrap();
        assert_eq!(session.state(), SessionState::Editing);
        assert!(session.has_unsaved_changes());
    }

    #[test]
    fn test_set_price_reaches_every_carrying_pallet() {
        let mut session = EditSession::load(&response(false), EngineConfig::default());
        let touched = session.set_price(&key(5, "L1"), Some(dec!(3.1))).unwrap();
        assert_eq!(touched, 2);
        let pallets = session.reception().pallets().unwrap();
        assert_eq!(pallets[0].price_for(&key(5, "L1")), Some(dec!(3.1)));
        assert_eq!(pallets[1].price_for(&key(5, "L1")), Some(dec!(3.1)));
        assert_eq!(session.prices().get(&key(5, "L1")), Some(dec!(3.1)));
    }

    #[test]
    fn test_rekeyed_box_picks_up_existing_price() {
        let mut session = EditSession::load(&response(false), EngineConfig::default());
        session
            .update_box(
                1,
                1,
                BoxEdit {
                    product_id: Some(ProductId::new(5)),
                    lot: Some("L1".to_owned()),
                    ..BoxEdit::default()
                },
            )
            .unwrap();
        let pallet = &session.reception().pallets().unwrap()[1];
        assert_eq!(pallet.price_for(&key(5, "L1")), Some(dec!(2)));
        assert!(!pallet.prices.contains_key(&key(6, "")));
    }

    #[test]
    fn test_partial_mode_rejects_new_box_immediately() {
        let mut session = EditSession::load(&response(true), EngineConfig::default());
        assert!(session.is_partial_edit());
        let before = session.reception().clone();
        let new_box = PalletBox::new(ProductId::new(5), "L1", dec!(1), dec!(0));
        let result = session.add_box(1, new_box);
        assert!(matches!(
            result,
            Err(ReceptionError::Constraint(
                ConstraintViolation::NewBoxNotPermitted { pallet: 1 }
            ))
        ));
        assert_eq!(session.reception(), &before);
        assert!(matches!(
            session.add_pallet(),
            Err(ReceptionError::Constraint(
                ConstraintViolation::NewPalletNotPermitted
            ))
        ));
    }

    #[test]
    fn test_partial_mode_allows_redistribution() {
        let mut session = EditSession::load(&response(true), EngineConfig::default());
        session.move_box(1, 0, 0).unwrap();
        session.update_box(0, 0, net(dec!(12))).unwrap();
        session.update_box(0, 1, net(dec!(3))).unwrap();
        let payload = session.begin_save().unwrap();
        assert_eq!(session.state(), SessionState::Saving);
        let SavePayload::Pallets(body) = payload else {
            panic!("expected pallets payload");
        };
        assert_eq!(body.pallets[0].boxes.len(), 2);
        assert_eq!(body.pallets[1].boxes.len(), 1);
    }

    #[test]
    fn test_partial_mode_drift_returns_to_editing() {
        let mut session = EditSession::load(&response(true), EngineConfig::default());
        session.update_box(1, 0, net(dec!(5.02))).unwrap();
        let before = session.reception().clone();
        let err = session.begin_save().unwrap_err();
        assert!(matches!(
            err,
            ReceptionError::Constraint(ConstraintViolation::WeightMismatch { .. })
        ));
        assert_eq!(session.state(), SessionState::Editing);
        assert_eq!(session.reception(), &before);
    }

    #[test]
    fn test_required_fields_checked_on_save() {
        let mut session = EditSession::load(&response(false), EngineConfig::default());
        session.set_supplier(None).unwrap();
        assert!(matches!(
            session.begin_save(),
            Err(ReceptionError::Validation(ValidationError::MissingSupplier))
        ));
    }

    #[test]
    fn test_second_save_while_pending_rejected() {
        let mut session = EditSession::load(&response(false), EngineConfig::default());
        session.set_notes("checked").unwrap();
        session.begin_save().unwrap();
        assert!(matches!(
            session.begin_save(),
            Err(ReceptionError::SaveInProgress)
        ));
        // Optimistic edits stay possible while the save is pending.
        session.set_notes("checked twice").unwrap();
        assert_eq!(session.state(), SessionState::Saving);
    }

    #[test]
    fn test_failed_save_keeps_state_and_baseline() {
        let mut session = EditSession::load(&response(false), EngineConfig::default());
        session.set_notes("checked").unwrap();
        session.begin_save().unwrap();
        let err = session.complete_save(Err("timeout".to_owned())).unwrap_err();
        assert_eq!(err.to_string(), "Save failed: timeout");
        assert_eq!(session.state(), SessionState::Editing);
        assert_eq!(session.reception().header.notes, "checked");
        assert!(session.has_unsaved_changes());
    }

    #[test]
    fn test_successful_save_rebases() {
        let mut session = EditSession::load(&response(false), EngineConfig::default());
        session.set_notes("checked").unwrap();
        session.begin_save().unwrap();
        let mut saved = response(false);
        saved.notes = Some("checked".to_owned());
        session.complete_save(Ok(saved)).unwrap();
        assert_eq!(session.state(), SessionState::Loaded);
        assert!(!session.has_unsaved_changes());
        assert_eq!(session.reception().header.notes, "checked");
    }

    #[test]
    fn test_edits_while_saving_survive_success() {
        let mut session = EditSession::load(&response(false), EngineConfig::default());
        session.set_notes("checked").unwrap();
        session.begin_save().unwrap();
        session.set_notes("typed while saving").unwrap();

        let mut saved = response(false);
        saved.notes = Some("checked".to_owned());
        session.complete_save(Ok(saved)).unwrap();

        assert_eq!(session.state(), SessionState::Editing);
        assert_eq!(session.reception().header.notes, "typed while saving");
        assert!(session.has_unsaved_changes());

        session.discard().unwrap();
        assert_eq!(session.reception().header.notes, "checked");
    }

    #[test]
    fn test_box_added_before_save_takes_persisted_id_after_later_edits() {
        let mut session = EditSession::load(&response(false), EngineConfig::default());
        let first = PalletBox::new(ProductId::new(6), "", dec!(4), dec!(3));
        session.add_box(1, first).unwrap();
        let pallets = session.reception().pallets().unwrap();
        assert!(pallets[1].boxes[2].id.unwrap().as_i64() < 0);

        session.begin_save().unwrap();
        session.update_box(1, 2, net(dec!(3.5))).unwrap();
        let second = PalletBox::new(ProductId::new(6), "", dec!(2), dec!(1));
        session.add_box(0, second).unwrap();

        let saved: ReceptionResponse = serde_json::from_value(json!({
            "id": 1,
            "supplier": { "id": 3 },
            "date": "2024-02-10",
            "prices": [{ "product": { "id": 5 }, "lot": "L1", "price": "2" }],
            "pallets": [
                { "id": 10, "boxes": [
                    { "id": 100, "product": { "id": 5 }, "lot": "L1", "grossWeight": 11, "netWeight": 10 }
                ]},
                { "id": 11, "boxes": [
                    { "id": 101, "product": { "id": 5 }, "lot": "L1", "grossWeight": 6, "netWeight": 5 },
                    { "id": 102, "product": { "id": 6 }, "lot": "", "grossWeight": 2, "netWeight": 1 },
                    { "id": 500, "product": { "id": 6 }, "lot": "", "grossWeight": 4, "netWeight": 3 }
                ]}
            ]
        }))
        .unwrap();
        session.complete_save(Ok(saved)).unwrap();

        let pallets = session.reception().pallets().unwrap();
        assert_eq!(pallets[1].boxes[2].id, Some(BoxId::new(500)));
        assert_eq!(pallets[1].boxes[2].net_weight, Some(dec!(3.5)));
        assert!(session.has_unsaved_changes());

        let SavePayload::Pallets(body) = session.begin_save().unwrap() else {
            panic!("expected pallets payload");
        };
        assert_eq!(body.pallets[1].boxes[2].id, Some(BoxId::new(500)));
        assert_eq!(body.pallets[1].boxes[2].net_weight, dec!(3.5));
        assert_eq!(body.pallets[0].boxes[1].id, None);
    }

    #[test]
    fn test_new_pallets_and_boxes_get_distinct_local_ids() {
        let mut session = EditSession::create(ReceptionMode::Pallets, EngineConfig::default());
        let first = session.add_pallet().unwrap();
        let second = session.add_pallet().unwrap();
        let fabricated = PalletBox::new(ProductId::new(5), "L1", dec!(2), dec!(1));
        session
            .add_box(first, fabricated.with_id(BoxId::new(-1)))
            .unwrap();
        let plain = PalletBox::new(ProductId::new(5), "L1", dec!(2), dec!(1));
        session.add_box(second, plain).unwrap();

        let pallets = session.reception().pallets().unwrap();
        let mut ids = vec![
            pallets[0].id.unwrap().as_i64(),
            pallets[1].id.unwrap().as_i64(),
            pallets[0].boxes[0].id.unwrap().as_i64(),
            pallets[1].boxes[0].id.unwrap().as_i64(),
        ];
        assert!(ids.iter().all(|id| *id < 0));
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 4);
    }

    #[test]
    fn test_complete_without_pending_save() {
        let mut session = EditSession::load(&response(false), EngineConfig::default());
        assert!(matches!(
            session.complete_save(Err("x".to_owned())),
            Err(ReceptionError::NotSaving)
        ));
    }

    #[test]
    fn test_discard_restores_baseline_and_closes() {
        let mut session = EditSession::load(&response(false), EngineConfig::default());
        session.set_price(&key(5, "L1"), Some(dec!(9))).unwrap();
        session.remove_box(1, 1).unwrap();
        session.discard().unwrap();
        assert_eq!(session.state(), SessionState::Discarded);
        assert!(!session.has_unsaved_changes());
        assert_eq!(session.prices().get(&key(5, "L1")), Some(dec!(2)));
        assert!(matches!(
            session.set_notes("x"),
            Err(ReceptionError::SessionClosed)
        ));
    }

    #[test]
    fn test_blocked_reception_rejects_mutations() {
        let mut blocked = response(false);
        blocked.can_edit = false;
        blocked.cannot_edit_reason = Some("Already invoiced".to_owned());
        let mut session = EditSession::load(&blocked, EngineConfig::default());
        let err = session.set_notes("x").unwrap_err();
        assert_eq!(err.to_string(), "Editing blocked: Already invoiced");
        assert!(matches!(
            session.begin_save(),
            Err(ReceptionError::EditingBlocked { .. })
        ));
        assert!(!session.has_unsaved_changes());
    }

    #[test]
    fn test_wrong_mode_and_bad_positions() {
        let mut session = EditSession::load(&response(false), EngineConfig::default());
        assert!(matches!(
            session.add_line(Line::default()),
            Err(ReceptionError::WrongMode { expected: ReceptionMode::Lines })
        ));
        assert!(matches!(
            session.remove_pallet(9),
            Err(ReceptionError::PalletNotFound(9))
        ));
        assert!(matches!(
            session.remove_box(0, 4),
            Err(ReceptionError::BoxNotFound { pallet: 0, position: 4 })
        ));
        assert!(matches!(
            session.move_box(0, 0, 5),
            Err(ReceptionError::PalletNotFound(5))
        ));
        assert!(!session.has_unsaved_changes());
    }

    #[test]
    fn test_invalid_declared_amount_leaves_header() {
        let mut session = EditSession::load(&response(false), EngineConfig::default());
        session.set_declared_total_amount("120,50").unwrap();
        let header = &session.reception().header;
        assert_eq!(header.declared_total_amount, Some(dec!(120.5)));
        assert!(session.set_declared_total_amount("abc").is_err());
        let header = &session.reception().header;
        assert_eq!(header.declared_total_amount, Some(dec!(120.5)));
    }

    #[test]
    fn test_lines_session_uses_form_signal() {
        let mut session = EditSession::create(ReceptionMode::Lines, EngineConfig::default());
        assert!(!session.has_unsaved_changes());
        session
            .add_line(Line {
                product_id: Some(ProductId::new(1)),
                net_weight: Some(dec!(4)),
                ..Line::default()
            })
            .unwrap();
        assert!(session.has_unsaved_changes());
        session.set_supplier(Some(SupplierId::new(2))).unwrap();
        session.set_date(NaiveDate::from_ymd_opt(2024, 1, 2)).unwrap();
        let payload = session.begin_save().unwrap();
        assert_eq!(payload.mode(), ReceptionMode::Lines);
    }

    #[test]
    fn test_new_reception_new_boxes_have_no_ids_on_wire() {
        let mut session = EditSession::create(ReceptionMode::Pallets, EngineConfig::default());
        session.set_supplier(Some(SupplierId::new(2))).unwrap();
        session.set_date(NaiveDate::from_ymd_opt(2024, 1, 2)).unwrap();
        let pallet = session.add_pallet().unwrap();
        let fabricated = PalletBox::new(ProductId::new(5), "L1", dec!(2), dec!(1));
        session
            .add_box(pallet, fabricated.with_id(BoxId::new(-1)))
            .unwrap();
        session.set_price_text(&key(5, "L1"), "1,25").unwrap();
        let SavePayload::Pallets(body) = session.begin_save().unwrap() else {
            panic!("expected pallets payload");
        };
        assert_eq!(body.pallets[0].boxes[0].id, None);
        assert_eq!(body.prices.len(), 1);
        assert_eq!(body.prices[0].price, dec!(1.25));
    }
}
