//! Integration tests for the reception engine.
//!
//! Tests drive [`reception_engine::EditSession`] end to end against
//! [`MemoryStore`], an in-memory stand-in for persistence that assigns IDs,
//! keeps box usage across saves and can be told to fail.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p reception-integration-tests
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::collections::HashMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde_json::{Value, json};
use tokio::sync::Mutex;

use reception_core::{BoxId, PalletId, ProductionId, ReceptionId};
use reception_engine::wire::{
    BoxResponse, IdRef, LineResponse, PalletResponse, ProductRef, ReceptionResponse,
};
use reception_engine::{ReceptionMode, SavePayload};

/// Reason persistence gives once a box is consumed.
pub const USED_IN_PRODUCTION: &str = "Some boxes are already used in production";

#[derive(Debug, Default)]
struct StoreState {
    next_id: i64,
    receptions: HashMap<ReceptionId, ReceptionResponse>,
    fail_next: Option<String>,
}

impl StoreState {
    fn allocate(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-memory persistence for receptions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
}

impl MemoryStore {
    /// Empty store; IDs start at 1000.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(StoreState {
                next_id: 1000,
                ..StoreState::default()
            }),
        }
    }

    /// Store a reception as-is, returning its ID.
    pub async fn insert(&self, mut response: ReceptionResponse) -> ReceptionId {
        let mut state = self.state.lock().await;
        let id = response
            .id
            .unwrap_or_else(|| ReceptionId::new(state.allocate()));
        response.id = Some(id);
        state.receptions.insert(id, response);
        id
    }

    /// Load a stored reception.
    pub async fn load(&self, id: ReceptionId) -> Option<ReceptionResponse> {
        self.state.lock().await.receptions.get(&id).cloned()
    }

    /// Make the next save fail with `message`.
    pub async fn fail_next_save(&self, message: impl Into<String>) {
        self.state.lock().await.fail_next = Some(message.into());
    }

    /// Mark a box as consumed by a production run.
    ///
    /// Returns whether the box was found.
    pub async fn consume_box(
        &self,
        id: ReceptionId,
        box_id: BoxId,
        production: ProductionId,
    ) -> bool {
        let mut state = self.state.lock().await;
        let Some(reception) = state.receptions.get_mut(&id) else {
            return false;
        };
        let Some(found) = reception
            .pallets
            .iter_mut()
            .flat_map(|p| p.boxes.iter_mut())
            .find(|b| b.id == Some(box_id))
        else {
            return false;
        };
        found.is_available = false;
        found.consumed_by = Some(IdRef::new(production));
        reception.can_edit = false;
        reception.cannot_edit_reason = Some(USED_IN_PRODUCTION.to_owned());
        true
    }

    /// Persist a save payload, creating the reception when `id` is `None`.
    ///
    /// New pallets and boxes receive fresh IDs; usage of existing boxes is
    /// kept.
    ///
    /// # Errors
    ///
    /// Returns an error if a failure was requested, the reception does not
    /// exist, or the payload references an unknown box.
    pub async fn save(
        &self,
        id: Option<ReceptionId>,
        payload: &SavePayload,
    ) -> Result<ReceptionResponse, String> {
        let mut state = self.state.lock().await;
        if let Some(message) = state.fail_next.take() {
            return Err(message);
        }

        let previous = match id {
            Some(id) => Some(
                state
                    .receptions
                    .get(&id)
                    .cloned()
                    .ok_or_else(|| format!("reception {id} not found"))?,
            ),
            None => None,
        };
        let id = match id {
            Some(id) => id,
            None => ReceptionId::new(state.allocate()),
        };
        let existing_boxes: HashMap<BoxId, BoxResponse> = previous
            .iter()
            .flat_map(|r| r.pallets.iter().flat_map(|p| p.boxes.iter()))
            .filter_map(|b| b.id.map(|box_id| (box_id, b.clone())))
            .collect();

        let mut response = match payload {
            SavePayload::Lines(lines) => ReceptionResponse {
                supplier: Some(lines.supplier),
                date: Some(lines.date),
                notes: Some(lines.notes.clone()),
                declared_total_amount: lines.declared_total_amount,
                declared_total_net_weight: lines.declared_total_net_weight,
                creation_mode: Some(ReceptionMode::Lines),
                details: lines
                    .details
                    .iter()
                    .map(|line| LineResponse {
                        product: Some(ProductRef {
                            id: line.product.id,
                            name: None,
                        }),
                        net_weight: Some(line.net_weight),
                        boxes: Some(line.boxes),
                        price: line.price,
                        lot: Some(line.lot.clone()),
                    })
                    .collect(),
                ..empty_response(id)
            },
            SavePayload::Pallets(body) => {
                let mut pallets = Vec::with_capacity(body.pallets.len());
                for pallet in &body.pallets {
                    let pallet_id = match pallet.id {
                        Some(pallet_id) => pallet_id,
                        None => PalletId::new(state.allocate()),
                    };
                    let mut boxes = Vec::with_capacity(pallet.boxes.len());
                    for b in &pallet.boxes {
                        let (box_id, is_available, consumed_by) = match b.id {
                            Some(box_id) => {
                                let known = existing_boxes
                                    .get(&box_id)
                                    .ok_or_else(|| format!("box {box_id} not found"))?;
                                (box_id, known.is_available, known.consumed_by)
                            }
                            None => (BoxId::new(state.allocate()), true, None),
                        };
                        boxes.push(BoxResponse {
                            id: Some(box_id),
                            product: Some(ProductRef {
                                id: b.product.id,
                                name: None,
                            }),
                            lot: Some(b.lot.clone()),
                            gross_weight: Some(b.gross_weight),
                            net_weight: Some(b.net_weight),
                            barcode: b.barcode.clone(),
                            is_available,
                            consumed_by,
                        });
                    }
                    pallets.push(PalletResponse {
                        id: Some(pallet_id),
                        observations: Some(pallet.observations.clone()),
                        boxes,
                    });
                }
                ReceptionResponse {
                    supplier: Some(body.supplier),
                    date: Some(body.date),
                    notes: Some(body.notes.clone()),
                    declared_total_amount: body.declared_total_amount,
                    declared_total_net_weight: body.declared_total_net_weight,
                    creation_mode: Some(ReceptionMode::Pallets),
                    prices: body.prices.clone(),
                    pallets,
                    ..empty_response(id)
                }
            }
        };

        if let Some(previous) = previous {
            response.can_edit = previous.can_edit;
            response.cannot_edit_reason = previous.cannot_edit_reason;
        }
        state.receptions.insert(id, response.clone());
        Ok(response)
    }
}

fn empty_response(id: ReceptionId) -> ReceptionResponse {
    ReceptionResponse {
        id: Some(id),
        supplier: None,
        date: None,
        notes: None,
        declared_total_amount: None,
        declared_total_net_weight: None,
        creation_mode: None,
        details: Vec::new(),
        prices: Vec::new(),
        pallets: Vec::new(),
        can_edit: true,
        cannot_edit_reason: None,
    }
}

/// A pallets reception with product 7 lot "L-24" spread over two pallets
/// (80 + 40 = 120.00 kg) plus one box of product 8 with no lot.
///
/// Box 101 is consumed when `used` is set.
///
/// # Panics
///
/// Panics if the fixture JSON stops matching the wire shape.
#[must_use]
#[allow(clippy::unwrap_used)]
pub fn two_pallet_reception(used: bool) -> ReceptionResponse {
    let available = !used;
    let production = if used {
        json!({ "id": 55 })
    } else {
        Value::Null
    };
    let (can_edit, reason) = if used {
        (false, Some(USED_IN_PRODUCTION))
    } else {
        (true, None)
    };
    serde_json::from_value(json!({
        "id": 1,
        "supplier": { "id": 3, "name": "Granja Norte" },
        "date": "2024-09-12T00:00:00.000Z",
        "notes": "",
        "creationMode": "pallets",
        "prices": [
            { "product": { "id": 7 }, "lot": "L-24", "price": "2.40" },
            { "product": { "id": 8 }, "lot": "", "price": "1.10" }
        ],
        "pallets": [
            { "id": 10, "observations": "", "boxes": [
                { "id": 100, "product": { "id": 7 }, "lot": "L-24", "grossWeight": "41", "netWeight": "40.00" },
                { "id": 101, "product": { "id": 7 }, "lot": "L-24", "grossWeight": "41", "netWeight": "40.00",
                  "isAvailable": available, "production": production }
            ]},
            { "id": 11, "observations": "wet", "boxes": [
                { "id": 102, "product": { "id": 7 }, "lot": "L-24", "grossWeight": "41", "netWeight": "40.00" },
                { "id": 103, "product": { "id": 8 }, "grossWeight": "12.5", "netWeight": "12" }
            ]}
        ],
        "canEdit": can_edit,
        "cannotEditReason": reason
    }))
    .unwrap()
}

/// A lines reception with two complete lines.
///
/// # Panics
///
/// Panics if the fixture JSON stops matching the wire shape.
#[must_use]
#[allow(clippy::unwrap_used)]
pub fn lines_reception() -> ReceptionResponse {
    serde_json::from_value(json!({
        "id": 2,
        "supplier": { "id": 4 },
        "date": "2024-09-13",
        "creationMode": "lines",
        "details": [
            { "product": { "id": 7 }, "netWeight": "100.5", "boxes": 5, "price": "2.00", "lot": "L-24" },
            { "product": { "id": 9 }, "netWeight": "20", "boxes": 1, "price": null, "lot": "" }
        ],
        "declaredTotalAmount": "201"
    }))
    .unwrap()
}

/// Reception date used by fixtures built in code.
#[must_use]
pub fn fixture_date() -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(2024, 9, 12)
}

/// Sum of net weights for one product and lot in a response.
#[must_use]
pub fn response_total(response: &ReceptionResponse, product: i64, lot: &str) -> Decimal {
    response
        .pallets
        .iter()
        .flat_map(|p| &p.boxes)
        .filter(|b| {
            b.product.as_ref().map(|p| p.id.as_i64()) == Some(product)
                && b.lot.as_deref().unwrap_or_default() == lot
        })
        .filter_map(|b| b.net_weight)
        .sum()
}
