//! Conversions between the nested pallet model and the flat wire shapes.
//!
//! Everything here is pure: no function mutates its input, so a failed save
//! never requires rolling back local state.

use std::collections::{BTreeMap, HashMap, HashSet};

use rust_decimal::Decimal;
use tracing::{debug, instrument};

use reception_core::{BoxId, LotKey, PalletId, ProductId};

use crate::config::EngineConfig;
use crate::constraint::{OriginalSnapshot, has_used_boxes};
use crate::error::ValidationError;
use crate::model::{
    EditPermission, Line, Pallet, PalletBox, PriceEntry, Reception, ReceptionBody,
    ReceptionHeader, ReceptionMode,
};
use crate::price_index::PriceIndex;
use crate::wire::{
    BoxResponse, BoxWire, IdRef, LineResponse, LineWire, LinesSavePayload, PalletResponse,
    PalletWire, PalletsSavePayload, PriceWire, ReceptionResponse, SavePayload,
};

/// Flat pallets-mode body: price list plus pallets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PalletsWireBody {
    /// One entry per priced (product, lot) pair.
    pub prices: Vec<PriceWire>,
    /// Pallets with their boxes.
    pub pallets: Vec<PalletWire>,
}

/// Everything reconstructed from a load response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedReception {
    /// The editable reception.
    pub reception: Reception,
    /// Authoritative prices (empty in lines mode).
    pub prices: PriceIndex,
    /// Totals, persisted IDs and usage captured at load time.
    pub snapshot: OriginalSnapshot,
    /// How far the reception may be edited.
    pub permission: EditPermission,
}

// =============================================================================
// Domain -> wire
// =============================================================================

/// Lines to wire, dropping lines without a product or a positive net weight.
#[must_use]
pub fn domain_to_lines_wire(lines: &[Line]) -> Vec<LineWire> {
    lines
        .iter()
        .filter_map(|line| {
            let product = line.product_id?;
            let net_weight = line.net_weight.filter(|w| *w > Decimal::ZERO)?;
            Some(LineWire {
                product: IdRef::new(product),
                net_weight,
                boxes: line.box_count,
                price: line.price_per_kg,
                lot: line.lot.clone(),
            })
        })
        .collect()
}

fn price_entry_to_wire(entry: PriceEntry) -> PriceWire {
    PriceWire {
        product: IdRef::new(entry.key.product_id),
        lot: entry.key.lot,
        price: entry.price_per_kg,
    }
}

fn box_to_wire(b: &PalletBox, original_box_ids: &HashSet<BoxId>) -> Option<BoxWire> {
    let product = b.product_id?;
    Some(BoxWire {
        id: b.id.filter(|id| original_box_ids.contains(id)),
        product: IdRef::new(product),
        lot: b.lot.clone(),
        gross_weight: b.gross_weight.unwrap_or(Decimal::ZERO),
        net_weight: b.net_weight_or_zero(),
        barcode: b.barcode.clone().filter(|code| !code.trim().is_empty()),
    })
}

/// Pallets to wire.
///
/// The price list is extracted from the pallet projections and only covers
/// priced pairs. Box and pallet IDs survive only when persistence assigned
/// them; locally fabricated IDs are never sent.
#[must_use]
pub fn domain_to_pallets_wire(
    pallets: &[Pallet],
    original_box_ids: &HashSet<BoxId>,
    original_pallet_ids: &HashSet<PalletId>,
) -> PalletsWireBody {
    let prices = PriceIndex::extract(pallets)
        .to_entries()
        .into_iter()
        .map(price_entry_to_wire)
        .collect();

    let pallets = pallets
        .iter()
        .map(|pallet| PalletWire {
            id: pallet.id.filter(|id| original_pallet_ids.contains(id)),
            observations: pallet.observations.clone(),
            boxes: pallet
                .boxes
                .iter()
                .filter_map(|b| box_to_wire(b, original_box_ids))
                .collect(),
        })
        .collect();

    PalletsWireBody { prices, pallets }
}

/// Build the full save payload for a reception.
///
/// # Errors
///
/// Returns an error if the supplier or date is missing.
pub fn build_save_payload(
    reception: &Reception,
    snapshot: &OriginalSnapshot,
) -> Result<SavePayload, ValidationError> {
    let header = &reception.header;
    let supplier = header.supplier_id.ok_or(ValidationError::MissingSupplier)?;
    let date = header.date.ok_or(ValidationError::MissingDate)?;

    Ok(match &reception.body {
        ReceptionBody::Lines(lines) => SavePayload::Lines(LinesSavePayload {
            supplier: IdRef::new(supplier),
            date,
            notes: header.notes.clone(),
            details: domain_to_lines_wire(lines),
            declared_total_amount: header.declared_total_amount,
            declared_total_net_weight: header.declared_total_net_weight,
        }),
        ReceptionBody::Pallets(pallets) => {
            let body = domain_to_pallets_wire(pallets, &snapshot.box_ids, &snapshot.pallet_ids);
            SavePayload::Pallets(PalletsSavePayload {
                supplier: IdRef::new(supplier),
                date,
                notes: header.notes.clone(),
                prices: body.prices,
                pallets: body.pallets,
                declared_total_amount: header.declared_total_amount,
                declared_total_net_weight: header.declared_total_net_weight,
            })
        }
    })
}

// =============================================================================
// Wire -> domain
// =============================================================================

fn box_from_response(b: &BoxResponse) -> PalletBox {
    PalletBox {
        id: b.id,
        product_id: b.product.as_ref().map(|p| p.id),
        lot: b.lot.clone().unwrap_or_default(),
        gross_weight: b.gross_weight,
        net_weight: b.net_weight,
        barcode: b.barcode.clone().filter(|code| !code.trim().is_empty()),
        is_available: b.is_available,
        consumed_by: b.consumed_by.map(|r| r.id),
    }
}

fn pallet_from_response(pallet: &PalletResponse, index: &PriceIndex) -> Pallet {
    let mut domain = Pallet {
        id: pallet.id,
        boxes: pallet.boxes.iter().map(box_from_response).collect(),
        observations: pallet.observations.clone().unwrap_or_default(),
        prices: BTreeMap::new(),
    };
    domain.prices = index.prices_for(&domain);
    domain
}

/// Rebuild pallets, prices and the load-time snapshot from a response.
///
/// Each pallet's price projection is the global price list intersected with
/// the pallet's own (product, lot) pairs.
#[must_use]
pub fn wire_to_pallets(
    response: &ReceptionResponse,
) -> (Vec<Pallet>, PriceIndex, OriginalSnapshot) {
    let index = PriceIndex::from_entries(response.prices.iter().map(|p| PriceEntry {
        key: LotKey::new(p.product.id, p.lot.clone()),
        price_per_kg: p.price,
    }));
    let pallets: Vec<Pallet> = response
        .pallets
        .iter()
        .map(|p| pallet_from_response(p, &index))
        .collect();
    let snapshot = OriginalSnapshot::capture(&pallets);
    (pallets, index, snapshot)
}

/// Rebuild lines from a response's details.
///
/// The box count of each line is reconstructed by counting boxes of the same
/// product in the attached pallets, falling back to the line's own count and
/// then to 1. It is display-only: the lines view does not track boxes.
#[must_use]
pub fn wire_to_lines(details: &[LineResponse], pallets: &[PalletResponse]) -> Vec<Line> {
    let mut boxes_per_product: HashMap<ProductId, u32> = HashMap::new();
    for b in pallets.iter().flat_map(|p| &p.boxes) {
        if let Some(product) = &b.product {
            *boxes_per_product.entry(product.id).or_default() += 1;
        }
    }

    details
        .iter()
        .map(|detail| {
            let product_id = detail.product.as_ref().map(|p| p.id);
            let counted = product_id
                .and_then(|id| boxes_per_product.get(&id).copied())
                .filter(|count| *count > 0);
            Line {
                product_id,
                net_weight: detail.net_weight,
                box_count: counted
                    .or(detail.boxes.filter(|count| *count > 0))
                    .unwrap_or(1),
                price_per_kg: detail.price,
                lot: detail.lot.clone().unwrap_or_default(),
            }
        })
        .collect()
}

fn header_from_response(response: &ReceptionResponse) -> ReceptionHeader {
    ReceptionHeader {
        supplier_id: response.supplier.map(|s| s.id),
        date: response.date,
        notes: response.notes.clone().unwrap_or_default(),
        declared_total_amount: response.declared_total_amount,
        declared_total_net_weight: response.declared_total_net_weight,
    }
}

/// Reconstruct the editable reception from a load response.
#[instrument(skip(response, config), fields(reception_id = ?response.id))]
#[must_use]
pub fn wire_to_domain(response: &ReceptionResponse, config: &EngineConfig) -> LoadedReception {
    let header = header_from_response(response);
    let mode = response.mode();

    let (body, prices, mut snapshot) = match mode {
        ReceptionMode::Pallets => {
            let (pallets, index, snapshot) = wire_to_pallets(response);
            (ReceptionBody::Pallets(pallets), index, snapshot)
        }
        ReceptionMode::Lines => {
            let lines = wire_to_lines(&response.details, &response.pallets);
            // Box usage must come from actual box records, never from lines.
            let (pallets, _, _) = wire_to_pallets(response);
            let snapshot = OriginalSnapshot {
                has_used_boxes: has_used_boxes(&pallets),
                ..OriginalSnapshot::default()
            };
            (ReceptionBody::Lines(lines), PriceIndex::new(), snapshot)
        }
    };

    let permission = EditPermission::resolve(
        response.can_edit,
        response.cannot_edit_reason.as_deref(),
        snapshot.has_used_boxes,
        &config.partial_edit_keywords,
    );
    // A refusal citing box usage restricts editing even when no used box is
    // visible in the payload.
    if permission == EditPermission::Partial {
        snapshot.has_used_boxes = true;
    }

    debug!(
        %mode,
        prices = prices.len(),
        used = snapshot.has_used_boxes,
        ?permission,
        "Reconstructed reception"
    );

    LoadedReception {
        reception: Reception {
            id: response.id,
            header,
            body,
        },
        prices,
        snapshot,
        permission,
    }
}
