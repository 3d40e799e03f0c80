//! Order-independent canonical form of a reception.
//!
//! Two receptions that mean the same thing serialize to the same string,
//! whatever the order boxes and pallets were inserted in, however numbers
//! were written (`3` vs `3.0`) and whether blank optional fields are `None`
//! or empty. Session-local IDs (zero or negative) are not persisted and
//! read as absent.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde_json::{Value, json};

use reception_core::{canonical_decimal, canonical_optional_decimal};

use crate::model::{Pallet, PalletBox, Reception, ReceptionBody, ReceptionHeader};

/// A canonical serialization, comparable with plain equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalForm(String);

impl CanonicalForm {
    /// The serialized form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the form and returns the string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl std::fmt::Display for CanonicalForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct CanonicalBox {
    id: Option<i64>,
    product_id: Option<i64>,
    lot: String,
    gross_weight: String,
    net_weight: String,
    barcode: Option<String>,
}

impl CanonicalBox {
    fn from_box(b: &PalletBox) -> Self {
        Self {
            id: b.id.map(|id| id.as_i64()).filter(|id| *id > 0),
            product_id: b.product_id.map(|id| id.as_i64()),
            lot: b.lot.clone(),
            gross_weight: canonical_optional_decimal(b.gross_weight),
            net_weight: canonical_optional_decimal(b.net_weight),
            barcode: b.barcode.clone().filter(|code| !code.trim().is_empty()),
        }
    }

    /// Persisted boxes first by ID, then new boxes by (product, lot).
    fn display_order(&self, other: &Self) -> Ordering {
        match (self.id, other.id) {
            (Some(a), Some(b)) => a.cmp(&b).then_with(|| self.cmp(other)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => (self.product_id, &self.lot)
                .cmp(&(other.product_id, &other.lot))
                .then_with(|| self.cmp(other)),
        }
    }

    fn to_value(&self) -> Value {
        let mut value = json!({
            "id": self.id,
            "productId": self.product_id,
            "lot": self.lot,
            "grossWeight": self.gross_weight,
            "netWeight": self.net_weight,
        });
        if let (Some(code), Value::Object(map)) = (&self.barcode, &mut value) {
            map.insert("barcode".to_owned(), Value::String(code.clone()));
        }
        value
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct CanonicalPallet {
    id: Option<i64>,
    boxes: Vec<CanonicalBox>,
    net_weight: String,
    observations: String,
    prices: BTreeMap<String, String>,
}

impl CanonicalPallet {
    fn from_pallet(pallet: &Pallet) -> Self {
        let mut boxes: Vec<CanonicalBox> =
            pallet.boxes.iter().map(CanonicalBox::from_box).collect();
        boxes.sort_by(CanonicalBox::display_order);

        let prices = pallet
            .prices
            .iter()
            .filter_map(|(key, price)| {
                price.map(|p| (format!("{}|{}", key.product_id, key.lot), canonical_decimal(p)))
            })
            .collect();

        Self {
            id: pallet.id.map(|id| id.as_i64()).filter(|id| *id > 0),
            boxes,
            net_weight: canonical_decimal(pallet.net_weight()),
            observations: pallet.observations.clone(),
            prices,
        }
    }

    /// Persisted pallets first by ID, then new pallets by descending box count.
    fn display_order(&self, other: &Self) -> Ordering {
        match (self.id, other.id) {
            (Some(a), Some(b)) => a.cmp(&b).then_with(|| self.cmp(other)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => other
                .boxes
                .len()
                .cmp(&self.boxes.len())
                .then_with(|| self.cmp(other)),
        }
    }

    fn to_value(&self) -> Value {
        json!({
            "id": self.id,
            "netWeight": self.net_weight,
            "observations": self.observations,
            "prices": self.prices,
            "boxes": self.boxes.iter().map(CanonicalBox::to_value).collect::<Vec<_>>(),
        })
    }
}

fn header_value(header: &ReceptionHeader) -> Value {
    json!({
        "supplierId": header.supplier_id.map(|id| id.to_string()).unwrap_or_default(),
        "date": header.date.map(|d| d.format("%Y-%m-%d").to_string()).unwrap_or_default(),
        "notes": header.notes,
        "declaredTotalAmount": canonical_optional_decimal(header.declared_total_amount),
        "declaredTotalNetWeight": canonical_optional_decimal(header.declared_total_net_weight),
    })
}

fn pallets_value(pallets: &[Pallet]) -> Value {
    let mut canonical: Vec<CanonicalPallet> =
        pallets.iter().map(CanonicalPallet::from_pallet).collect();
    canonical.sort_by(CanonicalPallet::display_order);
    Value::Array(canonical.iter().map(CanonicalPallet::to_value).collect())
}

/// Canonical form of the header fields alone.
#[must_use]
pub fn canonical_header(header: &ReceptionHeader) -> CanonicalForm {
    CanonicalForm(header_value(header).to_string())
}

/// Canonical form of a pallets body alone.
#[must_use]
pub fn canonical_pallets(pallets: &[Pallet]) -> CanonicalForm {
    CanonicalForm(pallets_value(pallets).to_string())
}

/// Canonical form of a whole reception.
///
/// Lines have no nested identity problem, so a lines-mode reception is
/// represented by its header only; line edits are tracked by the form.
#[must_use]
pub fn canonicalize(reception: &Reception) -> CanonicalForm {
    let value = match &reception.body {
        ReceptionBody::Pallets(pallets) => json!({
            "header": header_value(&reception.header),
            "pallets": pallets_value(pallets),
        }),
        ReceptionBody::Lines(_) => json!({
            "header": header_value(&reception.header),
        }),
    };
    CanonicalForm(value.to_string())
}
