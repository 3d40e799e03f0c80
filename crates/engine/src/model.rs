//! In-memory reception model held by the editing surface.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use reception_core::{BoxId, LotKey, PalletId, ProductId, ProductionId, ReceptionId, SupplierId};

/// How a reception body was created. Fixed at creation, never mixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReceptionMode {
    /// Flat accounting lines.
    Lines,
    /// Pallets of individually tracked boxes.
    Pallets,
}

impl std::fmt::Display for ReceptionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lines => write!(f, "lines"),
            Self::Pallets => write!(f, "pallets"),
        }
    }
}

/// Header fields shared by both reception modes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReceptionHeader {
    /// Supplier that delivered the goods.
    pub supplier_id: Option<SupplierId>,
    /// Delivery date.
    pub date: Option<NaiveDate>,
    /// Free-text notes.
    pub notes: String,
    /// Amount declared on the delivery note, if any.
    pub declared_total_amount: Option<Decimal>,
    /// Net weight declared on the delivery note, if any.
    pub declared_total_net_weight: Option<Decimal>,
}

/// A flat accounting line (lines mode).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    /// Product received.
    pub product_id: Option<ProductId>,
    /// Net weight received.
    pub net_weight: Option<Decimal>,
    /// Number of boxes. Display-only when reconstructed from pallets.
    pub box_count: u32,
    /// Price per kilogram, empty when not yet agreed.
    pub price_per_kg: Option<Decimal>,
    /// Lot text.
    pub lot: String,
}

impl Default for Line {
    fn default() -> Self {
        Self {
            product_id: None,
            net_weight: None,
            box_count: 1,
            price_per_kg: None,
            lot: String::new(),
        }
    }
}

impl Line {
    /// Whether the line carries enough data to be persisted.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.product_id.is_some() && self.net_weight.is_some_and(|w| w > Decimal::ZERO)
    }
}

/// The smallest tracked unit of product, lot and weight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PalletBox {
    /// Persisted ID; `None` for a box created in this session.
    pub id: Option<BoxId>,
    /// Product in the box.
    pub product_id: Option<ProductId>,
    /// Lot text.
    pub lot: String,
    /// Gross weight including packaging.
    pub gross_weight: Option<Decimal>,
    /// Net product weight.
    pub net_weight: Option<Decimal>,
    /// Optional barcode (GS1/SSCC) printed on the box label.
    pub barcode: Option<String>,
    /// False once the box has been taken out of stock.
    pub is_available: bool,
    /// Production run that consumed the box.
    pub consumed_by: Option<ProductionId>,
}

impl Default for PalletBox {
    fn default() -> Self {
        Self {
            id: None,
            product_id: None,
            lot: String::new(),
            gross_weight: None,
            net_weight: None,
            barcode: None,
            is_available: true,
            consumed_by: None,
        }
    }
}

impl PalletBox {
    /// Create a box for a product and lot with the given weights.
    #[must_use]
    pub fn new(
        product_id: ProductId,
        lot: impl Into<String>,
        gross: Decimal,
        net: Decimal,
    ) -> Self {
        Self {
            product_id: Some(product_id),
            lot: lot.into(),
            gross_weight: Some(gross),
            net_weight: Some(net),
            ..Self::default()
        }
    }

    /// Builder-style helper to attach a persisted ID.
    #[must_use]
    pub const fn with_id(mut self, id: BoxId) -> Self {
        self.id = Some(id);
        self
    }

    /// The (product, lot) key, if a product has been chosen.
    #[must_use]
    pub fn key(&self) -> Option<LotKey> {
        self.product_id.map(|product| LotKey::new(product, self.lot.clone()))
    }

    /// Whether this box carries exactly `key`, without allocating.
    #[must_use]
    pub fn has_key(&self, key: &LotKey) -> bool {
        self.product_id == Some(key.product_id) && self.lot == key.lot
    }

    /// A box is used once it left stock or a production run consumed it.
    #[must_use]
    pub const fn is_used(&self) -> bool {
        !self.is_available || self.consumed_by.is_some()
    }

    /// Net weight, counting a blank weight as zero.
    #[must_use]
    pub fn net_weight_or_zero(&self) -> Decimal {
        self.net_weight.unwrap_or(Decimal::ZERO)
    }
}

/// A grouping of boxes.
///
/// `prices` is a display projection of the reception-wide price index,
/// restricted to the keys this pallet's boxes carry. `None` values are
/// prices cleared in the editor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pallet {
    /// Persisted ID; `None` for a pallet created in this session.
    pub id: Option<PalletId>,
    /// Boxes on the pallet.
    pub boxes: Vec<PalletBox>,
    /// Free-text observations.
    pub observations: String,
    /// Pallet-local price projection.
    pub prices: BTreeMap<LotKey, Option<Decimal>>,
}

impl Pallet {
    /// Create an empty, unsaved pallet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Net weight of the pallet, always derived from its boxes.
    #[must_use]
    pub fn net_weight(&self) -> Decimal {
        self.boxes.iter().map(PalletBox::net_weight_or_zero).sum()
    }

    /// Gross weight of the pallet, derived from its boxes.
    #[must_use]
    pub fn gross_weight(&self) -> Decimal {
        self.boxes
            .iter()
            .map(|b| b.gross_weight.unwrap_or(Decimal::ZERO))
            .sum()
    }

    /// Whether any box on the pallet carries `key`.
    #[must_use]
    pub fn contains_key(&self, key: &LotKey) -> bool {
        self.boxes.iter().any(|b| b.has_key(key))
    }

    /// Distinct keys carried by this pallet's boxes.
    #[must_use]
    pub fn keys(&self) -> BTreeSet<LotKey> {
        self.boxes.iter().filter_map(PalletBox::key).collect()
    }

    /// The pallet-local price for `key`, if one is set.
    #[must_use]
    pub fn price_for(&self, key: &LotKey) -> Option<Decimal> {
        self.prices.get(key).copied().flatten()
    }
}

/// A single authoritative price for a (product, lot) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PriceEntry {
    /// Product and lot priced.
    pub key: LotKey,
    /// Price per kilogram.
    pub price_per_kg: Decimal,
}

/// The body of a reception: exactly one of the two modes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceptionBody {
    /// Flat accounting lines.
    Lines(Vec<Line>),
    /// Pallets of boxes.
    Pallets(Vec<Pallet>),
}

impl ReceptionBody {
    /// The mode this body belongs to.
    #[must_use]
    pub const fn mode(&self) -> ReceptionMode {
        match self {
            Self::Lines(_) => ReceptionMode::Lines,
            Self::Pallets(_) => ReceptionMode::Pallets,
        }
    }
}

/// A delivery from a supplier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reception {
    /// Persisted ID, if any.
    pub id: Option<ReceptionId>,
    /// Header fields.
    pub header: ReceptionHeader,
    /// Lines or pallets.
    pub body: ReceptionBody,
}

impl Reception {
    /// Start a new reception in the given mode.
    #[must_use]
    pub const fn new(mode: ReceptionMode) -> Self {
        Self {
            id: None,
            header: ReceptionHeader {
                supplier_id: None,
                date: None,
                notes: String::new(),
                declared_total_amount: None,
                declared_total_net_weight: None,
            },
            body: match mode {
                ReceptionMode::Lines => ReceptionBody::Lines(Vec::new()),
                ReceptionMode::Pallets => ReceptionBody::Pallets(Vec::new()),
            },
        }
    }

    /// The reception's mode.
    #[must_use]
    pub const fn mode(&self) -> ReceptionMode {
        self.body.mode()
    }

    /// Pallets, when in pallets mode.
    #[must_use]
    pub fn pallets(&self) -> Option<&[Pallet]> {
        match &self.body {
            ReceptionBody::Pallets(pallets) => Some(pallets),
            ReceptionBody::Lines(_) => None,
        }
    }

    /// Lines, when in lines mode.
    #[must_use]
    pub fn lines(&self) -> Option<&[Line]> {
        match &self.body {
            ReceptionBody::Lines(lines) => Some(lines),
            ReceptionBody::Pallets(_) => None,
        }
    }
}

/// How far a loaded reception may be edited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditPermission {
    /// Every field may change.
    Full,
    /// Some box is used downstream: per-lot weight totals are frozen and no
    /// new boxes may be created.
    Partial,
    /// No edits at all.
    Blocked {
        /// Reason reported by persistence.
        reason: String,
    },
}

/// Lowercased alphanumeric words of `text`.
fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Whether `keyword` (one or more words) appears as whole words in `words`.
fn mentions(words: &[String], keyword: &str) -> bool {
    let needle = self::words(keyword);
    if needle.is_empty() {
        return false;
    }
    words.windows(needle.len()).any(|w| w == needle.as_slice())
}

impl EditPermission {
    /// Derive the permission from the load response flags.
    ///
    /// A refusal whose reason mentions box usage downgrades to partial
    /// editing; any other refusal blocks editing entirely. Keywords match
    /// whole words case-insensitively, so "box" matches "Box used" but not
    /// "inbox".
    #[must_use]
    pub fn resolve(
        can_edit: bool,
        cannot_edit_reason: Option<&str>,
        has_used_boxes: bool,
        usage_keywords: &[String],
    ) -> Self {
        if can_edit {
            return if has_used_boxes {
                Self::Partial
            } else {
                Self::Full
            };
        }

        let reason = cannot_edit_reason.unwrap_or_default();
        let words = words(reason);
        if usage_keywords
            .iter()
            .any(|keyword| mentions(&words, keyword))
        {
            Self::Partial
        } else {
            Self::Blocked {
                reason: reason.to_owned(),
            }
        }
    }

    /// Whether any mutation is allowed.
    #[must_use]
    pub const fn allows_edits(&self) -> bool {
        !matches!(self, Self::Blocked { .. })
    }
}
