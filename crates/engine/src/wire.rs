//! Wire shapes exchanged with the persistence collaborator.
//!
//! Save payloads are produced by [`crate::transform`]; load responses are
//! consumed by it. Field names follow the persistence API (camelCase).

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

use reception_core::{BoxId, PalletId, ProductId, ProductionId, ReceptionId, SupplierId};

use crate::model::ReceptionMode;

/// A `{ "id": ... }` reference to another entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdRef<T> {
    /// Referenced ID.
    pub id: T,
}

impl<T> IdRef<T> {
    /// Wrap an ID.
    pub const fn new(id: T) -> Self {
        Self { id }
    }
}

// =============================================================================
// Save payloads
// =============================================================================

/// One line of a lines-mode save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineWire {
    pub product: IdRef<ProductId>,
    pub net_weight: Decimal,
    pub boxes: u32,
    pub price: Option<Decimal>,
    pub lot: String,
}

/// One entry of the reception-wide price list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceWire {
    pub product: IdRef<ProductId>,
    #[serde(default)]
    pub lot: String,
    pub price: Decimal,
}

/// One box of a pallets-mode save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoxWire {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<BoxId>,
    pub product: IdRef<ProductId>,
    pub lot: String,
    pub gross_weight: Decimal,
    pub net_weight: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub barcode: Option<String>,
}

/// One pallet of a pallets-mode save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PalletWire {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<PalletId>,
    pub observations: String,
    pub boxes: Vec<BoxWire>,
}

/// Lines-mode save body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinesSavePayload {
    pub supplier: IdRef<SupplierId>,
    pub date: NaiveDate,
    pub notes: String,
    pub details: Vec<LineWire>,
    pub declared_total_amount: Option<Decimal>,
    pub declared_total_net_weight: Option<Decimal>,
}

/// Pallets-mode save body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PalletsSavePayload {
    pub supplier: IdRef<SupplierId>,
    pub date: NaiveDate,
    pub notes: String,
    pub prices: Vec<PriceWire>,
    pub pallets: Vec<PalletWire>,
    pub declared_total_amount: Option<Decimal>,
    pub declared_total_net_weight: Option<Decimal>,
}

/// Whatever a save hands to persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum SavePayload {
    Lines(LinesSavePayload),
    Pallets(PalletsSavePayload),
}

impl SavePayload {
    /// The mode of the payload.
    #[must_use]
    pub const fn mode(&self) -> ReceptionMode {
        match self {
            Self::Lines(_) => ReceptionMode::Lines,
            Self::Pallets(_) => ReceptionMode::Pallets,
        }
    }
}

// =============================================================================
// Load response
// =============================================================================

/// Product reference as returned on load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRef {
    pub id: ProductId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Line as returned on load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineResponse {
    #[serde(default)]
    pub product: Option<ProductRef>,
    #[serde(default)]
    pub net_weight: Option<Decimal>,
    #[serde(default)]
    pub boxes: Option<u32>,
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub lot: Option<String>,
}

/// Box as returned on load, with usage linkage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoxResponse {
    #[serde(default)]
    pub id: Option<BoxId>,
    #[serde(default)]
    pub product: Option<ProductRef>,
    #[serde(default)]
    pub lot: Option<String>,
    #[serde(default)]
    pub gross_weight: Option<Decimal>,
    #[serde(default)]
    pub net_weight: Option<Decimal>,
    #[serde(default)]
    pub barcode: Option<String>,
    #[serde(default = "default_true")]
    pub is_available: bool,
    #[serde(default, alias = "production")]
    pub consumed_by: Option<IdRef<ProductionId>>,
}

/// Pallet as returned on load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PalletResponse {
    #[serde(default)]
    pub id: Option<PalletId>,
    #[serde(default)]
    pub observations: Option<String>,
    #[serde(default)]
    pub boxes: Vec<BoxResponse>,
}

/// A reception as returned by persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceptionResponse {
    #[serde(default)]
    pub id: Option<ReceptionId>,
    #[serde(default)]
    pub supplier: Option<IdRef<SupplierId>>,
    #[serde(default, deserialize_with = "deserialize_day")]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub declared_total_amount: Option<Decimal>,
    #[serde(default)]
    pub declared_total_net_weight: Option<Decimal>,
    #[serde(default)]
    pub creation_mode: Option<ReceptionMode>,
    #[serde(default)]
    pub details: Vec<LineResponse>,
    #[serde(default)]
    pub prices: Vec<PriceWire>,
    #[serde(default)]
    pub pallets: Vec<PalletResponse>,
    #[serde(default = "default_true")]
    pub can_edit: bool,
    #[serde(default)]
    pub cannot_edit_reason: Option<String>,
}

impl ReceptionResponse {
    /// The mode the reception was created in.
    ///
    /// Uses `creationMode` when present; otherwise a reception with details is
    /// a lines reception and anything else a pallets reception.
    #[must_use]
    pub fn mode(&self) -> ReceptionMode {
        self.creation_mode.unwrap_or(if self.details.is_empty() {
            ReceptionMode::Pallets
        } else {
            ReceptionMode::Lines
        })
    }
}

const fn default_true() -> bool {
    true
}

/// Accept `YYYY-MM-DD` or any timestamp starting with it.
fn deserialize_day<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    let Some(raw) = raw else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let day = trimmed.get(..10).unwrap_or(trimmed);
    NaiveDate::parse_from_str(day, "%Y-%m-%d")
        .map(Some)
        .map_err(|e| serde::de::Error::custom(format!("invalid date '{trimmed}': {e}")))
}
