//! The (product, lot) pair that prices and weight totals are keyed by.

use core::fmt;

use serde::{Deserialize, Serialize};

use super::id::ProductId;

/// A product together with the free-text lot it was delivered under.
///
/// Two boxes with equal keys must always share one price, and in partial-edit
/// mode their summed net weight is frozen.
///
/// ```
/// use reception_core::{LotKey, ProductId};
///
/// let key = LotKey::new(ProductId::new(5), "L1");
/// assert_eq!(key.to_string(), "product 5 / lot L1");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LotKey {
    /// Product delivered.
    pub product_id: ProductId,
    /// Lot text, empty when no lot was recorded.
    pub lot: String,
}

impl LotKey {
    /// Create a key from a product and lot.
    #[must_use]
    pub fn new(product_id: ProductId, lot: impl Into<String>) -> Self {
        Self {
            product_id,
            lot: lot.into(),
        }
    }
}

impl fmt::Display for LotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.lot.is_empty() {
            write!(f, "product {} / no lot", self.product_id)
        } else {
            write!(f, "product {} / lot {}", self.product_id, self.lot)
        }
    }
}
