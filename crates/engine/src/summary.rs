//! Derived totals shown next to the editor and compared with the delivery note.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::model::{Line, Pallet, Reception, ReceptionBody};
use crate::price_index::PriceIndex;

/// Totals computed from the reception body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceptionSummary {
    pub pallet_count: usize,
    pub box_count: u64,
    pub total_net_weight: Decimal,
    pub total_gross_weight: Decimal,
    /// Sum of net weight times price, over priced boxes or lines.
    pub total_amount: Decimal,
    /// Boxes or lines whose (product, lot) has no price yet.
    pub unpriced_count: u64,
    /// Computed minus declared amount, when an amount was declared.
    pub amount_difference: Option<Decimal>,
    /// Computed minus declared net weight, when a weight was declared.
    pub net_weight_difference: Option<Decimal>,
}

impl ReceptionSummary {
    /// Summarize a reception.
    ///
    /// Pallets-mode amounts use the authoritative price index rather than the
    /// pallet projections.
    #[must_use]
    pub fn compute(reception: &Reception, prices: &PriceIndex) -> Self {
        let mut summary = match &reception.body {
            ReceptionBody::Pallets(pallets) => Self::from_pallets(pallets, prices),
            ReceptionBody::Lines(lines) => Self::from_lines(lines),
        };
        summary.amount_difference = reception
            .header
            .declared_total_amount
            .map(|declared| summary.total_amount - declared);
        summary.net_weight_difference = reception
            .header
            .declared_total_net_weight
            .map(|declared| summary.total_net_weight - declared);
        summary
    }

    fn from_pallets(pallets: &[Pallet], prices: &PriceIndex) -> Self {
        let mut summary = Self {
            pallet_count: pallets.len(),
            ..Self::default()
        };
        for b in pallets.iter().flat_map(|p| &p.boxes) {
            summary.box_count += 1;
            let net = b.net_weight_or_zero();
            summary.total_net_weight += net;
            summary.total_gross_weight += b.gross_weight.unwrap_or(Decimal::ZERO);
            match b.key().and_then(|key| prices.get(&key)) {
                Some(price) => summary.total_amount += net * price,
                None => summary.unpriced_count += 1,
            }
        }
        summary
    }

    fn from_lines(lines: &[Line]) -> Self {
        let mut summary = Self::default();
        for line in lines.iter().filter(|l| l.is_complete()) {
            let net = line.net_weight.unwrap_or(Decimal::ZERO);
            summary.box_count += u64::from(line.box_count);
            summary.total_net_weight += net;
            match line.price_per_kg {
                Some(price) => summary.total_amount += net * price,
                None => summary.unpriced_count += 1,
            }
        }
        summary
    }
}
