//! Reception-wide price index keyed by (product, lot).
//!
//! The index is the single source of truth for prices. Each pallet keeps a
//! projection of the entries its boxes carry, rebuilt from the index and never
//! read back as a second authority except when the index itself is extracted.

use std::collections::{BTreeMap, HashMap, HashSet};

use rust_decimal::Decimal;
use tracing::{debug, warn};

use reception_core::LotKey;

use crate::model::{Pallet, PalletBox, PriceEntry};

/// Authoritative price per (product, lot) pair.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PriceIndex {
    prices: HashMap<LotKey, Decimal>,
}

impl PriceIndex {
    /// Create an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the index from the pallet-local projections.
    ///
    /// Scans every box of every pallet once. When pallets disagree, the
    /// last pallet in order wins, since the editor writes projections in
    /// pallet order. Pairs without a price are omitted, never defaulted.
    #[must_use]
    pub fn extract(pallets: &[Pallet]) -> Self {
        let mut prices = HashMap::new();
        for pallet in pallets {
            for b in &pallet.boxes {
                let Some(key) = b.key() else { continue };
                if let Some(price) = pallet.price_for(&key) {
                    prices.insert(key, price);
                }
            }
        }
        debug!(entries = prices.len(), "Extracted global prices");
        Self { prices }
    }

    /// Build the index from a persisted price list.
    ///
    /// Duplicate keys violate the one-entry-per-pair rule; the last entry
    /// wins and the duplicate is logged.
    #[must_use]
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = PriceEntry>,
    {
        let mut prices = HashMap::new();
        for entry in entries {
            if let Some(previous) = prices.insert(entry.key.clone(), entry.price_per_kg) {
                warn!(
                    product = %entry.key.product_id,
                    lot = %entry.key.lot,
                    %previous,
                    current = %entry.price_per_kg,
                    "Duplicate price entry"
                );
            }
        }
        Self { prices }
    }

    /// Price for `key`, if one is set.
    #[must_use]
    pub fn get(&self, key: &LotKey) -> Option<Decimal> {
        self.prices.get(key).copied()
    }

    /// Set or clear the price for `key`.
    pub fn set(&mut self, key: LotKey, price: Option<Decimal>) {
        match price {
            Some(price) => {
                self.prices.insert(key, price);
            }
            None => {
                self.prices.remove(&key);
            }
        }
    }

    /// Number of priced pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.prices.len()
    }

    /// Whether no pair is priced.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    /// Entries sorted by key, for a deterministic price list.
    #[must_use]
    pub fn to_entries(&self) -> Vec<PriceEntry> {
        let mut entries: Vec<PriceEntry> = self
            .prices
            .iter()
            .map(|(key, price)| PriceEntry {
                key: key.clone(),
                price_per_kg: *price,
            })
            .collect();
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        entries
    }

    /// The subset of prices relevant to one pallet's boxes.
    #[must_use]
    pub fn prices_for(&self, pallet: &Pallet) -> BTreeMap<LotKey, Option<Decimal>> {
        pallet
            .keys()
            .into_iter()
            .filter_map(|key| self.get(&key).map(|price| (key, Some(price))))
            .collect()
    }

    /// Rebuild every pallet-local projection from the index.
    pub fn project_onto(&self, pallets: &mut [Pallet]) {
        for pallet in pallets {
            pallet.prices = self.prices_for(pallet);
        }
    }

    /// Drop entries whose key no longer appears on any box.
    pub fn retain_present(&mut self, pallets: &[Pallet]) {
        let present: HashSet<LotKey> = pallets
            .iter()
            .flat_map(|p| p.boxes.iter().filter_map(PalletBox::key))
            .collect();
        self.prices.retain(|key, _| present.contains(key));
    }
}

/// Write `price` into the projection of every pallet carrying `key`.
///
/// Pallets without a box for `key` are left untouched, as are all other
/// keys. Runs in one pass over the boxes. Returns the number of pallets
/// updated.
pub fn synchronize(key: &LotKey, price: Option<Decimal>, pallets: &mut [Pallet]) -> usize {
    let mut touched = 0;
    for pallet in pallets.iter_mut() {
        if pallet.contains_key(key) {
            pallet.prices.insert(key.clone(), price);
            touched += 1;
        }
    }
    debug!(
        product = %key.product_id,
        lot = %key.lot,
        pallets = touched,
        "Synchronized price"
    );
    touched
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    use reception_core::ProductId;

    use super::*;

    fn key(product: i64, lot: &str) -> LotKey {
        LotKey::new(ProductId::new(product), lot)
    }

    fn pallet_with(keys: &[(i64, &str)]) -> Pallet {
        Pallet {
            boxes: keys
                .iter()
                .map(|(p, l)| PalletBox::new(ProductId::new(*p), *l, dec!(11), dec!(10)))
                .collect(),
            ..Pallet::default()
        }
    }

    #[test]
    fn test_extract_omits_unpriced_pairs() {
        let mut a = pallet_with(&[(1, "A"), (2, "B")]);
        a.prices.insert(key(1, "A"), Some(dec!(2.5)));
        a.prices.insert(key(2, "B"), None);
        let index = PriceIndex::extract(&[a]);
        assert_eq!(index.len(), 1);
        assert_eq!(index.get(&key(1, "A")), Some(dec!(2.5)));
        assert_eq!(index.get(&key(2, "B")), None);
    }

    #[test]
    fn test_extract_ignores_stale_projection_entries() {
        let mut a = pallet_with(&[(1, "A")]);
        a.prices.insert(key(9, "gone"), Some(dec!(4)));
        let index = PriceIndex::extract(&[a]);
        assert!(index.is_empty());
    }

    #[test]
    fn test_extract_last_pallet_wins() {
        let mut a = pallet_with(&[(1, "A")]);
        let mut b = pallet_with(&[(1, "A")]);
        a.prices.insert(key(1, "A"), Some(dec!(1)));
        b.prices.insert(key(1, "A"), Some(dec!(3)));
        let index = PriceIndex::extract(&[a, b]);
        assert_eq!(index.get(&key(1, "A")), Some(dec!(3)));
    }

    #[test]
    fn test_synchronize_only_touches_carrying_pallets() {
        let mut pallets = vec![
            pallet_with(&[(1, "A")]),
            pallet_with(&[(2, "B")]),
            pallet_with(&[(1, "A"), (2, "B")]),
        ];
        pallets[1].prices.insert(key(2, "B"), Some(dec!(7)));

        let touched = synchronize(&key(1, "A"), Some(dec!(4.2)), &mut pallets);

        assert_eq!(touched, 2);
        assert_eq!(pallets[0].price_for(&key(1, "A")), Some(dec!(4.2)));
        assert_eq!(pallets[1].price_for(&key(1, "A")), None);
        assert_eq!(pallets[1].price_for(&key(2, "B")), Some(dec!(7)));
        assert_eq!(pallets[2].price_for(&key(1, "A")), Some(dec!(4.2)));
        assert_eq!(pallets[2].price_for(&key(2, "B")), None);
    }

    #[test]
    fn test_synchronize_clear() {
        let mut pallets = vec![pallet_with(&[(1, "A")])];
        synchronize(&key(1, "A"), Some(dec!(1)), &mut pallets);
        synchronize(&key(1, "A"), None, &mut pallets);
        assert_eq!(pallets[0].price_for(&key(1, "A")), None);
        assert!(PriceIndex::extract(&pallets).is_empty());
    }

    #[test]
    fn test_prices_for_intersects_with_pallet_keys() {
        let index = PriceIndex::from_entries([
            PriceEntry {
                key: key(1, "A"),
                price_per_kg: dec!(2),
            },
            PriceEntry {
                key: key(2, "B"),
                price_per_kg: dec!(3),
            },
        ]);
        let prices = index.prices_for(&pallet_with(&[(1, "A"), (3, "C")]));
        assert_eq!(prices.len(), 1);
        assert_eq!(prices.get(&key(1, "A")), Some(&Some(dec!(2))));
    }

    #[test]
    fn test_from_entries_duplicate_last_wins() {
        let index = PriceIndex::from_entries([
            PriceEntry {
                key: key(1, "A"),
                price_per_kg: dec!(2),
            },
            PriceEntry {
                key: key(1, "A"),
                price_per_kg: dec!(5),
            },
        ]);
        assert_eq!(index.len(), 1);
        assert_eq!(index.get(&key(1, "A")), Some(dec!(5)));
    }

    #[test]
    fn test_retain_present() {
        let mut index = PriceIndex::new();
        index.set(key(1, "A"), Some(dec!(1)));
        index.set(key(2, "B"), Some(dec!(2)));
        index.retain_present(&[pallet_with(&[(2, "B")])]);
        assert_eq!(index.to_entries().len(), 1);
        assert_eq!(index.get(&key(2, "B")), Some(dec!(2)));
    }

    fn pallets_strategy() -> impl Strategy<Value = Vec<Pallet>> {
        let box_key = (1i64..4, prop_oneof![Just("L1"), Just("L2")]);
        prop::collection::vec(prop::collection::vec(box_key, 1..5), 1..6).prop_map(|pallets| {
            pallets
                .into_iter()
                .map(|keys| Pallet {
                    boxes: keys
                        .into_iter()
                        .map(|(p, l)| PalletBox::new(ProductId::new(p), l, dec!(2), dec!(1)))
                        .collect(),
                    ..Pallet::default()
                })
                .collect()
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn synchronization_closure(
            mut pallets in pallets_strategy(),
            product in 1i64..4,
            cents in 0i64..100_000,
        ) {
            let target = key(product, "L1");
            let other = key(1 + product % 3, "L2");
            synchronize(&other, Some(dec!(9.99)), &mut pallets);
            let price = Decimal::new(cents, 2);

            synchronize(&target, Some(price), &mut pallets);

            let index = PriceIndex::extract(&pallets);
            for pallet in &pallets {
                for b in &pallet.boxes {
                    if b.has_key(&target) {
                        prop_assert_eq!(pallet.price_for(&target), Some(price));
                    }
                    if b.has_key(&other) {
                        prop_assert_eq!(pallet.price_for(&other), Some(dec!(9.99)));
                    }
                }
            }
            if pallets.iter().any(|p| p.contains_key(&target)) {
                prop_assert_eq!(index.get(&target), Some(price));
            }
        }
    }
}
