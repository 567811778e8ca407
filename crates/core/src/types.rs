//! Core type definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Latest known price of a single asset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetPrice {
    pub symbol: String,
    pub price: f64,
}

impl AssetPrice {
    pub fn new(symbol: impl Into<String>, price: f64) -> Self {
        Self {
            symbol: symbol.into(),
            price,
        }
    }
}

impl fmt::Display for AssetPrice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.symbol, self.price)
    }
}

/// Prices decoded from one feed message.
///
/// Holds only the assets the message mentioned; everything else keeps its
/// previous price when merged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialUpdate {
    pub prices: Vec<AssetPrice>,
}

impl PartialUpdate {
    pub fn new(prices: Vec<AssetPrice>) -> Self {
        Self { prices }
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AssetPrice> {
        self.prices.iter()
    }

    /// Last price the update carries for `symbol`
    pub fn price_of(&self, symbol: &str) -> Option<f64> {
        self.prices
            .iter()
            .rev()
            .find(|p| p.symbol == symbol)
            .map(|p| p.price)
    }
}

impl FromIterator<AssetPrice> for PartialUpdate {
    fn from_iter<I: IntoIterator<Item = AssetPrice>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Immutable view of every tracked asset at one point in time.
///
/// Snapshots are never edited in place: merging produces a new snapshot
/// with a higher version.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    assets: Vec<AssetPrice>,
    version: u64,
    updated_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn empty() -> Self {
        Self {
            assets: Vec::new(),
            version: 0,
            updated_at: Utc::now(),
        }
    }

    /// Build a snapshot from a full price list.
    ///
    /// A symbol listed more than once keeps the position of its first
    /// occurrence and the price of its last.
    pub fn from_assets<I>(assets: I, version: u64) -> Self
    where
        I: IntoIterator<Item = AssetPrice>,
    {
        let mut unique: Vec<AssetPrice> = Vec::new();
        for asset in assets {
            match unique.iter_mut().find(|a| a.symbol == asset.symbol) {
                Some(existing) => existing.price = asset.price,
                None => unique.push(asset),
            }
        }

        Self {
            assets: unique,
            version,
            updated_at: Utc::now(),
        }
    }

    pub fn assets(&self) -> &[AssetPrice] {
        &self.assets
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.assets.iter().any(|a| a.symbol == symbol)
    }

    pub fn price_of(&self, symbol: &str) -> Option<f64> {
        self.assets
            .iter()
            .find(|a| a.symbol == symbol)
            .map(|a| a.price)
    }

    /// Apply an update on top of this snapshot.
    ///
    /// Only symbols already present are updated; the rest of the update is
    /// dropped. Returns `None` when nothing in the update applied.
    pub fn merged_with(&self, update: &PartialUpdate) -> Option<Snapshot> {
        let mut assets = self.assets.clone();
        let mut applied = 0usize;

        for incoming in update.iter() {
            if let Some(entry) = assets.iter_mut().find(|a| a.symbol == incoming.symbol) {
                entry.price = incoming.price;
                applied += 1;
            }
        }

        if applied == 0 {
            return None;
        }

        Some(Self {
            assets,
            version: self.version + 1,
            updated_at: Utc::now(),
        })
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn initial() -> Snapshot {
        Snapshot::from_assets(
            vec![
                AssetPrice::new("bitcoin", 100.0),
                AssetPrice::new("ethereum", 50.0),
            ],
            1,
        )
    }

    #[test]
    fn test_merge_replaces_known_price() {
        let snapshot = initial();
        let update = PartialUpdate::new(vec![AssetPrice::new("bitcoin", 110.0)]);

        let merged = snapshot.merged_with(&update).unwrap();

        assert_eq!(merged.price_of("bitcoin"), Some(110.0));
        assert_eq!(merged.price_of("ethereum"), Some(50.0));
        assert_eq!(merged.len(), 2);
        assert_eq!(merged.version(), 2);
        // Original is untouched
        assert_eq!(snapshot.price_of("bitcoin"), Some(100.0));
    }

    #[test]
    fn test_merge_drops_unknown_symbol() {
        let snapshot = initial();
        let update = PartialUpdate::new(vec![AssetPrice::new("dogecoin", 0.1)]);

        assert!(snapshot.merged_with(&update).is_none());
        assert!(!snapshot.contains("dogecoin"));
    }

    #[test]
    fn test_merge_mixed_known_and_unknown() {
        let snapshot = initial();
        let update = PartialUpdate::new(vec![
            AssetPrice::new("dogecoin", 0.1),
            AssetPrice::new("ethereum", 55.0),
        ]);

        let merged = snapshot.merged_with(&update).unwrap();
        assert_eq!(merged.len(), 2);
        assert_eq!(merged.price_of("ethereum"), Some(55.0));
        assert!(!merged.contains("dogecoin"));
    }

    #[test]
    fn test_from_assets_collapses_duplicates() {
        let snapshot = Snapshot::from_assets(
            vec![
                AssetPrice::new("bitcoin", 1.0),
                AssetPrice::new("ethereum", 2.0),
                AssetPrice::new("bitcoin", 3.0),
            ],
            1,
        );

        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.assets()[0].symbol, "bitcoin");
        assert_eq!(snapshot.price_of("bitcoin"), Some(3.0));
    }

    #[test]
    fn test_partial_update_last_price_wins() {
        let update = PartialUpdate::new(vec![
            AssetPrice::new("bitcoin", 1.0),
            AssetPrice::new("bitcoin", 2.0),
        ]);
        assert_eq!(update.price_of("bitcoin"), Some(2.0));
        assert_eq!(update.price_of("monero"), None);
    }

    fn symbol() -> impl Strategy<Value = String> {
        prop::sample::select(vec!["bitcoin", "ethereum", "monero", "litecoin", "dogecoin"])
            .prop_map(String::from)
    }

    proptest! {
        #[test]
        fn prop_merges_never_duplicate_symbols(
            updates in prop::collection::vec(
                prop::collection::vec((symbol(), 0.0f64..1_000_000.0), 0..6),
                0..20,
            )
        ) {
            let mut snapshot = Snapshot::from_assets(
                vec![
                    AssetPrice::new("bitcoin", 100.0),
                    AssetPrice::new("ethereum", 50.0),
                    AssetPrice::new("monero", 10.0),
                ],
                1,
            );

            for pairs in updates {
                let update: PartialUpdate = pairs
                    .into_iter()
                    .map(|(s, p)| AssetPrice::new(s, p))
                    .collect();
                if let Some(next) = snapshot.merged_with(&update) {
                    snapshot = next;
                }
            }

            let symbols: Vec<&str> = snapshot.assets().iter().map(|a| a.symbol.as_str()).collect();
            prop_assert_eq!(symbols, vec!["bitcoin", "ethereum", "monero"]);
        }
    }
}
