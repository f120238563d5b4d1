use std::collections::HashMap;

use crate::database::models::{Coin, CoinDexMetrics, CoinLinks, CoinMetrics, CoinScore};

/// In-process snapshot of the reconciled coin universe. The orchestrator
/// mutates it during refresh cycles and the read path serves from it, so
/// callers hold it behind a `tokio::sync::Mutex`.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    coins: HashMap<String, Coin>,
    links: HashMap<String, CoinLinks>,
    scores: HashMap<String, CoinScore>,
    metrics: HashMap<String, CoinMetrics>,
    dex_metrics: HashMap<String, Vec<CoinDexMetrics>>,
    /// Both addresses of every known coin map to its coin_id, so a record
    /// arriving under the other alias still resolves to the same identity.
    aliases: HashMap<String, String>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the snapshot from rows loaded out of the database.
    pub fn warm_from(
        coins: Vec<Coin>,
        links: Vec<CoinLinks>,
        scores: Vec<CoinScore>,
        metrics: Vec<CoinMetrics>,
    ) -> Self {
        let mut store = Self::new();
        for coin in coins {
            store.insert_coin(coin);
        }
        for row in links {
            store.links.insert(row.coin_id.clone(), row);
        }
        for row in scores {
            store.scores.insert(row.coin_id.clone(), row);
        }
        for row in metrics {
            store.metrics.insert(row.coin_id.clone(), row);
        }
        store
    }

    pub fn coin_count(&self) -> usize {
        self.coins.len()
    }

    pub fn coin_ids(&self) -> Vec<String> {
        self.coins.keys().cloned().collect()
    }

    pub fn get_coin(&self, coin_id: &str) -> Option<&Coin> {
        self.coins.get(coin_id)
    }

    pub fn coins(&self) -> impl Iterator<Item = &Coin> {
        self.coins.values()
    }

    /// Resolve either address form to a known coin_id.
    pub fn resolve_alias(&self, address: &str) -> Option<&String> {
        self.aliases.get(address)
    }

    /// Insert or replace a coin and register both of its addresses as
    /// aliases for its coin_id.
    pub fn insert_coin(&mut self, coin: Coin) {
        if let Some(ref legacy) = coin.coin_type_legacy {
            self.aliases.insert(legacy.clone(), coin.coin_id.clone());
        }
        if let Some(ref fungible) = coin.coin_address_fungible {
            self.aliases.insert(fungible.clone(), coin.coin_id.clone());
        }
        self.coins.insert(coin.coin_id.clone(), coin);
    }

    pub fn get_coin_mut(&mut self, coin_id: &str) -> Option<&mut Coin> {
        self.coins.get_mut(coin_id)
    }

    pub fn get_links(&self, coin_id: &str) -> Option<&CoinLinks> {
        self.links.get(coin_id)
    }

    pub fn links_mut(&mut self, coin_id: &str) -> &mut CoinLinks {
        self.links
            .entry(coin_id.to_string())
            .or_insert_with(|| CoinLinks {
                coin_id: coin_id.to_string(),
                ..CoinLinks::default()
            })
    }

    pub fn get_score(&self, coin_id: &str) -> Option<&CoinScore> {
        self.scores.get(coin_id)
    }

    pub fn score_mut(&mut self, coin_id: &str) -> &mut CoinScore {
        self.scores
            .entry(coin_id.to_string())
            .or_insert_with(|| CoinScore {
                coin_id: coin_id.to_string(),
                ..CoinScore::default()
            })
    }

    pub fn metrics_mut(&mut self, coin_id: &str) -> &mut CoinMetrics {
        self.metrics
            .entry(coin_id.to_string())
            .or_insert_with(|| CoinMetrics {
                coin_id: coin_id.to_string(),
                ..CoinMetrics::default()
            })
    }

    pub fn get_metrics(&self, coin_id: &str) -> Option<&CoinMetrics> {
        self.metrics.get(coin_id)
    }

    /// Replace the pair-level rows for one coin. Cleared wholesale at the
    /// start of each dex cycle so delisted pairs do not linger.
    pub fn set_dex_metrics(&mut self, coin_id: &str, rows: Vec<CoinDexMetrics>) {
        self.dex_metrics.insert(coin_id.to_string(), rows);
    }

    pub fn get_dex_metrics(&self, coin_id: &str) -> Option<&Vec<CoinDexMetrics>> {
        self.dex_metrics.get(coin_id)
    }

    pub fn clear_dex_metrics(&mut self) {
        self.dex_metrics.clear();
    }

    pub fn all_dex_metrics(&self) -> impl Iterator<Item = &CoinDexMetrics> {
        self.dex_metrics.values().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coin(id: &str, legacy: Option<&str>, fungible: Option<&str>) -> Coin {
        Coin {
            coin_id: id.to_string(),
            coin_type_legacy: legacy.map(str::to_string),
            coin_address_fungible: fungible.map(str::to_string),
            ..Coin::default()
        }
    }

    #[test]
    fn both_addresses_alias_to_the_same_id() {
        let mut store = SnapshotStore::new();
        store.insert_coin(coin(
            "0xfa1",
            Some("0xabc::doge::Doge"),
            Some("0xfa1"),
        ));

        assert_eq!(store.resolve_alias("0xfa1").map(String::as_str), Some("0xfa1"));
        assert_eq!(
            store.resolve_alias("0xabc::doge::Doge").map(String::as_str),
            Some("0xfa1")
        );
        assert!(store.resolve_alias("0xother").is_none());
    }

    #[test]
    fn dex_metrics_clear_drops_all_coins() {
        let mut store = SnapshotStore::new();
        store.set_dex_metrics("a", vec![CoinDexMetrics::default()]);
        store.set_dex_metrics("b", vec![CoinDexMetrics::default()]);
        store.clear_dex_metrics();
        assert!(store.get_dex_metrics("a").is_none());
        assert_eq!(store.all_dex_metrics().count(), 0);
    }
}
