//! Folds the per-pool rows a pair lookup returns into one market view
//! per coin: a mean price across its deepest pools, summed transaction
//! and volume figures, and per-window price-change averages.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::database::models::CoinDexMetrics;
use crate::decimal;
use crate::providers::dexscreener::DexPair;

/// Pools beyond the first six are recorded pair-by-pair but excluded
/// from the aggregate figures; the tail is mostly dust pools with
/// distorted prices.
pub const MAX_AGGREGATED_POOLS: usize = 6;

#[derive(Debug, Clone, Default)]
pub struct MarketAggregate {
    /// One row per pool, all pools included.
    pub pair_rows: Vec<CoinDexMetrics>,
    /// Mean over the aggregated pools' USD prices, None when no pool
    /// priced the coin.
    pub price_usd: Option<Decimal>,
    pub txns_m5_buys: i64,
    pub txns_m5_sells: i64,
    pub txns_h1_buys: i64,
    pub txns_h1_sells: i64,
    pub txns_h6_buys: i64,
    pub txns_h6_sells: i64,
    pub txns_h24_buys: i64,
    pub txns_h24_sells: i64,
    pub volume_5m: Decimal,
    pub volume_1h: Decimal,
    pub volume_6h: Decimal,
    pub volume_24h: Decimal,
    pub price_change_5m: Option<Decimal>,
    pub price_change_1h: Option<Decimal>,
    pub price_change_6h: Option<Decimal>,
    pub price_change_24h: Option<Decimal>,
}

/// Each window averages over only the pools that reported it, so one
/// pool missing its 5m figure does not drag the other windows down.
#[derive(Debug, Default)]
struct WindowMean {
    sum: Decimal,
    count: u32,
}

impl WindowMean {
    fn push(&mut self, value: Option<f64>) {
        if let Some(v) = value.and_then(decimal::from_f64) {
            self.sum += v;
            self.count += 1;
        }
    }

    fn mean(&self) -> Option<Decimal> {
        (self.count > 0).then(|| self.sum / Decimal::from(self.count))
    }
}

fn millis_to_utc(millis: i64) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_millis(millis)
}

fn pair_row(coin_id: &str, pair: &DexPair) -> CoinDexMetrics {
    let txns = pair.txns.unwrap_or_default();
    let volume = pair.volume.unwrap_or_default();
    let change = pair.price_change.unwrap_or_default();
    let liquidity = pair.liquidity.unwrap_or_default();
    CoinDexMetrics {
        coin_id: coin_id.to_string(),
        pair_id: pair.pair_address.clone(),
        dex: pair.dex_id.clone(),
        base_token: Some(pair.base_token.address.clone()),
        quote_token: Some(pair.quote_token.address.clone()),
        pair_created_at: pair.pair_created_at.and_then(millis_to_utc),
        transactions_m5_buys: Some(txns.m5.buys),
        transactions_m5_sells: Some(txns.m5.sells),
        transactions_h1_buys: Some(txns.h1.buys),
        transactions_h1_sells: Some(txns.h1.sells),
        transactions_h6_buys: Some(txns.h6.buys),
        transactions_h6_sells: Some(txns.h6.sells),
        transactions_h24_buys: Some(txns.h24.buys),
        transactions_h24_sells: Some(txns.h24.sells),
        volume_usd_5m: volume.m5.and_then(decimal::from_f64),
        volume_usd_1h: volume.h1.and_then(decimal::from_f64),
        volume_usd_6h: volume.h6.and_then(decimal::from_f64),
        volume_usd_24h: volume.h24.and_then(decimal::from_f64),
        price_change_5m: change.m5.and_then(decimal::from_f64),
        price_change_1h: change.h1.and_then(decimal::from_f64),
        price_change_6h: change.h6.and_then(decimal::from_f64),
        price_change_24h: change.h24.and_then(decimal::from_f64),
        liquidity_usd: liquidity.usd.and_then(decimal::from_f64),
        liquidity_base: liquidity.base.and_then(decimal::from_f64),
        liquidity_quote: liquidity.quote.and_then(decimal::from_f64),
        fdv_usd: pair.fdv.and_then(decimal::from_f64),
    }
}

/// USD price of `address` in this pool. Pools quoting the coin on the
/// other side are inverted through the native price.
fn pool_price(address: &str, pair: &DexPair) -> Option<Decimal> {
    if pair.base_token.address == address {
        pair.price_usd.and_then(decimal::from_f64)
    } else if pair.quote_token.address == address {
        let usd = pair.price_usd.and_then(decimal::from_f64)?;
        let native = pair.price_native.and_then(decimal::from_f64)?;
        if native.is_zero() {
            None
        } else {
            Some(usd / native)
        }
    } else {
        None
    }
}

/// Aggregate every pool `address` trades in. Coins with no pools yield
/// an empty aggregate rather than an error; a delisted coin is normal.
pub fn aggregate_pairs(coin_id: &str, address: &str, pairs: &[DexPair]) -> MarketAggregate {
    let mut agg = MarketAggregate::default();
    let mut prices = Vec::new();
    let mut change_5m = WindowMean::default();
    let mut change_1h = WindowMean::default();
    let mut change_6h = WindowMean::default();
    let mut change_24h = WindowMean::default();

    for (index, pair) in pairs.iter().enumerate() {
        agg.pair_rows.push(pair_row(coin_id, pair));

        if index >= MAX_AGGREGATED_POOLS {
            continue;
        }

        if let Some(price) = pool_price(address, pair) {
            prices.push(price);
        }

        if let Some(txns) = pair.txns {
            agg.txns_m5_buys += txns.m5.buys;
            agg.txns_m5_sells += txns.m5.sells;
            agg.txns_h1_buys += txns.h1.buys;
            agg.txns_h1_sells += txns.h1.sells;
            agg.txns_h6_buys += txns.h6.buys;
            agg.txns_h6_sells += txns.h6.sells;
            agg.txns_h24_buys += txns.h24.buys;
            agg.txns_h24_sells += txns.h24.sells;
        }

        if let Some(volume) = pair.volume {
            for (total, window) in [
                (&mut agg.volume_5m, volume.m5),
                (&mut agg.volume_1h, volume.h1),
                (&mut agg.volume_6h, volume.h6),
                (&mut agg.volume_24h, volume.h24),
            ] {
                if let Some(v) = window.and_then(decimal::from_f64) {
                    *total += v;
                }
            }
        }

        if let Some(change) = pair.price_change {
            change_5m.push(change.m5);
            change_1h.push(change.h1);
            change_6h.push(change.h6);
            change_24h.push(change.h24);
        }
    }

    agg.price_usd = decimal::mean(&prices);
    agg.price_change_5m = change_5m.mean();
    agg.price_change_1h = change_1h.mean();
    agg.price_change_6h = change_6h.mean();
    agg.price_change_24h = change_24h.mean();
    agg
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::dexscreener::{PairToken, PairTxns, PairWindows, TxnCounts};
    use rust_decimal_macros::dec;

    fn base_pair(pool: &str, base: &str, quote: &str) -> DexPair {
        DexPair {
            pair_address: pool.to_string(),
            dex_id: Some("thala".to_string()),
            base_token: PairToken {
                address: base.to_string(),
                name: None,
                symbol: None,
            },
            quote_token: PairToken {
                address: quote.to_string(),
                name: None,
                symbol: None,
            },
            ..DexPair::default()
        }
    }

    #[test]
    fn price_is_the_mean_of_base_pool_prices() {
        let mut pairs = Vec::new();
        for (pool, price) in [("0xp1", 1.00), ("0xp2", 1.02), ("0xp3", 0.98)] {
            let mut pair = base_pair(pool, "0xcoin", "0xapt");
            pair.price_usd = Some(price);
            pairs.push(pair);
        }

        let agg = aggregate_pairs("0xcoin", "0xcoin", &pairs);
        assert_eq!(agg.price_usd, Some(dec!(1.00)));
        assert_eq!(agg.pair_rows.len(), 3);
    }

    #[test]
    fn quote_side_pools_invert_through_native_price() {
        let mut pair = base_pair("0xp1", "0xother", "0xcoin");
        pair.price_usd = Some(2.00);
        pair.price_native = Some(4.0);

        let agg = aggregate_pairs("0xcoin", "0xcoin", &[pair]);
        assert_eq!(agg.price_usd, Some(dec!(0.5)));
    }

    #[test]
    fn pools_past_the_cap_are_recorded_but_not_aggregated() {
        let mut pairs = Vec::new();
        for i in 0..8 {
            let mut pair = base_pair(&format!("0xp{i}"), "0xcoin", "0xapt");
            pair.price_usd = Some(1.0);
            pair.volume = Some(PairWindows {
                h24: Some(100.0),
                ..PairWindows::default()
            });
            pairs.push(pair);
        }

        let agg = aggregate_pairs("0xcoin", "0xcoin", &pairs);
        assert_eq!(agg.pair_rows.len(), 8);
        assert_eq!(agg.volume_24h, dec!(600));
    }

    #[test]
    fn txns_sum_across_aggregated_pools() {
        let mut a = base_pair("0xp1", "0xcoin", "0xapt");
        a.txns = Some(PairTxns {
            h24: TxnCounts { buys: 10, sells: 4 },
            ..PairTxns::default()
        });
        let mut b = base_pair("0xp2", "0xcoin", "0xusdc");
        b.txns = Some(PairTxns {
            h24: TxnCounts { buys: 5, sells: 6 },
            ..PairTxns::default()
        });

        let agg = aggregate_pairs("0xcoin", "0xcoin", &[a, b]);
        assert_eq!(agg.txns_h24_buys, 15);
        assert_eq!(agg.txns_h24_sells, 10);
    }

    #[test]
    fn each_change_window_averages_its_own_reporters() {
        let mut a = base_pair("0xp1", "0xcoin", "0xapt");
        a.price_change = Some(PairWindows {
            h1: Some(2.0),
            h24: Some(10.0),
            ..PairWindows::default()
        });
        let mut b = base_pair("0xp2", "0xcoin", "0xusdc");
        b.price_change = Some(PairWindows {
            h24: Some(20.0),
            ..PairWindows::default()
        });

        let agg = aggregate_pairs("0xcoin", "0xcoin", &[a, b]);
        // h1 saw one reporter, h24 saw two
        assert_eq!(agg.price_change_1h, Some(dec!(2)));
        assert_eq!(agg.price_change_24h, Some(dec!(15)));
        assert!(agg.price_change_5m.is_none());
    }

    #[test]
    fn no_pools_yields_an_empty_aggregate() {
        let agg = aggregate_pairs("0xcoin", "0xcoin", &[]);
        assert!(agg.price_usd.is_none());
        assert!(agg.pair_rows.is_empty());
        assert_eq!(agg.volume_24h, Decimal::ZERO);
    }
}
