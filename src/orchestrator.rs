//! Drives the refresh cycles: pull from every provider, reconcile into
//! the in-process snapshot, then persist. A failed provider degrades the
//! cycle, it never aborts it.

use std::collections::HashMap;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::aggregator::{self, MarketAggregate};
use crate::database::models::{CoinDexMetrics, CoinMetrics};
use crate::database::CoinRepository;
use crate::decimal;
use crate::error::IngestError;
use crate::providers::coingecko::{CoinGeckoProvider, PRICE_BATCH_SIZE};
use crate::providers::coinmarketcap::{CoinMarketCapProvider, QUOTE_BATCH_SIZE};
use crate::providers::exchange_rate::ExchangeRateProvider;
use crate::providers::pump_launch::PumpLaunchProvider;
use crate::providers::{CoinListSource, PairSource, RetryPolicy};
use crate::registry::{IdentityResolver, SnapshotStore};

/// Concurrent pair lookups per dex cycle. The pair API rate-limits well
/// above this.
const PAIR_FETCH_CONCURRENCY: usize = 8;

/// Outcome summary of one refresh cycle, for the scheduler's logs.
#[derive(Debug, Clone, Copy, Default)]
pub struct CycleReport {
    pub sources_ok: usize,
    pub sources_failed: usize,
    pub records: usize,
    pub persisted: usize,
}

pub struct RefreshOrchestrator {
    list_sources: Vec<Arc<dyn CoinListSource>>,
    pair_source: Arc<dyn PairSource>,
    coingecko: Arc<CoinGeckoProvider>,
    coinmarketcap: Arc<CoinMarketCapProvider>,
    pump: Arc<PumpLaunchProvider>,
    exchange_rate: Option<Arc<ExchangeRateProvider>>,
    repository: CoinRepository,
    snapshot: Arc<Mutex<SnapshotStore>>,
    retry: RetryPolicy,
}

impl RefreshOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        list_sources: Vec<Arc<dyn CoinListSource>>,
        pair_source: Arc<dyn PairSource>,
        coingecko: Arc<CoinGeckoProvider>,
        coinmarketcap: Arc<CoinMarketCapProvider>,
        pump: Arc<PumpLaunchProvider>,
        exchange_rate: Option<Arc<ExchangeRateProvider>>,
        repository: CoinRepository,
        snapshot: Arc<Mutex<SnapshotStore>>,
    ) -> Self {
        Self {
            list_sources,
            pair_source,
            coingecko,
            coinmarketcap,
            pump,
            exchange_rate,
            repository,
            snapshot,
            retry: RetryPolicy::default(),
        }
    }

    pub fn snapshot(&self) -> Arc<Mutex<SnapshotStore>> {
        Arc::clone(&self.snapshot)
    }

    /// Rebuild the snapshot from the database, typically at startup and
    /// on the slow rewarm cadence. Lets the read path serve immediately
    /// after a restart instead of waiting out a full provider cycle.
    pub async fn warm_snapshot(&self) -> Result<usize, IngestError> {
        let coins = self.repository.get_all_coins().await?;
        let links = self.repository.get_all_links().await?;
        let scores = self.repository.get_all_scores().await?;
        let metrics = self.repository.get_all_metrics().await?;
        let store = SnapshotStore::warm_from(coins, links, scores, metrics);
        let count = store.coin_count();
        *self.snapshot.lock().await = store;
        info!(coins = count, "snapshot warmed from database");
        Ok(count)
    }

    /// Pull every token list, reconcile identities, persist. Fetches run
    /// in parallel; the resolve step is serialized under the snapshot
    /// lock so merge order is deterministic within a cycle.
    pub async fn refresh_coin_list(&self) -> Result<CycleReport, IngestError> {
        let mut report = CycleReport::default();

        let fetches = self.list_sources.iter().map(|source| {
            let source = Arc::clone(source);
            let retry = self.retry.clone();
            async move {
                let name = source.name();
                let result = retry.run(name, || source.fetch_records()).await;
                (name, result)
            }
        });
        let results = futures::future::join_all(fetches).await;

        let mut snapshot = self.snapshot.lock().await;
        for (name, result) in results {
            match result {
                Ok(records) => {
                    report.sources_ok += 1;
                    report.records += records.len();
                    for record in &records {
                        if let Err(e) = IdentityResolver::resolve(&mut snapshot, record) {
                            warn!(source = name, error = %e, "skipping unresolvable record");
                        }
                    }
                }
                Err(e) => {
                    report.sources_failed += 1;
                    error!(source = name, error = %e, "token list fetch failed, continuing with the rest");
                }
            }
        }

        let coins: Vec<_> = snapshot.coins().cloned().collect();
        let links: Vec<_> = coins
            .iter()
            .filter_map(|c| snapshot.get_links(&c.coin_id).cloned())
            .collect();
        let scores: Vec<_> = coins
            .iter()
            .filter_map(|c| snapshot.get_score(&c.coin_id).cloned())
            .collect();
        drop(snapshot);

        // Parent rows first; links and scores carry foreign keys to them.
        self.repository.upsert_coins(&coins).await?;
        self.repository.upsert_links(&links).await?;
        self.repository.upsert_scores(&scores).await?;
        report.persisted = coins.len();

        info!(
            sources_ok = report.sources_ok,
            sources_failed = report.sources_failed,
            coins = report.persisted,
            "coin list cycle finished"
        );
        Ok(report)
    }

    /// Mirror the launch platform's full token list into its own table.
    pub async fn refresh_launch_tokens(&self) -> Result<usize, IngestError> {
        let tokens = self
            .retry
            .run("pump", || self.pump.fetch_all_tokens())
            .await?;
        let count = tokens.len();
        self.repository.upsert_launch_tokens(&tokens).await?;
        Ok(count)
    }

    /// Refresh pair-level market data for every known coin. The snapshot's
    /// pair map is cleared first so pools that disappeared upstream do not
    /// linger for another cycle.
    pub async fn refresh_dex_metrics(&self) -> Result<CycleReport, IngestError> {
        let mut report = CycleReport::default();

        let coin_ids = {
            let mut snapshot = self.snapshot.lock().await;
            snapshot.clear_dex_metrics();
            snapshot.coin_ids()
        };
        report.records = coin_ids.len();

        let pair_source = Arc::clone(&self.pair_source);
        let retry = self.retry.clone();
        let mut lookups = stream::iter(coin_ids.into_iter().map(|coin_id| {
            let pair_source = Arc::clone(&pair_source);
            let retry = retry.clone();
            async move {
                let result = retry
                    .run(pair_source.name(), || pair_source.fetch_pairs(&coin_id))
                    .await;
                (coin_id, result)
            }
        }))
        .buffer_unordered(PAIR_FETCH_CONCURRENCY);

        let mut pair_rows: Vec<CoinDexMetrics> = Vec::new();
        let mut metric_rows: Vec<CoinMetrics> = Vec::new();

        while let Some((coin_id, result)) = lookups.next().await {
            let pairs = match result {
                Ok(pairs) => pairs,
                Err(e) => {
                    report.sources_failed += 1;
                    warn!(coin_id = %coin_id, error = %e, "pair lookup failed, keeping previous data");
                    continue;
                }
            };
            report.sources_ok += 1;

            let aggregate = aggregator::aggregate_pairs(&coin_id, &coin_id, &pairs);
            let mut snapshot = self.snapshot.lock().await;
            snapshot.set_dex_metrics(&coin_id, aggregate.pair_rows.clone());
            apply_market_aggregate(snapshot.metrics_mut(&coin_id), &aggregate);
            if let Some(metrics) = snapshot.get_metrics(&coin_id) {
                metric_rows.push(metrics.clone());
            }
            drop(snapshot);
            pair_rows.extend(aggregate.pair_rows);
        }

        self.repository.upsert_dex_metrics(&pair_rows).await?;
        self.repository.upsert_metrics(&metric_rows).await?;
        report.persisted = pair_rows.len();

        info!(
            coins = report.records,
            pairs = report.persisted,
            failed = report.sources_failed,
            "dex metrics cycle finished"
        );
        Ok(report)
    }

    /// Refresh the fiat conversion table. A missing API key disables the
    /// cycle rather than failing it.
    pub async fn refresh_currency_rates(&self) -> Result<usize, IngestError> {
        let Some(provider) = &self.exchange_rate else {
            warn!("exchange rate api key not configured, skipping currency refresh");
            return Ok(0);
        };
        let prices = self
            .retry
            .run("exchange-rate", || provider.fetch_currency_prices())
            .await?;
        let count = prices.len();
        self.repository.upsert_currency_prices(&prices).await?;
        info!(currencies = count, "currency rate cycle finished");
        Ok(count)
    }

    /// Refresh the oracle-sourced figures (supplies, long-window changes,
    /// market caps). Coins with a coinmarketcap id go through that API in
    /// batches; the remainder with a coingecko id fall back to it.
    pub async fn refresh_market_metrics(&self) -> Result<CycleReport, IngestError> {
        let mut report = CycleReport::default();

        let (cmc_ids, gecko_ids) = {
            let snapshot = self.snapshot.lock().await;
            let mut cmc: HashMap<String, String> = HashMap::new();
            let mut gecko: HashMap<String, String> = HashMap::new();
            for coin in snapshot.coins() {
                if let Some(ref id) = coin.coinmarketcap_id {
                    cmc.insert(id.clone(), coin.coin_id.clone());
                } else if let Some(ref id) = coin.coingecko_id {
                    gecko.insert(id.clone(), coin.coin_id.clone());
                }
            }
            (cmc, gecko)
        };
        report.records = cmc_ids.len() + gecko_ids.len();

        let mut metric_rows: Vec<CoinMetrics> = Vec::new();

        let ids: Vec<String> = cmc_ids.keys().cloned().collect();
        for batch in ids.chunks(QUOTE_BATCH_SIZE) {
            let quotes = self
                .retry
                .run("coinmarketcap", || self.coinmarketcap.quotes_by_ids(batch))
                .await;
            match quotes {
                Ok(quotes) => {
                    report.sources_ok += 1;
                    let mut snapshot = self.snapshot.lock().await;
                    for (id, quote) in quotes {
                        let Some(coin_id) = cmc_ids.get(&id) else {
                            continue;
                        };
                        let metrics = snapshot.metrics_mut(coin_id);
                        apply_cmc_quote(metrics, &quote);
                        metric_rows.push(metrics.clone());
                        if let Some(rank) = quote.cmc_rank {
                            snapshot.score_mut(coin_id).coin_market_cap_rank =
                                Some(rank as i32);
                        }
                    }
                }
                Err(e) => {
                    report.sources_failed += 1;
                    error!(error = %e, "quote batch failed, continuing");
                }
            }
        }

        let ids: Vec<String> = gecko_ids.keys().cloned().collect();
        for batch in ids.chunks(PRICE_BATCH_SIZE) {
            let prices = self
                .retry
                .run("coingecko", || self.coingecko.prices_by_ids(batch))
                .await;
            match prices {
                Ok(prices) => {
                    report.sources_ok += 1;
                    let mut snapshot = self.snapshot.lock().await;
                    for (id, price) in prices {
                        let Some(coin_id) = gecko_ids.get(&id) else {
                            continue;
                        };
                        let metrics = snapshot.metrics_mut(coin_id);
                        apply_gecko_price(metrics, &price);
                        metric_rows.push(metrics.clone());
                    }
                }
                Err(e) => {
                    report.sources_failed += 1;
                    error!(error = %e, "price batch failed, continuing");
                }
            }
        }

        let scores: Vec<_> = {
            let snapshot = self.snapshot.lock().await;
            metric_rows
                .iter()
                .filter_map(|m| snapshot.get_score(&m.coin_id).cloned())
                .collect()
        };
        self.repository.upsert_metrics(&metric_rows).await?;
        self.repository.upsert_scores(&scores).await?;
        report.persisted = metric_rows.len();

        info!(
            coins = report.persisted,
            failed_batches = report.sources_failed,
            "market metrics cycle finished"
        );
        Ok(report)
    }
}

fn apply_market_aggregate(metrics: &mut CoinMetrics, aggregate: &MarketAggregate) {
    if aggregate.price_usd.is_some() {
        metrics.price_usd = aggregate.price_usd;
    }
    metrics.price_change_5m = aggregate.price_change_5m.or(metrics.price_change_5m);
    metrics.price_change_1h = aggregate.price_change_1h.or(metrics.price_change_1h);
    metrics.price_change_6h = aggregate.price_change_6h.or(metrics.price_change_6h);
    metrics.price_change_24h = aggregate.price_change_24h.or(metrics.price_change_24h);
    if !aggregate.pair_rows.is_empty() {
        metrics.volume_5m = Some(aggregate.volume_5m);
        metrics.volume_1h = Some(aggregate.volume_1h);
        metrics.volume_6h = Some(aggregate.volume_6h);
        metrics.volume_24h = Some(aggregate.volume_24h);
    }
}

fn apply_cmc_quote(
    metrics: &mut CoinMetrics,
    quote: &crate::providers::coinmarketcap::CmcQuote,
) {
    metrics.circulating_supply = quote
        .circulating_supply
        .and_then(decimal::from_f64)
        .or(metrics.circulating_supply);
    metrics.total_supply = quote
        .total_supply
        .and_then(decimal::from_f64)
        .or(metrics.total_supply);
    metrics.max_supply = quote
        .max_supply
        .and_then(decimal::from_f64)
        .or(metrics.max_supply);
    metrics.infinite_supply = quote.infinite_supply.or(metrics.infinite_supply);
    metrics.self_reported_circulating_supply = quote
        .self_reported_circulating_supply
        .and_then(decimal::from_f64)
        .or(metrics.self_reported_circulating_supply);
    metrics.self_reported_market_cap = quote
        .self_reported_market_cap
        .and_then(decimal::from_f64)
        .or(metrics.self_reported_market_cap);

    let Some(usd) = quote.quote.usd else { return };
    if let Some(price) = usd.price.and_then(decimal::from_f64) {
        metrics.price_usd = Some(price);
    }
    metrics.volume_24h = usd
        .volume_24h
        .and_then(decimal::from_f64)
        .or(metrics.volume_24h);
    metrics.volume_7d = usd
        .volume_7d
        .and_then(decimal::from_f64)
        .or(metrics.volume_7d);
    metrics.volume_30d = usd
        .volume_30d
        .and_then(decimal::from_f64)
        .or(metrics.volume_30d);
    metrics.volume_change_24h = usd
        .volume_change_24h
        .and_then(decimal::from_f64)
        .or(metrics.volume_change_24h);
    metrics.price_change_1h = usd
        .percent_change_1h
        .and_then(decimal::from_f64)
        .or(metrics.price_change_1h);
    metrics.price_change_24h = usd
        .percent_change_24h
        .and_then(decimal::from_f64)
        .or(metrics.price_change_24h);
    metrics.price_change_7d = usd
        .percent_change_7d
        .and_then(decimal::from_f64)
        .or(metrics.price_change_7d);
    metrics.price_change_30d = usd
        .percent_change_30d
        .and_then(decimal::from_f64)
        .or(metrics.price_change_30d);
    metrics.market_cap = usd
        .market_cap
        .and_then(decimal::from_f64)
        .or(metrics.market_cap);
    metrics.fully_diluted_market_cap = usd
        .fully_diluted_market_cap
        .and_then(decimal::from_f64)
        .or(metrics.fully_diluted_market_cap);
    metrics.market_cap_by_total_supply = usd
        .market_cap_by_total_supply
        .and_then(decimal::from_f64)
        .or(metrics.market_cap_by_total_supply);
    metrics.tvl = usd.tvl.and_then(decimal::from_f64).or(metrics.tvl);
}

fn apply_gecko_price(
    metrics: &mut CoinMetrics,
    price: &crate::providers::coingecko::GeckoPrice,
) {
    if let Some(usd) = price.usd.and_then(decimal::from_f64) {
        metrics.price_usd = Some(usd);
    }
    metrics.market_cap = price
        .usd_market_cap
        .and_then(decimal::from_f64)
        .or(metrics.market_cap);
    metrics.volume_24h = price
        .usd_24h_vol
        .and_then(decimal::from_f64)
        .or(metrics.volume_24h);
    metrics.price_change_24h = price
        .usd_24h_change
        .and_then(decimal::from_f64)
        .or(metrics.price_change_24h);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::coinmarketcap::{CmcQuote, CmcQuoteCurrencies, CmcUsdQuote};
    use rust_decimal_macros::dec;

    #[test]
    fn cmc_quote_fills_without_clearing() {
        let mut metrics = CoinMetrics {
            coin_id: "0xfa1".into(),
            tvl: Some(dec!(1000)),
            ..CoinMetrics::default()
        };
        let quote = CmcQuote {
            id: 1,
            circulating_supply: Some(1_000_000.0),
            quote: CmcQuoteCurrencies {
                usd: Some(CmcUsdQuote {
                    price: Some(0.5),
                    market_cap: Some(500_000.0),
                    ..CmcUsdQuote::default()
                }),
            },
            ..CmcQuote::default()
        };
        apply_cmc_quote(&mut metrics, &quote);
        assert_eq!(metrics.price_usd, Some(dec!(0.5)));
        assert_eq!(metrics.market_cap, Some(dec!(500000)));
        // absent in the quote, so the previous value survives
        assert_eq!(metrics.tvl, Some(dec!(1000)));
    }

    #[test]
    fn aggregate_with_no_pools_keeps_previous_volumes() {
        let mut metrics = CoinMetrics {
            coin_id: "0xfa1".into(),
            price_usd: Some(dec!(1.5)),
            volume_24h: Some(dec!(900)),
            ..CoinMetrics::default()
        };
        apply_market_aggregate(&mut metrics, &MarketAggregate::default());
        assert_eq!(metrics.price_usd, Some(dec!(1.5)));
        assert_eq!(metrics.volume_24h, Some(dec!(900)));
    }
}
