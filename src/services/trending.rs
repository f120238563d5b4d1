use std::sync::Arc;

use redis::RedisError;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::cache::{Cached, RedisCache};
use crate::providers::emojicoin::{
    EmojiCoinProvider, MarketTicker, MarketTrade, TradeQuery, TrendingMarket, PAGE_LIMIT,
};

const CACHE_PREFIX_TRENDING: &str = "emoji:trending";
const CACHE_PREFIX_TICKERS: &str = "emoji:tickers";
const CACHE_PREFIX_TRADES: &str = "emoji:trades";
const CACHE_TTL_TRENDING: u64 = 120;
const CACHE_TTL: u64 = 300;

const DEFAULT_TRENDING_LIMIT: usize = 100;
const MAX_TICKERS: usize = 5000;

/// Emoji-market read model: trending list, full ticker sweep, and
/// per-market trade history, all cache-only.
pub struct TrendingService {
    emojicoin: Arc<EmojiCoinProvider>,
    cache: RedisCache,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendingResponse {
    pub trending_coins: Vec<TrendingMarket>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickersResponse {
    pub tickers: Vec<MarketTicker>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradesResponse {
    pub market_address: String,
    pub trades: Vec<MarketTrade>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TrendingService {
    pub fn new(emojicoin: Arc<EmojiCoinProvider>, cache: RedisCache) -> Self {
        Self { emojicoin, cache }
    }

    pub async fn trending(&self, limit: Option<usize>, skip_cache: bool) -> Cached<TrendingResponse> {
        let limit = limit.unwrap_or(DEFAULT_TRENDING_LIMIT);
        let key = RedisCache::create_key(CACHE_PREFIX_TRENDING, &[&limit.to_string()]);
        if !skip_cache {
            if let Some(stored) = self.cache.get_json::<TrendingResponse>(&key).await {
                return Cached::from_cache(stored);
            }
        }

        match self.emojicoin.trending().await {
            Ok(mut markets) => {
                markets.truncate(limit);
                let result = TrendingResponse {
                    trending_coins: markets,
                    error: None,
                };
                self.cache.set_json(&key, &result, CACHE_TTL_TRENDING).await;
                Cached::fresh(result)
            }
            Err(e) => {
                error!(error = %e, "trending lookup failed");
                Cached::fresh(TrendingResponse {
                    trending_coins: Vec::new(),
                    error: Some(format!("failed to fetch trending markets: {e}")),
                })
            }
        }
    }

    /// Sweep the paginated ticker endpoint until it runs dry or the
    /// ceiling is hit; a failed page ends the sweep with what was
    /// gathered so far.
    pub async fn all_tickers(&self, max: Option<usize>, skip_cache: bool) -> Cached<TickersResponse> {
        let max = max.unwrap_or(MAX_TICKERS);
        let key = RedisCache::create_key(CACHE_PREFIX_TICKERS, &[&format!("max-{max}")]);
        if !skip_cache {
            if let Some(stored) = self.cache.get_json::<TickersResponse>(&key).await {
                return Cached::from_cache(stored);
            }
        }

        let mut tickers: Vec<MarketTicker> = Vec::new();
        let mut sweep_error: Option<String> = None;
        let mut skip = 0;
        while tickers.len() < max {
            match self.emojicoin.tickers(PAGE_LIMIT, skip).await {
                Ok(page) if page.is_empty() => break,
                Ok(page) => {
                    skip += page.len();
                    tickers.extend(page);
                    info!(total = tickers.len(), "ticker sweep progressing");
                }
                Err(e) => {
                    error!(skip, error = %e, "ticker page failed, stopping sweep");
                    sweep_error = Some(format!("ticker sweep failed at offset {skip}: {e}"));
                    break;
                }
            }
        }
        tickers.truncate(max);

        let result = TickersResponse {
            tickers,
            error: sweep_error,
        };
        // A truncated sweep is not worth a TTL; serve it once, uncached.
        if result.error.is_none() {
            self.cache.set_json(&key, &result, CACHE_TTL).await;
        }
        Cached::fresh(result)
    }

    pub async fn trades(
        &self,
        market_address: &str,
        query: TradeQuery,
        skip_cache: bool,
    ) -> Cached<TradesResponse> {
        let key = RedisCache::create_key(
            CACHE_PREFIX_TRADES,
            &[
                market_address,
                &format!("start_{}", query.start_time.unwrap_or(0)),
                &format!("end_{}", query.end_time.unwrap_or(0)),
                &format!(
                    "type_{}",
                    match query.buy_side_only {
                        Some(true) => "buy",
                        Some(false) => "sell",
                        None => "all",
                    }
                ),
                &format!("limit_{}", query.limit),
                &format!("skip_{}", query.skip),
            ],
        );
        if !skip_cache {
            if let Some(stored) = self.cache.get_json::<TradesResponse>(&key).await {
                return Cached::from_cache(stored);
            }
        }

        match self.emojicoin.historical_trades(market_address, query).await {
            Ok(trades) => {
                let result = TradesResponse {
                    market_address: market_address.to_string(),
                    trades,
                    error: None,
                };
                self.cache.set_json(&key, &result, CACHE_TTL).await;
                Cached::fresh(result)
            }
            Err(e) => {
                error!(market_address, error = %e, "trade lookup failed");
                Cached::fresh(TradesResponse {
                    market_address: market_address.to_string(),
                    trades: Vec::new(),
                    error: Some(format!("failed to fetch trades: {e}")),
                })
            }
        }
    }

    pub async fn invalidate_trending(&self) -> Result<u64, RedisError> {
        self.cache.invalidate_prefix(CACHE_PREFIX_TRENDING).await
    }

    pub async fn invalidate_trades(&self, market_address: &str) -> Result<u64, RedisError> {
        let prefix = RedisCache::create_key(CACHE_PREFIX_TRADES, &[market_address]);
        self.cache.invalidate_prefix(&prefix).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unreachable_service() -> TrendingService {
        // nothing listens on port 1; every request fails immediately
        let provider = EmojiCoinProvider::with_base_url(
            reqwest::Client::new(),
            "http://127.0.0.1:1/api",
        );
        let cache = RedisCache::connect("redis://127.0.0.1:1").unwrap();
        TrendingService::new(Arc::new(provider), cache)
    }

    #[tokio::test]
    async fn failed_ticker_sweep_reports_the_error() {
        let service = unreachable_service();
        let result = service.all_tickers(Some(10), true).await;
        assert!(result.data.tickers.is_empty());
        assert!(result.data.error.is_some());
        assert_eq!(result.cached, None);
    }
}
