use std::sync::Arc;

use redis::RedisError;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::cache::{Cached, RedisCache};
use crate::providers::geckoterminal::{GeckoTerminalProvider, OhlcPoint, Timeframe};

const CACHE_PREFIX: &str = "token:chart";
const CACHE_TTL: u64 = 300;

/// Per-token OHLC chart, sourced from the deepest stablecoin pool the
/// terminal knows for the token. Cache-only data.
pub struct TokenChartService {
    gecko: Arc<GeckoTerminalProvider>,
    cache: RedisCache,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ChartQuery {
    pub timeframe: Timeframe,
    pub limit: Option<usize>,
    /// Unix-second bounds applied to the fetched candles.
    pub start_time: Option<i64>,
    pub end_time: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartDataResponse {
    pub token_address: String,
    pub price_data: Vec<OhlcPoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool_info: Option<PoolInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolInfo {
    pub pool_address: String,
    pub quote_token: String,
    pub dex: String,
    pub liquidity_usd: f64,
}

/// Drop candles outside the inclusive `[start, end]` window; an open
/// bound passes everything on that side.
pub fn filter_by_range(
    points: Vec<OhlcPoint>,
    start: Option<i64>,
    end: Option<i64>,
) -> Vec<OhlcPoint> {
    points
        .into_iter()
        .filter(|p| {
            start.map_or(true, |s| p.timestamp >= s) && end.map_or(true, |e| p.timestamp <= e)
        })
        .collect()
}

impl TokenChartService {
    pub fn new(gecko: Arc<GeckoTerminalProvider>, cache: RedisCache) -> Self {
        Self { gecko, cache }
    }

    fn cache_key(token_address: &str, query: &ChartQuery) -> String {
        let limit = query
            .limit
            .map_or_else(|| "default".to_string(), |l| l.to_string());
        let mut parts = vec![
            token_address.to_string(),
            query.timeframe.as_str().to_string(),
            limit,
        ];
        if query.start_time.is_some() || query.end_time.is_some() {
            parts.push(format!(
                "range-{}-{}",
                query.start_time.unwrap_or(0),
                query.end_time.unwrap_or(0)
            ));
        }
        let parts: Vec<&str> = parts.iter().map(String::as_str).collect();
        RedisCache::create_key(CACHE_PREFIX, &parts)
    }

    pub async fn chart(
        &self,
        token_address: &str,
        query: ChartQuery,
        skip_cache: bool,
    ) -> Cached<ChartDataResponse> {
        let key = Self::cache_key(token_address, &query);
        if !skip_cache {
            if let Some(stored) = self.cache.get_json::<ChartDataResponse>(&key).await {
                return Cached::from_cache(stored);
            }
        }

        info!(token_address, timeframe = query.timeframe.as_str(), "fetching chart data");
        let pool = match self.gecko.best_stablecoin_pool(token_address).await {
            Ok(Some(pool)) => pool,
            Ok(None) => {
                return Cached::fresh(ChartDataResponse {
                    token_address: token_address.to_string(),
                    price_data: Vec::new(),
                    pool_info: None,
                    error: Some("no suitable liquidity pool found for this token".to_string()),
                });
            }
            Err(e) => {
                error!(token_address, error = %e, "pool discovery failed");
                return Cached::fresh(ChartDataResponse {
                    token_address: token_address.to_string(),
                    price_data: Vec::new(),
                    pool_info: None,
                    error: Some(format!("failed to fetch chart data: {e}")),
                });
            }
        };

        let points = match self
            .gecko
            .pool_ohlc(&pool.attributes.address, query.timeframe, query.limit)
            .await
        {
            Ok(points) => points,
            Err(e) => {
                error!(token_address, error = %e, "ohlc fetch failed");
                return Cached::fresh(ChartDataResponse {
                    token_address: token_address.to_string(),
                    price_data: Vec::new(),
                    pool_info: None,
                    error: Some(format!("failed to fetch chart data: {e}")),
                });
            }
        };

        let result = ChartDataResponse {
            token_address: token_address.to_string(),
            price_data: filter_by_range(points, query.start_time, query.end_time),
            pool_info: Some(PoolInfo {
                pool_address: pool.attributes.address.clone(),
                quote_token: pool.quote_symbol(),
                dex: pool.relationships.dex.data.id.clone(),
                liquidity_usd: pool.liquidity_usd(),
            }),
            error: None,
        };
        self.cache.set_json(&key, &result, CACHE_TTL).await;
        Cached::fresh(result)
    }

    pub async fn invalidate(&self, token_address: &str) -> Result<u64, RedisError> {
        let prefix = RedisCache::create_key(CACHE_PREFIX, &[token_address]);
        self.cache.invalidate_prefix(&prefix).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(timestamp: i64) -> OhlcPoint {
        OhlcPoint {
            timestamp,
            open: 1.0,
            high: 1.0,
            low: 1.0,
            close: 1.0,
            volume: 0.0,
        }
    }

    #[test]
    fn range_filter_is_inclusive_and_one_sided() {
        let points = vec![point(100), point(200), point(300)];
        let both = filter_by_range(points.clone(), Some(100), Some(200));
        assert_eq!(both.len(), 2);

        let from_only = filter_by_range(points.clone(), Some(250), None);
        assert_eq!(from_only.len(), 1);
        assert_eq!(from_only[0].timestamp, 300);

        let open = filter_by_range(points, None, None);
        assert_eq!(open.len(), 3);
    }

    #[test]
    fn cache_keys_separate_ranged_lookups() {
        let plain = TokenChartService::cache_key(
            "0xfa1",
            &ChartQuery {
                timeframe: Timeframe::Hour,
                ..ChartQuery::default()
            },
        );
        assert_eq!(plain, "token:chart:0xfa1:hour:default");

        let ranged = TokenChartService::cache_key(
            "0xfa1",
            &ChartQuery {
                timeframe: Timeframe::Hour,
                start_time: Some(100),
                ..ChartQuery::default()
            },
        );
        assert_eq!(ranged, "token:chart:0xfa1:hour:default:range-100-0");
    }

    #[tokio::test]
    async fn unreachable_terminal_degrades_to_an_error_payload() {
        // nothing listens on port 1; pool discovery fails immediately
        let gecko = GeckoTerminalProvider::with_base_url(
            reqwest::Client::new(),
            "http://127.0.0.1:1/api/v2",
        );
        let cache = RedisCache::connect("redis://127.0.0.1:1").unwrap();
        let service = TokenChartService::new(Arc::new(gecko), cache);

        let result = service.chart("0xfa1", ChartQuery::default(), true).await;
        assert!(result.data.price_data.is_empty());
        assert!(result.data.error.is_some());
    }
}
