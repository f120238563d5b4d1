use std::sync::Arc;

use redis::RedisError;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::cache::{Cached, RedisCache};
use crate::database::models::LaunchToken;
use crate::database::CoinRepository;
use crate::providers::pump_launch::{ChartPoint, PumpLaunchProvider, ThreadItem, TokenHolder};

const CACHE_PREFIX_LEGEND: &str = "launch:legend";
const CACHE_PREFIX_HOLDERS: &str = "coin:holders";
const CACHE_PREFIX_CHATS: &str = "coin:chats";
const CACHE_PREFIX_CHARTS: &str = "coin:charts";
const CACHE_TTL_LEGEND: u64 = 120;
const CACHE_TTL: u64 = 300;

const TOP_HOLDER_COUNT: usize = 5;

/// Launchpad read model: the persisted token list plus the cache-only
/// holder, chat, and chart feeds fetched straight from the platform.
pub struct LaunchFeedService {
    pump: Arc<PumpLaunchProvider>,
    repository: CoinRepository,
    cache: RedisCache,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegendResponse {
    pub token: Option<LaunchToken>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaunchListResponse {
    pub tokens: Vec<LaunchToken>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HoldersResponse {
    pub coin_id: String,
    pub holders: Vec<TokenHolder>,
    pub dev_percentage: String,
    pub top_holders: Vec<TokenHolder>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatsResponse {
    pub coin_id: String,
    pub threads: Vec<ThreadItem>,
    pub total_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartResponse {
    pub coin_id: String,
    pub points: Vec<ChartPoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn parse_percentage(raw: &str) -> f64 {
    raw.trim().trim_end_matches('%').parse().unwrap_or(0.0)
}

/// Share of supply sitting in wallets the platform flags as the dev's.
pub fn dev_percentage(holders: &[TokenHolder]) -> String {
    let total: f64 = holders
        .iter()
        .filter(|h| h.is_dev)
        .map(|h| parse_percentage(&h.percentage))
        .sum();
    // An empty sum is -0.0, which would render as "-0.00%".
    let total = if total == 0.0 { 0.0 } else { total };
    format!("{total:.2}%")
}

pub fn top_holders(holders: &[TokenHolder], limit: usize) -> Vec<TokenHolder> {
    let mut sorted = holders.to_vec();
    sorted.sort_by(|a, b| {
        parse_percentage(&b.percentage)
            .partial_cmp(&parse_percentage(&a.percentage))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    sorted.truncate(limit);
    sorted
}

impl LaunchFeedService {
    pub fn new(pump: Arc<PumpLaunchProvider>, repository: CoinRepository, cache: RedisCache) -> Self {
        Self {
            pump,
            repository,
            cache,
        }
    }

    /// Currently featured token, straight from the platform.
    pub async fn legend(&self, skip_cache: bool) -> Cached<LegendResponse> {
        let key = RedisCache::create_key(CACHE_PREFIX_LEGEND, &[]);
        if !skip_cache {
            if let Some(stored) = self.cache.get_json::<LegendResponse>(&key).await {
                return Cached::from_cache(stored);
            }
        }

        match self.pump.legend().await {
            Ok(token) => {
                let result = LegendResponse {
                    token: Some(token),
                    error: None,
                };
                self.cache.set_json(&key, &result, CACHE_TTL_LEGEND).await;
                Cached::fresh(result)
            }
            Err(e) => {
                error!(error = %e, "legend lookup failed");
                Cached::fresh(LegendResponse {
                    token: None,
                    error: Some(format!("failed to fetch legend token: {e}")),
                })
            }
        }
    }

    /// Paginated launch token list served from the mirror table, ordered
    /// the way the platform orders its own listing.
    pub async fn list(&self, page: i64, page_size: i64) -> LaunchListResponse {
        let page = page.max(1);
        let page_size = page_size.clamp(1, 100);
        // page is caller-supplied; saturate rather than overflow on i64::MAX
        let offset = (page - 1).saturating_mul(page_size);

        let tokens = self.repository.get_launch_tokens_page(page_size, offset).await;
        let total = self.repository.count_launch_tokens().await;
        match (tokens, total) {
            (Ok(tokens), Ok(total)) => LaunchListResponse {
                tokens,
                total,
                page,
                page_size,
                error: None,
            },
            (tokens, total) => {
                let e = tokens.err().or(total.err());
                error!(error = ?e, "launch list query failed");
                LaunchListResponse {
                    tokens: Vec::new(),
                    total: 0,
                    page,
                    page_size,
                    error: Some("failed to read launch token list".to_string()),
                }
            }
        }
    }

    /// Holder breakdown for one launch token. Cache-only data: it is
    /// never persisted, an upstream failure degrades to an error payload.
    pub async fn holders(&self, coin_id: &str, skip_cache: bool) -> Cached<HoldersResponse> {
        let key = RedisCache::create_key(CACHE_PREFIX_HOLDERS, &[coin_id]);
        if !skip_cache {
            if let Some(stored) = self.cache.get_json::<HoldersResponse>(&key).await {
                return Cached::from_cache(stored);
            }
        }

        info!(coin_id, "fetching holder data");
        match self.pump.holders(coin_id).await {
            Ok(holders) => {
                let result = HoldersResponse {
                    coin_id: coin_id.to_string(),
                    dev_percentage: dev_percentage(&holders),
                    top_holders: top_holders(&holders, TOP_HOLDER_COUNT),
                    holders,
                    error: None,
                };
                self.cache.set_json(&key, &result, CACHE_TTL).await;
                Cached::fresh(result)
            }
            Err(e) => {
                error!(coin_id, error = %e, "holder lookup failed");
                Cached::fresh(HoldersResponse {
                    coin_id: coin_id.to_string(),
                    holders: Vec::new(),
                    dev_percentage: "0.00%".to_string(),
                    top_holders: Vec::new(),
                    error: Some(format!("failed to fetch holders: {e}")),
                })
            }
        }
    }

    pub async fn chats(
        &self,
        coin_id: &str,
        page: usize,
        page_size: usize,
        skip_cache: bool,
    ) -> Cached<ChatsResponse> {
        let page = page.max(1);
        let page_size = page_size.clamp(1, 100);
        let key = RedisCache::create_key(
            CACHE_PREFIX_CHATS,
            &[coin_id, &page.to_string(), &page_size.to_string()],
        );
        if !skip_cache {
            if let Some(stored) = self.cache.get_json::<ChatsResponse>(&key).await {
                return Cached::from_cache(stored);
            }
        }

        match self.pump.threads(coin_id, page, page_size).await {
            Ok((threads, total_count)) => {
                let result = ChatsResponse {
                    coin_id: coin_id.to_string(),
                    threads,
                    total_count,
                    error: None,
                };
                self.cache.set_json(&key, &result, CACHE_TTL).await;
                Cached::fresh(result)
            }
            Err(e) => {
                error!(coin_id, error = %e, "chat lookup failed");
                Cached::fresh(ChatsResponse {
                    coin_id: coin_id.to_string(),
                    threads: Vec::new(),
                    total_count: 0,
                    error: Some(format!("failed to fetch chats: {e}")),
                })
            }
        }
    }

    pub async fn chart(&self, coin_id: &str, skip_cache: bool) -> Cached<ChartResponse> {
        let key = RedisCache::create_key(CACHE_PREFIX_CHARTS, &[coin_id]);
        if !skip_cache {
            if let Some(stored) = self.cache.get_json::<ChartResponse>(&key).await {
                return Cached::from_cache(stored);
            }
        }

        match self.pump.chart(coin_id).await {
            Ok(points) => {
                let result = ChartResponse {
                    coin_id: coin_id.to_string(),
                    points,
                    error: None,
                };
                self.cache.set_json(&key, &result, CACHE_TTL).await;
                Cached::fresh(result)
            }
            Err(e) => {
                error!(coin_id, error = %e, "chart lookup failed");
                Cached::fresh(ChartResponse {
                    coin_id: coin_id.to_string(),
                    points: Vec::new(),
                    error: Some(format!("failed to fetch chart: {e}")),
                })
            }
        }
    }

    /// Drop every cached feed for one coin, all page variants included.
    pub async fn invalidate_coin(&self, coin_id: &str) -> Result<u64, RedisError> {
        let mut removed = 0;
        for prefix in [CACHE_PREFIX_HOLDERS, CACHE_PREFIX_CHATS, CACHE_PREFIX_CHARTS] {
            let full = RedisCache::create_key(prefix, &[coin_id]);
            removed += self.cache.invalidate_prefix(&full).await?;
        }
        Ok(removed)
    }

    pub async fn invalidate_legend(&self) -> Result<bool, RedisError> {
        self.cache
            .delete(&RedisCache::create_key(CACHE_PREFIX_LEGEND, &[]))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn holder(addr: &str, percentage: &str, is_dev: bool) -> TokenHolder {
        TokenHolder {
            token_addr: "0xfa1".to_string(),
            holder_addr: addr.to_string(),
            holder_name: None,
            percentage: percentage.to_string(),
            is_dev,
        }
    }

    #[test]
    fn dev_percentage_sums_flagged_wallets() {
        let holders = vec![
            holder("0xdev", "91.71%", true),
            holder("0xdev2", "1.04%", true),
            holder("0xwhale", "5.00%", false),
        ];
        assert_eq!(dev_percentage(&holders), "92.75%");
    }

    #[test]
    fn dev_percentage_of_no_devs_is_zero() {
        let holders = vec![holder("0xwhale", "5.00%", false)];
        assert_eq!(dev_percentage(&holders), "0.00%");
    }

    #[tokio::test]
    async fn huge_page_numbers_do_not_overflow_the_offset() {
        let options: sqlx::postgres::PgConnectOptions = "postgres://nobody@127.0.0.1:1/nowhere"
            .parse()
            .unwrap();
        let pool = sqlx::postgres::PgPoolOptions::new()
            .acquire_timeout(std::time::Duration::from_millis(200))
            .connect_lazy_with(options);
        let service = LaunchFeedService::new(
            Arc::new(PumpLaunchProvider::new(reqwest::Client::new())),
            CoinRepository::new(pool),
            RedisCache::connect("redis://127.0.0.1:1").unwrap(),
        );

        // the query fails (nothing behind the pool), but the offset math
        // must saturate instead of panicking
        let list = service.list(i64::MAX, 50).await;
        assert!(list.error.is_some());
        assert_eq!(list.page, i64::MAX);
    }

    #[test]
    fn top_holders_sorts_by_share_descending() {
        let holders = vec![
            holder("0xa", "1.00%", false),
            holder("0xb", "9.50%", false),
            holder("0xc", "4.25%", true),
        ];
        let top = top_holders(&holders, 2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].holder_addr, "0xb");
        assert_eq!(top[1].holder_addr, "0xc");
    }
}
