use std::sync::Arc;

use chrono::Utc;
use redis::RedisError;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::cache::{Cached, RedisCache};
use crate::providers::{CoinGeckoProvider, CoinMarketCapProvider};

const CACHE_PREFIX: &str = "apt:price";
const CACHE_TTL: u64 = 300;

/// Native-token spot price with oracle fallback: the free oracle first,
/// the keyed one when it fails or returns nothing.
pub struct NativePriceService {
    coingecko: Arc<CoinGeckoProvider>,
    coinmarketcap: Arc<CoinMarketCapProvider>,
    cache: RedisCache,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NativePrice {
    pub price: Option<f64>,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl NativePriceService {
    pub fn new(
        coingecko: Arc<CoinGeckoProvider>,
        coinmarketcap: Arc<CoinMarketCapProvider>,
        cache: RedisCache,
    ) -> Self {
        Self {
            coingecko,
            coinmarketcap,
            cache,
        }
    }

    fn cache_key() -> String {
        RedisCache::create_key(CACHE_PREFIX, &["usd"])
    }

    pub async fn get_price(&self, skip_cache: bool) -> Cached<NativePrice> {
        let key = Self::cache_key();
        if !skip_cache {
            if let Some(stored) = self.cache.get_json::<NativePrice>(&key).await {
                return Cached::from_cache(stored);
            }
        }

        let price = match self.coingecko.native_price().await {
            Ok(Some(price)) => Some(price),
            Ok(None) => {
                warn!("primary oracle returned no native price, trying fallback");
                self.fallback_price().await
            }
            Err(e) => {
                warn!(error = %e, "primary oracle failed, trying fallback");
                self.fallback_price().await
            }
        };

        let result = NativePrice {
            price,
            timestamp: Utc::now().to_rfc3339(),
            error: price
                .is_none()
                .then(|| "failed to fetch native token price".to_string()),
        };
        // an errored lookup is never cached, the next request retries
        if result.price.is_some() {
            self.cache.set_json(&key, &result, CACHE_TTL).await;
        }
        Cached::fresh(result)
    }

    async fn fallback_price(&self) -> Option<f64> {
        match self.coinmarketcap.native_price().await {
            Ok(price) => price,
            Err(e) => {
                error!(error = %e, "fallback oracle failed as well");
                None
            }
        }
    }

    pub async fn invalidate(&self) -> Result<bool, RedisError> {
        self.cache.delete(&Self::cache_key()).await
    }
}
