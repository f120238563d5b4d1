pub mod coingecko;
pub mod coinmarketcap;
pub mod dexscreener;
pub mod emojicoin;
pub mod exchange_rate;
pub mod geckoterminal;
pub mod hippo;
pub mod panora;
pub mod pump_launch;
pub mod retry;

pub use coingecko::CoinGeckoProvider;
pub use coinmarketcap::CoinMarketCapProvider;
pub use dexscreener::{DexPair, DexScreenerProvider};
pub use emojicoin::EmojiCoinProvider;
pub use exchange_rate::ExchangeRateProvider;
pub use geckoterminal::GeckoTerminalProvider;
pub use hippo::HippoProvider;
pub use panora::PanoraProvider;
pub use pump_launch::PumpLaunchProvider;
pub use retry::RetryPolicy;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;

use crate::registry::CoinListRecord;

/// Per-request deadline applied by every adapter.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request to {provider} failed: {source}")]
    Http {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{provider} returned status {status}")]
    Status {
        provider: &'static str,
        status: StatusCode,
    },
    #[error("{provider} responded with {content_type:?} instead of json")]
    ContentType {
        provider: &'static str,
        content_type: Option<String>,
    },
    #[error("unparseable {provider} payload: {detail}")]
    Parse {
        provider: &'static str,
        detail: String,
    },
    #[error("{provider} api error: {detail}")]
    Api {
        provider: &'static str,
        detail: String,
    },
}

impl ProviderError {
    pub fn provider(&self) -> &'static str {
        match self {
            Self::Http { provider, .. }
            | Self::Status { provider, .. }
            | Self::ContentType { provider, .. }
            | Self::Parse { provider, .. }
            | Self::Api { provider, .. } => provider,
        }
    }

    /// Whether a retry has any chance of succeeding. Explicit upstream api
    /// errors (bad key, unknown id) are permanent; everything else is
    /// treated as a transient fault of the wire or the provider edge.
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::Api { .. })
    }
}

/// Source of token-list records for the coin-list refresh cycle.
#[async_trait]
pub trait CoinListSource: Send + Sync {
    fn name(&self) -> &'static str;
    async fn fetch_records(&self) -> Result<Vec<CoinListRecord>, ProviderError>;
}

/// Source of per-coin liquidity-pool observations for the dex cycle.
#[async_trait]
pub trait PairSource: Send + Sync {
    fn name(&self) -> &'static str;
    async fn fetch_pairs(&self, address: &str) -> Result<Vec<DexPair>, ProviderError>;
}

/// Send a GET, validate status and content type, parse the body.
///
/// Raw token-list hosts (githubusercontent) serve json as text/plain, so
/// that content type is accepted alongside application/json.
pub(crate) async fn get_json<T: DeserializeOwned>(
    provider: &'static str,
    builder: reqwest::RequestBuilder,
) -> Result<T, ProviderError> {
    let response = builder
        .timeout(REQUEST_TIMEOUT)
        .send()
        .await
        .map_err(|source| ProviderError::Http { provider, source })?;

    let status = response.status();
    if !status.is_success() {
        return Err(ProviderError::Status { provider, status });
    }

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    let acceptable = content_type
        .as_deref()
        .map_or(false, |c| c.contains("json") || c.contains("text/plain"));
    if !acceptable {
        return Err(ProviderError::ContentType {
            provider,
            content_type,
        });
    }

    let body = response
        .text()
        .await
        .map_err(|source| ProviderError::Http { provider, source })?;
    serde_json::from_str(&body).map_err(|e| ProviderError::Parse {
        provider,
        detail: e.to_string(),
    })
}
