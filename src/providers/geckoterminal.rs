use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::providers::{get_json, ProviderError};

const BASE_URL: &str = "https://api.geckoterminal.com/api/v2";
const API_VERSION_HEADER: &str = "application/json;version=20230302";
const NETWORK: &str = "aptos";
const POOL_SORT: &str = "h24_volume_usd_liquidity_desc";

/// OHLC candle source. Pools are discovered per token, the deepest
/// stablecoin-quoted one is charted.
pub struct GeckoTerminalProvider {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct TokenPoolsResponse {
    #[serde(default)]
    data: Vec<PoolData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PoolData {
    pub attributes: PoolAttributes,
    pub relationships: PoolRelationships,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PoolAttributes {
    pub address: String,
    pub name: Option<String>,
    /// Served as a string despite being numeric.
    pub reserve_in_usd: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PoolRelationships {
    pub quote_token: Relationship,
    pub dex: Relationship,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Relationship {
    pub data: RelationshipId,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RelationshipId {
    pub id: String,
}

#[derive(Debug, Deserialize)]
struct OhlcResponse {
    data: OhlcData,
}

#[derive(Debug, Deserialize)]
struct OhlcData {
    attributes: OhlcAttributes,
}

#[derive(Debug, Deserialize)]
struct OhlcAttributes {
    /// `[timestamp, open, high, low, close, volume]` rows.
    ohlcv_list: Vec<(i64, f64, f64, f64, f64, f64)>,
}

/// One candle of the chart.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OhlcPoint {
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Timeframe {
    #[default]
    Day,
    Hour,
    Minute,
}

impl Timeframe {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "day" => Some(Self::Day),
            "hour" => Some(Self::Hour),
            "minute" => Some(Self::Minute),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Hour => "hour",
            Self::Minute => "minute",
        }
    }
}

impl PoolData {
    pub fn liquidity_usd(&self) -> f64 {
        self.attributes
            .reserve_in_usd
            .as_deref()
            .and_then(|v| v.parse().ok())
            .unwrap_or(0.0)
    }

    /// Quote token symbol, the last segment of the relationship id
    /// (`aptos_0x...::asset::USDC` style).
    pub fn quote_symbol(&self) -> String {
        self.relationships
            .quote_token
            .data
            .id
            .rsplit('_')
            .next()
            .unwrap_or("unknown")
            .to_string()
    }
}

/// Deepest pool quoted in a USD stablecoin, if any.
pub fn pick_stablecoin_pool(pools: Vec<PoolData>) -> Option<PoolData> {
    let mut stable: Vec<PoolData> = pools
        .into_iter()
        .filter(|pool| {
            let quote = pool.relationships.quote_token.data.id.to_lowercase();
            quote.contains("usdc") || quote.contains("usdt")
        })
        .collect();
    stable.sort_by(|a, b| {
        b.liquidity_usd()
            .partial_cmp(&a.liquidity_usd())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    stable.into_iter().next()
}

impl GeckoTerminalProvider {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            base_url: BASE_URL.to_string(),
        }
    }

    /// Point the adapter at a different host, for tests.
    pub fn with_base_url(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    async fn token_pools(&self, token_address: &str) -> Result<Vec<PoolData>, ProviderError> {
        let encoded = urlencode(token_address);
        let url = format!(
            "{}/networks/{NETWORK}/tokens/{encoded}/pools\
             ?page=1&sort={POOL_SORT}&include=base_token,quote_token,dex",
            self.base_url
        );
        let response: TokenPoolsResponse = get_json(
            "geckoterminal",
            self.client.get(url).header("Accept", API_VERSION_HEADER),
        )
        .await?;
        Ok(response.data)
    }

    pub async fn best_stablecoin_pool(
        &self,
        token_address: &str,
    ) -> Result<Option<PoolData>, ProviderError> {
        let pools = self.token_pools(token_address).await?;
        Ok(pick_stablecoin_pool(pools))
    }

    pub async fn pool_ohlc(
        &self,
        pool_address: &str,
        timeframe: Timeframe,
        limit: Option<usize>,
    ) -> Result<Vec<OhlcPoint>, ProviderError> {
        let encoded = urlencode(pool_address);
        let mut url = format!(
            "{}/networks/{NETWORK}/pools/{encoded}/ohlcv/{}?currency=usd&token=base",
            self.base_url,
            timeframe.as_str()
        );
        if let Some(limit) = limit {
            url.push_str(&format!("&limit={limit}"));
        }
        let response: OhlcResponse = get_json(
            "geckoterminal",
            self.client.get(url).header("Accept", API_VERSION_HEADER),
        )
        .await?;
        Ok(response
            .data
            .attributes
            .ohlcv_list
            .into_iter()
            .map(|(timestamp, open, high, low, close, volume)| OhlcPoint {
                timestamp,
                open,
                high,
                low,
                close,
                volume,
            })
            .collect())
    }
}

/// Aptos coin types carry `::`, which must not break the path segment.
fn urlencode(raw: &str) -> String {
    raw.replace(':', "%3A")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(quote_id: &str, reserve: &str) -> PoolData {
        PoolData {
            attributes: PoolAttributes {
                address: format!("0xpool-{quote_id}"),
                name: None,
                reserve_in_usd: Some(reserve.to_string()),
            },
            relationships: PoolRelationships {
                quote_token: Relationship {
                    data: RelationshipId {
                        id: quote_id.to_string(),
                    },
                },
                dex: Relationship {
                    data: RelationshipId {
                        id: "thala".to_string(),
                    },
                },
            },
        }
    }

    #[test]
    fn stablecoin_pool_with_deepest_reserve_wins() {
        let pools = vec![
            pool("aptos_0x1::apt::APT", "900000"),
            pool("aptos_0x2::asset::USDC", "15000"),
            pool("aptos_0x3::asset::USDT", "40000"),
        ];
        let best = pick_stablecoin_pool(pools).unwrap();
        assert_eq!(best.quote_symbol(), "0x3::asset::USDT");
        assert_eq!(best.liquidity_usd(), 40000.0);
    }

    #[test]
    fn no_stablecoin_pool_means_none() {
        let pools = vec![pool("aptos_0x1::apt::APT", "900000")];
        assert!(pick_stablecoin_pool(pools).is_none());
    }

    #[test]
    fn ohlcv_rows_parse_as_tuples() {
        let raw = r#"{
            "data": {
                "id": "x",
                "type": "ohlcv_request_response",
                "attributes": {
                    "ohlcv_list": [[1714521600, 1.0, 1.2, 0.9, 1.1, 54000.5]]
                }
            }
        }"#;
        let response: OhlcResponse = serde_json::from_str(raw).unwrap();
        let (ts, open, _, _, close, volume) = response.data.attributes.ohlcv_list[0];
        assert_eq!(ts, 1714521600);
        assert_eq!(open, 1.0);
        assert_eq!(close, 1.1);
        assert_eq!(volume, 54000.5);
    }
}
