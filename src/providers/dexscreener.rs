use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Deserializer};

use crate::providers::{get_json, PairSource, ProviderError};

const BASE_URL: &str = "https://api.dexscreener.com";

/// Pair-level market data, one lookup per token address. Returns every
/// pool the token trades in across the chain's dexes.
pub struct DexScreenerProvider {
    client: Client,
}

#[derive(Debug, Deserialize)]
struct TokenPairsResponse {
    #[serde(default)]
    pairs: Option<Vec<DexPair>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DexPair {
    pub pair_address: String,
    pub dex_id: Option<String>,
    pub base_token: PairToken,
    pub quote_token: PairToken,
    /// Served as a string by the API despite being numeric.
    #[serde(default, deserialize_with = "lenient_f64")]
    pub price_native: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub price_usd: Option<f64>,
    #[serde(default)]
    pub txns: Option<PairTxns>,
    #[serde(default)]
    pub volume: Option<PairWindows>,
    #[serde(default)]
    pub price_change: Option<PairWindows>,
    #[serde(default)]
    pub liquidity: Option<PairLiquidity>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub fdv: Option<f64>,
    /// Millisecond epoch.
    #[serde(default)]
    pub pair_created_at: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PairToken {
    pub address: String,
    pub name: Option<String>,
    pub symbol: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PairTxns {
    #[serde(default)]
    pub m5: TxnCounts,
    #[serde(default)]
    pub h1: TxnCounts,
    #[serde(default)]
    pub h6: TxnCounts,
    #[serde(default)]
    pub h24: TxnCounts,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct TxnCounts {
    #[serde(default)]
    pub buys: i64,
    #[serde(default)]
    pub sells: i64,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PairWindows {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub m5: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub h1: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub h6: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub h24: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PairLiquidity {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub usd: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub base: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub quote: Option<f64>,
}

/// Accepts a JSON number, a numeric string, or null. The API is not
/// consistent about which one it serves for price fields.
fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

impl DexScreenerProvider {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PairSource for DexScreenerProvider {
    fn name(&self) -> &'static str {
        "dexscreener"
    }

    async fn fetch_pairs(&self, address: &str) -> Result<Vec<DexPair>, ProviderError> {
        let url = format!("{BASE_URL}/latest/dex/tokens/{address}");
        let response: TokenPairsResponse = get_json(self.name(), self.client.get(url)).await?;
        // `pairs` is null rather than [] for unknown tokens
        Ok(response.pairs.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_deserializes_with_string_prices() {
        let raw = r#"{
            "pairAddress": "0xpool1",
            "dexId": "thala",
            "baseToken": { "address": "0xfa1", "name": "Doge", "symbol": "DOGE" },
            "quoteToken": { "address": "0xa", "name": "Aptos", "symbol": "APT" },
            "priceNative": "0.0000213",
            "priceUsd": "0.000104",
            "txns": {
                "m5": { "buys": 1, "sells": 0 },
                "h1": { "buys": 10, "sells": 4 },
                "h6": { "buys": 40, "sells": 22 },
                "h24": { "buys": 120, "sells": 90 }
            },
            "volume": { "m5": 12.5, "h1": 420.0, "h6": 1800.0, "h24": 9000.0 },
            "priceChange": { "m5": 0.1, "h1": -1.2, "h6": 3.4, "h24": -7.8 },
            "liquidity": { "usd": 15000.0, "base": 1.2e9, "quote": 3200.0 },
            "fdv": 104000,
            "pairCreatedAt": 1700000000000
        }"#;
        let pair: DexPair = serde_json::from_str(raw).unwrap();
        assert_eq!(pair.price_usd, Some(0.000104));
        assert_eq!(pair.txns.unwrap().h24.buys, 120);
        assert_eq!(pair.liquidity.unwrap().usd, Some(15000.0));
    }

    #[test]
    fn null_pairs_become_empty() {
        let raw = r#"{ "schemaVersion": "1.0.0", "pairs": null }"#;
        let response: TokenPairsResponse = serde_json::from_str(raw).unwrap();
        assert!(response.pairs.is_none());
    }
}
