use std::collections::HashMap;

use reqwest::Client;
use serde::Deserialize;

use crate::providers::{get_json, ProviderError};

const BASE_URL: &str = "https://api.coingecko.com/api/v3";
/// simple/price caps the ids parameter well below our universe, so the
/// caller batches lookups at this size.
pub const PRICE_BATCH_SIZE: usize = 30;

const NATIVE_ID: &str = "aptos";

pub struct CoinGeckoProvider {
    client: Client,
    api_key: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct GeckoPrice {
    pub usd: Option<f64>,
    pub usd_market_cap: Option<f64>,
    pub usd_24h_vol: Option<f64>,
    pub usd_24h_change: Option<f64>,
}

impl CoinGeckoProvider {
    pub fn new(client: Client, api_key: Option<String>) -> Self {
        Self { client, api_key }
    }

    fn get(&self, url: String) -> reqwest::RequestBuilder {
        let mut builder = self.client.get(url).header("Accept", "application/json");
        if let Some(ref key) = self.api_key {
            builder = builder.header("x-cg-api-key", key.clone());
        }
        builder
    }

    /// Batched `simple/price` lookup keyed by coingecko id. Callers pass at
    /// most [`PRICE_BATCH_SIZE`] ids per invocation.
    pub async fn prices_by_ids(
        &self,
        ids: &[String],
    ) -> Result<HashMap<String, GeckoPrice>, ProviderError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let url = format!(
            "{BASE_URL}/simple/price?ids={}&vs_currencies=usd\
             &include_market_cap=true&include_24hr_vol=true&include_24hr_change=true",
            ids.join(",")
        );
        get_json("coingecko", self.get(url)).await
    }

    /// Spot USD price of the chain's native token.
    pub async fn native_price(&self) -> Result<Option<f64>, ProviderError> {
        let url = format!("{BASE_URL}/simple/price?ids={NATIVE_ID}&vs_currencies=usd");
        let prices: HashMap<String, GeckoPrice> = get_json("coingecko", self.get(url)).await?;
        Ok(prices.get(NATIVE_ID).and_then(|p| p.usd))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn price_map_deserializes() {
        let raw = r#"{
            "aptos": { "usd": 4.61, "usd_market_cap": 2900000000.0,
                       "usd_24h_vol": 120000000.0, "usd_24h_change": -2.3 },
            "tether": { "usd": 1.0 }
        }"#;
        let prices: HashMap<String, GeckoPrice> = serde_json::from_str(raw).unwrap();
        assert_eq!(prices["aptos"].usd, Some(4.61));
        assert!(prices["tether"].usd_market_cap.is_none());
    }
}
