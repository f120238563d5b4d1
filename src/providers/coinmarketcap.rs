use std::collections::HashMap;

use reqwest::Client;
use serde::Deserialize;

use crate::providers::{get_json, ProviderError};

const BASE_URL: &str = "https://pro-api.coinmarketcap.com";
/// quotes/latest accepts large id batches; 100 keeps the URL short of any
/// proxy limit while still covering the universe in a few calls.
pub const QUOTE_BATCH_SIZE: usize = 100;

pub struct CoinMarketCapProvider {
    client: Client,
    api_key: Option<String>,
}

/// Every endpoint wraps its payload in this envelope; a nonzero
/// error_code means the request itself was bad, not the transport.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    status: EnvelopeStatus,
    #[serde(default)]
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct EnvelopeStatus {
    error_code: i64,
    error_message: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CmcQuote {
    pub id: i64,
    pub cmc_rank: Option<i64>,
    pub max_supply: Option<f64>,
    pub circulating_supply: Option<f64>,
    pub total_supply: Option<f64>,
    pub infinite_supply: Option<bool>,
    pub self_reported_circulating_supply: Option<f64>,
    pub self_reported_market_cap: Option<f64>,
    pub quote: CmcQuoteCurrencies,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CmcQuoteCurrencies {
    #[serde(rename = "USD")]
    pub usd: Option<CmcUsdQuote>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct CmcUsdQuote {
    pub price: Option<f64>,
    pub volume_24h: Option<f64>,
    pub volume_7d: Option<f64>,
    pub volume_30d: Option<f64>,
    pub volume_change_24h: Option<f64>,
    pub percent_change_1h: Option<f64>,
    pub percent_change_24h: Option<f64>,
    pub percent_change_7d: Option<f64>,
    pub percent_change_30d: Option<f64>,
    pub market_cap: Option<f64>,
    pub fully_diluted_market_cap: Option<f64>,
    pub market_cap_by_total_supply: Option<f64>,
    pub tvl: Option<f64>,
}

impl CoinMarketCapProvider {
    pub fn new(client: Client, api_key: Option<String>) -> Self {
        Self { client, api_key }
    }

    fn get(&self, url: String) -> reqwest::RequestBuilder {
        let mut builder = self.client.get(url).header("Accept", "application/json");
        if let Some(ref key) = self.api_key {
            builder = builder.header("X-CMC_PRO_API_KEY", key.clone());
        }
        builder
    }

    fn unwrap_envelope<T>(envelope: Envelope<T>) -> Result<Option<T>, ProviderError> {
        if envelope.status.error_code != 0 {
            return Err(ProviderError::Api {
                provider: "coinmarketcap",
                detail: envelope
                    .status
                    .error_message
                    .unwrap_or_else(|| format!("error_code {}", envelope.status.error_code)),
            });
        }
        Ok(envelope.data)
    }

    /// Batched quote lookup keyed by coinmarketcap id. Callers pass at most
    /// [`QUOTE_BATCH_SIZE`] ids per invocation; invalid ids are skipped
    /// server-side instead of failing the batch.
    pub async fn quotes_by_ids(
        &self,
        ids: &[String],
    ) -> Result<HashMap<String, CmcQuote>, ProviderError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let url = format!(
            "{BASE_URL}/v2/cryptocurrency/quotes/latest?id={}&skip_invalid=true\
             &aux=cmc_rank,max_supply,circulating_supply,total_supply,\
market_cap_by_total_supply,volume_7d,volume_30d",
            ids.join(",")
        );
        let envelope: Envelope<HashMap<String, CmcQuote>> =
            get_json("coinmarketcap", self.get(url)).await?;
        Ok(Self::unwrap_envelope(envelope)?.unwrap_or_default())
    }

    /// Native-token USD spot, used as the fallback oracle when the primary
    /// one fails or returns nothing.
    pub async fn native_price(&self) -> Result<Option<f64>, ProviderError> {
        let url = format!("{BASE_URL}/v1/cryptocurrency/quotes/latest?symbol=APT&convert=USD");
        let envelope: Envelope<HashMap<String, CmcQuote>> =
            get_json("coinmarketcap", self.get(url)).await?;
        let data = Self::unwrap_envelope(envelope)?.unwrap_or_default();
        Ok(data
            .get("APT")
            .and_then(|q| q.quote.usd)
            .and_then(|usd| usd.price))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_envelope_deserializes() {
        let raw = r#"{
            "status": { "timestamp": "2025-05-01T00:00:00Z", "error_code": 0,
                        "error_message": null, "elapsed": 12, "credit_count": 1 },
            "data": {
                "21794": {
                    "id": 21794,
                    "cmc_rank": 30,
                    "max_supply": null,
                    "circulating_supply": 630000000.0,
                    "total_supply": 1130000000.0,
                    "infinite_supply": true,
                    "self_reported_circulating_supply": null,
                    "self_reported_market_cap": null,
                    "quote": { "USD": {
                        "price": 4.61,
                        "volume_24h": 120000000.0,
                        "percent_change_24h": -2.3,
                        "market_cap": 2900000000.0,
                        "fully_diluted_market_cap": 5200000000.0
                    } }
                }
            }
        }"#;
        let envelope: Envelope<HashMap<String, CmcQuote>> = serde_json::from_str(raw).unwrap();
        let data = CoinMarketCapProvider::unwrap_envelope(envelope)
            .unwrap()
            .unwrap();
        let usd = data["21794"].quote.usd.unwrap();
        assert_eq!(usd.price, Some(4.61));
        assert_eq!(data["21794"].cmc_rank, Some(30));
    }

    #[test]
    fn nonzero_error_code_is_a_permanent_error() {
        let raw = r#"{
            "status": { "timestamp": "2025-05-01T00:00:00Z", "error_code": 1002,
                        "error_message": "API key missing.", "elapsed": 0, "credit_count": 0 }
        }"#;
        let envelope: Envelope<HashMap<String, CmcQuote>> = serde_json::from_str(raw).unwrap();
        let err = CoinMarketCapProvider::unwrap_envelope(envelope).unwrap_err();
        assert!(!err.is_transient());
        assert!(matches!(err, ProviderError::Api { .. }));
    }
}
