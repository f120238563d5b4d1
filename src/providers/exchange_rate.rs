use std::collections::HashMap;

use reqwest::Client;
use serde::Deserialize;

use crate::database::models::CurrencyPrice;
use crate::decimal;
use crate::providers::{get_json, ProviderError};

const BASE_URL: &str = "https://v6.exchangerate-api.com/v6";

/// Fiat exchange-rate feed. Everything is quoted against USD; the rate
/// table lets the read path convert USD figures into any display
/// currency.
pub struct ExchangeRateProvider {
    client: Client,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct SupportedCodesResponse {
    /// `[code, country name]` pairs.
    supported_codes: Vec<(String, String)>,
}

#[derive(Debug, Deserialize)]
struct CurrencyRatesResponse {
    conversion_rates: HashMap<String, f64>,
}

impl ExchangeRateProvider {
    pub fn new(client: Client, api_key: String) -> Self {
        Self { client, api_key }
    }

    async fn supported_codes(&self) -> Result<SupportedCodesResponse, ProviderError> {
        let url = format!("{BASE_URL}/{}/codes", self.api_key);
        get_json("exchange-rate", self.client.get(url)).await
    }

    async fn usd_rates(&self) -> Result<CurrencyRatesResponse, ProviderError> {
        let url = format!("{BASE_URL}/{}/latest/USD", self.api_key);
        get_json("exchange-rate", self.client.get(url)).await
    }

    /// Join the code list against the USD rate table into one row per
    /// currency. A code without a rate still gets a row; its price stays
    /// null until the API serves one.
    pub async fn fetch_currency_prices(&self) -> Result<Vec<CurrencyPrice>, ProviderError> {
        let codes = self.supported_codes().await?;
        let rates = self.usd_rates().await?;
        Ok(join_codes_and_rates(codes.supported_codes, &rates.conversion_rates))
    }
}

fn join_codes_and_rates(
    codes: Vec<(String, String)>,
    rates: &HashMap<String, f64>,
) -> Vec<CurrencyPrice> {
    codes
        .into_iter()
        .map(|(code, country)| {
            let price = rates.get(&code).copied().and_then(decimal::from_f64);
            CurrencyPrice {
                currency_id: code,
                country: Some(country),
                base_currency: Some("USD".to_string()),
                price,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn codes_parse_as_pairs() {
        let raw = r#"{
            "result": "success",
            "supported_codes": [["EUR", "Euro"], ["JPY", "Japanese Yen"]]
        }"#;
        let codes: SupportedCodesResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(codes.supported_codes.len(), 2);
        assert_eq!(codes.supported_codes[0].0, "EUR");
    }

    #[test]
    fn join_keeps_codes_without_a_rate() {
        let codes = vec![
            ("EUR".to_string(), "Euro".to_string()),
            ("XYZ".to_string(), "Nowhere".to_string()),
        ];
        let mut rates = HashMap::new();
        rates.insert("EUR".to_string(), 0.92);

        let prices = join_codes_and_rates(codes, &rates);
        assert_eq!(prices.len(), 2);
        assert_eq!(prices[0].price, Some(dec!(0.92)));
        assert_eq!(prices[0].base_currency.as_deref(), Some("USD"));
        assert_eq!(prices[1].price, None);
    }
}
