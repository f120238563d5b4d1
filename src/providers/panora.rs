use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::providers::{get_json, CoinListSource, ProviderError};
use crate::registry::CoinListRecord;

const TOKEN_LIST_URL: &str =
    "https://raw.githubusercontent.com/PanoraExchange/Aptos-Tokens/main/token-list.json";

/// Panora's curated token list. The richest of the list sources: carries
/// both address forms, oracle ids, and the ban flag.
pub struct PanoraProvider {
    client: Client,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PanoraToken {
    token_address: Option<String>,
    fa_address: Option<String>,
    name: Option<String>,
    symbol: Option<String>,
    panora_symbol: Option<String>,
    decimals: Option<i32>,
    logo_url: Option<String>,
    website_url: Option<String>,
    coin_gecko_id: Option<String>,
    coin_market_cap_id: Option<serde_json::Value>,
    is_banned: Option<bool>,
}

impl PanoraProvider {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CoinListSource for PanoraProvider {
    fn name(&self) -> &'static str {
        "panora"
    }

    async fn fetch_records(&self) -> Result<Vec<CoinListRecord>, ProviderError> {
        let tokens: Vec<PanoraToken> =
            get_json(self.name(), self.client.get(TOKEN_LIST_URL)).await?;

        let records = tokens
            .into_iter()
            .map(|token| {
                // tokenAddress may be null for fungible-asset-only listings;
                // when set it is always the legacy `::` coin type.
                let legacy = token
                    .token_address
                    .filter(|a| a.contains("::"))
                    .map(|a| a.trim().to_string());
                let fungible = token
                    .fa_address
                    .map(|a| a.trim().to_string())
                    .filter(|a| !a.is_empty());
                CoinListRecord {
                    source: "panora",
                    legacy_address: legacy,
                    fungible_address: fungible,
                    name: token.name,
                    symbol: token.symbol,
                    display_symbol: token.panora_symbol,
                    decimals: token.decimals,
                    logo_url: token.logo_url,
                    website: token.website_url,
                    coingecko_id: token.coin_gecko_id,
                    // the upstream list mixes numeric and string ids
                    coinmarketcap_id: token.coin_market_cap_id.map(|v| match v {
                        serde_json::Value::String(s) => s,
                        other => other.to_string(),
                    }),
                    is_banned: token.is_banned,
                    ..CoinListRecord::default()
                }
            })
            .collect();
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_deserializes_with_numeric_cmc_id() {
        let raw = r#"{
            "tokenAddress": "0x1::aptos_coin::AptosCoin",
            "faAddress": "0xa",
            "name": "Aptos Coin",
            "symbol": "APT",
            "panoraSymbol": "APT",
            "decimals": 8,
            "logoUrl": "https://img/apt.svg",
            "websiteUrl": "https://aptosfoundation.org",
            "coinGeckoId": "aptos",
            "coinMarketCapId": 21794,
            "isBanned": false
        }"#;
        let token: PanoraToken = serde_json::from_str(raw).unwrap();
        assert_eq!(token.decimals, Some(8));
        assert_eq!(
            token.coin_market_cap_id,
            Some(serde_json::Value::from(21794))
        );
    }
}
