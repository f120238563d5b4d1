use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::providers::{get_json, CoinListSource, ProviderError};
use crate::registry::CoinListRecord;

const COIN_LIST_URL: &str =
    "https://raw.githubusercontent.com/hippospace/aptos-coin-list/main/src/defaultList.mainnet.json";

/// Hippo's permissioned mainnet coin list. Legacy coin types only; every
/// entry here is on the curated list, which is what the permissioned flag
/// records.
pub struct HippoProvider {
    client: Client,
}

#[derive(Debug, Deserialize)]
struct HippoCoin {
    name: Option<String>,
    symbol: Option<String>,
    official_symbol: Option<String>,
    coingecko_id: Option<String>,
    decimals: Option<i32>,
    logo_url: Option<String>,
    project_url: Option<String>,
    token_type: HippoTokenType,
}

#[derive(Debug, Deserialize)]
struct HippoTokenType {
    #[serde(rename = "type")]
    coin_type: String,
}

impl HippoProvider {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CoinListSource for HippoProvider {
    fn name(&self) -> &'static str {
        "hippo"
    }

    async fn fetch_records(&self) -> Result<Vec<CoinListRecord>, ProviderError> {
        let coins: Vec<HippoCoin> = get_json(self.name(), self.client.get(COIN_LIST_URL)).await?;

        let records = coins
            .into_iter()
            .filter(|coin| coin.token_type.coin_type.contains("::"))
            .map(|coin| CoinListRecord {
                source: "hippo",
                legacy_address: Some(coin.token_type.coin_type.trim().to_string()),
                name: coin.name,
                symbol: coin.official_symbol.or(coin.symbol),
                decimals: coin.decimals,
                logo_url: coin.logo_url,
                website: coin.project_url.filter(|u| !u.is_empty()),
                coingecko_id: coin.coingecko_id.filter(|id| !id.is_empty()),
                is_permissioned: Some(true),
                ..CoinListRecord::default()
            })
            .collect();
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coin_deserializes_and_prefers_official_symbol() {
        let raw = r#"{
            "name": "Tether USD",
            "symbol": "zUSDT",
            "official_symbol": "USDT",
            "coingecko_id": "tether",
            "decimals": 6,
            "logo_url": "https://img/usdt.svg",
            "project_url": "",
            "token_type": {
                "type": "0xf2::asset::USDT",
                "account_address": "0xf2",
                "module_name": "asset",
                "struct_name": "USDT"
            }
        }"#;
        let coin: HippoCoin = serde_json::from_str(raw).unwrap();
        assert_eq!(coin.token_type.coin_type, "0xf2::asset::USDT");
        assert_eq!(coin.official_symbol.as_deref(), Some("USDT"));
    }
}
