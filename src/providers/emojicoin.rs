use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::providers::{get_json, ProviderError};

const BASE_URL: &str = "https://www.emojicoin.fun/api";

/// Single request cap imposed by the tickers and trades endpoints.
pub const PAGE_LIMIT: usize = 500;

/// Emoji-ticker market venue. Serves the trending, ticker, and trade
/// read endpoints; its markets never enter the coin universe.
pub struct EmojiCoinProvider {
    client: Client,
    base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendingMarket {
    pub market_id: Option<i64>,
    pub market_address: Option<String>,
    pub symbol_emojis: Option<Vec<String>>,
    pub in_bonding_curve: Option<bool>,
    pub daily_volume_quote: Option<f64>,
    pub usd_price: Option<f64>,
    pub quote_price: Option<f64>,
    pub quote_price_delta_24h: Option<f64>,
    pub instantaneous_stats: Option<TrendingStats>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TrendingStats {
    pub circulating_supply: Option<f64>,
    pub total_value_locked: Option<f64>,
    pub fully_diluted_value: Option<f64>,
    pub market_cap_usd: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketTicker {
    pub ticker_id: String,
    pub base_currency: Option<String>,
    pub target_currency: Option<String>,
    pub pool_id: Option<String>,
    pub last_price: Option<String>,
    pub base_volume: Option<String>,
    pub target_volume: Option<String>,
    pub liquidity_in_usd: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketTrade {
    pub trade_id: String,
    pub price: Option<String>,
    pub base_volume: Option<String>,
    pub target_volume: Option<String>,
    pub trade_timestamp: Option<String>,
    #[serde(rename = "type")]
    pub side: Option<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TradeQuery {
    pub start_time: Option<i64>,
    pub end_time: Option<i64>,
    pub buy_side_only: Option<bool>,
    pub limit: usize,
    pub skip: usize,
}

impl EmojiCoinProvider {
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

    pub async fn trending(&self) -> Result<Vec<TrendingMarket>, ProviderError> {
        let url = format!("{}/trending", self.base_url);
        get_json("emojicoin", self.client.get(url)).await
    }

    /// One page of tickers; callers advance `skip` until an empty page
    /// comes back.
    pub async fn tickers(&self, limit: usize, skip: usize) -> Result<Vec<MarketTicker>, ProviderError> {
        let limit = limit.min(PAGE_LIMIT);
        let url = format!("{}/coingecko/tickers?limit={limit}&skip={skip}", self.base_url);
        get_json("emojicoin", self.client.get(url)).await
    }

    pub async fn historical_trades(
        &self,
        ticker_id: &str,
        query: TradeQuery,
    ) -> Result<Vec<MarketTrade>, ProviderError> {
        let limit = query.limit.clamp(1, PAGE_LIMIT);
        let mut url = format!(
            "{}/coingecko/historical_trades?ticker_id={ticker_id}",
            self.base_url
        );
        if let Some(start) = query.start_time {
            url.push_str(&format!("&start_time={start}"));
        }
        if let Some(end) = query.end_time {
            url.push_str(&format!("&end_time={end}"));
        }
        if let Some(buy) = query.buy_side_only {
            url.push_str(if buy { "&type=buy" } else { "&type=sell" });
        }
        url.push_str(&format!("&limit={limit}&skip={}", query.skip));
        get_json("emojicoin", self.client.get(url)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trending_market_deserializes() {
        let raw = r#"{
            "market_id": 413,
            "market_address": "0xmarket",
            "symbol_emojis": ["🐕"],
            "in_bonding_curve": true,
            "daily_volume_quote": 12000.0,
            "usd_price": 0.0021,
            "quote_price": 0.00045,
            "quote_price_delta_24h": 12.4,
            "instantaneous_stats": {
                "circulating_supply": 4.5e9,
                "total_value_locked": 9000.0,
                "fully_diluted_value": 21000.0,
                "market_cap_usd": 9450.0
            }
        }"#;
        let market: TrendingMarket = serde_json::from_str(raw).unwrap();
        assert_eq!(market.market_id, Some(413));
        assert_eq!(
            market.instantaneous_stats.unwrap().market_cap_usd,
            Some(9450.0)
        );
    }

    #[test]
    fn trade_side_maps_from_type_field() {
        let raw = r#"{
            "trade_id": "123:4",
            "price": "0.00045",
            "base_volume": "100000",
            "target_volume": "45",
            "trade_timestamp": "1714000000",
            "type": "buy"
        }"#;
        let trade: MarketTrade = serde_json::from_str(raw).unwrap();
        assert_eq!(trade.side.as_deref(), Some("buy"));
    }
}
