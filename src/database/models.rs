use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::decimal;

/// Canonical coin entity. `coin_id` is the fungible-asset address when the
/// asset has one, otherwise the legacy coin type; it never changes once
/// assigned, aliases are only ever back-filled.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Coin {
    pub coin_id: String,
    pub coin_type_legacy: Option<String>,
    pub coin_address_fungible: Option<String>,
    pub coin_name: Option<String>,
    pub coin_symbol: Option<String>,
    pub coin_display_symbol: Option<String>,
    pub coin_decimals: Option<i32>,
    pub coin_description: Option<String>,
    pub coin_logo_url: Option<String>,
    pub coingecko_id: Option<String>,
    pub coinmarketcap_id: Option<String>,
    pub graduated: Option<bool>,
    pub bonding_curve_progress: Option<Decimal>,
}

/// Social/external links, independently nullable and merged additively.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CoinLinks {
    pub coin_id: String,
    pub website: Option<String>,
    pub twitter: Option<String>,
    pub telegram: Option<String>,
    pub discord: Option<String>,
    pub github: Option<String>,
    pub medium: Option<String>,
    pub reddit: Option<String>,
    pub whitepaper: Option<String>,
}

/// Reputation signals per coin.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CoinScore {
    pub coin_id: String,
    pub score: Option<Decimal>,
    pub is_banned_panora: Option<bool>,
    pub is_permissioned_hippo: Option<bool>,
    pub coin_market_cap_rank: Option<i32>,
}

/// One row per liquidity pool a coin trades in. Uniqueness is on `pair_id`;
/// a coin can have zero to many rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CoinDexMetrics {
    pub coin_id: String,
    pub pair_id: String,
    pub dex: Option<String>,
    pub base_token: Option<String>,
    pub quote_token: Option<String>,
    pub pair_created_at: Option<DateTime<Utc>>,

    pub transactions_m5_buys: Option<i64>,
    pub transactions_m5_sells: Option<i64>,
    pub transactions_h1_buys: Option<i64>,
    pub transactions_h1_sells: Option<i64>,
    pub transactions_h6_buys: Option<i64>,
    pub transactions_h6_sells: Option<i64>,
    pub transactions_h24_buys: Option<i64>,
    pub transactions_h24_sells: Option<i64>,

    pub volume_usd_5m: Option<Decimal>,
    pub volume_usd_1h: Option<Decimal>,
    pub volume_usd_6h: Option<Decimal>,
    pub volume_usd_24h: Option<Decimal>,

    pub price_change_5m: Option<Decimal>,
    pub price_change_1h: Option<Decimal>,
    pub price_change_6h: Option<Decimal>,
    pub price_change_24h: Option<Decimal>,

    pub liquidity_usd: Option<Decimal>,
    pub liquidity_base: Option<Decimal>,
    pub liquidity_quote: Option<Decimal>,
    pub fdv_usd: Option<Decimal>,
}

/// Aggregated market record per coin; produced by the aggregator and the
/// oracle cycles, never hand-authored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CoinMetrics {
    pub coin_id: String,
    pub price_usd: Option<Decimal>,
    pub circulating_supply: Option<Decimal>,
    pub total_supply: Option<Decimal>,
    pub max_supply: Option<Decimal>,
    pub infinite_supply: Option<bool>,
    pub holders: Option<i64>,
    pub self_reported_market_cap: Option<Decimal>,
    pub self_reported_circulating_supply: Option<Decimal>,

    pub price_change_5m: Option<Decimal>,
    pub price_change_1h: Option<Decimal>,
    pub price_change_6h: Option<Decimal>,
    pub price_change_24h: Option<Decimal>,
    pub price_change_7d: Option<Decimal>,
    pub price_change_30d: Option<Decimal>,

    pub volume_5m: Option<Decimal>,
    pub volume_1h: Option<Decimal>,
    pub volume_6h: Option<Decimal>,
    pub volume_24h: Option<Decimal>,
    pub volume_7d: Option<Decimal>,
    pub volume_30d: Option<Decimal>,
    pub volume_change_24h: Option<Decimal>,

    pub market_cap: Option<Decimal>,
    pub fully_diluted_market_cap: Option<Decimal>,
    pub market_cap_by_total_supply: Option<Decimal>,
    pub tvl: Option<Decimal>,
    pub raw_charts: Option<serde_json::Value>,
}

/// Fiat exchange rate against USD, one row per ISO currency code.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CurrencyPrice {
    pub currency_id: String,
    pub country: Option<String>,
    pub base_currency: Option<String>,
    pub price: Option<Decimal>,
}

/// Bonding-curve launch platform token. Reserve figures are kept as decimals
/// because they are scaled integers well past u64.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct LaunchToken {
    pub addr: String,
    pub nsfw: Option<bool>,
    pub img: Option<String>,
    pub name: Option<String>,
    pub ticker: Option<String>,
    pub description: Option<String>,
    pub twitter: Option<String>,
    pub telegram: Option<String>,
    pub website: Option<String>,
    pub virtual_aptos_reserves: Option<Decimal>,
    pub virtual_token_reserves: Option<Decimal>,
    pub initial_token_reserves: Option<Decimal>,
    pub rep_count: Option<i64>,
    pub tx_count: Option<i64>,
    pub created_by: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub tx_at: Option<DateTime<Utc>>,
    pub legend_at: Option<DateTime<Utc>>,
    pub legend_tx: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub completed_tx: Option<String>,
    pub lp_addr: Option<String>,
    pub user_addr: Option<String>,
    pub user_name: Option<String>,
    pub market_cap: Option<Decimal>,
}

impl LaunchToken {
    /// A token has graduated once its curve completed or an LP exists.
    pub fn graduated(&self) -> bool {
        self.completed_at.is_some() || self.completed_tx.is_some() || self.lp_addr.is_some()
    }

    /// Percentage of the initial token reserve sold off the curve.
    pub fn curve_progress(&self) -> Option<Decimal> {
        let initial = self.initial_token_reserves?;
        let remaining = self.virtual_token_reserves?;
        decimal::bonding_progress(initial, remaining)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn launch_token_graduation() {
        let mut token = LaunchToken {
            addr: "0xabc::meme::MEME".to_string(),
            ..Default::default()
        };
        assert!(!token.graduated());

        token.lp_addr = Some("0xdef".to_string());
        assert!(token.graduated());
    }

    #[test]
    fn launch_token_curve_progress() {
        let token = LaunchToken {
            addr: "0xabc::meme::MEME".to_string(),
            initial_token_reserves: Some(dec!(80000000000000000)),
            virtual_token_reserves: Some(dec!(20000000000000000)),
            ..Default::default()
        };
        assert_eq!(token.curve_progress(), Some(dec!(75)));

        let unstarted = LaunchToken::default();
        assert_eq!(unstarted.curve_progress(), None);
    }
}
