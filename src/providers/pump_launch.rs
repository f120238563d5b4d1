use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::database::models::LaunchToken;
use crate::decimal;
use crate::providers::{get_json, CoinListSource, ProviderError};
use crate::registry::{classify_address, CoinListRecord};

const BASE_URL: &str = "https://pump.uptos.xyz";
const PAGE_SIZE: usize = 45;

/// Bonding-curve launch platform. Feeds both the coin universe (every
/// launched token is a coin) and the launchpad read endpoints.
pub struct PumpLaunchProvider {
    client: Client,
}

/// The list endpoint returns a bare two-element array: the page of
/// tokens, then the total count across all pages.
#[derive(Debug, Deserialize)]
struct TokenPage(Vec<PumpToken>, u64);

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PumpToken {
    pub addr: String,
    pub nsfw: Option<bool>,
    pub img: Option<String>,
    pub name: Option<String>,
    pub ticker: Option<String>,
    pub description: Option<String>,
    pub twitter: Option<String>,
    pub telegram: Option<String>,
    pub website: Option<String>,
    /// Raw u64-in-a-string reserve amounts, larger than f64 can hold
    /// exactly.
    pub virtual_aptos_reserves: Option<String>,
    pub virtual_token_reserves: Option<String>,
    pub initial_token_reserves: Option<String>,
    #[serde(rename = "repC")]
    pub rep_count: Option<i64>,
    #[serde(rename = "txC")]
    pub tx_count: Option<i64>,
    pub created_by: Option<String>,
    pub created_at: Option<String>,
    pub tx_at: Option<String>,
    pub legend_at: Option<String>,
    pub legend_tx: Option<String>,
    pub completed_at: Option<String>,
    pub completed_tx: Option<String>,
    pub lp_addr: Option<String>,
    pub user_addr: Option<String>,
    pub user_name: Option<String>,
    #[serde(rename = "mCap")]
    pub market_cap: Option<f64>,
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenHolder {
    pub token_addr: String,
    pub holder_addr: String,
    pub holder_name: Option<String>,
    /// Formatted like "91.71%".
    pub percentage: String,
    pub is_dev: bool,
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadItem {
    pub id: i64,
    pub img: Option<String>,
    pub content: String,
    pub created_by: String,
    pub reply_to: Option<i64>,
    pub token_addr: String,
    pub created_at: String,
    #[serde(rename = "likeC")]
    pub like_count: i64,
    pub user_name: Option<String>,
    pub user_img: Option<String>,
    pub is_dev: bool,
}

#[derive(Debug, Deserialize)]
struct ThreadPage(Vec<ThreadItem>, u64);

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
pub struct ChartPoint {
    pub date: Option<String>,
    pub low: Option<f64>,
    pub high: Option<f64>,
    pub open: Option<f64>,
    pub close: Option<f64>,
    #[serde(rename = "buyC")]
    pub buy_count: Option<i64>,
    #[serde(rename = "sellC")]
    pub sell_count: Option<i64>,
}

fn parse_time(value: &Option<String>) -> Option<DateTime<Utc>> {
    value
        .as_deref()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc))
}

impl PumpToken {
    pub fn into_launch_token(self) -> LaunchToken {
        LaunchToken {
            created_at: parse_time(&self.created_at),
            tx_at: parse_time(&self.tx_at),
            legend_at: parse_time(&self.legend_at),
            completed_at: parse_time(&self.completed_at),
            virtual_aptos_reserves: self
                .virtual_aptos_reserves
                .as_deref()
                .and_then(decimal::parse_str),
            virtual_token_reserves: self
                .virtual_token_reserves
                .as_deref()
                .and_then(decimal::parse_str),
            initial_token_reserves: self
                .initial_token_reserves
                .as_deref()
                .and_then(decimal::parse_str),
            market_cap: self.market_cap.and_then(decimal::from_f64),
            addr: self.addr,
            nsfw: self.nsfw,
            img: self.img,
            name: self.name,
            ticker: self.ticker,
            description: self.description,
            twitter: self.twitter,
            telegram: self.telegram,
            website: self.website,
            rep_count: self.rep_count,
            tx_count: self.tx_count,
            created_by: self.created_by,
            legend_tx: self.legend_tx,
            completed_tx: self.completed_tx,
            lp_addr: self.lp_addr,
            user_addr: self.user_addr,
            user_name: self.user_name,
        }
    }
}

/// The listing is paginated over live data ordered by reserves, so a
/// token that moves between requests can show up on two pages. Keep the
/// first occurrence; a repeated addr inside one upsert chunk would make
/// the whole statement fail.
fn dedup_by_addr(tokens: Vec<LaunchToken>) -> Vec<LaunchToken> {
    let mut seen = std::collections::HashSet::new();
    tokens
        .into_iter()
        .filter(|t| seen.insert(t.addr.clone()))
        .collect()
}

impl PumpLaunchProvider {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn list_url(page: usize) -> String {
        format!(
            "{BASE_URL}/token/api?page={page}&pageSize={PAGE_SIZE}\
             &keyword=&orderField=virtual_aptos_reserves&orderBy=desc"
        )
    }

    /// Walk the paginated list until the total the first page reported is
    /// covered.
    pub async fn fetch_all_tokens(&self) -> Result<Vec<LaunchToken>, ProviderError> {
        let first: TokenPage = get_json("pump", self.client.get(Self::list_url(1))).await?;
        let total = first.1 as usize;
        let total_pages = total.div_ceil(PAGE_SIZE);
        let mut tokens = first.0;

        for page in 2..=total_pages {
            debug!(page, total_pages, "fetching launch token page");
            let next: TokenPage = get_json("pump", self.client.get(Self::list_url(page))).await?;
            if next.0.is_empty() {
                break;
            }
            tokens.extend(next.0);
        }

        Ok(dedup_by_addr(
            tokens.into_iter().map(PumpToken::into_launch_token).collect(),
        ))
    }

    /// The currently featured "legend" token.
    pub async fn legend(&self) -> Result<LaunchToken, ProviderError> {
        let url = format!("{BASE_URL}/token/api/legend");
        let token: PumpToken = get_json("pump", self.client.get(url)).await?;
        Ok(token.into_launch_token())
    }

    pub async fn holders(&self, addr: &str) -> Result<Vec<TokenHolder>, ProviderError> {
        let url = format!("{BASE_URL}/token/{addr}/api/holders");
        get_json("pump", self.client.get(url)).await
    }

    pub async fn threads(
        &self,
        addr: &str,
        page: usize,
        page_size: usize,
    ) -> Result<(Vec<ThreadItem>, u64), ProviderError> {
        let url = format!("{BASE_URL}/token/{addr}/api/thread?page={page}&pageSize={page_size}");
        let page: ThreadPage = get_json("pump", self.client.get(url)).await?;
        Ok((page.0, page.1))
    }

    pub async fn chart(&self, addr: &str) -> Result<Vec<ChartPoint>, ProviderError> {
        let url = format!("{BASE_URL}/token/{addr}/api/chart");
        get_json("pump", self.client.get(url)).await
    }
}

#[async_trait]
impl CoinListSource for PumpLaunchProvider {
    fn name(&self) -> &'static str {
        "pump"
    }

    async fn fetch_records(&self) -> Result<Vec<CoinListRecord>, ProviderError> {
        let tokens = self.fetch_all_tokens().await?;
        Ok(tokens.into_iter().map(launch_record).collect())
    }
}

/// Launched tokens address under either scheme: older ones by coin type,
/// newer ones by fungible-asset object address.
fn launch_record(token: LaunchToken) -> CoinListRecord {
    let graduated = token.graduated();
    let progress = token.curve_progress();
    let (legacy_address, fungible_address) = classify_address(&token.addr);
    CoinListRecord {
        source: "pump",
        legacy_address,
        fungible_address,
        name: token.name,
        symbol: token.ticker,
        description: token.description,
        logo_url: token.img,
        website: token.website.filter(|u| !u.is_empty()),
        twitter: token.twitter.filter(|u| !u.is_empty()),
        telegram: token.telegram.filter(|u| !u.is_empty()),
        graduated: Some(graduated),
        bonding_curve_progress: progress,
        ..CoinListRecord::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn token_page_is_a_bare_tuple() {
        let raw = r#"[
            [{ "addr": "0xfa1", "ticker": "DOGE", "mCap": 42000.5,
               "virtualAptosReserves": "300000000000",
               "virtualTokenReserves": "20000000000000000",
               "initialTokenReserves": "80000000000000000",
               "createdAt": "2025-04-01T12:00:00.000Z" }],
            91
        ]"#;
        let page: TokenPage = serde_json::from_str(raw).unwrap();
        assert_eq!(page.1, 91);
        let token = page.0.into_iter().next().unwrap().into_launch_token();
        assert_eq!(token.curve_progress(), Some(dec!(75)));
        assert!(!token.graduated());
        assert!(token.created_at.is_some());
    }

    #[test]
    fn launch_records_classify_the_address_scheme() {
        let legacy = launch_record(LaunchToken {
            addr: "0xabc::meme::MEME".to_string(),
            ..LaunchToken::default()
        });
        assert_eq!(legacy.legacy_address.as_deref(), Some("0xabc::meme::MEME"));
        assert_eq!(legacy.fungible_address, None);

        let fungible = launch_record(LaunchToken {
            addr: "0xfa1".to_string(),
            ..LaunchToken::default()
        });
        assert_eq!(fungible.legacy_address, None);
        assert_eq!(fungible.fungible_address.as_deref(), Some("0xfa1"));
    }

    #[test]
    fn page_overlap_keeps_one_row_per_addr() {
        let token = |addr: &str, reps: i64| LaunchToken {
            addr: addr.to_string(),
            rep_count: Some(reps),
            ..LaunchToken::default()
        };
        // 0xfa1 slid down the ordering and came back on the next page
        let tokens = vec![token("0xfa1", 10), token("0xfa2", 5), token("0xfa1", 11)];
        let deduped = dedup_by_addr(tokens);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].addr, "0xfa1");
        assert_eq!(deduped[0].rep_count, Some(10));
        assert_eq!(deduped[1].addr, "0xfa2");
    }

    #[test]
    fn thread_page_splits_items_and_count() {
        let raw = r#"[
            [{ "id": 7, "content": "gm", "createdBy": "0xdev", "replyTo": null,
               "tokenAddr": "0xfa1", "createdAt": "2025-04-01T12:00:00.000Z",
               "likeC": 3, "userName": "dev", "userImg": null, "isDev": true,
               "img": null }],
            1
        ]"#;
        let page: ThreadPage = serde_json::from_str(raw).unwrap();
        assert_eq!(page.1, 1);
        assert!(page.0[0].is_dev);
    }
}
