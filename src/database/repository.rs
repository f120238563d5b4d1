use sqlx::{PgPool, QueryBuilder};
use tracing::info;

use super::models::{
    Coin, CoinDexMetrics, CoinLinks, CoinMetrics, CoinScore, CurrencyPrice, LaunchToken,
};

/// Rows per multi-VALUES statement. Keeps bind counts comfortably under
/// postgres' 65535 parameter ceiling on the widest table.
const CHUNK_SIZE: usize = 100;

pub struct CoinRepository {
    pool: PgPool,
}

impl CoinRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Batch upsert of the parent table. Must run before links, scores,
    /// or metrics for the same cycle; those rows reference coin_id.
    pub async fn upsert_coins(&self, coins: &[Coin]) -> Result<(), sqlx::Error> {
        for chunk in coins.chunks(CHUNK_SIZE) {
            let mut builder = QueryBuilder::new(
                "INSERT INTO coins (coin_id, coin_type_legacy, coin_address_fungible, \
                 coin_name, coin_symbol, coin_display_symbol, coin_decimals, \
                 coin_description, coin_logo_url, coingecko_id, coinmarketcap_id, \
                 graduated, bonding_curve_progress) ",
            );
            builder.push_values(chunk, |mut row, coin| {
                row.push_bind(&coin.coin_id)
                    .push_bind(&coin.coin_type_legacy)
                    .push_bind(&coin.coin_address_fungible)
                    .push_bind(&coin.coin_name)
                    .push_bind(&coin.coin_symbol)
                    .push_bind(&coin.coin_display_symbol)
                    .push_bind(coin.coin_decimals)
                    .push_bind(&coin.coin_description)
                    .push_bind(&coin.coin_logo_url)
                    .push_bind(&coin.coingecko_id)
                    .push_bind(&coin.coinmarketcap_id)
                    .push_bind(coin.graduated)
                    .push_bind(coin.bonding_curve_progress);
            });
            builder.push(
                " ON CONFLICT (coin_id) DO UPDATE SET \
                 coin_type_legacy = COALESCE(EXCLUDED.coin_type_legacy, coins.coin_type_legacy), \
                 coin_address_fungible = COALESCE(EXCLUDED.coin_address_fungible, coins.coin_address_fungible), \
                 coin_name = COALESCE(EXCLUDED.coin_name, coins.coin_name), \
                 coin_symbol = COALESCE(EXCLUDED.coin_symbol, coins.coin_symbol), \
                 coin_display_symbol = COALESCE(EXCLUDED.coin_display_symbol, coins.coin_display_symbol), \
                 coin_decimals = COALESCE(EXCLUDED.coin_decimals, coins.coin_decimals), \
                 coin_description = COALESCE(EXCLUDED.coin_description, coins.coin_description), \
                 coin_logo_url = COALESCE(EXCLUDED.coin_logo_url, coins.coin_logo_url), \
                 coingecko_id = COALESCE(EXCLUDED.coingecko_id, coins.coingecko_id), \
                 coinmarketcap_id = COALESCE(EXCLUDED.coinmarketcap_id, coins.coinmarketcap_id), \
                 graduated = COALESCE(EXCLUDED.graduated, coins.graduated), \
                 bonding_curve_progress = COALESCE(EXCLUDED.bonding_curve_progress, coins.bonding_curve_progress), \
                 updated_at = now()",
            );
            builder.build().execute(&self.pool).await?;
        }
        info!(count = coins.len(), "upserted coins");
        Ok(())
    }

    pub async fn upsert_links(&self, links: &[CoinLinks]) -> Result<(), sqlx::Error> {
        for chunk in links.chunks(CHUNK_SIZE) {
            let mut builder = QueryBuilder::new(
                "INSERT INTO coin_links (coin_id, website, twitter, telegram, discord, \
                 github, medium, reddit, whitepaper) ",
            );
            builder.push_values(chunk, |mut row, link| {
                row.push_bind(&link.coin_id)
                    .push_bind(&link.website)
                    .push_bind(&link.twitter)
                    .push_bind(&link.telegram)
                    .push_bind(&link.discord)
                    .push_bind(&link.github)
                    .push_bind(&link.medium)
                    .push_bind(&link.reddit)
                    .push_bind(&link.whitepaper);
            });
            builder.push(
                " ON CONFLICT (coin_id) DO UPDATE SET \
                 website = COALESCE(EXCLUDED.website, coin_links.website), \
                 twitter = COALESCE(EXCLUDED.twitter, coin_links.twitter), \
                 telegram = COALESCE(EXCLUDED.telegram, coin_links.telegram), \
                 discord = COALESCE(EXCLUDED.discord, coin_links.discord), \
                 github = COALESCE(EXCLUDED.github, coin_links.github), \
                 medium = COALESCE(EXCLUDED.medium, coin_links.medium), \
                 reddit = COALESCE(EXCLUDED.reddit, coin_links.reddit), \
                 whitepaper = COALESCE(EXCLUDED.whitepaper, coin_links.whitepaper), \
                 updated_at = now()",
            );
            builder.build().execute(&self.pool).await?;
        }
        Ok(())
    }

    pub async fn upsert_scores(&self, scores: &[CoinScore]) -> Result<(), sqlx::Error> {
        for chunk in scores.chunks(CHUNK_SIZE) {
            let mut builder = QueryBuilder::new(
                "INSERT INTO coin_scores (coin_id, score, is_banned_panora, \
                 is_permissioned_hippo, coin_market_cap_rank) ",
            );
            builder.push_values(chunk, |mut row, score| {
                row.push_bind(&score.coin_id)
                    .push_bind(score.score)
                    .push_bind(score.is_banned_panora)
                    .push_bind(score.is_permissioned_hippo)
                    .push_bind(score.coin_market_cap_rank);
            });
            builder.push(
                " ON CONFLICT (coin_id) DO UPDATE SET \
                 score = COALESCE(EXCLUDED.score, coin_scores.score), \
                 is_banned_panora = COALESCE(EXCLUDED.is_banned_panora, coin_scores.is_banned_panora), \
                 is_permissioned_hippo = COALESCE(EXCLUDED.is_permissioned_hippo, coin_scores.is_permissioned_hippo), \
                 coin_market_cap_rank = COALESCE(EXCLUDED.coin_market_cap_rank, coin_scores.coin_market_cap_rank), \
                 updated_at = now()",
            );
            builder.build().execute(&self.pool).await?;
        }
        Ok(())
    }

    pub async fn upsert_dex_metrics(&self, rows: &[CoinDexMetrics]) -> Result<(), sqlx::Error> {
        for chunk in rows.chunks(CHUNK_SIZE) {
            let mut builder = QueryBuilder::new(
                "INSERT INTO coin_dex_metrics (coin_id, pair_id, dex, base_token, \
                 quote_token, pair_created_at, transactions_m5_buys, transactions_m5_sells, \
                 transactions_h1_buys, transactions_h1_sells, transactions_h6_buys, \
                 transactions_h6_sells, transactions_h24_buys, transactions_h24_sells, \
                 volume_usd_5m, volume_usd_1h, volume_usd_6h, volume_usd_24h, \
                 price_change_5m, price_change_1h, price_change_6h, price_change_24h, \
                 liquidity_usd, liquidity_base, liquidity_quote, fdv_usd) ",
            );
            builder.push_values(chunk, |mut row, m| {
                row.push_bind(&m.coin_id)
                    .push_bind(&m.pair_id)
                    .push_bind(&m.dex)
                    .push_bind(&m.base_token)
                    .push_bind(&m.quote_token)
                    .push_bind(m.pair_created_at)
                    .push_bind(m.transactions_m5_buys)
                    .push_bind(m.transactions_m5_sells)
                    .push_bind(m.transactions_h1_buys)
                    .push_bind(m.transactions_h1_sells)
                    .push_bind(m.transactions_h6_buys)
                    .push_bind(m.transactions_h6_sells)
                    .push_bind(m.transactions_h24_buys)
                    .push_bind(m.transactions_h24_sells)
                    .push_bind(m.volume_usd_5m)
                    .push_bind(m.volume_usd_1h)
                    .push_bind(m.volume_usd_6h)
                    .push_bind(m.volume_usd_24h)
                    .push_bind(m.price_change_5m)
                    .push_bind(m.price_change_1h)
                    .push_bind(m.price_change_6h)
                    .push_bind(m.price_change_24h)
                    .push_bind(m.liquidity_usd)
                    .push_bind(m.liquidity_base)
                    .push_bind(m.liquidity_quote)
                    .push_bind(m.fdv_usd);
            });
            builder.push(
                " ON CONFLICT (coin_id, pair_id) DO UPDATE SET \
                 dex = EXCLUDED.dex, \
                 base_token = EXCLUDED.base_token, \
                 quote_token = EXCLUDED.quote_token, \
                 pair_created_at = EXCLUDED.pair_created_at, \
                 transactions_m5_buys = EXCLUDED.transactions_m5_buys, \
                 transactions_m5_sells = EXCLUDED.transactions_m5_sells, \
                 transactions_h1_buys = EXCLUDED.transactions_h1_buys, \
                 transactions_h1_sells = EXCLUDED.transactions_h1_sells, \
                 transactions_h6_buys = EXCLUDED.transactions_h6_buys, \
                 transactions_h6_sells = EXCLUDED.transactions_h6_sells, \
                 transactions_h24_buys = EXCLUDED.transactions_h24_buys, \
                 transactions_h24_sells = EXCLUDED.transactions_h24_sells, \
                 volume_usd_5m = EXCLUDED.volume_usd_5m, \
                 volume_usd_1h = EXCLUDED.volume_usd_1h, \
                 volume_usd_6h = EXCLUDED.volume_usd_6h, \
                 volume_usd_24h = EXCLUDED.volume_usd_24h, \
                 price_change_5m = EXCLUDED.price_change_5m, \
                 price_change_1h = EXCLUDED.price_change_1h, \
                 price_change_6h = EXCLUDED.price_change_6h, \
                 price_change_24h = EXCLUDED.price_change_24h, \
                 liquidity_usd = EXCLUDED.liquidity_usd, \
                 liquidity_base = EXCLUDED.liquidity_base, \
                 liquidity_quote = EXCLUDED.liquidity_quote, \
                 fdv_usd = EXCLUDED.fdv_usd, \
                 updated_at = now()",
            );
            builder.build().execute(&self.pool).await?;
        }
        Ok(())
    }

    pub async fn upsert_metrics(&self, rows: &[CoinMetrics]) -> Result<(), sqlx::Error> {
        for chunk in rows.chunks(CHUNK_SIZE) {
            let mut builder = QueryBuilder::new(
                "INSERT INTO coin_metrics (coin_id, price_usd, circulating_supply, \
                 total_supply, max_supply, infinite_supply, holders, \
                 self_reported_market_cap, self_reported_circulating_supply, \
                 price_change_5m, price_change_1h, price_change_6h, price_change_24h, \
                 price_change_7d, price_change_30d, volume_5m, volume_1h, volume_6h, \
                 volume_24h, volume_7d, volume_30d, volume_change_24h, market_cap, \
                 fully_diluted_market_cap, market_cap_by_total_supply, tvl, raw_charts) ",
            );
            builder.push_values(chunk, |mut row, m| {
                row.push_bind(&m.coin_id)
                    .push_bind(m.price_usd)
                    .push_bind(m.circulating_supply)
                    .push_bind(m.total_supply)
                    .push_bind(m.max_supply)
                    .push_bind(m.infinite_supply)
                    .push_bind(m.holders)
                    .push_bind(m.self_reported_market_cap)
                    .push_bind(m.self_reported_circulating_supply)
                    .push_bind(m.price_change_5m)
                    .push_bind(m.price_change_1h)
                    .push_bind(m.price_change_6h)
                    .push_bind(m.price_change_24h)
                    .push_bind(m.price_change_7d)
                    .push_bind(m.price_change_30d)
                    .push_bind(m.volume_5m)
                    .push_bind(m.volume_1h)
                    .push_bind(m.volume_6h)
                    .push_bind(m.volume_24h)
                    .push_bind(m.volume_7d)
                    .push_bind(m.volume_30d)
                    .push_bind(m.volume_change_24h)
                    .push_bind(m.market_cap)
                    .push_bind(m.fully_diluted_market_cap)
                    .push_bind(m.market_cap_by_total_supply)
                    .push_bind(m.tvl)
                    .push_bind(&m.raw_charts);
            });
            builder.push(
                " ON CONFLICT (coin_id) DO UPDATE SET \
                 price_usd = COALESCE(EXCLUDED.price_usd, coin_metrics.price_usd), \
                 circulating_supply = COALESCE(EXCLUDED.circulating_supply, coin_metrics.circulating_supply), \
                 total_supply = COALESCE(EXCLUDED.total_supply, coin_metrics.total_supply), \
                 max_supply = COALESCE(EXCLUDED.max_supply, coin_metrics.max_supply), \
                 infinite_supply = COALESCE(EXCLUDED.infinite_supply, coin_metrics.infinite_supply), \
                 holders = COALESCE(EXCLUDED.holders, coin_metrics.holders), \
                 self_reported_market_cap = COALESCE(EXCLUDED.self_reported_market_cap, coin_metrics.self_reported_market_cap), \
                 self_reported_circulating_supply = COALESCE(EXCLUDED.self_reported_circulating_supply, coin_metrics.self_reported_circulating_supply), \
                 price_change_5m = COALESCE(EXCLUDED.price_change_5m, coin_metrics.price_change_5m), \
                 price_change_1h = COALESCE(EXCLUDED.price_change_1h, coin_metrics.price_change_1h), \
                 price_change_6h = COALESCE(EXCLUDED.price_change_6h, coin_metrics.price_change_6h), \
                 price_change_24h = COALESCE(EXCLUDED.price_change_24h, coin_metrics.price_change_24h), \
                 price_change_7d = COALESCE(EXCLUDED.price_change_7d, coin_metrics.price_change_7d), \
                 price_change_30d = COALESCE(EXCLUDED.price_change_30d, coin_metrics.price_change_30d), \
                 volume_5m = COALESCE(EXCLUDED.volume_5m, coin_metrics.volume_5m), \
                 volume_1h = COALESCE(EXCLUDED.volume_1h, coin_metrics.volume_1h), \
                 volume_6h = COALESCE(EXCLUDED.volume_6h, coin_metrics.volume_6h), \
                 volume_24h = COALESCE(EXCLUDED.volume_24h, coin_metrics.volume_24h), \
                 volume_7d = COALESCE(EXCLUDED.volume_7d, coin_metrics.volume_7d), \
                 volume_30d = COALESCE(EXCLUDED.volume_30d, coin_metrics.volume_30d), \
                 volume_change_24h = COALESCE(EXCLUDED.volume_change_24h, coin_metrics.volume_change_24h), \
                 market_cap = COALESCE(EXCLUDED.market_cap, coin_metrics.market_cap), \
                 fully_diluted_market_cap = COALESCE(EXCLUDED.fully_diluted_market_cap, coin_metrics.fully_diluted_market_cap), \
                 market_cap_by_total_supply = COALESCE(EXCLUDED.market_cap_by_total_supply, coin_metrics.market_cap_by_total_supply), \
                 tvl = COALESCE(EXCLUDED.tvl, coin_metrics.tvl), \
                 raw_charts = COALESCE(EXCLUDED.raw_charts, coin_metrics.raw_charts), \
                 updated_at = now()",
            );
            builder.build().execute(&self.pool).await?;
        }
        Ok(())
    }

    pub async fn upsert_launch_tokens(&self, tokens: &[LaunchToken]) -> Result<(), sqlx::Error> {
        for chunk in tokens.chunks(CHUNK_SIZE) {
            let mut builder = QueryBuilder::new(
                "INSERT INTO launch_tokens (addr, nsfw, img, name, ticker, description, \
                 twitter, telegram, website, virtual_aptos_reserves, virtual_token_reserves, \
                 initial_token_reserves, rep_count, tx_count, created_by, created_at, \
                 tx_at, legend_at, legend_tx, completed_at, completed_tx, lp_addr, \
                 user_addr, user_name, market_cap) ",
            );
            builder.push_values(chunk, |mut row, t| {
                row.push_bind(&t.addr)
                    .push_bind(t.nsfw)
                    .push_bind(&t.img)
                    .push_bind(&t.name)
                    .push_bind(&t.ticker)
                    .push_bind(&t.description)
                    .push_bind(&t.twitter)
                    .push_bind(&t.telegram)
                    .push_bind(&t.website)
                    .push_bind(t.virtual_aptos_reserves)
                    .push_bind(t.virtual_token_reserves)
                    .push_bind(t.initial_token_reserves)
                    .push_bind(t.rep_count)
                    .push_bind(t.tx_count)
                    .push_bind(&t.created_by)
                    .push_bind(t.created_at)
                    .push_bind(t.tx_at)
                    .push_bind(t.legend_at)
                    .push_bind(&t.legend_tx)
                    .push_bind(t.completed_at)
                    .push_bind(&t.completed_tx)
                    .push_bind(&t.lp_addr)
                    .push_bind(&t.user_addr)
                    .push_bind(&t.user_name)
                    .push_bind(t.market_cap);
            });
            builder.push(
                " ON CONFLICT (addr) DO UPDATE SET \
                 nsfw = EXCLUDED.nsfw, \
                 img = EXCLUDED.img, \
                 name = EXCLUDED.name, \
                 ticker = EXCLUDED.ticker, \
                 description = EXCLUDED.description, \
                 twitter = EXCLUDED.twitter, \
                 telegram = EXCLUDED.telegram, \
                 website = EXCLUDED.website, \
                 virtual_aptos_reserves = EXCLUDED.virtual_aptos_reserves, \
                 virtual_token_reserves = EXCLUDED.virtual_token_reserves, \
                 initial_token_reserves = EXCLUDED.initial_token_reserves, \
                 rep_count = EXCLUDED.rep_count, \
                 tx_count = EXCLUDED.tx_count, \
                 created_by = EXCLUDED.created_by, \
                 created_at = EXCLUDED.created_at, \
                 tx_at = EXCLUDED.tx_at, \
                 legend_at = EXCLUDED.legend_at, \
                 legend_tx = EXCLUDED.legend_tx, \
                 completed_at = EXCLUDED.completed_at, \
                 completed_tx = EXCLUDED.completed_tx, \
                 lp_addr = EXCLUDED.lp_addr, \
                 user_addr = EXCLUDED.user_addr, \
                 user_name = EXCLUDED.user_name, \
                 market_cap = EXCLUDED.market_cap, \
                 updated_at = now()",
            );
            builder.build().execute(&self.pool).await?;
        }
        info!(count = tokens.len(), "upserted launch tokens");
        Ok(())
    }

    // Snapshot rewarm reads.

    pub async fn get_all_coins(&self) -> Result<Vec<Coin>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM coins").fetch_all(&self.pool).await
    }

    pub async fn get_all_links(&self) -> Result<Vec<CoinLinks>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM coin_links")
            .fetch_all(&self.pool)
            .await
    }

    pub async fn get_all_scores(&self) -> Result<Vec<CoinScore>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM coin_scores")
            .fetch_all(&self.pool)
            .await
    }

    pub async fn get_all_metrics(&self) -> Result<Vec<CoinMetrics>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM coin_metrics")
            .fetch_all(&self.pool)
            .await
    }

    pub async fn upsert_currency_prices(
        &self,
        prices: &[CurrencyPrice],
    ) -> Result<(), sqlx::Error> {
        for chunk in prices.chunks(CHUNK_SIZE) {
            let mut builder = QueryBuilder::new(
                "INSERT INTO currency_prices (currency_id, country, base_currency, price) ",
            );
            builder.push_values(chunk, |mut row, p| {
                row.push_bind(&p.currency_id)
                    .push_bind(&p.country)
                    .push_bind(&p.base_currency)
                    .push_bind(p.price);
            });
            builder.push(
                " ON CONFLICT (currency_id) DO UPDATE SET \
                 price = EXCLUDED.price, \
                 updated_at = now()",
            );
            builder.build().execute(&self.pool).await?;
        }
        info!(count = prices.len(), "upserted currency prices");
        Ok(())
    }

    pub async fn get_launch_tokens_page(
        &self,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<LaunchToken>, sqlx::Error> {
        sqlx::query_as(
            "SELECT * FROM launch_tokens \
             ORDER BY virtual_aptos_reserves DESC NULLS LAST LIMIT $1 OFFSET $2",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
    }

    pub async fn count_launch_tokens(&self) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM launch_tokens")
            .fetch_one(&self.pool)
            .await
    }
}
