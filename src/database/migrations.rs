use sqlx::PgPool;
use tracing::info;

/// Idempotent schema setup, run once at startup. `coins` is the parent
/// table; every other coin table references it, which is why refresh
/// cycles persist coins before anything else.
pub async fn run(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS coins (
            coin_id TEXT PRIMARY KEY,
            coin_type_legacy TEXT,
            coin_address_fungible TEXT,
            coin_name TEXT,
            coin_symbol TEXT,
            coin_display_symbol TEXT,
            coin_decimals INTEGER,
            coin_description TEXT,
            coin_logo_url TEXT,
            coingecko_id TEXT,
            coinmarketcap_id TEXT,
            graduated BOOLEAN,
            bonding_curve_progress NUMERIC,
            updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS coin_links (
            coin_id TEXT PRIMARY KEY REFERENCES coins (coin_id),
            website TEXT,
            twitter TEXT,
            telegram TEXT,
            discord TEXT,
            github TEXT,
            medium TEXT,
            reddit TEXT,
            whitepaper TEXT,
            updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS coin_scores (
            coin_id TEXT PRIMARY KEY REFERENCES coins (coin_id),
            score NUMERIC,
            is_banned_panora BOOLEAN,
            is_permissioned_hippo BOOLEAN,
            coin_market_cap_rank INTEGER,
            updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS coin_dex_metrics (
            coin_id TEXT NOT NULL REFERENCES coins (coin_id),
            pair_id TEXT NOT NULL,
            dex TEXT,
            base_token TEXT,
            quote_token TEXT,
            pair_created_at TIMESTAMPTZ,
            transactions_m5_buys BIGINT,
            transactions_m5_sells BIGINT,
            transactions_h1_buys BIGINT,
            transactions_h1_sells BIGINT,
            transactions_h6_buys BIGINT,
            transactions_h6_sells BIGINT,
            transactions_h24_buys BIGINT,
            transactions_h24_sells BIGINT,
            volume_usd_5m NUMERIC,
            volume_usd_1h NUMERIC,
            volume_usd_6h NUMERIC,
            volume_usd_24h NUMERIC,
            price_change_5m NUMERIC,
            price_change_1h NUMERIC,
            price_change_6h NUMERIC,
            price_change_24h NUMERIC,
            liquidity_usd NUMERIC,
            liquidity_base NUMERIC,
            liquidity_quote NUMERIC,
            fdv_usd NUMERIC,
            updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            PRIMARY KEY (coin_id, pair_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS coin_metrics (
            coin_id TEXT PRIMARY KEY REFERENCES coins (coin_id),
            price_usd NUMERIC,
            circulating_supply NUMERIC,
            total_supply NUMERIC,
            max_supply NUMERIC,
            infinite_supply BOOLEAN,
            holders BIGINT,
            self_reported_market_cap NUMERIC,
            self_reported_circulating_supply NUMERIC,
            price_change_5m NUMERIC,
            price_change_1h NUMERIC,
            price_change_6h NUMERIC,
            price_change_24h NUMERIC,
            price_change_7d NUMERIC,
            price_change_30d NUMERIC,
            volume_5m NUMERIC,
            volume_1h NUMERIC,
            volume_6h NUMERIC,
            volume_24h NUMERIC,
            volume_7d NUMERIC,
            volume_30d NUMERIC,
            volume_change_24h NUMERIC,
            market_cap NUMERIC,
            fully_diluted_market_cap NUMERIC,
            market_cap_by_total_supply NUMERIC,
            tvl NUMERIC,
            raw_charts JSONB,
            updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS launch_tokens (
            addr TEXT PRIMARY KEY,
            nsfw BOOLEAN,
            img TEXT,
            name TEXT,
            ticker TEXT,
            description TEXT,
            twitter TEXT,
            telegram TEXT,
            website TEXT,
            virtual_aptos_reserves NUMERIC,
            virtual_token_reserves NUMERIC,
            initial_token_reserves NUMERIC,
            rep_count BIGINT,
            tx_count BIGINT,
            created_by TEXT,
            created_at TIMESTAMPTZ,
            tx_at TIMESTAMPTZ,
            legend_at TIMESTAMPTZ,
            legend_tx TEXT,
            completed_at TIMESTAMPTZ,
            completed_tx TEXT,
            lp_addr TEXT,
            user_addr TEXT,
            user_name TEXT,
            market_cap NUMERIC,
            updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS currency_prices (
            currency_id TEXT PRIMARY KEY,
            country TEXT,
            base_currency TEXT,
            price NUMERIC,
            updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
    )
    .execute(pool)
    .await?;

    info!("database schema ready");
    Ok(())
}
