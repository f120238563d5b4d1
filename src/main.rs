use std::sync::Arc;

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use tokio::sync::Mutex;
use tracing::info;
use tracing_subscriber::EnvFilter;

use aptoscan_backend::api::{self, AppState};
use aptoscan_backend::cache::RedisCache;
use aptoscan_backend::config::Config;
use aptoscan_backend::database::{migrations, CoinRepository};
use aptoscan_backend::orchestrator::RefreshOrchestrator;
use aptoscan_backend::providers::{
    CoinGeckoProvider, CoinListSource, CoinMarketCapProvider, DexScreenerProvider,
    EmojiCoinProvider, ExchangeRateProvider, GeckoTerminalProvider, HippoProvider, PairSource,
    PanoraProvider, PumpLaunchProvider, REQUEST_TIMEOUT,
};
use aptoscan_backend::registry::SnapshotStore;
use aptoscan_backend::scheduler::RefreshScheduler;
use aptoscan_backend::services::{
    LaunchFeedService, NativePriceService, TokenChartService, TrendingService,
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::from_env();
    info!(bind = %config.bind_address, "starting");

    let pool = PgPoolOptions::new()
        .max_connections(config.max_db_connections)
        .connect(&config.database_url)
        .await?;
    migrations::run(&pool).await?;

    let cache = RedisCache::connect(&config.redis_url)?;

    let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
    let panora = Arc::new(PanoraProvider::new(http.clone()));
    let hippo = Arc::new(HippoProvider::new(http.clone()));
    let pump = Arc::new(PumpLaunchProvider::new(http.clone()));
    let dexscreener = Arc::new(DexScreenerProvider::new(http.clone()));
    let coingecko = Arc::new(CoinGeckoProvider::new(
        http.clone(),
        config.coingecko_api_key.clone(),
    ));
    let coinmarketcap = Arc::new(CoinMarketCapProvider::new(
        http.clone(),
        config.coinmarketcap_api_key.clone(),
    ));
    let emojicoin = Arc::new(EmojiCoinProvider::new(http.clone()));
    let geckoterminal = Arc::new(GeckoTerminalProvider::new(http.clone()));
    let exchange_rate = config
        .exchange_rate_api_key
        .clone()
        .map(|key| Arc::new(ExchangeRateProvider::new(http, key)));

    let list_sources: Vec<Arc<dyn CoinListSource>> =
        vec![panora, hippo, Arc::clone(&pump) as Arc<dyn CoinListSource>];
    let pair_source: Arc<dyn PairSource> = dexscreener;

    let snapshot = Arc::new(Mutex::new(SnapshotStore::new()));
    let orchestrator = Arc::new(RefreshOrchestrator::new(
        list_sources,
        pair_source,
        Arc::clone(&coingecko),
        Arc::clone(&coinmarketcap),
        Arc::clone(&pump),
        exchange_rate,
        CoinRepository::new(pool.clone()),
        Arc::clone(&snapshot),
    ));

    RefreshScheduler::new(Arc::clone(&orchestrator)).start().await;

    let state = AppState {
        snapshot,
        native_price: Arc::new(NativePriceService::new(
            coingecko,
            coinmarketcap,
            cache.clone(),
        )),
        launch_feed: Arc::new(LaunchFeedService::new(
            pump,
            CoinRepository::new(pool),
            cache.clone(),
        )),
        trending: Arc::new(TrendingService::new(emojicoin, cache.clone())),
        token_chart: Arc::new(TokenChartService::new(geckoterminal, cache)),
    };
    let app = api::router(state);

    info!("listening on {}", config.bind_address);
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
