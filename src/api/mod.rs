use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{delete, get};
use axum::Router;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tracing::error;

use crate::database::models::{Coin, CoinDexMetrics, CoinLinks, CoinMetrics, CoinScore};
use crate::providers::emojicoin::TradeQuery;
use crate::providers::geckoterminal::Timeframe;
use crate::registry::SnapshotStore;
use crate::services::token_chart::ChartQuery;
use crate::services::{
    LaunchFeedService, NativePriceService, TokenChartService, TrendingService,
};

#[derive(Clone)]
pub struct AppState {
    pub snapshot: Arc<Mutex<SnapshotStore>>,
    pub native_price: Arc<NativePriceService>,
    pub launch_feed: Arc<LaunchFeedService>,
    pub trending: Arc<TrendingService>,
    pub token_chart: Arc<TokenChartService>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/coins", get(list_coins))
        .route("/coins/:coin_id", get(get_coin))
        .route("/token-charts/:addr", get(token_chart))
        .route("/token-charts/:addr/cache", delete(invalidate_token_chart))
        .route("/apt/price", get(native_price).delete(invalidate_native_price))
        .route("/launchpad/legend", get(legend).delete(invalidate_legend))
        .route("/launchpad/tokens", get(launch_tokens))
        .route("/launchpad/:addr/holders", get(holders))
        .route("/launchpad/:addr/chats", get(chats))
        .route("/launchpad/:addr/chart", get(chart))
        .route("/launchpad/:addr/cache", delete(invalidate_launch_coin))
        .route("/emojicoin/trending", get(trending).delete(invalidate_trending))
        .route("/emojicoin/tickers", get(tickers))
        .route("/emojicoin/trades/:market", get(trades).delete(invalidate_trades))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct CacheParams {
    #[serde(default, rename = "skipCache")]
    skip_cache: bool,
}

#[derive(Debug, Deserialize)]
struct PageParams {
    page: Option<i64>,
    #[serde(rename = "pageSize")]
    page_size: Option<i64>,
}

#[derive(Debug, Serialize)]
struct CoinView {
    #[serde(flatten)]
    coin: Coin,
    links: Option<CoinLinks>,
    score: Option<CoinScore>,
    metrics: Option<CoinMetrics>,
}

#[derive(Debug, Serialize)]
struct CoinDetail {
    #[serde(flatten)]
    view: CoinView,
    pairs: Vec<CoinDexMetrics>,
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn list_coins(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> Json<Value> {
    let page = params.page.unwrap_or(1).max(1);
    let page_size = params.page_size.unwrap_or(50).clamp(1, 200);

    let snapshot = state.snapshot.lock().await;
    let mut ids = snapshot.coin_ids();
    ids.sort();
    let total = ids.len();
    let start = (page - 1).saturating_mul(page_size).min(total as i64) as usize;
    let views: Vec<CoinView> = ids
        .into_iter()
        .skip(start)
        .take(page_size as usize)
        .filter_map(|id| {
            snapshot.get_coin(&id).map(|coin| CoinView {
                coin: coin.clone(),
                links: snapshot.get_links(&id).cloned(),
                score: snapshot.get_score(&id).cloned(),
                metrics: snapshot.get_metrics(&id).cloned(),
            })
        })
        .collect();

    Json(json!({
        "coins": views,
        "total": total,
        "page": page,
        "pageSize": page_size,
    }))
}

async fn get_coin(
    State(state): State<AppState>,
    Path(coin_id): Path<String>,
) -> Result<Json<CoinDetail>, (StatusCode, Json<Value>)> {
    let snapshot = state.snapshot.lock().await;
    // accept either address form
    let resolved = snapshot
        .resolve_alias(&coin_id)
        .cloned()
        .unwrap_or(coin_id);
    let Some(coin) = snapshot.get_coin(&resolved) else {
        return Err((
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "coin not found" })),
        ));
    };
    Ok(Json(CoinDetail {
        view: CoinView {
            coin: coin.clone(),
            links: snapshot.get_links(&resolved).cloned(),
            score: snapshot.get_score(&resolved).cloned(),
            metrics: snapshot.get_metrics(&resolved).cloned(),
        },
        pairs: snapshot
            .get_dex_metrics(&resolved)
            .cloned()
            .unwrap_or_default(),
    }))
}

#[derive(Debug, Deserialize)]
struct ChartParams {
    timeframe: Option<String>,
    limit: Option<usize>,
    #[serde(rename = "startTime")]
    start_time: Option<i64>,
    #[serde(rename = "endTime")]
    end_time: Option<i64>,
    #[serde(default, rename = "skipCache")]
    skip_cache: bool,
}

async fn token_chart(
    State(state): State<AppState>,
    Path(addr): Path<String>,
    Query(params): Query<ChartParams>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let timeframe = match params.timeframe.as_deref() {
        None => Timeframe::default(),
        Some(raw) => Timeframe::parse(raw).ok_or((
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "timeframe must be one of: day, hour, minute" })),
        ))?,
    };
    let query = ChartQuery {
        timeframe,
        limit: params.limit,
        start_time: params.start_time,
        end_time: params.end_time,
    };
    let chart = state.token_chart.chart(&addr, query, params.skip_cache).await;
    Ok(Json(
        serde_json::to_value(chart).unwrap_or_else(|_| json!({ "error": "serialization failed" })),
    ))
}

async fn invalidate_token_chart(
    State(state): State<AppState>,
    Path(addr): Path<String>,
) -> Json<Value> {
    match state.token_chart.invalidate(&addr).await {
        Ok(removed) => Json(json!({ "success": true, "removed": removed })),
        Err(e) => Json(json!({ "success": false, "error": e.to_string() })),
    }
}

async fn native_price(
    State(state): State<AppState>,
    Query(params): Query<CacheParams>,
) -> Json<Value> {
    let price = state.native_price.get_price(params.skip_cache).await;
    Json(serde_json::to_value(price).unwrap_or_else(|_| json!({ "error": "serialization failed" })))
}

async fn invalidate_native_price(State(state): State<AppState>) -> Json<Value> {
    match state.native_price.invalidate().await {
        Ok(removed) => Json(json!({ "success": true, "removed": removed })),
        Err(e) => {
            error!(error = %e, "native price cache invalidation failed");
            Json(json!({ "success": false, "error": e.to_string() }))
        }
    }
}

async fn legend(State(state): State<AppState>, Query(params): Query<CacheParams>) -> Json<Value> {
    let legend = state.launch_feed.legend(params.skip_cache).await;
    Json(serde_json::to_value(legend).unwrap_or_else(|_| json!({ "error": "serialization failed" })))
}

async fn invalidate_legend(State(state): State<AppState>) -> Json<Value> {
    match state.launch_feed.invalidate_legend().await {
        Ok(removed) => Json(json!({ "success": true, "removed": removed })),
        Err(e) => Json(json!({ "success": false, "error": e.to_string() })),
    }
}

async fn launch_tokens(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> Json<Value> {
    let list = state
        .launch_feed
        .list(params.page.unwrap_or(1), params.page_size.unwrap_or(45))
        .await;
    Json(serde_json::to_value(list).unwrap_or_else(|_| json!({ "error": "serialization failed" })))
}

#[derive(Debug, Deserialize)]
struct ChatParams {
    page: Option<usize>,
    #[serde(rename = "pageSize")]
    page_size: Option<usize>,
    #[serde(default, rename = "skipCache")]
    skip_cache: bool,
}

async fn holders(
    State(state): State<AppState>,
    Path(addr): Path<String>,
    Query(params): Query<CacheParams>,
) -> Json<Value> {
    let holders = state.launch_feed.holders(&addr, params.skip_cache).await;
    Json(serde_json::to_value(holders).unwrap_or_else(|_| json!({ "error": "serialization failed" })))
}

async fn chats(
    State(state): State<AppState>,
    Path(addr): Path<String>,
    Query(params): Query<ChatParams>,
) -> Json<Value> {
    let chats = state
        .launch_feed
        .chats(
            &addr,
            params.page.unwrap_or(1),
            params.page_size.unwrap_or(20),
            params.skip_cache,
        )
        .await;
    Json(serde_json::to_value(chats).unwrap_or_else(|_| json!({ "error": "serialization failed" })))
}

async fn chart(
    State(state): State<AppState>,
    Path(addr): Path<String>,
    Query(params): Query<CacheParams>,
) -> Json<Value> {
    let chart = state.launch_feed.chart(&addr, params.skip_cache).await;
    Json(serde_json::to_value(chart).unwrap_or_else(|_| json!({ "error": "serialization failed" })))
}

async fn invalidate_launch_coin(
    State(state): State<AppState>,
    Path(addr): Path<String>,
) -> Json<Value> {
    match state.launch_feed.invalidate_coin(&addr).await {
        Ok(removed) => Json(json!({ "success": true, "removed": removed })),
        Err(e) => Json(json!({ "success": false, "error": e.to_string() })),
    }
}

#[derive(Debug, Deserialize)]
struct TrendingParams {
    limit: Option<usize>,
    #[serde(default, rename = "skipCache")]
    skip_cache: bool,
}

async fn trending(
    State(state): State<AppState>,
    Query(params): Query<TrendingParams>,
) -> Json<Value> {
    let trending = state.trending.trending(params.limit, params.skip_cache).await;
    Json(serde_json::to_value(trending).unwrap_or_else(|_| json!({ "error": "serialization failed" })))
}

async fn invalidate_trending(State(state): State<AppState>) -> Json<Value> {
    match state.trending.invalidate_trending().await {
        Ok(removed) => Json(json!({ "success": true, "removed": removed })),
        Err(e) => Json(json!({ "success": false, "error": e.to_string() })),
    }
}

#[derive(Debug, Deserialize)]
struct TickerParams {
    max: Option<usize>,
    #[serde(default, rename = "skipCache")]
    skip_cache: bool,
}

async fn tickers(
    State(state): State<AppState>,
    Query(params): Query<TickerParams>,
) -> Json<Value> {
    let tickers = state.trending.all_tickers(params.max, params.skip_cache).await;
    Json(serde_json::to_value(tickers).unwrap_or_else(|_| json!({ "error": "serialization failed" })))
}

#[derive(Debug, Deserialize)]
struct TradeParams {
    #[serde(rename = "startTime")]
    start_time: Option<i64>,
    #[serde(rename = "endTime")]
    end_time: Option<i64>,
    /// "buy" or "sell"; anything else means both sides.
    #[serde(rename = "type")]
    side: Option<String>,
    limit: Option<usize>,
    skip: Option<usize>,
    #[serde(default, rename = "skipCache")]
    skip_cache: bool,
}

async fn trades(
    State(state): State<AppState>,
    Path(market): Path<String>,
    Query(params): Query<TradeParams>,
) -> Json<Value> {
    let query = TradeQuery {
        start_time: params.start_time,
        end_time: params.end_time,
        buy_side_only: match params.side.as_deref() {
            Some("buy") => Some(true),
            Some("sell") => Some(false),
            _ => None,
        },
        limit: params.limit.unwrap_or(500),
        skip: params.skip.unwrap_or(0),
    };
    let trades = state.trending.trades(&market, query, params.skip_cache).await;
    Json(serde_json::to_value(trades).unwrap_or_else(|_| json!({ "error": "serialization failed" })))
}

async fn invalidate_trades(
    State(state): State<AppState>,
    Path(market): Path<String>,
) -> Json<Value> {
    match state.trending.invalidate_trades(&market).await {
        Ok(removed) => Json(json!({ "success": true, "removed": removed })),
        Err(e) => Json(json!({ "success": false, "error": e.to_string() })),
    }
}
