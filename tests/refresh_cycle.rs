//! Refresh cycle behavior against mocked providers: one failing token
//! list must not block the others, and pair lookups must land in the
//! snapshot as aggregated market data. The database is unreachable in
//! these tests, so persistence is expected to fail after the snapshot
//! has been updated; the assertions target the snapshot.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use tokio::sync::Mutex;

use aptoscan_backend::database::CoinRepository;
use aptoscan_backend::orchestrator::RefreshOrchestrator;
use aptoscan_backend::providers::dexscreener::{DexPair, PairToken, PairWindows};
use aptoscan_backend::providers::{
    CoinGeckoProvider, CoinListSource, CoinMarketCapProvider, PairSource, ProviderError,
    PumpLaunchProvider,
};
use aptoscan_backend::registry::{CoinListRecord, SnapshotStore};

struct StaticListSource {
    name: &'static str,
    records: Vec<CoinListRecord>,
}

#[async_trait]
impl CoinListSource for StaticListSource {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn fetch_records(&self) -> Result<Vec<CoinListRecord>, ProviderError> {
        Ok(self.records.clone())
    }
}

struct FailingListSource;

#[async_trait]
impl CoinListSource for FailingListSource {
    fn name(&self) -> &'static str {
        "broken"
    }

    async fn fetch_records(&self) -> Result<Vec<CoinListRecord>, ProviderError> {
        Err(ProviderError::Api {
            provider: "broken",
            detail: "upstream rejected the request".to_string(),
        })
    }
}

struct StaticPairSource {
    pairs: Vec<DexPair>,
}

#[async_trait]
impl PairSource for StaticPairSource {
    fn name(&self) -> &'static str {
        "static-pairs"
    }

    async fn fetch_pairs(&self, address: &str) -> Result<Vec<DexPair>, ProviderError> {
        Ok(self
            .pairs
            .iter()
            .filter(|p| p.base_token.address == address || p.quote_token.address == address)
            .cloned()
            .collect())
    }
}

fn record(source: &'static str, fungible: &str) -> CoinListRecord {
    CoinListRecord {
        source,
        fungible_address: Some(fungible.to_string()),
        ..CoinListRecord::default()
    }
}

/// Pool pointing at a port nothing listens on; queries fail fast.
fn unreachable_pool() -> sqlx::PgPool {
    let options: PgConnectOptions = "postgres://nobody@127.0.0.1:1/nowhere"
        .parse()
        .expect("static url");
    PgPoolOptions::new()
        .acquire_timeout(Duration::from_millis(200))
        .connect_lazy_with(options)
}

fn orchestrator(
    list_sources: Vec<Arc<dyn CoinListSource>>,
    pair_source: Arc<dyn PairSource>,
) -> RefreshOrchestrator {
    let http = reqwest::Client::new();
    RefreshOrchestrator::new(
        list_sources,
        pair_source,
        Arc::new(CoinGeckoProvider::new(http.clone(), None)),
        Arc::new(CoinMarketCapProvider::new(http.clone(), None)),
        Arc::new(PumpLaunchProvider::new(http)),
        None,
        CoinRepository::new(unreachable_pool()),
        Arc::new(Mutex::new(SnapshotStore::new())),
    )
}

#[tokio::test]
async fn one_failing_source_does_not_block_the_others() {
    let mut panora = record("panora", "0xfa1");
    panora.name = Some("Doge".to_string());
    let mut hippo = record("hippo", "0xfa1");
    hippo.decimals = Some(8);
    let other = record("hippo", "0xfa2");

    let sources: Vec<Arc<dyn CoinListSource>> = vec![
        Arc::new(StaticListSource {
            name: "panora",
            records: vec![panora],
        }),
        Arc::new(FailingListSource),
        Arc::new(StaticListSource {
            name: "hippo",
            records: vec![hippo, other],
        }),
    ];
    let orchestrator = orchestrator(sources, Arc::new(StaticPairSource { pairs: vec![] }));

    // persistence fails (no database behind the pool), the merge must
    // already have happened by then
    let result = orchestrator.refresh_coin_list().await;
    assert!(result.is_err());

    let snapshot = orchestrator.snapshot();
    let snapshot = snapshot.lock().await;
    assert_eq!(snapshot.coin_count(), 2);
    let coin = snapshot.get_coin("0xfa1").expect("merged coin");
    assert_eq!(coin.coin_name.as_deref(), Some("Doge"));
    assert_eq!(coin.coin_decimals, Some(8));
}

#[tokio::test]
async fn pair_lookups_aggregate_into_the_snapshot() {
    let sources: Vec<Arc<dyn CoinListSource>> = vec![Arc::new(StaticListSource {
        name: "panora",
        records: vec![record("panora", "0xfa1")],
    })];

    let mut pool_a = DexPair {
        pair_address: "0xpool1".to_string(),
        base_token: PairToken {
            address: "0xfa1".to_string(),
            name: None,
            symbol: None,
        },
        quote_token: PairToken {
            address: "0xapt".to_string(),
            name: None,
            symbol: None,
        },
        ..DexPair::default()
    };
    pool_a.price_usd = Some(1.00);
    pool_a.volume = Some(PairWindows {
        h24: Some(500.0),
        ..PairWindows::default()
    });
    let mut pool_b = pool_a.clone();
    pool_b.pair_address = "0xpool2".to_string();
    pool_b.price_usd = Some(1.02);
    let mut pool_c = pool_a.clone();
    pool_c.pair_address = "0xpool3".to_string();
    pool_c.price_usd = Some(0.98);

    let orchestrator = orchestrator(
        sources,
        Arc::new(StaticPairSource {
            pairs: vec![pool_a, pool_b, pool_c],
        }),
    );
    let _ = orchestrator.refresh_coin_list().await;
    let _ = orchestrator.refresh_dex_metrics().await;

    let snapshot = orchestrator.snapshot();
    let snapshot = snapshot.lock().await;
    let pairs = snapshot.get_dex_metrics("0xfa1").expect("pair rows");
    assert_eq!(pairs.len(), 3);

    let metrics = snapshot.get_metrics("0xfa1").expect("metrics");
    assert_eq!(
        metrics.price_usd,
        Some(rust_decimal_macros::dec!(1.00))
    );
    assert_eq!(metrics.volume_24h, Some(rust_decimal_macros::dec!(1500)));
}
