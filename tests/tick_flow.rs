//! End-to-end tick flow: mock provider + mock chain client wired through the
//! full `Aggregator` -> `PriceStore` -> `VoteCoordinator` pipeline a single
//! `Scheduler::run_tick` would drive, without the scheduler's own sleep/ctrl_c
//! loop getting in the way.

use oraclefeeder::application::aggregator::{default_supported_conversion_pairs, Aggregator, ConfiguredProvider};
use oraclefeeder::application::param_refresh::ParamCacheService;
use oraclefeeder::application::price_store::PriceStore;
use oraclefeeder::application::voter::VoteCoordinator;
use oraclefeeder::domain::oracle_params::{CurrencyPairProviders, OracleParams};
use oraclefeeder::domain::types::{CandlePrice, CurrencyPair, TickerPrice};
use oraclefeeder::domain::vote::VoteState;
use oraclefeeder::infrastructure::chain::MockChainClient;
use oraclefeeder::infrastructure::observability::Metrics;
use oraclefeeder::infrastructure::providers::MockProvider;
use rust_decimal_macros::dec;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

fn oracle_params() -> OracleParams {
    OracleParams {
        vote_period: 5,
        accept_list: HashSet::from(["ATOM".to_string()]),
        currency_pair_providers: vec![CurrencyPairProviders {
            base: "ATOM".to_string(),
            quote: "USD".to_string(),
            providers: vec!["mock".to_string()],
            pair_addresses: vec![],
        }],
        deviation_thresholds: HashMap::new(),
    }
}

#[tokio::test]
async fn full_tick_publishes_a_price_and_advances_the_vote_state() {
    let mock_provider = Arc::new(MockProvider::new());
    mock_provider.publish_ticker(
        CurrencyPair::new("ATOM", "USD"),
        TickerPrice { price: dec!(10.50), volume: dec!(500) },
    );
    mock_provider.publish_ticker(
        CurrencyPair::new("USDC", "USD"),
        TickerPrice { price: dec!(1.00), volume: dec!(1_000_000) },
    );
    mock_provider.publish_ticker(
        CurrencyPair::new("USDT", "USD"),
        TickerPrice { price: dec!(1.00), volume: dec!(1_000_000) },
    );

    let metrics = Arc::new(Metrics::new().unwrap());
    let providers = vec![ConfiguredProvider::new("mock", mock_provider.clone())];
    let aggregator = Arc::new(Aggregator::new(
        providers,
        std::time::Duration::from_secs(2),
        metrics.clone(),
        default_supported_conversion_pairs(),
    ));

    let chain = Arc::new(MockChainClient::new(10, oracle_params()));
    let param_cache = Arc::new(ParamCacheService::new(chain.clone()));
    let outcome = param_cache.refresh_if_needed(10).await.unwrap();
    assert!(outcome.refreshed);
    let params = outcome.params.unwrap();

    let required_pairs = vec![CurrencyPair::new("ATOM", "USD")];
    let now_ms = 1_700_000_000_000;
    let computed = aggregator
        .set_prices(&required_pairs, &params.deviation_thresholds, now_ms)
        .await
        .unwrap();

    let atom_usd = CurrencyPair::new("ATOM", "USD");
    assert_eq!(*computed.prices.get(&atom_usd).unwrap(), dec!(10.50));

    let store = Arc::new(PriceStore::new());
    store.publish(
        computed.prices.clone(),
        computed.tvwap_by_provider,
        computed.vwap_by_provider,
        now_ms,
    );
    assert_eq!(store.get_prices().get(&atom_usd).copied(), Some(dec!(10.50)));

    let voter = VoteCoordinator::new(chain.clone(), "valoper1abc".to_string(), metrics);
    voter.tick(10, params.vote_period, &computed.prices).await.unwrap();
    assert!(matches!(voter.current_state(), VoteState::Prevoted { .. }));
}

#[tokio::test]
async fn provider_with_no_data_yields_no_prices_without_erroring() {
    let empty_provider = Arc::new(MockProvider::new());
    let metrics = Arc::new(Metrics::new().unwrap());
    let providers = vec![ConfiguredProvider::new("mock", empty_provider)];
    let aggregator = Aggregator::new(
        providers,
        std::time::Duration::from_secs(1),
        metrics,
        default_supported_conversion_pairs(),
    );

    let required_pairs = vec![CurrencyPair::new("ATOM", "USD")];
    let computed = aggregator
        .set_prices(&required_pairs, &HashMap::new(), 1_700_000_000_000)
        .await
        .unwrap();

    assert!(computed.prices.is_empty());
}

#[tokio::test]
async fn param_cache_event_signal_forces_refresh_before_staleness_window() {
    let chain = Arc::new(MockChainClient::new(100, oracle_params()));
    let param_cache = Arc::new(ParamCacheService::new(chain.clone()));
    param_cache.refresh_if_needed(100).await.unwrap();
    assert!(!param_cache.refresh_if_needed(150).await.unwrap().refreshed);

    chain.emit_param_update().await;
    tokio::spawn(param_cache.clone().run_event_listener());
    // give the spawned listener a tick to observe the event
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;

    let outcome = param_cache.refresh_if_needed(150).await.unwrap();
    assert!(outcome.refreshed);
}
