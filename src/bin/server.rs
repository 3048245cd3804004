//! Oracle feeder server.
//!
//! Runs the tick scheduler (height -> refresh params -> `SetPrices` -> publish
//! -> vote) alongside the read-only HTTP API, until `Ctrl+C` is received.
//!
//! # Usage
//! ```sh
//! PROVIDER_ENDPOINTS='[{"name":"binance","rest":"https://api.binance.com","websocket":"wss://stream.binance.com:9443"}]' \
//!     oraclefeeder
//! ```
//!
//! With no `PROVIDER_ENDPOINTS` configured, the feeder runs against an
//! in-process [`MockProvider`] seeded with a handful of prices, so the read
//! API has something to serve out of the box.

use anyhow::Result;
use oraclefeeder::application::aggregator::{default_supported_conversion_pairs, Aggregator, ConfiguredProvider};
use oraclefeeder::application::param_refresh::ParamCacheService;
use oraclefeeder::application::price_store::PriceStore;
use oraclefeeder::application::scheduler::Scheduler;
use oraclefeeder::application::voter::VoteCoordinator;
use oraclefeeder::config::Config;
use oraclefeeder::domain::oracle_params::{CurrencyPairProviders, OracleParams};
use oraclefeeder::domain::ports::PriceProvider;
use oraclefeeder::domain::types::{CandlePrice, CurrencyPair, TickerPrice};
use oraclefeeder::infrastructure::chain::MockChainClient;
use oraclefeeder::infrastructure::observability::Metrics;
use oraclefeeder::infrastructure::providers::{BinanceProvider, MockProvider};
use oraclefeeder::interfaces::{router, AppState};
use rust_decimal_macros::dec;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;

/// Default chain governance parameter seeded into the mock chain client.
/// Real deployments fetch this from `get_oracle_params`; there is no real
/// chain backing here, so a representative default stands in.
const DEFAULT_VOTE_PERIOD: u64 = 5;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with_target(false)
        .init();

    info!("oraclefeeder {} starting", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;
    let metrics = Arc::new(Metrics::new()?);

    let (providers, currency_pair_providers) = build_providers(&config, &metrics);
    for provider in &providers {
        let pairs: Vec<CurrencyPair> = currency_pair_providers
            .iter()
            .filter(|p| p.providers.contains(&provider.name))
            .map(|p| CurrencyPair::new(&p.base, &p.quote))
            .collect();
        provider.adapter.start_connections().await?;
        provider.adapter.subscribe_currency_pairs(&pairs).await?;
    }

    let accept_list: HashSet<String> = currency_pair_providers.iter().map(|p| p.base.clone()).collect();
    let initial_params = OracleParams {
        vote_period: DEFAULT_VOTE_PERIOD,
        accept_list,
        currency_pair_providers,
        deviation_thresholds: config.deviation_thresholds.as_map(),
    };
    let chain = Arc::new(MockChainClient::new(1, initial_params));

    let param_cache = Arc::new(ParamCacheService::new(chain.clone()));
    tokio::spawn(param_cache.clone().run_event_listener());

    let aggregator = Arc::new(Aggregator::new(
        providers,
        config.provider_timeout,
        metrics.clone(),
        default_supported_conversion_pairs(),
    ));
    let store = Arc::new(PriceStore::new());
    let voter = Arc::new(VoteCoordinator::new(
        chain.clone(),
        config.account.validator.clone(),
        metrics.clone(),
    ));
    let scheduler = Arc::new(Scheduler::new(
        chain.clone(),
        param_cache,
        aggregator,
        store.clone(),
        voter,
        metrics.clone(),
    ));

    let scheduler_handle = tokio::spawn(scheduler.run());

    if config.observability.enabled {
        let app_state = AppState {
            store,
            metrics,
            liveness_window_ms: 2 * config.provider_timeout.as_millis() as i64,
        };
        let addr = format!("{}:{}", config.observability.bind_address, config.observability.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        info!("HTTP read API listening on {addr}");

        let server = axum::serve(listener, router(app_state)).with_graceful_shutdown(shutdown_signal());
        tokio::select! {
            result = server => {
                if let Err(e) = result {
                    warn!("HTTP server exited with error: {e}");
                }
            }
            _ = scheduler_handle => {
                info!("Scheduler exited");
            }
        }
    } else {
        info!("Observability HTTP API disabled (OBSERVABILITY_ENABLED=false)");
        scheduler_handle.await?;
    }

    info!("oraclefeeder shut down");
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

/// Builds one [`ConfiguredProvider`] per `PROVIDER_ENDPOINTS` entry and the
/// `CurrencyPairProviders` list describing which provider backs which pair.
/// Only `binance` has a real adapter; any other configured name falls back to
/// an unseeded [`MockProvider`] under that name. With no endpoints configured
/// at all, a single seeded `mock` provider stands in so the read API has data.
fn build_providers(
    config: &Config,
    metrics: &Arc<Metrics>,
) -> (Vec<ConfiguredProvider>, Vec<CurrencyPairProviders>) {
    if config.provider_endpoints.is_empty() {
        let mock = Arc::new(seeded_mock_provider());
        let providers = vec![ConfiguredProvider::new("mock", mock)];
        let currency_pair_providers = vec![CurrencyPairProviders {
            base: "ATOM".to_string(),
            quote: "USD".to_string(),
            providers: vec!["mock".to_string()],
            pair_addresses: vec![],
        }];
        return (providers, currency_pair_providers);
    }

    let mut providers = Vec::with_capacity(config.provider_endpoints.len());
    let mut currency_pair_providers = Vec::new();

    for endpoint in &config.provider_endpoints {
        let adapter: Arc<dyn PriceProvider> = if endpoint.name == "binance" {
            Arc::new(BinanceProvider::new(
                endpoint.rest.to_string(),
                endpoint.websocket.to_string(),
                metrics.clone(),
            ))
        } else {
            warn!(
                "no dedicated adapter for provider {:?}; running it as an unseeded mock",
                endpoint.name
            );
            Arc::new(MockProvider::new())
        };
        providers.push(ConfiguredProvider::new(endpoint.name.clone(), adapter));
        currency_pair_providers.push(CurrencyPairProviders {
            base: "ATOM".to_string(),
            quote: "USD".to_string(),
            providers: vec![endpoint.name.clone()],
            pair_addresses: vec![],
        });
    }

    (providers, currency_pair_providers)
}

fn seeded_mock_provider() -> MockProvider {
    let provider = MockProvider::new();
    let now_ms = 1_700_000_000_000;
    provider.publish_ticker(
        CurrencyPair::new("ATOM", "USD"),
        TickerPrice { price: dec!(10.0), volume: dec!(1000) },
    );
    provider.publish_candle(
        CurrencyPair::new("ATOM", "USD"),
        CandlePrice { price: dec!(10.0), volume: dec!(1000), timestamp: now_ms },
    );
    provider
}
