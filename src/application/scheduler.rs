//! Outer tick loop (spec §4.G): height -> refresh params -> SetPrices -> vote
//! -> sleep one second, cancellable via `ctrl_c`.

use crate::application::aggregator::Aggregator;
use crate::application::param_refresh::ParamCacheService;
use crate::application::price_store::PriceStore;
use crate::application::voter::VoteCoordinator;
use crate::domain::oracle_params::CurrencyPairProviders;
use crate::domain::ports::ChainClient;
use crate::domain::types::CurrencyPair;
use crate::infrastructure::observability::Metrics;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

const TICK_INTERVAL: Duration = Duration::from_secs(1);

pub struct Scheduler {
    chain: Arc<dyn ChainClient>,
    params: Arc<ParamCacheService>,
    aggregator: Arc<Aggregator>,
    store: Arc<PriceStore>,
    voter: Arc<VoteCoordinator>,
    metrics: Arc<Metrics>,
}

impl Scheduler {
    pub fn new(
        chain: Arc<dyn ChainClient>,
        params: Arc<ParamCacheService>,
        aggregator: Arc<Aggregator>,
        store: Arc<PriceStore>,
        voter: Arc<VoteCoordinator>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            chain,
            params,
            aggregator,
            store,
            voter,
            metrics,
        }
    }

    /// Runs the tick loop until `ctrl_c` is received.
    pub async fn run(self: Arc<Self>) {
        let mut interval = tokio::time::interval(TICK_INTERVAL);
        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("Scheduler: shutdown signal received");
                    return;
                }
                _ = interval.tick() => {
                    if let Err(e) = self.run_tick().await {
                        warn!("Scheduler: tick failed: {e}");
                    }
                }
            }
        }
    }

    async fn run_tick(&self) -> anyhow::Result<()> {
        let started = std::time::Instant::now();
        let height = self.chain.get_chain_height().await?;

        let outcome = self.params.refresh_if_needed(height).await?;
        let Some(params) = outcome.params.or(self.params.current_params().await) else {
            warn!("Scheduler: no oracle params available yet, skipping tick");
            return Ok(());
        };

        let required_pairs = required_pairs_from(&params.currency_pair_providers);
        let now_ms = chrono::Utc::now().timestamp_millis();

        let computed = self
            .aggregator
            .set_prices(&required_pairs, &params.deviation_thresholds, now_ms)
            .await?;

        self.store.publish(
            computed.prices.clone(),
            computed.tvwap_by_provider,
            computed.vwap_by_provider,
            now_ms,
        );

        if let Err(e) = self
            .voter
            .tick(height, params.vote_period, &computed.prices)
            .await
        {
            warn!("Scheduler: vote tick aborted: {e}");
        }

        self.metrics
            .observe_tick_duration("full_tick", started.elapsed().as_secs_f64());
        let age = (height - self.params.last_updated_block().await).max(0);
        self.metrics.set_param_cache_age(age as f64);

        Ok(())
    }
}

fn required_pairs_from(providers: &[CurrencyPairProviders]) -> Vec<CurrencyPair> {
    providers
        .iter()
        .map(|p| CurrencyPair::new(&p.base, &p.quote))
        .collect()
}
