//! Per-tick fan-out, assembly, and three-stage price computation (spec §4.C).

use crate::domain::errors::AggregationError;
use crate::domain::ports::PriceProvider;
use crate::domain::types::{
    AggregatedProviderCandles, AggregatedProviderTickers, CurrencyPair, CurrencyPairDec,
    CurrencyPairDecByProvider,
};
use crate::infrastructure::core::circuit_breaker::{CircuitBreaker, CircuitBreakerError};
use crate::infrastructure::observability::Metrics;
use crate::kernel::{convert, filter, tvwap, vwap};
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{error, warn};

const CIRCUIT_FAILURE_THRESHOLD: usize = 5;
const CIRCUIT_SUCCESS_THRESHOLD: usize = 2;
const CIRCUIT_RESET_TIMEOUT: Duration = Duration::from_secs(30);

/// A named provider adapter plus the pairs the aggregator should ask it for.
/// Wrapped in its own [`CircuitBreaker`] so a provider that fails repeatedly
/// stops being hammered every tick instead of timing out on each one.
pub struct ConfiguredProvider {
    pub name: String,
    pub adapter: Arc<dyn PriceProvider>,
    pub circuit_breaker: Arc<CircuitBreaker>,
}

impl ConfiguredProvider {
    pub fn new(name: impl Into<String>, adapter: Arc<dyn PriceProvider>) -> Self {
        let name = name.into();
        let circuit_breaker = Arc::new(CircuitBreaker::new(
            name.clone(),
            CIRCUIT_FAILURE_THRESHOLD,
            CIRCUIT_SUCCESS_THRESHOLD,
            CIRCUIT_RESET_TIMEOUT,
        ));
        Self {
            name,
            adapter,
            circuit_breaker,
        }
    }
}

/// Orchestrates one aggregation tick across every configured provider.
pub struct Aggregator {
    providers: Vec<ConfiguredProvider>,
    provider_timeout: Duration,
    metrics: Arc<Metrics>,
    /// Compile-time fixed bridge pairs the feeder is prepared to resolve via
    /// stablecoin/bridge rates before the final accept-list pass (spec §4.C Stage A).
    supported_conversion_pairs: Vec<CurrencyPair>,
}

/// Compile-time fixed bridge pairs the feeder always resolves alongside the
/// accept-list: major stablecoins and ATOM quoted in USD (spec §4.C Stage A).
pub fn default_supported_conversion_pairs() -> Vec<CurrencyPair> {
    vec![
        CurrencyPair::new("USDC", "USD"),
        CurrencyPair::new("USDT", "USD"),
        CurrencyPair::new("ATOM", "USD"),
    ]
}

/// Output of one [`Aggregator::set_prices`] invocation, ready to publish.
pub struct ComputedPrices {
    pub prices: CurrencyPairDec,
    pub tvwap_by_provider: CurrencyPairDecByProvider,
    pub vwap_by_provider: CurrencyPairDecByProvider,
}

impl Aggregator {
    pub fn new(
        providers: Vec<ConfiguredProvider>,
        provider_timeout: Duration,
        metrics: Arc<Metrics>,
        supported_conversion_pairs: Vec<CurrencyPair>,
    ) -> Self {
        Self {
            providers,
            provider_timeout,
            metrics,
            supported_conversion_pairs,
        }
    }

    /// `SetPrices`: fan out to every provider, assemble, run the three-stage
    /// computation, and return the result for the caller to publish.
    pub async fn set_prices(
        &self,
        required_pairs: &[CurrencyPair],
        deviation_thresholds: &HashMap<String, Decimal>,
        now_ms: i64,
    ) -> Result<ComputedPrices, AggregationError> {
        let all_pairs: Vec<CurrencyPair> = self
            .supported_conversion_pairs
            .iter()
            .chain(required_pairs.iter())
            .cloned()
            .collect();

        let (tickers, candles) = self.fan_out_and_assemble(&all_pairs).await;

        // Stage A: stable-coin/bridge rates.
        let conversion_rates = self.calc_currency_pair_rates(
            &self.supported_conversion_pairs,
            &tickers,
            &candles,
            deviation_thresholds,
            now_ms,
        )?;

        // Stage B: rewrite every provider's raw series into USD-quoted pairs.
        let usd_rates = convert::convert_rates_to_usd(&conversion_rates);
        let usd_candles = convert::convert_aggregated_candles(&candles, &usd_rates);
        let usd_tickers = convert::convert_aggregated_tickers(&tickers, &usd_rates);

        // Stage C: final prices over the accept-list, on the USD-rewritten series.
        let usd_required: Vec<CurrencyPair> = required_pairs.iter().map(|p| p.to_usd()).collect();
        let final_prices = self.calc_currency_pair_rates(
            &usd_required,
            &usd_tickers,
            &usd_candles,
            deviation_thresholds,
            now_ms,
        )?;

        for pair in &usd_required {
            if !final_prices.contains_key(pair) {
                warn!(
                    "Aggregator: required pair {} missing from computed output",
                    pair.symbol()
                );
            }
        }

        let tvwap_by_provider = self.per_provider_tvwap(&usd_candles, now_ms);
        let vwap_by_provider = self.per_provider_vwap(&usd_tickers);

        Ok(ComputedPrices {
            prices: final_prices,
            tvwap_by_provider,
            vwap_by_provider,
        })
    }

    /// Stage 1-2: time-bounded parallel fan-out, assembled under a single
    /// shared mutex. A timed-out or errored provider contributes nothing to
    /// this tick; its peers are unaffected.
    async fn fan_out_and_assemble(
        &self,
        pairs: &[CurrencyPair],
    ) -> (AggregatedProviderTickers, AggregatedProviderCandles) {
        let tickers = Arc::new(Mutex::new(AggregatedProviderTickers::new()));
        let candles = Arc::new(Mutex::new(AggregatedProviderCandles::new()));

        let mut tasks = Vec::with_capacity(self.providers.len());
        for provider in &self.providers {
            let name = provider.name.clone();
            let adapter = provider.adapter.clone();
            let breaker = provider.circuit_breaker.clone();
            let pairs = pairs.to_vec();
            let timeout = self.provider_timeout;
            let tickers = tickers.clone();
            let candles = candles.clone();
            let metrics = self.metrics.clone();

            tasks.push(tokio::spawn(async move {
                let result = breaker
                    .call(async {
                        tokio::time::timeout(timeout, async {
                            let ticker_map = adapter.get_ticker_prices(&pairs).await?;
                            let candle_map = adapter.get_candle_prices(&pairs).await?;
                            anyhow::Ok((ticker_map, candle_map))
                        })
                        .await
                        .unwrap_or_else(|_| {
                            Err(anyhow::anyhow!("provider {name} timed out after {timeout:?}"))
                        })
                    })
                    .await;

                match result {
                    Ok((ticker_map, candle_map)) => {
                        if !ticker_map.is_empty() {
                            let mut guard = tickers.lock().unwrap_or_else(|p| p.into_inner());
                            guard.insert(name.clone(), ticker_map);
                        }
                        if !candle_map.is_empty() {
                            let mut guard = candles.lock().unwrap_or_else(|p| p.into_inner());
                            guard.insert(name, candle_map);
                        }
                    }
                    Err(CircuitBreakerError::Open(msg)) => {
                        warn!("Aggregator: provider {name} circuit open: {msg}");
                        metrics.inc_provider_error(&name);
                    }
                    Err(CircuitBreakerError::Inner(e)) => {
                        if e.to_string().contains("timed out") {
                            warn!("Aggregator: provider {name} timed out: {e}");
                            metrics.inc_provider_timeout(&name);
                        } else {
                            warn!("Aggregator: provider {name} call failed: {e}");
                            metrics.inc_provider_error(&name);
                        }
                    }
                }
            }));
        }

        for task in tasks {
            if let Err(e) = task.await {
                error!("Aggregator: provider task panicked: {e}");
            }
        }

        let tickers = Arc::try_unwrap(tickers)
            .map(|m| m.into_inner().unwrap_or_else(|p| p.into_inner()))
            .unwrap_or_default();
        let candles = Arc::try_unwrap(candles)
            .map(|m| m.into_inner().unwrap_or_else(|p| p.into_inner()))
            .unwrap_or_default();

        (tickers, candles)
    }

    /// `CalcCurrencyPairRates`: candles win, tickers fill gaps (spec §9 Open
    /// Question, resolved in that order).
    fn calc_currency_pair_rates(
        &self,
        pairs: &[CurrencyPair],
        tickers: &AggregatedProviderTickers,
        candles: &AggregatedProviderCandles,
        thresholds: &HashMap<String, Decimal>,
        now_ms: i64,
    ) -> Result<CurrencyPairDec, AggregationError> {
        let wanted: HashSet<&CurrencyPair> = pairs.iter().collect();

        let scoped_candles = scope_candles(candles, &wanted);
        let (filtered_candles, candle_rejections) =
            filter::filter_candle_deviations(&scoped_candles, thresholds, now_ms)?;
        for rejection in &candle_rejections {
            self.metrics.inc_deviation_rejection(&rejection.pair.base);
        }
        let candle_rates = tvwap::tvwap(&filtered_candles, now_ms)?;

        let remaining: HashSet<&CurrencyPair> = wanted
            .into_iter()
            .filter(|p| !candle_rates.contains_key(*p))
            .collect();
        let scoped_tickers = scope_tickers(tickers, &remaining);
        let (filtered_tickers, ticker_rejections) =
            filter::filter_ticker_deviations(&scoped_tickers, thresholds)?;
        for rejection in &ticker_rejections {
            self.metrics.inc_deviation_rejection(&rejection.pair.base);
        }
        let ticker_rates = vwap::vwap(&filtered_tickers, crate::kernel::vwap_volume_floor());

        let mut merged = candle_rates;
        for (pair, rate) in ticker_rates {
            merged.entry(pair).or_insert(rate);
        }
        Ok(merged)
    }

    fn per_provider_tvwap(
        &self,
        candles: &AggregatedProviderCandles,
        now_ms: i64,
    ) -> CurrencyPairDecByProvider {
        let mut result = CurrencyPairDecByProvider::new();
        for (provider, candles_by_pair) in candles {
            let mut single = AggregatedProviderCandles::new();
            single.insert(provider.clone(), candles_by_pair.clone());
            if let Ok(rates) = tvwap::tvwap(&single, now_ms) {
                result.insert(provider.clone(), rates);
            }
        }
        result
    }

    fn per_provider_vwap(&self, tickers: &AggregatedProviderTickers) -> CurrencyPairDecByProvider {
        let mut result = CurrencyPairDecByProvider::new();
        for (provider, tickers_by_pair) in tickers {
            let mut single = AggregatedProviderTickers::new();
            single.insert(provider.clone(), tickers_by_pair.clone());
            result.insert(provider.clone(), vwap::vwap(&single, crate::kernel::vwap_volume_floor()));
        }
        result
    }
}

fn scope_candles(
    candles: &AggregatedProviderCandles,
    wanted: &HashSet<&CurrencyPair>,
) -> AggregatedProviderCandles {
    candles
        .iter()
        .map(|(provider, pairs)| {
            let scoped = pairs
                .iter()
                .filter(|(pair, _)| wanted.contains(pair))
                .map(|(pair, candles)| (pair.clone(), candles.clone()))
                .collect();
            (provider.clone(), scoped)
        })
        .collect()
}

fn scope_tickers(
    tickers: &AggregatedProviderTickers,
    wanted: &HashSet<&CurrencyPair>,
) -> AggregatedProviderTickers {
    tickers
        .iter()
        .map(|(provider, pairs)| {
            let scoped = pairs
                .iter()
                .filter(|(pair, _)| wanted.contains(pair))
                .map(|(pair, ticker)| (pair.clone(), *ticker))
                .collect();
            (provider.clone(), scoped)
        })
        .collect()
}
