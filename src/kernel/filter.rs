//! Outlier rejection by standard deviation (spec §4.B).

use crate::domain::errors::KernelError;
use crate::domain::types::{
    AggregatedProviderCandles, AggregatedProviderTickers, CurrencyPair, TickerPrice,
};
use crate::kernel::stats::{is_between, standard_deviation};
use crate::kernel::tvwap::{tvwap, WINDOW_MS};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;

/// Default deviation multiplier `T` when a base has no configured threshold.
pub const DEFAULT_DEVIATION_THRESHOLD: Decimal = dec!(1.0);

/// One rejected sample, for the caller to forward to telemetry.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviationRejection {
    pub provider: String,
    pub pair: CurrencyPair,
    pub sample: Decimal,
    pub mean: Decimal,
    pub deviation: Decimal,
}

fn threshold_for(base: &str, thresholds: &HashMap<String, Decimal>) -> Decimal {
    thresholds.get(base).copied().unwrap_or(DEFAULT_DEVIATION_THRESHOLD)
}

/// Accepts a provider's ticker sample iff its deviation is unknown (fewer
/// than 3 samples for that pair) or it falls within `mean +/- (sigma * T)`.
pub fn filter_ticker_deviations(
    providers: &AggregatedProviderTickers,
    thresholds: &HashMap<String, Decimal>,
) -> Result<(AggregatedProviderTickers, Vec<DeviationRejection>), KernelError> {
    let stats = standard_deviation(providers)?;
    let mut rejections = Vec::new();
    let mut filtered = AggregatedProviderTickers::new();

    for (provider_name, tickers) in providers {
        let mut kept = HashMap::new();
        for (pair, ticker) in tickers {
            let accepted = match stats.get(pair) {
                None => true,
                Some((deviation, mean)) => {
                    let margin = *deviation * threshold_for(&pair.base, thresholds);
                    if is_between(ticker.price, *mean, margin) {
                        true
                    } else {
                        rejections.push(DeviationRejection {
                            provider: provider_name.clone(),
                            pair: pair.clone(),
                            sample: ticker.price,
                            mean: *mean,
                            deviation: *deviation,
                        });
                        false
                    }
                }
            };

            if accepted {
                kept.insert(pair.clone(), *ticker);
            }
        }
        filtered.insert(provider_name.clone(), kept);
    }

    Ok((filtered, rejections))
}

/// The candle twin of [`filter_ticker_deviations`]: each provider's candle
/// series is first reduced to a per-provider TVWAP scalar, the same
/// deviation test runs on those scalars, and the *original* candle series
/// of accepted providers is returned unmodified.
pub fn filter_candle_deviations(
    providers: &AggregatedProviderCandles,
    thresholds: &HashMap<String, Decimal>,
    now_ms: i64,
) -> Result<(AggregatedProviderCandles, Vec<DeviationRejection>), KernelError> {
    let mut per_provider_tvwap = AggregatedProviderTickers::new();

    for (provider_name, candles_by_pair) in providers {
        let mut single_provider_candles = AggregatedProviderCandles::new();
        single_provider_candles.insert(provider_name.clone(), candles_by_pair.clone());

        let scalars = tvwap(&single_provider_candles, now_ms)?;
        let tickers: HashMap<CurrencyPair, TickerPrice> = scalars
            .into_iter()
            .map(|(pair, price)| (pair, TickerPrice { price, volume: Decimal::ONE }))
            .collect();
        per_provider_tvwap.insert(provider_name.clone(), tickers);
    }

    let (accepted_scalars, rejections) = filter_ticker_deviations(&per_provider_tvwap, thresholds)?;

    let mut filtered = AggregatedProviderCandles::new();
    for (provider_name, candles_by_pair) in providers {
        let accepted_pairs = accepted_scalars.get(provider_name);
        let mut kept = HashMap::new();
        for (pair, candles) in candles_by_pair {
            let pair_has_candle_in_window = candles
                .iter()
                .any(|c| c.timestamp > now_ms - WINDOW_MS && c.timestamp <= now_ms);
            let accepted = accepted_pairs
                .map(|pairs| pairs.contains_key(pair))
                .unwrap_or(false);
            if accepted && pair_has_candle_in_window {
                kept.insert(pair.clone(), candles.clone());
            }
        }
        filtered.insert(provider_name.clone(), kept);
    }

    Ok((filtered, rejections))
}
