//! Volume-weighted average price across providers, for an instant (spec §4.B).

use crate::domain::types::{AggregatedProviderTickers, CurrencyPair, CurrencyPairDec};
use rust_decimal::Decimal;
use std::collections::HashMap;

/// `price[B] = Σ(p·v) / Σv` across all providers reporting pair `B`.
/// A pair whose total volume is zero is omitted from the output. Volumes
/// below `volume_floor` are clamped up to it so a zero-volume ticker still
/// contributes to the weighted sum.
pub fn vwap(providers: &AggregatedProviderTickers, volume_floor: Decimal) -> CurrencyPairDec {
    let mut weighted_sum: HashMap<CurrencyPair, Decimal> = HashMap::new();
    let mut volume_sum: HashMap<CurrencyPair, Decimal> = HashMap::new();

    for tickers in providers.values() {
        for (pair, ticker) in tickers {
            let volume = if ticker.volume < volume_floor {
                volume_floor
            } else {
                ticker.volume
            };

            *weighted_sum.entry(pair.clone()).or_insert(Decimal::ZERO) += ticker.price * volume;
            *volume_sum.entry(pair.clone()).or_insert(Decimal::ZERO) += volume;
        }
    }

    volume_sum
        .into_iter()
        .filter_map(|(pair, total_volume)| {
            if total_volume == Decimal::ZERO {
                return None;
            }
            let total_weighted = weighted_sum.get(&pair).copied().unwrap_or(Decimal::ZERO);
            Some((pair, total_weighted / total_volume))
        })
        .collect()
}
