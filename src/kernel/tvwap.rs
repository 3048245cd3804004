//! Time-and-volume-weighted average price over a sliding window (spec §4.B).

use crate::domain::errors::KernelError;
use crate::domain::types::{AggregatedProviderCandles, CandlePrice, CurrencyPair, CurrencyPairDec};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;

/// Window length: the last 10 minutes, in milliseconds.
pub const WINDOW_MS: i64 = 10 * 60 * 1000;
const MIN_TIME_WEIGHT: Decimal = dec!(0.20);
const MIN_CANDLE_VOLUME: Decimal = dec!(0.0001);

/// Computes TVWAP per base pair from candles within the last 10 minutes
/// ending at `now_ms`. Candles outside `(now_ms - WINDOW_MS, now_ms]` are
/// dropped (clock-skew guard for the future side). Pairs with no candle in
/// the window are omitted from the result.
pub fn tvwap(
    providers: &AggregatedProviderCandles,
    now_ms: i64,
) -> Result<CurrencyPairDec, KernelError> {
    let mut by_pair: HashMap<CurrencyPair, Vec<CandlePrice>> = HashMap::new();
    for candles_by_pair in providers.values() {
        for (pair, candles) in candles_by_pair {
            by_pair.entry(pair.clone()).or_default().extend(candles.iter().copied());
        }
    }

    let mut result = CurrencyPairDec::new();

    for (pair, mut candles) in by_pair {
        candles.sort_by_key(|c| c.timestamp);

        let windowed: Vec<CandlePrice> = candles
            .into_iter()
            .filter(|c| c.timestamp > now_ms - WINDOW_MS && c.timestamp <= now_ms)
            .collect();

        if windowed.is_empty() {
            continue;
        }

        let oldest_timestamp = windowed[0].timestamp;
        let period = now_ms - oldest_timestamp;
        if period == 0 {
            return Err(KernelError::ZeroPeriod { base: pair.base });
        }
        let period_dec = Decimal::from(period);
        let weight_unit = (Decimal::ONE - MIN_TIME_WEIGHT) / period_dec;

        let mut weighted_sum = Decimal::ZERO;
        let mut weight_sum = Decimal::ZERO;

        for candle in windowed {
            let volume = if candle.volume == Decimal::ZERO {
                MIN_CANDLE_VOLUME
            } else {
                candle.volume
            };
            let age = Decimal::from(now_ms - candle.timestamp);
            let w = volume * (weight_unit * (period_dec - age) + MIN_TIME_WEIGHT);
            weighted_sum += candle.price * w;
            weight_sum += w;
        }

        result.insert(pair, weighted_sum / weight_sum);
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn single_provider(pair: CurrencyPair, candles: Vec<CandlePrice>) -> AggregatedProviderCandles {
        let mut inner = HashMap::new();
        inner.insert(pair, candles);
        let mut providers = AggregatedProviderCandles::new();
        providers.insert("binance".to_string(), inner);
        providers
    }

    #[test]
    fn tvwap_two_candles_exact_division() {
        let now = 1_000_000_000i64;
        let pair = CurrencyPair::new("ATOM", "USD");
        let candles = vec![
            CandlePrice {
                price: dec!(10),
                volume: dec!(100),
                timestamp: now - 100_000,
            },
            CandlePrice {
                price: dec!(20),
                volume: dec!(100),
                timestamp: now - 50_000,
            },
        ];

        let result = tvwap(&single_provider(pair.clone(), candles), now).unwrap();
        assert_eq!(*result.get(&pair).unwrap(), dec!(17.5));
    }

    #[test]
    fn tvwap_drops_expired_and_future_candles() {
        let now = 1_000_000_000i64;
        let pair = CurrencyPair::new("ATOM", "USD");
        let candles = vec![
            CandlePrice {
                price: dec!(10),
                volume: dec!(100),
                timestamp: now - WINDOW_MS - 1, // expired, excluded
            },
            CandlePrice {
                price: dec!(20),
                volume: dec!(100),
                timestamp: now + 1, // future, excluded
            },
            CandlePrice {
                price: dec!(30),
                volume: dec!(100),
                timestamp: now - 1_000,
            },
        ];

        let result = tvwap(&single_provider(pair.clone(), candles), now).unwrap();
        // Only the in-window candle survives; its own weight cancels out so price == its price.
        assert_eq!(*result.get(&pair).unwrap(), dec!(30));
    }

    #[test]
    fn tvwap_zero_volume_uses_min_candle_volume() {
        let now = 1_000_000_000i64;
        let pair = CurrencyPair::new("ATOM", "USD");
        let candles = vec![
            CandlePrice {
                price: dec!(10),
                volume: Decimal::ZERO,
                timestamp: now - 100_000,
            },
            CandlePrice {
                price: dec!(20),
                volume: dec!(100),
                timestamp: now - 50_000,
            },
        ];

        // Should not panic/skip despite the zero-volume candle, and the
        // zero-volume sample should barely move the result away from 20.
        let result = tvwap(&single_provider(pair.clone(), candles), now).unwrap();
        let price = *result.get(&pair).unwrap();
        assert!(price > dec!(19.9) && price <= dec!(20));
    }

    #[test]
    fn tvwap_zero_period_errors() {
        let now = 1_000_000_000i64;
        let pair = CurrencyPair::new("ATOM", "USD");
        let candles = vec![CandlePrice {
            price: dec!(10),
            volume: dec!(1),
            timestamp: now,
        }];

        let result = tvwap(&single_provider(pair, candles), now);
        assert!(matches!(result, Err(KernelError::ZeroPeriod { .. })));
    }
}
