//! USD-denomination conversion (spec §4.B): a single bridge hop from a
//! non-USD quote into USD, applied to rates, tickers, and candles alike.

use crate::domain::types::{
    AggregatedProviderCandles, AggregatedProviderTickers, CurrencyPair, CurrencyPairDec,
    TickerPrice,
};

/// For every non-USD-quoted rate `(A, Q)`, emits `(A, USD) = rate(A,Q) *
/// rate(Q,USD)` when `(Q, USD)` is present in the same map. Already
/// USD-quoted rates pass through unchanged. Exactly one hop: a chain of two
/// non-USD hops is not resolved transitively.
pub fn convert_rates_to_usd(rates: &CurrencyPairDec) -> CurrencyPairDec {
    let mut result = CurrencyPairDec::new();

    for (pair, rate) in rates {
        if pair.is_usd_quoted() {
            result.insert(pair.clone(), *rate);
        }
    }

    for (pair, rate) in rates {
        if pair.is_usd_quoted() {
            continue;
        }
        let bridge = CurrencyPair::new(&pair.quote, "USD");
        if let Some(bridge_rate) = rates.get(&bridge) {
            result.insert(pair.to_usd(), *rate * *bridge_rate);
        }
    }

    result
}

/// Rewrites every provider's raw ticker series into USD-quoted pairs, using
/// `rates` as the one-hop bridge. Pairs already USD-quoted pass through
/// unchanged; pairs with no available bridge rate are dropped.
pub fn convert_aggregated_tickers(
    providers: &AggregatedProviderTickers,
    rates: &CurrencyPairDec,
) -> AggregatedProviderTickers {
    let mut result = AggregatedProviderTickers::new();

    for (provider, tickers) in providers {
        let mut converted = std::collections::HashMap::new();
        for (pair, ticker) in tickers {
            if pair.is_usd_quoted() {
                converted.insert(pair.clone(), *ticker);
                continue;
            }
            let bridge = CurrencyPair::new(&pair.quote, "USD");
            if let Some(bridge_rate) = rates.get(&bridge) {
                converted.insert(
                    pair.to_usd(),
                    TickerPrice {
                        price: ticker.price * *bridge_rate,
                        volume: ticker.volume,
                    },
                );
            }
        }
        result.insert(provider.clone(), converted);
    }

    result
}

/// As [`convert_aggregated_tickers`], for candle series.
pub fn convert_aggregated_candles(
    providers: &AggregatedProviderCandles,
    rates: &CurrencyPairDec,
) -> AggregatedProviderCandles {
    let mut result = AggregatedProviderCandles::new();

    for (provider, candles_by_pair) in providers {
        let mut converted = std::collections::HashMap::new();
        for (pair, candles) in candles_by_pair {
            if pair.is_usd_quoted() {
                converted.insert(pair.clone(), candles.clone());
                continue;
            }
            let bridge = CurrencyPair::new(&pair.quote, "USD");
            if let Some(bridge_rate) = rates.get(&bridge) {
                let rewritten = candles
                    .iter()
                    .map(|c| crate::domain::types::CandlePrice {
                        price: c.price * *bridge_rate,
                        volume: c.volume,
                        timestamp: c.timestamp,
                    })
                    .collect();
                converted.insert(pair.to_usd(), rewritten);
            }
        }
        result.insert(provider.clone(), converted);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn usd_conversion_chain_drops_unbridged_pair() {
        let mut rates = CurrencyPairDec::new();
        rates.insert(CurrencyPair::new("ATOM", "USD"), dec!(10));
        rates.insert(CurrencyPair::new("OSMO", "ATOM"), dec!(3));
        rates.insert(CurrencyPair::new("JUNO", "ATOM"), dec!(20));
        rates.insert(CurrencyPair::new("LTC", "USDT"), dec!(20));

        let converted = convert_rates_to_usd(&rates);

        assert_eq!(converted.len(), 3);
        assert_eq!(*converted.get(&CurrencyPair::new("ATOM", "USD")).unwrap(), dec!(10));
        assert_eq!(*converted.get(&CurrencyPair::new("OSMO", "USD")).unwrap(), dec!(30));
        assert_eq!(*converted.get(&CurrencyPair::new("JUNO", "USD")).unwrap(), dec!(200));
        assert!(converted.get(&CurrencyPair::new("LTC", "USD")).is_none());
    }

    #[test]
    fn usd_conversion_is_idempotent_on_fully_usd_input() {
        let mut rates = CurrencyPairDec::new();
        rates.insert(CurrencyPair::new("ATOM", "USD"), dec!(10));
        rates.insert(CurrencyPair::new("OSMO", "USD"), dec!(30));

        let once = convert_rates_to_usd(&rates);
        let twice = convert_rates_to_usd(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn convert_aggregated_tickers_rewrites_and_drops() {
        let mut providers = AggregatedProviderTickers::new();
        let mut inner = std::collections::HashMap::new();
        inner.insert(CurrencyPair::new("OSMO", "ATOM"), TickerPrice { price: dec!(3), volume: dec!(1) });
        inner.insert(CurrencyPair::new("LTC", "USDT"), TickerPrice { price: dec!(20), volume: dec!(1) });
        providers.insert("binance".to_string(), inner);

        let mut rates = CurrencyPairDec::new();
        rates.insert(CurrencyPair::new("ATOM", "USD"), dec!(10));

        let converted = convert_aggregated_tickers(&providers, &rates);
        let binance = &converted["binance"];
        assert_eq!(binance[&CurrencyPair::new("OSMO", "USD")].price, dec!(30));
        assert!(!binance.contains_key(&CurrencyPair::new("LTC", "USD")));
    }
}
