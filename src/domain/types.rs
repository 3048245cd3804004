//! Core price-feeder data model: currency pairs, ticker/candle samples, and
//! the two-level provider maps the aggregator assembles each tick.

use rust_decimal::Decimal;
use std::collections::HashMap;

/// Identifies a tradeable instrument by base/quote symbol.
///
/// Symbols are compared case-insensitively but stored uppercase. `address` is
/// an optional on-chain-pool disambiguator; it does not participate in
/// equality once a rate has been converted to USD.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CurrencyPair {
    pub base: String,
    pub quote: String,
    pub address: Option<String>,
}

impl CurrencyPair {
    pub fn new(base: impl Into<String>, quote: impl Into<String>) -> Self {
        Self {
            base: base.into().to_uppercase(),
            quote: quote.into().to_uppercase(),
            address: None,
        }
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn is_usd_quoted(&self) -> bool {
        self.quote == "USD"
    }

    /// Rewrites this pair's quote to USD, keeping the base symbol.
    pub fn to_usd(&self) -> Self {
        Self {
            base: self.base.clone(),
            quote: "USD".to_string(),
            address: None,
        }
    }

    /// The `BASEQUOTE` symbol used by the HTTP read API and canonical rates string.
    pub fn symbol(&self) -> String {
        format!("{}{}", self.base, self.quote)
    }
}

/// A single venue-reported price and traded volume, valid "now".
///
/// Invariants: `price > 0`, `volume >= 0`. No NaN, no negatives.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickerPrice {
    pub price: Decimal,
    pub volume: Decimal,
}

/// A closed trading candle: price, volume, and the Unix-millisecond close time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CandlePrice {
    pub price: Decimal,
    pub volume: Decimal,
    pub timestamp: i64,
}

pub type ProviderName = String;

/// Mapping from provider name to that provider's latest ticker per pair.
/// A provider present with an empty inner map is legal; absence means "no
/// data this tick" from that provider.
pub type AggregatedProviderTickers = HashMap<ProviderName, HashMap<CurrencyPair, TickerPrice>>;

/// As [`AggregatedProviderTickers`], but the inner value is the candle
/// sequence retained for that pair (unsorted; the kernel sorts when needed).
pub type AggregatedProviderCandles = HashMap<ProviderName, HashMap<CurrencyPair, Vec<CandlePrice>>>;

/// Per-pair aggregated decimal output (a consensus price, a conversion rate, ...).
pub type CurrencyPairDec = HashMap<CurrencyPair, Decimal>;

/// Per-provider [`CurrencyPairDec`] snapshots, e.g. the per-provider VWAP/TVWAP maps.
pub type CurrencyPairDecByProvider = HashMap<ProviderName, CurrencyPairDec>;
