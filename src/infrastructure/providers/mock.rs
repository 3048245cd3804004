//! In-memory `PriceProvider` for tests and local runs without real exchange
//! connectivity, grounded on the teacher's `infrastructure/mock.rs` pattern.

use crate::domain::ports::PriceProvider;
use crate::domain::types::{CandlePrice, CurrencyPair, TickerPrice};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

/// A provider whose ticker/candle data is pushed directly by the caller via
/// [`MockProvider::publish_ticker`]/[`MockProvider::publish_candle`], rather
/// than fetched over the network.
#[derive(Default)]
pub struct MockProvider {
    tickers: RwLock<HashMap<CurrencyPair, TickerPrice>>,
    candles: RwLock<HashMap<CurrencyPair, Vec<CandlePrice>>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish_ticker(&self, pair: CurrencyPair, ticker: TickerPrice) {
        let mut guard = self.tickers.write().unwrap_or_else(|p| p.into_inner());
        guard.insert(pair, ticker);
    }

    pub fn publish_candle(&self, pair: CurrencyPair, candle: CandlePrice) {
        let mut guard = self.candles.write().unwrap_or_else(|p| p.into_inner());
        guard.entry(pair).or_default().push(candle);
    }
}

#[async_trait]
impl PriceProvider for MockProvider {
    async fn start_connections(&self) -> Result<()> {
        Ok(())
    }

    async fn subscribe_currency_pairs(&self, _pairs: &[CurrencyPair]) -> Result<()> {
        Ok(())
    }

    async fn get_ticker_prices(
        &self,
        pairs: &[CurrencyPair],
    ) -> Result<HashMap<CurrencyPair, TickerPrice>> {
        let guard = self.tickers.read().unwrap_or_else(|p| p.into_inner());
        Ok(pairs
            .iter()
            .filter_map(|p| guard.get(p).map(|t| (p.clone(), *t)))
            .collect())
    }

    async fn get_candle_prices(
        &self,
        pairs: &[CurrencyPair],
    ) -> Result<HashMap<CurrencyPair, Vec<CandlePrice>>> {
        let guard = self.candles.read().unwrap_or_else(|p| p.into_inner());
        Ok(pairs
            .iter()
            .filter_map(|p| guard.get(p).map(|c| (p.clone(), c.clone())))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn publishes_are_visible_to_subsequent_reads() {
        let provider = MockProvider::new();
        let pair = CurrencyPair::new("ATOM", "USD");
        provider.publish_ticker(pair.clone(), TickerPrice { price: dec!(10), volume: dec!(1) });

        let prices = provider.get_ticker_prices(&[pair.clone()]).await.unwrap();
        assert_eq!(prices[&pair].price, dec!(10));
    }

    #[tokio::test]
    async fn unpublished_pair_is_absent_not_zero() {
        let provider = MockProvider::new();
        let pair = CurrencyPair::new("ATOM", "USD");
        let prices = provider.get_ticker_prices(&[pair]).await.unwrap();
        assert!(prices.is_empty());
    }
}
