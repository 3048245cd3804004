//! Port interfaces: the abstract capabilities the aggregator and vote
//! scheduler depend on. Concrete adapters live under `infrastructure/`.

use crate::domain::oracle_params::OracleParams;
use crate::domain::types::{CandlePrice, CurrencyPair, TickerPrice};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;

/// Capability contract for a single exchange/venue adapter (spec §4.A).
///
/// `get_ticker_prices`/`get_candle_prices` must never block on network I/O;
/// they read from an internal snapshot kept current by the adapter's own
/// background connection.
#[async_trait]
pub trait PriceProvider: Send + Sync {
    /// Idempotent; starts the adapter's background transport if not already running.
    async fn start_connections(&self) -> Result<()>;

    /// Adds pairs to the adapter's subscription set. Duplicates are no-ops.
    async fn subscribe_currency_pairs(&self, pairs: &[CurrencyPair]) -> Result<()>;

    /// Latest cached ticker per requested pair; pairs with no data are omitted.
    async fn get_ticker_prices(
        &self,
        pairs: &[CurrencyPair],
    ) -> Result<HashMap<CurrencyPair, TickerPrice>>;

    /// Cached candles within the retention window, per requested pair.
    async fn get_candle_prices(
        &self,
        pairs: &[CurrencyPair],
    ) -> Result<HashMap<CurrencyPair, Vec<CandlePrice>>>;
}

/// Capability contract for the chain client (spec §6).
#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn get_chain_height(&self) -> Result<i64>;

    async fn get_oracle_params(&self) -> Result<OracleParams>;

    /// Broadcasts `MsgAggregateExchangeRatePrevote`.
    async fn broadcast_prevote(
        &self,
        target_height: i64,
        deadline_blocks: i64,
        hash: &str,
    ) -> Result<()>;

    /// Broadcasts `MsgAggregateExchangeRateVote`.
    async fn broadcast_vote(
        &self,
        target_height: i64,
        deadline_blocks: i64,
        salt: &str,
        exchange_rates: &str,
    ) -> Result<()>;

    /// Long-lived subscription to `EventParamUpdate`; each received item is
    /// one on-chain param update notification. Consumers poll this via
    /// `try_recv` rather than blocking on it.
    async fn subscribe_param_updates(&self) -> Result<tokio::sync::mpsc::Receiver<()>>;
}
