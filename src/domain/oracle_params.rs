//! On-chain oracle parameters and the cache that tracks their freshness.

use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};

/// One base/quote pair plus the providers and on-chain pool addresses the
/// feeder should consult for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrencyPairProviders {
    pub base: String,
    pub quote: String,
    pub providers: Vec<String>,
    pub pair_addresses: Vec<String>,
}

/// Oracle module parameters as observed from the chain.
#[derive(Debug, Clone, PartialEq)]
pub struct OracleParams {
    pub vote_period: u64,
    pub accept_list: HashSet<String>,
    pub currency_pair_providers: Vec<CurrencyPairProviders>,
    pub deviation_thresholds: HashMap<String, Decimal>,
}

/// Holds the most recently refreshed [`OracleParams`] plus the bookkeeping
/// needed to decide when a refresh is due.
#[derive(Debug, Default)]
pub struct ParamCache {
    pub params: Option<OracleParams>,
    pub last_updated_block: i64,
    pub pending_event_signalled: bool,
}

/// Blocks tolerated between a staleness refresh before the cache is
/// considered outdated even without a pending event.
const STALENESS_BLOCKS: i64 = 200;

impl ParamCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` when params must be refreshed before this tick can proceed:
    /// no params yet, a clock rollback, staleness past 200 blocks, or a
    /// pending `EventParamUpdate` signal.
    pub fn is_outdated(&self, height: i64) -> bool {
        if self.params.is_none() {
            return true;
        }
        if self.pending_event_signalled {
            return true;
        }
        height < self.last_updated_block || height - self.last_updated_block > STALENESS_BLOCKS
    }

    /// Records a successful refresh, returning `true` if the tracked
    /// provider-pair list or deviation thresholds changed relative to the
    /// previous snapshot (the aggregator must reconfigure on `true`).
    pub fn apply_refresh(&mut self, height: i64, params: OracleParams) -> bool {
        let reconfigure = match &self.params {
            Some(previous) => {
                previous.currency_pair_providers != params.currency_pair_providers
                    || previous.deviation_thresholds != params.deviation_thresholds
            }
            None => true,
        };

        self.params = Some(params);
        self.last_updated_block = height;
        self.pending_event_signalled = false;
        reconfigure
    }

    pub fn signal_pending_event(&mut self) {
        self.pending_event_signalled = true;
    }
}
