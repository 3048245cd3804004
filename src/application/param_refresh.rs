//! Parameter cache refresh path (spec §4.D): staleness-triggered and
//! event-triggered refresh of on-chain oracle params, bounded by a
//! 15-second chain query timeout.

use crate::domain::errors::ChainError;
use crate::domain::oracle_params::{OracleParams, ParamCache};
use crate::domain::ports::ChainClient;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

const PARAM_QUERY_TIMEOUT: Duration = Duration::from_secs(15);

/// Owns the [`ParamCache`] and the chain client used to refresh it. Safe to
/// share across the tick scheduler and the background event-subscription task.
pub struct ParamCacheService {
    cache: RwLock<ParamCache>,
    chain: Arc<dyn ChainClient>,
}

/// Outcome of a refresh attempt that the caller must act on.
pub struct RefreshOutcome {
    pub refreshed: bool,
    pub reconfigure: bool,
    pub params: Option<OracleParams>,
}

impl ParamCacheService {
    pub fn new(chain: Arc<dyn ChainClient>) -> Self {
        Self {
            cache: RwLock::new(ParamCache::new()),
            chain,
        }
    }

    /// Refreshes params if the cache is outdated for `height`. On chain
    /// failure, the previous params are retained and the error is returned
    /// to the caller (spec: "tick aborts; cached params continue to serve").
    pub async fn refresh_if_needed(&self, height: i64) -> Result<RefreshOutcome, ChainError> {
        let outdated = { self.cache.read().await.is_outdated(height) };
        if !outdated {
            let params = self.cache.read().await.params.clone();
            return Ok(RefreshOutcome {
                refreshed: false,
                reconfigure: false,
                params,
            });
        }

        let fetch = tokio::time::timeout(PARAM_QUERY_TIMEOUT, self.chain.get_oracle_params());
        let params = match fetch.await {
            Ok(Ok(params)) => params,
            Ok(Err(e)) => {
                warn!("ParamCacheService: refresh failed: {e}");
                return Err(ChainError::ParamQueryFailed {
                    reason: e.to_string(),
                });
            }
            Err(_) => {
                warn!("ParamCacheService: refresh timed out after {PARAM_QUERY_TIMEOUT:?}");
                return Err(ChainError::ParamQueryFailed {
                    reason: "timeout".to_string(),
                });
            }
        };

        let mut cache = self.cache.write().await;
        let reconfigure = cache.apply_refresh(height, params.clone());
        info!(
            "ParamCacheService: refreshed params at height {height} (reconfigure={reconfigure})"
        );

        Ok(RefreshOutcome {
            refreshed: true,
            reconfigure,
            params: Some(params),
        })
    }

    /// Background task body: consumes `EventParamUpdate` notifications and
    /// flags the cache so the next tick forces a refresh.
    pub async fn run_event_listener(self: Arc<Self>) {
        let mut rx = match self.chain.subscribe_param_updates().await {
            Ok(rx) => rx,
            Err(e) => {
                error!("ParamCacheService: failed to subscribe to param updates: {e}");
                return;
            }
        };

        while rx.recv().await.is_some() {
            self.cache.write().await.signal_pending_event();
            info!("ParamCacheService: pending param update event flagged");
        }
    }

    pub async fn current_params(&self) -> Option<OracleParams> {
        self.cache.read().await.params.clone()
    }

    pub async fn last_updated_block(&self) -> i64 {
        self.cache.read().await.last_updated_block
    }
}
