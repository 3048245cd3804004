//! Commit-reveal vote coordinator (spec §4.E): wires [`domain::vote`]'s pure
//! state machine to an actual [`ChainClient`] broadcast.

use crate::domain::ports::ChainClient;
use crate::domain::types::CurrencyPairDec;
use crate::domain::vote::{self, VoteAction, VoteState};
use crate::infrastructure::observability::Metrics;
use anyhow::Result;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

/// Deadline window, in blocks, given to the chain to include a broadcast
/// tx before the feeder considers it failed for this tick.
const BROADCAST_DEADLINE_BLOCKS: i64 = 2;

pub struct VoteCoordinator {
    chain: Arc<dyn ChainClient>,
    validator_addr: String,
    metrics: Arc<Metrics>,
    state: Mutex<VoteState>,
}

impl VoteCoordinator {
    pub fn new(chain: Arc<dyn ChainClient>, validator_addr: String, metrics: Arc<Metrics>) -> Self {
        Self {
            chain,
            validator_addr,
            metrics,
            state: Mutex::new(VoteState::None),
        }
    }

    /// Runs one tick of the state machine. On any broadcast error the tick
    /// aborts and the vote state is left untouched — a previous prevote's
    /// memory is only committed after its broadcast actually succeeds.
    pub async fn tick(&self, block_height: i64, vote_period: u64, prices: &CurrencyPairDec) -> Result<()> {
        let current_state = self.current_state();
        let action = vote::decide(&current_state, block_height, vote_period, prices, &self.validator_addr);

        match &action {
            VoteAction::Skip => {
                return Ok(());
            }
            VoteAction::Prevote { hash, .. } => {
                let target_height = block_height + 1;
                if let Err(e) = self
                    .chain
                    .broadcast_prevote(target_height, BROADCAST_DEADLINE_BLOCKS, hash)
                    .await
                {
                    warn!("VoteCoordinator: prevote broadcast failed: {e}");
                    self.metrics.inc_broadcast_failure("prevote");
                    return Err(e);
                }
                info!("VoteCoordinator: prevote broadcast at height {target_height}");
            }
            VoteAction::Vote { salt, canonical_rates } => {
                let target_height = block_height + 1;
                if let Err(e) = self
                    .chain
                    .broadcast_vote(target_height, BROADCAST_DEADLINE_BLOCKS, salt, canonical_rates)
                    .await
                {
                    warn!("VoteCoordinator: vote broadcast failed: {e}");
                    self.metrics.inc_broadcast_failure("vote");
                    return Err(e);
                }
                info!("VoteCoordinator: vote broadcast at height {target_height}");
            }
            VoteAction::MissedWindowReset => {
                warn!("VoteCoordinator: missed vote window, resetting state");
                self.metrics.inc_missed_vote_window();
            }
        }

        let next_state = vote::advance_state(&current_state, &action, block_height + 1, vote_period);
        self.set_state(next_state);
        Ok(())
    }

    /// The state machine's current state, for callers that want to observe
    /// vote progress (e.g. tests, or a future status endpoint).
    pub fn current_state(&self) -> VoteState {
        self.state.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    fn set_state(&self, state: VoteState) {
        *self.state.lock().unwrap_or_else(|p| p.into_inner()) = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::CurrencyPair;
    use crate::infrastructure::chain::mock_client::MockChainClient;
    use crate::domain::oracle_params::OracleParams;
    use rust_decimal_macros::dec;
    use std::collections::{HashMap, HashSet};

    fn params() -> OracleParams {
        OracleParams {
            vote_period: 5,
            accept_list: HashSet::new(),
            currency_pair_providers: vec![],
            deviation_thresholds: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn broadcast_failure_leaves_state_unchanged() {
        let chain = Arc::new(MockChainClient::new(10, params()));
        chain.fail_broadcasts_with("rejected");
        let metrics = Arc::new(Metrics::new().unwrap());
        let coordinator = VoteCoordinator::new(chain, "val1".to_string(), metrics);

        let mut prices = CurrencyPairDec::new();
        prices.insert(CurrencyPair::new("ATOM", "USD"), dec!(10));

        let result = coordinator.tick(10, 5, &prices).await;
        assert!(result.is_err());
        assert_eq!(coordinator.current_state(), VoteState::None);
    }

    #[tokio::test]
    async fn successful_prevote_then_vote_completes_the_cycle() {
        let chain = Arc::new(MockChainClient::new(10, params()));
        let metrics = Arc::new(Metrics::new().unwrap());
        let coordinator = VoteCoordinator::new(chain, "val1".to_string(), metrics);

        let mut prices = CurrencyPairDec::new();
        prices.insert(CurrencyPair::new("ATOM", "USD"), dec!(10));

        // height 10 -> next_height 11, index_in_period = 11 % 5 = 1, prevotes.
        coordinator.tick(10, 5, &prices).await.unwrap();
        assert!(matches!(coordinator.current_state(), VoteState::Prevoted { .. }));

        // Advance one full period: next_height 16 -> current_vote_period = 3; state's
        // period after prevote was 11/5=2, so 3-2=1 -> vote.
        coordinator.tick(15, 5, &prices).await.unwrap();
        assert_eq!(coordinator.current_state(), VoteState::None);
    }
}
