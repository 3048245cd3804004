//! In-memory `ChainClient` for tests and local runs. Real gRPC wire
//! transport to a Cosmos SDK chain is out of scope; this is the only
//! `ChainClient` backing the feeder ships with.

use crate::domain::oracle_params::OracleParams;
use crate::domain::ports::ChainClient;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::RwLock;
use tokio::sync::mpsc;
use tracing::info;

pub struct MockChainClient {
    height: AtomicI64,
    params: RwLock<OracleParams>,
    param_update_tx: mpsc::Sender<()>,
    param_update_rx: tokio::sync::Mutex<Option<mpsc::Receiver<()>>>,
    /// When set, every broadcast call fails with this message instead of succeeding.
    broadcast_failure: RwLock<Option<String>>,
}

impl MockChainClient {
    pub fn new(initial_height: i64, params: OracleParams) -> Self {
        let (tx, rx) = mpsc::channel(16);
        Self {
            height: AtomicI64::new(initial_height),
            params: RwLock::new(params),
            param_update_tx: tx,
            param_update_rx: tokio::sync::Mutex::new(Some(rx)),
            broadcast_failure: RwLock::new(None),
        }
    }

    pub fn set_height(&self, height: i64) {
        self.height.store(height, Ordering::Relaxed);
    }

    pub fn set_params(&self, params: OracleParams) {
        *self.params.write().unwrap_or_else(|p| p.into_inner()) = params;
    }

    /// Pushes an `EventParamUpdate` notification to subscribers.
    pub async fn emit_param_update(&self) {
        let _ = self.param_update_tx.send(()).await;
    }

    pub fn fail_broadcasts_with(&self, reason: impl Into<String>) {
        *self.broadcast_failure.write().unwrap_or_else(|p| p.into_inner()) = Some(reason.into());
    }

    pub fn clear_broadcast_failure(&self) {
        *self.broadcast_failure.write().unwrap_or_else(|p| p.into_inner()) = None;
    }
}

#[async_trait]
impl ChainClient for MockChainClient {
    async fn get_chain_height(&self) -> Result<i64> {
        Ok(self.height.load(Ordering::Relaxed))
    }

    async fn get_oracle_params(&self) -> Result<OracleParams> {
        Ok(self.params.read().unwrap_or_else(|p| p.into_inner()).clone())
    }

    async fn broadcast_prevote(
        &self,
        target_height: i64,
        deadline_blocks: i64,
        hash: &str,
    ) -> Result<()> {
        if let Some(reason) = self.broadcast_failure.read().unwrap_or_else(|p| p.into_inner()).clone() {
            anyhow::bail!("prevote broadcast rejected: {reason}");
        }
        info!("MockChainClient: prevote {hash} at height {target_height} (deadline +{deadline_blocks})");
        Ok(())
    }

    async fn broadcast_vote(
        &self,
        target_height: i64,
        deadline_blocks: i64,
        salt: &str,
        exchange_rates: &str,
    ) -> Result<()> {
        if let Some(reason) = self.broadcast_failure.read().unwrap_or_else(|p| p.into_inner()).clone() {
            anyhow::bail!("vote broadcast rejected: {reason}");
        }
        info!(
            "MockChainClient: vote salt={salt} rates=\"{exchange_rates}\" at height {target_height} (deadline +{deadline_blocks})"
        );
        Ok(())
    }

    async fn subscribe_param_updates(&self) -> Result<mpsc::Receiver<()>> {
        self.param_update_rx
            .lock()
            .await
            .take()
            .ok_or_else(|| anyhow::anyhow!("MockChainClient supports only one subscriber"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::oracle_params::OracleParams;
    use std::collections::{HashMap, HashSet};

    fn empty_params() -> OracleParams {
        OracleParams {
            vote_period: 5,
            accept_list: HashSet::new(),
            currency_pair_providers: Vec::new(),
            deviation_thresholds: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn height_and_params_roundtrip() {
        let client = MockChainClient::new(100, empty_params());
        assert_eq!(client.get_chain_height().await.unwrap(), 100);
        client.set_height(105);
        assert_eq!(client.get_chain_height().await.unwrap(), 105);
    }

    #[tokio::test]
    async fn broadcast_failure_injection_rejects_calls() {
        let client = MockChainClient::new(100, empty_params());
        client.fail_broadcasts_with("simulated mempool rejection");
        let result = client.broadcast_vote(100, 2, "salt", "ATOM:1.0").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn param_update_event_is_observable_by_subscriber() {
        let client = MockChainClient::new(100, empty_params());
        let mut rx = client.subscribe_param_updates().await.unwrap();
        client.emit_param_update().await;
        assert!(rx.recv().await.is_some());
    }
}
