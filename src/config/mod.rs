//! Configuration module for the oracle price-feeder core.
//!
//! Structured environment-variable loading, organized by concern the way the
//! teacher's `config/` module is split: provider endpoints and deviation
//! thresholds, chain RPC, validator account/keyring, and observability.
//! `.env` loading via `dotenvy` happens once in `main`, not here.

mod account_config;
mod observability_config;
mod provider_config;
mod rpc_config;

pub use account_config::AccountEnvConfig;
pub use observability_config::ObservabilityEnvConfig;
pub use provider_config::{parse_duration, DeviationThresholds, ProviderEndpointConfig, ProviderEnvConfig};
pub use rpc_config::RpcEnvConfig;

use anyhow::{Context, Result};
use std::time::Duration;

/// Aggregates every sub-config into the one object `main` builds and passes
/// down to the application layer (spec §6's recognized options).
pub struct Config {
    pub provider_timeout: Duration,
    pub provider_endpoints: Vec<ProviderEndpointConfig>,
    pub deviation_thresholds: DeviationThresholds,

    pub rpc: RpcEnvConfig,
    pub account: AccountEnvConfig,
    pub observability: ObservabilityEnvConfig,
}

impl Config {
    /// Loads configuration from environment variables, composing each
    /// sub-config's loader. A malformed `PROVIDER_ENDPOINTS`/
    /// `DEVIATION_THRESHOLDS` JSON value is a fatal startup error (spec §7).
    pub fn from_env() -> Result<Self> {
        let provider = ProviderEnvConfig::from_env().context("failed to load provider config")?;
        let rpc = RpcEnvConfig::from_env().context("failed to load rpc config")?;
        let account = AccountEnvConfig::from_env();
        let observability = ObservabilityEnvConfig::from_env();

        Ok(Self {
            provider_timeout: provider.provider_timeout,
            provider_endpoints: provider.provider_endpoints,
            deviation_thresholds: provider.deviation_thresholds,
            rpc,
            account,
            observability,
        })
    }
}
