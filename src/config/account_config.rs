//! Validator account and keyring configuration (spec §6, `account.*`/`keyring.*`).

use std::env;

pub struct AccountEnvConfig {
    pub address: String,
    pub validator: String,
    pub chain_id: String,
    pub keyring_backend: String,
    pub keyring_dir: String,
    pub gas_adjustment: f64,
}

impl AccountEnvConfig {
    pub fn from_env() -> Self {
        Self {
            address: env::var("ACCOUNT_ADDRESS").unwrap_or_default(),
            validator: env::var("ACCOUNT_VALIDATOR").unwrap_or_default(),
            chain_id: env::var("ACCOUNT_CHAIN_ID").unwrap_or_default(),
            keyring_backend: env::var("KEYRING_BACKEND").unwrap_or_else(|_| "os".to_string()),
            keyring_dir: env::var("KEYRING_DIR").unwrap_or_else(|_| "~/.oraclefeeder".to_string()),
            gas_adjustment: env::var("GAS_ADJUSTMENT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1.5),
        }
    }
}
