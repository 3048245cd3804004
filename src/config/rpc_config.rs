//! Chain RPC/gRPC endpoint configuration (spec §6, `rpc.*`).

use super::provider_config::parse_duration;
use anyhow::Result;
use std::env;
use std::time::Duration;

pub struct RpcEnvConfig {
    pub tmrpc_endpoint: String,
    pub grpc_endpoint: String,
    pub rpc_timeout: Duration,
}

impl RpcEnvConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            tmrpc_endpoint: env::var("RPC_TMRPC_ENDPOINT")
                .unwrap_or_else(|_| "http://localhost:26657".to_string()),
            grpc_endpoint: env::var("RPC_GRPC_ENDPOINT")
                .unwrap_or_else(|_| "http://localhost:9090".to_string()),
            rpc_timeout: match env::var("RPC_TIMEOUT") {
                Ok(raw) => parse_duration(&raw)?,
                Err(_) => Duration::from_secs(15),
            },
        })
    }
}
