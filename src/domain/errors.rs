//! Error taxonomy for the aggregation and voting core (spec §7).

use thiserror::Error;

/// Errors from the price math kernel. Unlike provider/chain errors, these
/// propagate and fail the tick (spec: "math failure").
#[derive(Debug, Error)]
pub enum KernelError {
    #[error("TVWAP window for {base} has zero period (all candles share one timestamp)")]
    ZeroPeriod { base: String },

    #[error("standard deviation did not converge for {base} after {iterations} iterations")]
    SqrtDidNotConverge { base: String, iterations: u32 },
}

/// Errors surfaced by a provider adapter call. Transient by construction:
/// the aggregator drops that provider's contribution for the tick and
/// continues with its peers.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider {provider} timed out after {timeout_ms}ms")]
    Timeout { provider: String, timeout_ms: u64 },

    #[error("provider {provider} returned a malformed message: {reason}")]
    MalformedMessage { provider: String, reason: String },

    #[error("provider {provider} is disconnected")]
    Disconnected { provider: String },
}

/// Errors from the chain client abstraction.
#[derive(Debug, Error)]
pub enum ChainError {
    #[error("failed to query chain height: {reason}")]
    HeightQueryFailed { reason: String },

    #[error("failed to query oracle params: {reason}")]
    ParamQueryFailed { reason: String },

    #[error("broadcast of {msg_type} rejected: {reason}")]
    BroadcastRejected { msg_type: String, reason: String },
}

/// Errors from the aggregation pipeline itself (spec §4.C/§7).
#[derive(Debug, Error)]
pub enum AggregationError {
    #[error(transparent)]
    Kernel(#[from] KernelError),

    #[error("required pair {pair} missing from computed output")]
    MissingRequiredPair { pair: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_timeout_message_contains_fields() {
        let err = ProviderError::Timeout {
            provider: "binance".to_string(),
            timeout_ms: 2000,
        };
        let msg = err.to_string();
        assert!(msg.contains("binance"));
        assert!(msg.contains("2000"));
    }

    #[test]
    fn kernel_zero_period_message() {
        let err = KernelError::ZeroPeriod {
            base: "ATOM".to_string(),
        };
        assert!(err.to_string().contains("ATOM"));
    }

    #[test]
    fn aggregation_error_wraps_kernel_error() {
        let err: AggregationError = KernelError::SqrtDidNotConverge {
            base: "OSMO".to_string(),
            iterations: 64,
        }
        .into();
        assert!(err.to_string().contains("OSMO"));
    }
}
