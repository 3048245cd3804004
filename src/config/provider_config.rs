//! Provider endpoint and deviation-threshold configuration (spec §6).

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::time::Duration;
use url::Url;

/// One configured provider's REST/websocket endpoints, loaded from the
/// `PROVIDER_ENDPOINTS` JSON array.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderEndpointConfig {
    pub name: String,
    pub rest: Url,
    pub websocket: Url,
    #[serde(default)]
    pub api_key: Option<String>,
}

/// Per-base deviation-threshold override, falling back to the kernel's
/// default multiplier (`1.0`) when a base has none configured.
#[derive(Debug, Clone, Default)]
pub struct DeviationThresholds {
    pub default: Decimal,
    pub per_base: HashMap<String, Decimal>,
}

impl DeviationThresholds {
    pub fn as_map(&self) -> HashMap<String, Decimal> {
        self.per_base.clone()
    }
}

pub struct ProviderEnvConfig {
    pub provider_timeout: Duration,
    pub provider_endpoints: Vec<ProviderEndpointConfig>,
    pub deviation_thresholds: DeviationThresholds,
}

/// Parses a Go-style duration string (`"2s"`, `"500ms"`, `"1m"`) as used by
/// spec §6's `providerTimeout` example. Only the units the config surface
/// actually needs are supported.
pub fn parse_duration(raw: &str) -> Result<Duration> {
    let raw = raw.trim();
    let (digits, unit) = raw
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .map(|idx| raw.split_at(idx))
        .with_context(|| format!("duration {raw:?} has no unit suffix"))?;
    let value: f64 = digits
        .parse()
        .with_context(|| format!("invalid duration magnitude in {raw:?}"))?;
    let millis = match unit {
        "ms" => value,
        "s" => value * 1_000.0,
        "m" => value * 60_000.0,
        other => anyhow::bail!("unsupported duration unit {other:?} in {raw:?}"),
    };
    Ok(Duration::from_millis(millis.round() as u64))
}

impl ProviderEnvConfig {
    pub fn from_env() -> Result<Self> {
        let provider_timeout = match env::var("PROVIDER_TIMEOUT") {
            Ok(raw) => parse_duration(&raw)?,
            Err(_) => Duration::from_secs(2),
        };

        let provider_endpoints: Vec<ProviderEndpointConfig> = match env::var("PROVIDER_ENDPOINTS")
        {
            Ok(raw) => {
                serde_json::from_str(&raw).context("PROVIDER_ENDPOINTS is not valid JSON")?
            }
            Err(_) => Vec::new(),
        };

        let deviation_thresholds = match env::var("DEVIATION_THRESHOLDS") {
            Ok(raw) => {
                let per_base: HashMap<String, Decimal> =
                    serde_json::from_str(&raw).context("DEVIATION_THRESHOLDS is not valid JSON")?;
                DeviationThresholds {
                    default: crate::kernel::filter::DEFAULT_DEVIATION_THRESHOLD,
                    per_base,
                }
            }
            Err(_) => DeviationThresholds {
                default: crate::kernel::filter::DEFAULT_DEVIATION_THRESHOLD,
                per_base: HashMap::new(),
            },
        };

        Ok(Self {
            provider_timeout,
            provider_endpoints,
            deviation_thresholds,
        })
    }
}
