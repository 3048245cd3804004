//! Prometheus metrics definitions for the oracle feeder.
//!
//! All metrics use the `oraclefeeder_` prefix and are read-only.

use prometheus::{
    CounterVec, Gauge, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
    core::{AtomicF64, GenericGauge},
};
use std::sync::Arc;

/// Prometheus metrics for the aggregation-and-voting core.
#[derive(Clone)]
pub struct Metrics {
    registry: Arc<Registry>,
    /// Deviation-filter rejections by base symbol.
    pub deviation_rejections_total: CounterVec,
    /// Provider call timeouts, by provider name.
    pub provider_timeouts_total: CounterVec,
    /// Provider call errors (non-timeout), by provider name.
    pub provider_errors_total: CounterVec,
    /// Vote windows where the feeder neither prevoted nor voted in time.
    pub missed_vote_windows_total: GenericGauge<AtomicF64>,
    /// Broadcast failures by message type.
    pub broadcast_failures_total: CounterVec,
    /// Duration of a full `SetPrices` tick.
    pub tick_duration_seconds: HistogramVec,
    /// Age in seconds of the param cache at last refresh attempt.
    pub param_cache_age_seconds: GenericGauge<AtomicF64>,
    /// WebSocket reconnection attempts, by provider name.
    pub provider_reconnects_total: CounterVec,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let deviation_rejections_total = CounterVec::new(
            Opts::new(
                "oraclefeeder_deviation_rejections_total",
                "Samples rejected by the deviation filter, by base symbol",
            ),
            &["base"],
        )?;
        registry.register(Box::new(deviation_rejections_total.clone()))?;

        let provider_timeouts_total = CounterVec::new(
            Opts::new(
                "oraclefeeder_provider_timeouts_total",
                "Provider calls that exceeded the per-tick timeout",
            ),
            &["provider"],
        )?;
        registry.register(Box::new(provider_timeouts_total.clone()))?;

        let provider_errors_total = CounterVec::new(
            Opts::new(
                "oraclefeeder_provider_errors_total",
                "Provider calls that returned an error",
            ),
            &["provider"],
        )?;
        registry.register(Box::new(provider_errors_total.clone()))?;

        let missed_vote_windows_total = Gauge::with_opts(Opts::new(
            "oraclefeeder_missed_vote_windows_total",
            "Vote windows closed without a broadcast vote",
        ))?;
        registry.register(Box::new(missed_vote_windows_total.clone()))?;

        let broadcast_failures_total = CounterVec::new(
            Opts::new(
                "oraclefeeder_broadcast_failures_total",
                "Chain broadcast failures, by message type",
            ),
            &["msg_type"],
        )?;
        registry.register(Box::new(broadcast_failures_total.clone()))?;

        let tick_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "oraclefeeder_tick_duration_seconds",
                "Wall-clock duration of a full aggregation tick",
            )
            .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.0, 5.0, 10.0]),
            &["stage"],
        )?;
        registry.register(Box::new(tick_duration_seconds.clone()))?;

        let param_cache_age_seconds = Gauge::with_opts(Opts::new(
            "oraclefeeder_param_cache_age_seconds",
            "Blocks since the oracle param cache was last refreshed",
        ))?;
        registry.register(Box::new(param_cache_age_seconds.clone()))?;

        let provider_reconnects_total = CounterVec::new(
            Opts::new(
                "oraclefeeder_provider_reconnects_total",
                "Total provider websocket reconnection attempts",
            ),
            &["provider"],
        )?;
        registry.register(Box::new(provider_reconnects_total.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            deviation_rejections_total,
            provider_timeouts_total,
            provider_errors_total,
            missed_vote_windows_total,
            broadcast_failures_total,
            tick_duration_seconds,
            param_cache_age_seconds,
            provider_reconnects_total,
        })
    }

    /// Render all metrics in Prometheus text format.
    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        encoder
            .encode_to_string(&metric_families)
            .unwrap_or_default()
    }

    pub fn inc_deviation_rejection(&self, base: &str) {
        self.deviation_rejections_total
            .with_label_values(&[base])
            .inc();
    }

    pub fn inc_provider_timeout(&self, provider: &str) {
        self.provider_timeouts_total
            .with_label_values(&[provider])
            .inc();
    }

    pub fn inc_provider_error(&self, provider: &str) {
        self.provider_errors_total
            .with_label_values(&[provider])
            .inc();
    }

    pub fn inc_missed_vote_window(&self) {
        self.missed_vote_windows_total.inc();
    }

    pub fn inc_broadcast_failure(&self, msg_type: &str) {
        self.broadcast_failures_total
            .with_label_values(&[msg_type])
            .inc();
    }

    pub fn observe_tick_duration(&self, stage: &str, seconds: f64) {
        self.tick_duration_seconds
            .with_label_values(&[stage])
            .observe(seconds);
    }

    pub fn set_param_cache_age(&self, blocks: f64) {
        self.param_cache_age_seconds.set(blocks);
    }

    pub fn inc_provider_reconnect(&self, provider: &str) {
        self.provider_reconnects_total
            .with_label_values(&[provider])
            .inc();
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new().expect("failed to create default Metrics")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_render_carries_prefix() {
        let metrics = Metrics::new().expect("failed to create metrics");
        assert!(metrics.render().contains("oraclefeeder_"));
    }

    #[test]
    fn deviation_rejection_counter_labels_by_base() {
        let metrics = Metrics::new().expect("failed to create metrics");
        metrics.inc_deviation_rejection("ATOM");
        metrics.inc_deviation_rejection("ATOM");
        metrics.inc_deviation_rejection("OSMO");
        let output = metrics.render();
        assert!(output.contains("oraclefeeder_deviation_rejections_total"));
        assert!(output.contains("ATOM"));
        assert!(output.contains("OSMO"));
    }

    #[test]
    fn provider_timeout_and_error_counters_are_distinct() {
        let metrics = Metrics::new().expect("failed to create metrics");
        metrics.inc_provider_timeout("binance");
        metrics.inc_provider_error("binance");
        let output = metrics.render();
        assert!(output.contains("oraclefeeder_provider_timeouts_total"));
        assert!(output.contains("oraclefeeder_provider_errors_total"));
    }
}
