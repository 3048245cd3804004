//! Telemetry sink for the aggregation-and-voting core: a Prometheus
//! registry pulled by `GET /api/v1/metrics`, plus `tracing` as the
//! structured-logging layer used throughout (spec §9's "ambient singleton"
//! avoidance — the registry is constructed once in `main` and passed down,
//! never a process-wide global).

pub mod metrics;

pub use metrics::Metrics;
