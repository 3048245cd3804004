//! Pure price math: VWAP, TVWAP, deviation filtering, and USD conversion.
//! No I/O, no locking — every function here is unit-tested directly.

pub mod convert;
pub mod filter;
pub mod stats;
pub mod tvwap;
pub mod vwap;

/// Default volume floor passed to [`vwap::vwap`] by the aggregator. Small
/// enough that a genuinely zero-volume ticker still contributes a sample
/// without dominating providers that report real volume.
pub fn vwap_volume_floor() -> rust_decimal::Decimal {
    rust_decimal_macros::dec!(0.000000000000001)
}
