//! Thread-safe publication point for the latest consensus prices and
//! per-provider VWAP/TVWAP snapshots (spec §4.F).
//!
//! Grounded on the teacher's lock-poisoning-tolerant `SpreadCache`: readers
//! never block each other, writers take a brief exclusive window, and a
//! poisoned lock is recovered rather than propagated.

use crate::domain::types::{CurrencyPairDec, CurrencyPairDecByProvider};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::RwLock;

#[derive(Debug, Default, Clone)]
struct PriceSnapshot {
    prices: CurrencyPairDec,
    tvwap: CurrencyPairDecByProvider,
    vwap: CurrencyPairDecByProvider,
}

/// Public read surface: [`get_prices`](PriceStore::get_prices),
/// [`get_tvwap_prices`](PriceStore::get_tvwap_prices), and
/// [`get_vwap_prices`](PriceStore::get_vwap_prices) each return a deep copy
/// taken under a read lock, so observers never see a torn snapshot (P8).
pub struct PriceStore {
    snapshot: RwLock<PriceSnapshot>,
    last_tick_at_ms: AtomicI64,
}

impl PriceStore {
    pub fn new() -> Self {
        Self {
            snapshot: RwLock::new(PriceSnapshot::default()),
            last_tick_at_ms: AtomicI64::new(0),
        }
    }

    /// Installs a new snapshot under the write lock. Readers already mid-read
    /// keep seeing the previous snapshot; new reads see the new one.
    pub fn publish(
        &self,
        prices: CurrencyPairDec,
        tvwap: CurrencyPairDecByProvider,
        vwap: CurrencyPairDecByProvider,
        now_ms: i64,
    ) {
        let next = PriceSnapshot { prices, tvwap, vwap };
        match self.snapshot.write() {
            Ok(mut guard) => *guard = next,
            Err(poisoned) => {
                tracing::error!("PriceStore: lock poisoned during publish, recovering");
                *poisoned.into_inner() = next;
            }
        }
        self.last_tick_at_ms.store(now_ms, Ordering::Relaxed);
    }

    pub fn get_prices(&self) -> CurrencyPairDec {
        self.read(|s| s.prices.clone())
    }

    pub fn get_tvwap_prices(&self) -> CurrencyPairDecByProvider {
        self.read(|s| s.tvwap.clone())
    }

    pub fn get_vwap_prices(&self) -> CurrencyPairDecByProvider {
        self.read(|s| s.vwap.clone())
    }

    pub fn last_tick_at_ms(&self) -> i64 {
        self.last_tick_at_ms.load(Ordering::Relaxed)
    }

    fn read<T>(&self, f: impl FnOnce(&PriceSnapshot) -> T) -> T {
        match self.snapshot.read() {
            Ok(guard) => f(&guard),
            Err(poisoned) => f(&poisoned.into_inner()),
        }
    }
}

impl Default for PriceStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::CurrencyPair;
    use rust_decimal_macros::dec;

    #[test]
    fn publish_then_read_roundtrips() {
        let store = PriceStore::new();
        let mut prices = CurrencyPairDec::new();
        prices.insert(CurrencyPair::new("ATOM", "USD"), dec!(10));

        store.publish(prices.clone(), CurrencyPairDecByProvider::new(), CurrencyPairDecByProvider::new(), 1000);

        assert_eq!(store.get_prices(), prices);
        assert_eq!(store.last_tick_at_ms(), 1000);
    }

    #[test]
    fn fresh_store_reports_empty_snapshot() {
        let store = PriceStore::new();
        assert!(store.get_prices().is_empty());
        assert_eq!(store.last_tick_at_ms(), 0);
    }
}
