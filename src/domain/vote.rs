//! The prevote/vote commit-reveal state machine (spec §4.E).

use crate::domain::types::CurrencyPairDec;
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Memory carried from a successful prevote broadcast to the vote broadcast
/// one period later. Discarded on a missed window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviousPrevote {
    pub salt: String,
    pub exchange_rates: String,
    pub submit_block_height: i64,
}

/// Per-validator vote state: either nothing outstanding, or a prevote
/// awaiting its reveal in a later vote period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoteState {
    None,
    Prevoted { period: u64, memory: PreviousPrevote },
}

impl Default for VoteState {
    fn default() -> Self {
        VoteState::None
    }
}

/// The action the state machine wants the tick scheduler to take.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoteAction {
    Skip,
    Prevote {
        salt: String,
        hash: String,
        canonical_rates: String,
    },
    Vote {
        salt: String,
        canonical_rates: String,
    },
    /// `currentVotePeriod - previousPeriod > 1`: memory is discarded, nothing is broadcast.
    MissedWindowReset,
}

/// Builds the canonical `"<base>:<priceDec>,..."` string, pairs sorted
/// lexicographically by base symbol (P7: invariant under input order).
pub fn canonical_rates_string(prices: &CurrencyPairDec) -> String {
    let mut entries: Vec<(String, String)> = prices
        .iter()
        .map(|(pair, price)| (pair.symbol(), format!("{:.18}", price)))
        .collect();
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    entries
        .into_iter()
        .map(|(symbol, price)| format!("{}:{}", symbol, price))
        .collect::<Vec<_>>()
        .join(",")
}

/// Generates a fresh cryptographically random 32-byte salt, hex-encoded.
pub fn generate_salt() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// `H(salt, canonicalRates, validatorAddr)`, hex-encoded.
pub fn commitment_hash(salt: &str, canonical_rates: &str, validator_addr: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(canonical_rates.as_bytes());
    hasher.update(validator_addr.as_bytes());
    hex::encode(hasher.finalize())
}

/// Drives one tick of the vote state machine (spec §4.E). Does not perform
/// any broadcast itself — the caller is expected to attempt the broadcast
/// implied by the returned [`VoteAction`] and only then call
/// [`advance_state`] with the outcome.
pub fn decide(
    state: &VoteState,
    block_height: i64,
    vote_period: u64,
    prices: &CurrencyPairDec,
    validator_addr: &str,
) -> VoteAction {
    let next_height = block_height + 1;
    let current_vote_period = (next_height as u64) / vote_period;
    let index_in_period = (next_height as u64) % vote_period;

    match state {
        VoteState::None => {
            if vote_period == 0 || index_in_period >= vote_period - 1 {
                VoteAction::Skip
            } else {
                let canonical_rates = canonical_rates_string(prices);
                let salt = generate_salt();
                let hash = commitment_hash(&salt, &canonical_rates, validator_addr);
                VoteAction::Prevote {
                    salt,
                    hash,
                    canonical_rates,
                }
            }
        }
        VoteState::Prevoted { period, memory } => {
            if current_vote_period == *period {
                VoteAction::Skip
            } else if current_vote_period.saturating_sub(*period) == 1 {
                VoteAction::Vote {
                    salt: memory.salt.clone(),
                    canonical_rates: memory.exchange_rates.clone(),
                }
            } else {
                // Covers both "missed more than one period" and a chain-height
                // rollback (current_vote_period < period): either way the
                // prevote memory is stale and must be discarded.
                VoteAction::MissedWindowReset
            }
        }
    }
}

/// Applies the effect of a successful broadcast (or a skip/miss) to the
/// vote state. `height_after_broadcast` is the block height observed right
/// after a prevote broadcast succeeds.
pub fn advance_state(
    state: &VoteState,
    action: &VoteAction,
    height_after_broadcast: i64,
    vote_period: u64,
) -> VoteState {
    match action {
        VoteAction::Skip => state.clone(),
        VoteAction::Prevote {
            salt,
            canonical_rates,
            ..
        } => VoteState::Prevoted {
            period: (height_after_broadcast as u64) / vote_period,
            memory: PreviousPrevote {
                salt: salt.clone(),
                exchange_rates: canonical_rates.clone(),
                submit_block_height: height_after_broadcast,
            },
        },
        VoteAction::Vote { .. } => VoteState::None,
        VoteAction::MissedWindowReset => VoteState::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::CurrencyPair;
    use rust_decimal_macros::dec;

    #[test]
    fn vote_skip_near_boundary() {
        // votePeriod=5, blockHeight=8 -> indexInPeriod = 9 % 5 = 4 >= 4 -> skip
        let action = decide(&VoteState::None, 8, 5, &CurrencyPairDec::new(), "val1");
        assert_eq!(action, VoteAction::Skip);
    }

    #[test]
    fn none_state_prevotes_away_from_boundary() {
        let mut prices = CurrencyPairDec::new();
        prices.insert(CurrencyPair::new("atom", "usd"), dec!(40.13));
        let action = decide(&VoteState::None, 10, 5, &prices, "val1");
        assert!(matches!(action, VoteAction::Prevote { .. }));
    }

    #[test]
    fn prevoted_same_period_skips() {
        let memory = PreviousPrevote {
            salt: "abc".into(),
            exchange_rates: "ATOMUSD:40".into(),
            submit_block_height: 10,
        };
        let state = VoteState::Prevoted { period: 2, memory };
        // next_height/votePeriod must equal 2 for this to hold
        let action = decide(&state, 9, 5, &CurrencyPairDec::new(), "val1");
        assert_eq!(action, VoteAction::Skip);
    }

    #[test]
    fn prevoted_one_period_later_votes() {
        let memory = PreviousPrevote {
            salt: "abc".into(),
            exchange_rates: "ATOMUSD:40".into(),
            submit_block_height: 10,
        };
        let state = VoteState::Prevoted { period: 2, memory };
        // next_height = 15, currentVotePeriod = 3, 3-2=1 -> vote
        let action = decide(&state, 14, 5, &CurrencyPairDec::new(), "val1");
        assert!(matches!(action, VoteAction::Vote { .. }));
    }

    #[test]
    fn prevoted_missed_window() {
        let memory = PreviousPrevote {
            salt: "abc".into(),
            exchange_rates: "ATOMUSD:40".into(),
            submit_block_height: 10,
        };
        let state = VoteState::Prevoted { period: 2, memory };
        // next_height = 20, currentVotePeriod = 4, 4-2=2 > 1 -> missed
        let action = decide(&state, 19, 5, &CurrencyPairDec::new(), "val1");
        assert_eq!(action, VoteAction::MissedWindowReset);
    }

    #[test]
    fn prevoted_height_rollback_resets_without_underflow() {
        let memory = PreviousPrevote {
            salt: "abc".into(),
            exchange_rates: "ATOMUSD:40".into(),
            submit_block_height: 10,
        };
        // period recorded was 4; a rolled-back height now yields currentVotePeriod = 1,
        // which is behind the recorded period. Must not panic on underflow.
        let state = VoteState::Prevoted { period: 4, memory };
        let action = decide(&state, 4, 5, &CurrencyPairDec::new(), "val1");
        assert_eq!(action, VoteAction::MissedWindowReset);
    }

    #[test]
    fn canonical_rates_string_is_sorted_and_formatted() {
        let mut prices = CurrencyPairDec::new();
        prices.insert(CurrencyPair::new("OJO", "USD"), dec!(3.72));
        prices.insert(CurrencyPair::new("ATOM", "USD"), dec!(40.13));
        prices.insert(CurrencyPair::new("OSMO", "USD"), dec!(8.69));

        let s = canonical_rates_string(&prices);
        assert_eq!(
            s,
            "ATOMUSD:40.130000000000000000,OJOUSD:3.720000000000000000,OSMOUSD:8.690000000000000000"
        );
    }

    #[test]
    fn canonical_rates_string_invariant_under_permutation() {
        let mut a = CurrencyPairDec::new();
        a.insert(CurrencyPair::new("ATOM", "USD"), dec!(1));
        a.insert(CurrencyPair::new("OSMO", "USD"), dec!(2));

        let mut b = CurrencyPairDec::new();
        b.insert(CurrencyPair::new("OSMO", "USD"), dec!(2));
        b.insert(CurrencyPair::new("ATOM", "USD"), dec!(1));

        assert_eq!(canonical_rates_string(&a), canonical_rates_string(&b));
    }
}
