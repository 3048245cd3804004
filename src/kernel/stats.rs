//! Population standard deviation across providers, and the deviation test
//! built on top of it (spec §4.B).

use crate::domain::errors::KernelError;
use crate::domain::types::{AggregatedProviderTickers, CurrencyPair};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;

const SQRT_TOLERANCE: Decimal = dec!(0.000000000000000001);
const SQRT_MAX_ITERATIONS: u32 = 100;

/// Square root via Newton-Raphson iteration, to the same fixed-point
/// precision as the rest of the kernel.
pub fn decimal_sqrt(value: Decimal, base: &str) -> Result<Decimal, KernelError> {
    if value < Decimal::ZERO {
        return Err(KernelError::SqrtDidNotConverge {
            base: base.to_string(),
            iterations: 0,
        });
    }
    if value == Decimal::ZERO {
        return Ok(Decimal::ZERO);
    }

    let two = dec!(2);
    let mut x = if value > Decimal::ONE { value / two } else { Decimal::ONE };

    for iteration in 0..SQRT_MAX_ITERATIONS {
        let next = (x + value / x) / two;
        if (next - x).abs() < SQRT_TOLERANCE {
            return Ok(next);
        }
        x = next;
        let _ = iteration;
    }

    Err(KernelError::SqrtDidNotConverge {
        base: base.to_string(),
        iterations: SQRT_MAX_ITERATIONS,
    })
}

/// `(mean - margin) <= p <= (mean + margin)`.
pub fn is_between(p: Decimal, mean: Decimal, margin: Decimal) -> bool {
    p >= mean - margin && p <= mean + margin
}

/// Per-pair population standard deviation and mean of each provider's raw
/// ticker price. Pairs with fewer than 3 provider samples are omitted.
pub fn standard_deviation(
    providers: &AggregatedProviderTickers,
) -> Result<HashMap<CurrencyPair, (Decimal, Decimal)>, KernelError> {
    let mut samples: HashMap<CurrencyPair, Vec<Decimal>> = HashMap::new();
    for tickers in providers.values() {
        for (pair, ticker) in tickers {
            samples.entry(pair.clone()).or_default().push(ticker.price);
        }
    }

    let mut result = HashMap::new();
    for (pair, values) in samples {
        if values.len() < 3 {
            continue;
        }

        let count = Decimal::from(values.len() as u64);
        let mean = values.iter().copied().sum::<Decimal>() / count;
        let variance = values
            .iter()
            .map(|v| (*v - mean) * (*v - mean))
            .sum::<Decimal>()
            / count;
        let deviation = decimal_sqrt(variance, &pair.base)?;

        result.insert(pair, (deviation, mean));
    }

    Ok(result)
}
