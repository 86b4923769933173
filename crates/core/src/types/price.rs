//! Retail price conversion using decimal arithmetic.
//!
//! Printful reports retail prices as decimal strings (`"25.00"`); Stripe
//! prices are integer minor-currency units (`2500`). Conversion goes through
//! `rust_decimal` so `"19.99"` never takes a float detour.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

/// Errors that can occur converting a retail price string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PriceError {
    /// The input is not a parseable decimal number.
    #[error("invalid retail price {0:?}")]
    Invalid(String),
    /// The price is negative.
    #[error("negative retail price {0:?}")]
    Negative(String),
    /// The price overflows the minor-unit range.
    #[error("retail price {0:?} out of range")]
    OutOfRange(String),
}

/// Convert a decimal retail price string into minor currency units.
///
/// `"25.00"` becomes `2500`. Values with sub-cent precision round half
/// away from zero (`"10.005"` becomes `1001`).
///
/// # Errors
///
/// Returns [`PriceError`] if the string is not a non-negative decimal that
/// fits in minor units.
pub fn retail_price_to_minor_units(retail_price: &str) -> Result<i64, PriceError> {
    let amount: Decimal = retail_price
        .trim()
        .parse()
        .map_err(|_| PriceError::Invalid(retail_price.to_string()))?;

    if amount.is_sign_negative() {
        return Err(PriceError::Negative(retail_price.to_string()));
    }

    let minor = (amount * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, rust_decimal::RoundingStrategy::MidpointAwayFromZero);

    minor
        .to_i64()
        .ok_or_else(|| PriceError::OutOfRange(retail_price.to_string()))
}
