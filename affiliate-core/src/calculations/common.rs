//! Shared currency helpers.

use rust_decimal::{Decimal, RoundingStrategy};

/// Rounds a decimal value to currency precision (two places), half away from zero.
///
/// # Examples
///
/// ```
/// use rust_decimal_macros::dec;
/// use affiliate_core::calculations::common::round_currency;
///
/// assert_eq!(round_currency(dec!(149.9985)), dec!(150.00));
/// assert_eq!(round_currency(dec!(37.495)), dec!(37.50));
/// assert_eq!(round_currency(dec!(-0.005)), dec!(-0.01)); // Away from zero
/// ```
pub fn round_currency(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// `amount × rate / 100`, unrounded. `None` when the product leaves the
/// range `Decimal` can represent.
pub fn percent_of(
    amount: Decimal,
    rate_percent: Decimal,
) -> Option<Decimal> {
    amount
        .checked_mul(rate_percent)?
        .checked_div(Decimal::ONE_HUNDRED)
}
