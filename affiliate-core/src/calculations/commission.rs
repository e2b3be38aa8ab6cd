//! Commission split for a single deal.
//!
//! | Figure           | Formula                                          |
//! |------------------|--------------------------------------------------|
//! | commission       | deal value × commission rate / 100               |
//! | platform fee     | commission × platform fee rate / 100             |
//! | affiliate payout | commission − platform fee                        |
//!
//! Rates are percentages. Commission and fee are computed at full precision
//! and rounded to cents only at output; the payout is the difference of the
//! two rounded figures so the three always reconcile to the cent.
//!
//! # Example
//!
//! ```
//! use rust_decimal_macros::dec;
//! use affiliate_core::calculations::CommissionCalculator;
//!
//! let split = CommissionCalculator::calculate(dec!(999.99), dec!(15), dec!(25)).unwrap();
//!
//! assert_eq!(split.commission, dec!(150.00));
//! assert_eq!(split.platform_fee, dec!(37.50));
//! assert_eq!(split.affiliate_payout, dec!(112.50));
//! ```

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::calculations::common::{percent_of, round_currency};
use crate::models::EffectiveRates;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommissionBreakdown {
    pub commission: Decimal,
    pub platform_fee: Decimal,
    pub affiliate_payout: Decimal,
}

impl CommissionBreakdown {
    pub const ZERO: Self = Self {
        commission: Decimal::ZERO,
        platform_fee: Decimal::ZERO,
        affiliate_payout: Decimal::ZERO,
    };
}

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum CommissionError {
    #[error("commission on a deal value of {deal_value} is out of range")]
    OutOfRange { deal_value: Decimal },
}

/// Calculator for deal commissions.
///
/// Rates are not range-checked: values above 100 or below 0 flow through the
/// arithmetic unchanged.
pub struct CommissionCalculator;

impl CommissionCalculator {
    pub fn calculate(
        deal_value: Decimal,
        commission_rate: Decimal,
        platform_fee_rate: Decimal,
    ) -> Result<CommissionBreakdown, CommissionError> {
        let out_of_range = CommissionError::OutOfRange { deal_value };
        let raw_commission = percent_of(deal_value, commission_rate).ok_or(out_of_range)?;
        let raw_fee = percent_of(raw_commission, platform_fee_rate).ok_or(out_of_range)?;

        let commission = round_currency(raw_commission);
        let platform_fee = round_currency(raw_fee);
        let affiliate_payout = commission
            .checked_sub(platform_fee)
            .ok_or(out_of_range)?;

        Ok(CommissionBreakdown {
            commission,
            platform_fee,
            affiliate_payout,
        })
    }

    /// Same as [`CommissionCalculator::calculate`] with rates already resolved
    /// for the deal.
    pub fn calculate_with(
        deal_value: Decimal,
        rates: &EffectiveRates,
    ) -> Result<CommissionBreakdown, CommissionError> {
        Self::calculate(deal_value, rates.commission_rate, rates.platform_fee_rate)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::models::{CompanySettings, Product};

    fn calc(
        deal_value: Decimal,
        commission_rate: Decimal,
        platform_fee_rate: Decimal,
    ) -> CommissionBreakdown {
        CommissionCalculator::calculate(deal_value, commission_rate, platform_fee_rate)
            .expect("calculation should succeed")
    }

    fn split(
        commission: Decimal,
        platform_fee: Decimal,
        affiliate_payout: Decimal,
    ) -> CommissionBreakdown {
        CommissionBreakdown {
            commission,
            platform_fee,
            affiliate_payout,
        }
    }

    #[test]
    fn default_rates_on_round_value() {
        let result = calc(dec!(1000), dec!(10), dec!(20));

        assert_eq!(result, split(dec!(100.00), dec!(20.00), dec!(80.00)));
    }

    #[test]
    fn rounds_only_the_final_figures() {
        let result = calc(dec!(999.99), dec!(15), dec!(25));

        assert_eq!(result, split(dec!(150.00), dec!(37.50), dec!(112.50)));
    }

    #[test]
    fn fee_uses_unrounded_commission() {
        // raw commission 10.005; half of it is 5.0025, whereas half of 10.01 would be 5.005
        let result = calc(dec!(100.05), dec!(10), dec!(50));

        assert_eq!(result.commission, dec!(10.01));
        assert_eq!(result.platform_fee, dec!(5.00));
        assert_eq!(result.affiliate_payout, dec!(5.01));
    }

    #[test]
    fn zero_deal_value_yields_zero_split() {
        for (rate, fee) in [(dec!(0), dec!(0)), (dec!(10), dec!(20)), (dec!(150), dec!(99.9))] {
            assert_eq!(
                calc(dec!(0), rate, fee),
                CommissionBreakdown::ZERO
            );
        }
    }

    #[test]
    fn zero_fee_rate_pays_everything_to_affiliate() {
        let result = calc(dec!(2500), dec!(12), dec!(0));

        assert_eq!(result, split(dec!(300.00), dec!(0), dec!(300.00)));
    }

    #[test]
    fn rates_above_one_hundred_are_not_capped() {
        let result = calc(dec!(100), dec!(150), dec!(100));

        assert_eq!(result, split(dec!(150.00), dec!(150.00), dec!(0)));
    }

    #[test]
    fn negative_rate_propagates() {
        let result = calc(dec!(100), dec!(-10), dec!(20));

        assert_eq!(result, split(dec!(-10.00), dec!(-2.00), dec!(-8.00)));
    }

    #[test]
    fn split_always_reconciles_to_the_cent() {
        let values = [dec!(0.01), dec!(1.005), dec!(19.99), dec!(333.33), dec!(10050.05), dec!(87654.321)];
        let rates = [dec!(0), dec!(2.5), dec!(7), dec!(10), dec!(33.333), dec!(100)];

        for value in values {
            for rate in rates {
                for fee in rates {
                    let result = calc(value, rate, fee);
                    assert_eq!(
                        result.commission,
                        result.platform_fee + result.affiliate_payout,
                        "value={value} rate={rate} fee={fee}"
                    );
                    assert_eq!(result.commission, result.commission.round_dp(2));
                    assert_eq!(result.platform_fee, result.platform_fee.round_dp(2));
                }
            }
        }
    }

    #[test]
    fn calculate_with_uses_product_override() {
        let product = Product {
            id: 3,
            company_id: 1,
            name: "Premium plan".to_string(),
            commission_rate: Some(dec!(25)),
        };
        let rates = CompanySettings::defaults_for(1).effective_rates(Some(&product));

        let result = CommissionCalculator::calculate_with(dec!(1000), &rates)
            .expect("calculation should succeed");

        assert_eq!(result, split(dec!(250.00), dec!(50.00), dec!(200.00)));
    }

    #[test]
    fn oversized_deal_value_is_an_error() {
        for value in [Decimal::MAX, dec!(10000000000000000000000000000)] {
            assert_eq!(
                CommissionCalculator::calculate(value, dec!(10), dec!(20)),
                Err(CommissionError::OutOfRange { deal_value: value })
            );
        }
    }

    #[test]
    fn largest_values_that_fit_still_calculate() {
        let result = calc(dec!(1000000000000000000000000000), dec!(10), dec!(20));

        assert_eq!(result.commission, dec!(100000000000000000000000000));
        assert_eq!(result.platform_fee, dec!(20000000000000000000000000));
        assert_eq!(result.affiliate_payout, dec!(80000000000000000000000000));
    }
}
