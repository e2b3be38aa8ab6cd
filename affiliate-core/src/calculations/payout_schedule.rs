//! Payment-period schedules for recurring deals and payout due dates.
//!
//! Period `i` of a schedule falls `i` calendar months after the contract
//! start. Each date is offset from the start rather than from the previous
//! period, so a start on the 31st returns to the 31st whenever the month has
//! one:
//!
//! ```
//! use chrono::NaiveDate;
//! use affiliate_core::calculations::PayoutScheduleGenerator;
//!
//! let start = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
//! let periods = PayoutScheduleGenerator::generate(start, 3).unwrap();
//! let dates: Vec<_> = periods.iter().map(|p| p.expected_payment_date.to_string()).collect();
//!
//! assert_eq!(dates, ["2024-02-29", "2024-03-31", "2024-04-30"]);
//! ```

use chrono::{Days, Months, NaiveDate};
use thiserror::Error;

use crate::models::NewPaymentPeriod;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PayoutScheduleError {
    #[error("contract length must be a positive number of months, got {0}")]
    InvalidContractLength(i32),

    #[error("payout frequency must not be negative, got {0} days")]
    InvalidPayoutFrequency(i32),

    #[error("date for period {0} is out of range")]
    DateOutOfRange(i32),
}

pub struct PayoutScheduleGenerator;

impl PayoutScheduleGenerator {
    /// Expands a contract into `contract_length_months` unconfirmed periods
    /// numbered from 1.
    pub fn generate(
        start: NaiveDate,
        contract_length_months: i32,
    ) -> Result<Vec<NewPaymentPeriod>, PayoutScheduleError> {
        let months = u32::try_from(contract_length_months)
            .ok()
            .filter(|n| *n > 0)
            .ok_or(PayoutScheduleError::InvalidContractLength(
                contract_length_months,
            ))?;

        (1..=months)
            .map(|offset| {
                let period_number = offset as i32;
                let expected_payment_date = start
                    .checked_add_months(Months::new(offset))
                    .ok_or(PayoutScheduleError::DateOutOfRange(period_number))?;

                Ok(NewPaymentPeriod {
                    period_number,
                    expected_payment_date,
                    payment_confirmed: false,
                })
            })
            .collect()
    }

    /// Date a one-time commission is expected to be paid out.
    pub fn payout_due_date(
        closed_on: NaiveDate,
        payout_frequency_days: i32,
    ) -> Result<NaiveDate, PayoutScheduleError> {
        let days = u64::try_from(payout_frequency_days)
            .map_err(|_| PayoutScheduleError::InvalidPayoutFrequency(payout_frequency_days))?;

        closed_on
            .checked_add_days(Days::new(days))
            .ok_or(PayoutScheduleError::DateOutOfRange(0))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn date(
        y: i32,
        m: u32,
        d: u32,
    ) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn three_month_contract_from_mid_january() {
        let periods = PayoutScheduleGenerator::generate(date(2024, 1, 15), 3).unwrap();

        assert_eq!(
            periods,
            vec![
                NewPaymentPeriod {
                    period_number: 1,
                    expected_payment_date: date(2024, 2, 15),
                    payment_confirmed: false,
                },
                NewPaymentPeriod {
                    period_number: 2,
                    expected_payment_date: date(2024, 3, 15),
                    payment_confirmed: false,
                },
                NewPaymentPeriod {
                    period_number: 3,
                    expected_payment_date: date(2024, 4, 15),
                    payment_confirmed: false,
                },
            ]
        );
    }

    #[test]
    fn uses_calendar_months_not_thirty_days() {
        let periods = PayoutScheduleGenerator::generate(date(2023, 1, 31), 2).unwrap();

        assert_eq!(periods[0].expected_payment_date, date(2023, 2, 28));
        assert_eq!(periods[1].expected_payment_date, date(2023, 3, 31));
    }

    #[test]
    fn crosses_year_boundary() {
        let periods = PayoutScheduleGenerator::generate(date(2024, 11, 10), 14).unwrap();

        assert_eq!(periods.len(), 14);
        assert_eq!(periods[1].expected_payment_date, date(2025, 1, 10));
        assert_eq!(periods[13].expected_payment_date, date(2026, 1, 10));
        assert_eq!(periods.last().unwrap().period_number, 14);
    }

    #[test]
    fn zero_length_is_rejected() {
        assert_eq!(
            PayoutScheduleGenerator::generate(date(2024, 1, 15), 0),
            Err(PayoutScheduleError::InvalidContractLength(0))
        );
    }

    #[test]
    fn negative_length_is_rejected() {
        assert_eq!(
            PayoutScheduleGenerator::generate(date(2024, 1, 15), -6),
            Err(PayoutScheduleError::InvalidContractLength(-6))
        );
    }

    #[test]
    fn out_of_range_date_names_the_period() {
        let result = PayoutScheduleGenerator::generate(NaiveDate::MAX, 1);

        assert_eq!(result, Err(PayoutScheduleError::DateOutOfRange(1)));
    }

    #[test]
    fn payout_due_date_adds_days() {
        assert_eq!(
            PayoutScheduleGenerator::payout_due_date(date(2024, 1, 15), 30),
            Ok(date(2024, 2, 14))
        );
        assert_eq!(
            PayoutScheduleGenerator::payout_due_date(date(2024, 1, 15), 0),
            Ok(date(2024, 1, 15))
        );
    }

    #[test]
    fn payout_due_date_rejects_negative_frequency() {
        assert_eq!(
            PayoutScheduleGenerator::payout_due_date(date(2024, 1, 15), -1),
            Err(PayoutScheduleError::InvalidPayoutFrequency(-1))
        );
    }
}
