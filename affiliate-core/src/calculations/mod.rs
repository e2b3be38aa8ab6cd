//! Commission arithmetic for closed deals.
//!
//! Everything here is pure: callers resolve rates and dates first and
//! persist the results afterwards.

pub mod commission;
pub mod common;
pub mod payout_schedule;

pub use commission::{CommissionBreakdown, CommissionCalculator, CommissionError};
pub use payout_schedule::{PayoutScheduleError, PayoutScheduleGenerator};
