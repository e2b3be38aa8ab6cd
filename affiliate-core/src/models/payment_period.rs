use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One expected billing cycle of a recurring deal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DealPaymentPeriod {
    pub id: i64,
    pub deal_id: i64,
    pub period_number: i32,
    pub expected_payment_date: NaiveDate,
    pub payment_confirmed: bool,
}

/// A period generated before its deal row exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPaymentPeriod {
    pub period_number: i32,
    pub expected_payment_date: NaiveDate,
    pub payment_confirmed: bool,
}
