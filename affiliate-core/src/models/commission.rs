use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::TransitionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommissionType {
    OneTime,
    Recurring,
}

impl CommissionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OneTime => "one_time",
            Self::Recurring => "recurring",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "one_time" => Some(Self::OneTime),
            "recurring" => Some(Self::Recurring),
            _ => None,
        }
    }
}

/// `pending -> approved -> paid`. Payment always follows approval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommissionStatus {
    #[default]
    Pending,
    Approved,
    Paid,
}

impl CommissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Paid => "paid",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "paid" => Some(Self::Paid),
            _ => None,
        }
    }

    /// Status a freshly created commission starts in.
    pub fn initial(auto_approve: bool) -> Self {
        if auto_approve { Self::Approved } else { Self::Pending }
    }

    pub fn can_transition_to(
        &self,
        next: CommissionStatus,
    ) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Approved) | (Self::Approved, Self::Paid)
        )
    }

    pub fn transition_to(
        &self,
        next: CommissionStatus,
    ) -> Result<CommissionStatus, TransitionError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(TransitionError {
                entity: "commission",
                from: self.as_str(),
                to: next.as_str(),
            })
        }
    }
}

/// Money owed to an affiliate for a deal.
///
/// `commission_amount == platform_fee_amount + affiliate_payout_amount`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commission {
    pub id: i64,
    pub deal_id: i64,
    pub affiliate_id: i64,
    pub company_id: i64,
    pub commission_amount: Decimal,
    pub platform_fee_amount: Decimal,
    pub affiliate_payout_amount: Decimal,
    pub commission_type: CommissionType,
    pub status: CommissionStatus,
    pub expected_payout_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

/// A commission computed before its deal row exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCommission {
    pub affiliate_id: i64,
    pub company_id: i64,
    pub commission_amount: Decimal,
    pub platform_fee_amount: Decimal,
    pub affiliate_payout_amount: Decimal,
    pub commission_type: CommissionType,
    pub status: CommissionStatus,
    pub expected_payout_date: NaiveDate,
}
