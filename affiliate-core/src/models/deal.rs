use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{NewCommission, NewPaymentPeriod, TransitionError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DealContractType {
    OneTime,
    Recurring,
}

impl DealContractType {
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

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingFrequency {
    Monthly,
}

impl BillingFrequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Monthly => "monthly",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "monthly" => Some(Self::Monthly),
            _ => None,
        }
    }
}

/// `active -> cancelled | completed`; both outcomes are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DealStatus {
    #[default]
    Active,
    Cancelled,
    Completed,
}

impl DealStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Cancelled => "cancelled",
            Self::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "cancelled" => Some(Self::Cancelled),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }

    pub fn can_transition_to(
        &self,
        next: DealStatus,
    ) -> bool {
        matches!(
            (self, next),
            (Self::Active, Self::Cancelled) | (Self::Active, Self::Completed)
        )
    }

    pub fn transition_to(
        &self,
        next: DealStatus,
    ) -> Result<DealStatus, TransitionError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(TransitionError {
                entity: "deal",
                from: self.as_str(),
                to: next.as_str(),
            })
        }
    }
}

/// A closed sale tied to exactly one lead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deal {
    pub id: i64,
    pub submission_id: i64,
    pub partnership_id: i64,
    pub company_id: i64,
    pub affiliate_id: i64,
    pub deal_value: Decimal,
    pub contract_type: DealContractType,
    pub billing_frequency: Option<BillingFrequency>,
    pub contract_length_months: Option<i32>,
    pub status: DealStatus,
    pub closed_at: DateTime<Utc>,
}

/// For creating new deals (no id)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDeal {
    pub submission_id: i64,
    pub partnership_id: i64,
    pub company_id: i64,
    pub affiliate_id: i64,
    pub deal_value: Decimal,
    pub contract_type: DealContractType,
    pub billing_frequency: Option<BillingFrequency>,
    pub contract_length_months: Option<i32>,
    pub status: DealStatus,
    pub closed_at: DateTime<Utc>,
}

/// What becomes payable when a deal is recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DealPayout {
    /// One commission row, created immediately.
    Commission(NewCommission),
    /// One row per expected billing cycle; commissions are deferred.
    Schedule(Vec<NewPaymentPeriod>),
}

/// Everything written when a lead is closed. Backends persist it atomically
/// together with the lead's move to `closed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewClosedDeal {
    pub deal: NewDeal,
    pub payout: DealPayout,
}
