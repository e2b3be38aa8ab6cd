use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::TransitionError;

/// Pipeline position of a lead.
///
/// ```text
/// new -> contacted -> qualified -> closed
///   \________\____________\-----> not_interested
/// ```
///
/// Forward moves may skip steps. `closed` and `not_interested` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    #[default]
    New,
    Contacted,
    Qualified,
    Closed,
    NotInterested,
}

impl LeadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Contacted => "contacted",
            Self::Qualified => "qualified",
            Self::Closed => "closed",
            Self::NotInterested => "not_interested",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "new" => Some(Self::New),
            "contacted" => Some(Self::Contacted),
            "qualified" => Some(Self::Qualified),
            "closed" => Some(Self::Closed),
            "not_interested" => Some(Self::NotInterested),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed | Self::NotInterested)
    }

    // `None` for the dead-end state, which sits outside the pipeline.
    fn pipeline_position(&self) -> Option<u8> {
        match self {
            Self::New => Some(0),
            Self::Contacted => Some(1),
            Self::Qualified => Some(2),
            Self::Closed => Some(3),
            Self::NotInterested => None,
        }
    }

    pub fn can_transition_to(
        &self,
        next: LeadStatus,
    ) -> bool {
        if self.is_terminal() {
            return false;
        }
        match (self.pipeline_position(), next.pipeline_position()) {
            (_, None) => true,
            (Some(from), Some(to)) => to > from,
            (None, Some(_)) => false,
        }
    }

    pub fn transition_to(
        &self,
        next: LeadStatus,
    ) -> Result<LeadStatus, TransitionError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(TransitionError {
                entity: "lead",
                from: self.as_str(),
                to: next.as_str(),
            })
        }
    }
}

/// Contract shape recorded on a lead before it is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractType {
    #[default]
    OneTime,
    Monthly,
}

impl ContractType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OneTime => "one_time",
            Self::Monthly => "monthly",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "one_time" => Some(Self::OneTime),
            "monthly" => Some(Self::Monthly),
            _ => None,
        }
    }
}

/// A prospective customer captured through an affiliate's tracked page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactSubmission {
    pub id: i64,
    pub partnership_id: i64,
    pub product_id: Option<i64>,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub message: Option<String>,
    pub status: LeadStatus,

    // Recorded by the company while working the lead
    pub contract_value: Option<Decimal>,
    pub contract_type: ContractType,
    pub contract_length_months: Option<i32>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// For creating new submissions (no id, status or timestamps)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewContactSubmission {
    pub partnership_id: i64,
    pub product_id: Option<i64>,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractTerms {
    pub contract_value: Decimal,
    pub contract_type: ContractType,
    pub contract_length_months: Option<i32>,
}
