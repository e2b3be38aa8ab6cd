//! Closing a lead into a deal.
//!
//! Closing is split in two: [`plan_close`] decides everything that will be
//! written from already-loaded records, and [`DealCloser`] loads those
//! records, runs the plan, and hands the result to the repository as one
//! atomic write.
//!
//! | Lead contract                      | Deal        | Written alongside              |
//! |------------------------------------|-------------|--------------------------------|
//! | `monthly`, length N > 0            | `recurring` | N payment periods, no commission |
//! | anything else                      | `one_time`  | one commission                 |

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::calculations::{
    CommissionBreakdown, CommissionCalculator, CommissionError, PayoutScheduleError,
    PayoutScheduleGenerator,
};
use crate::db::repository::{AffiliateRepository, RepositoryError};
use crate::models::{
    BillingFrequency, CommissionStatus, CommissionType, CompanySettings, ContactSubmission,
    ContractTerms, ContractType, Deal, DealContractType, DealPayout, DealStatus, EffectiveRates,
    LeadStatus, NewClosedDeal, NewCommission, NewDeal, Partnership, Product, TransitionError,
};
use crate::services::settings::{SettingsError, SettingsResolver};

pub const MISSING_CONTRACT_VALUE: &str = "Please enter a contract value before closing this lead.";
pub const NEGATIVE_CONTRACT_VALUE: &str = "Contract value cannot be negative.";
pub const CLOSE_VIA_DEAL: &str = "Use the close action so the deal is recorded with the lead.";
pub const TERMS_ON_FINISHED_LEAD: &str = "Contract terms can only be changed on an open lead.";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CloseError {
    /// Rejected input. The message is meant for the person closing the lead.
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error(transparent)]
    Calculation(#[from] CommissionError),

    #[error(transparent)]
    Schedule(#[from] PayoutScheduleError),

    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Everything decided for one close, before anything is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosePlan {
    pub closed: NewClosedDeal,
    pub breakdown: CommissionBreakdown,
    pub rates: EffectiveRates,
}

/// Checks that `lead` may move to `closed` and returns its contract value.
pub fn check_closable(lead: &ContactSubmission) -> Result<Decimal, CloseError> {
    lead.status.transition_to(LeadStatus::Closed)?;

    let value = lead
        .contract_value
        .ok_or_else(|| CloseError::Validation(MISSING_CONTRACT_VALUE.to_string()))?;
    if value < Decimal::ZERO {
        return Err(CloseError::Validation(NEGATIVE_CONTRACT_VALUE.to_string()));
    }
    Ok(value)
}

/// Builds the deal and its payout for a lead closed at `closed_at`.
///
/// A `monthly` lead without a positive contract length is closed as a
/// one-time deal. A product belonging to another company is ignored and the
/// company rate applies.
pub fn plan_close(
    lead: &ContactSubmission,
    partnership: &Partnership,
    settings: &CompanySettings,
    product: Option<&Product>,
    closed_at: DateTime<Utc>,
) -> Result<ClosePlan, CloseError> {
    let deal_value = check_closable(lead)?;
    if let Some(p) = product.filter(|p| p.company_id != partnership.company_id) {
        warn!(
            lead_id = lead.id,
            product_id = p.id,
            product_company_id = p.company_id,
            company_id = partnership.company_id,
            "product belongs to another company, using the company rate"
        );
    }
    let rates = settings.effective_rates(product);
    debug!(
        lead_id = lead.id,
        commission_rate = %rates.commission_rate,
        platform_fee_rate = %rates.platform_fee_rate,
        source = ?rates.source,
        "resolved effective rates"
    );
    let breakdown = CommissionCalculator::calculate_with(deal_value, &rates)?;
    let closed_on = closed_at.date_naive();

    let months = match (lead.contract_type, lead.contract_length_months) {
        (ContractType::Monthly, Some(n)) if n > 0 => Some(n),
        (ContractType::Monthly, length) => {
            warn!(
                lead_id = lead.id,
                ?length,
                "monthly contract without a usable length, closing as one-time"
            );
            None
        }
        (ContractType::OneTime, _) => None,
    };

    let (contract_type, billing_frequency, payout) = match months {
        Some(n) => (
            DealContractType::Recurring,
            Some(BillingFrequency::Monthly),
            DealPayout::Schedule(PayoutScheduleGenerator::generate(closed_on, n)?),
        ),
        None => (
            DealContractType::OneTime,
            None,
            DealPayout::Commission(NewCommission {
                affiliate_id: partnership.affiliate_id,
                company_id: partnership.company_id,
                commission_amount: breakdown.commission,
                platform_fee_amount: breakdown.platform_fee,
                affiliate_payout_amount: breakdown.affiliate_payout,
                commission_type: CommissionType::OneTime,
                status: CommissionStatus::initial(settings.auto_approve_commissions),
                expected_payout_date: PayoutScheduleGenerator::payout_due_date(
                    closed_on,
                    settings.payout_frequency_days,
                )?,
            }),
        ),
    };

    let deal = NewDeal {
        submission_id: lead.id,
        partnership_id: partnership.id,
        company_id: partnership.company_id,
        affiliate_id: partnership.affiliate_id,
        deal_value,
        contract_type,
        billing_frequency,
        contract_length_months: months,
        status: DealStatus::Active,
        closed_at,
    };

    Ok(ClosePlan {
        closed: NewClosedDeal { deal, payout },
        breakdown,
        rates,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseOutcome {
    Closed {
        deal: Deal,
        breakdown: CommissionBreakdown,
    },
    /// The lead had already been closed; nothing was written.
    AlreadyClosed(Deal),
}

impl CloseOutcome {
    pub fn deal(&self) -> &Deal {
        match self {
            Self::Closed { deal, .. } => deal,
            Self::AlreadyClosed(deal) => deal,
        }
    }
}

/// Moves leads through the pipeline and records deals when they close.
pub struct DealCloser<'a, R: AffiliateRepository + ?Sized> {
    repo: &'a R,
}

impl<'a, R: AffiliateRepository + ?Sized> DealCloser<'a, R> {
    pub fn new(repo: &'a R) -> Self {
        Self { repo }
    }

    /// Closes a lead, recording its deal and commission or payment schedule.
    ///
    /// Closing an already-closed lead returns its existing deal.
    pub async fn close_lead(
        &self,
        lead_id: i64,
        closed_at: DateTime<Utc>,
    ) -> Result<CloseOutcome, CloseError> {
        let lead = self.repo.get_lead(lead_id).await?;

        if lead.status == LeadStatus::Closed {
            if let Some(deal) = self.repo.find_deal_by_submission(lead.id).await? {
                warn!(lead_id, deal_id = deal.id, "lead already closed, returning its deal");
                return Ok(CloseOutcome::AlreadyClosed(deal));
            }
        }

        if let Err(e) = check_closable(&lead) {
            warn!(lead_id, error = %e, "close rejected");
            return Err(e);
        }

        let partnership = self.repo.get_partnership(lead.partnership_id).await?;
        let settings = SettingsResolver::new(self.repo)
            .resolve(partnership.company_id)
            .await?;
        let product = match lead.product_id {
            Some(id) => Some(self.repo.get_product(id).await?),
            None => None,
        };

        let plan = plan_close(&lead, &partnership, &settings, product.as_ref(), closed_at)?;
        let breakdown = plan.breakdown;

        match self.repo.record_closed_deal(plan.closed).await {
            Ok(deal) => {
                info!(
                    lead_id,
                    deal_id = deal.id,
                    deal_value = %deal.deal_value,
                    contract_type = deal.contract_type.as_str(),
                    commission = %breakdown.commission,
                    platform_fee = %breakdown.platform_fee,
                    affiliate_payout = %breakdown.affiliate_payout,
                    "lead closed"
                );
                Ok(CloseOutcome::Closed { deal, breakdown })
            }
            // Another close won the race for this lead.
            Err(RepositoryError::Conflict(reason)) => {
                let deal = self
                    .repo
                    .find_deal_by_submission(lead.id)
                    .await?
                    .ok_or(RepositoryError::Conflict(reason))?;
                warn!(lead_id, deal_id = deal.id, "concurrent close detected, returning its deal");
                Ok(CloseOutcome::AlreadyClosed(deal))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Moves a lead to any status except `closed`.
    pub async fn set_status(
        &self,
        lead_id: i64,
        status: LeadStatus,
    ) -> Result<ContactSubmission, CloseError> {
        if status == LeadStatus::Closed {
            return Err(CloseError::Validation(CLOSE_VIA_DEAL.to_string()));
        }

        let lead = self.repo.get_lead(lead_id).await?;
        lead.status.transition_to(status).inspect_err(|e| {
            warn!(lead_id, error = %e, "status change rejected");
        })?;

        self.repo.update_lead_status(lead_id, status).await?;
        Ok(self.repo.get_lead(lead_id).await?)
    }

    /// Records what the customer signed up for on an open lead.
    pub async fn record_contract_terms(
        &self,
        lead_id: i64,
        terms: ContractTerms,
    ) -> Result<ContactSubmission, CloseError> {
        if terms.contract_value < Decimal::ZERO {
            return Err(CloseError::Validation(NEGATIVE_CONTRACT_VALUE.to_string()));
        }

        let lead = self.repo.get_lead(lead_id).await?;
        if lead.status.is_terminal() {
            return Err(CloseError::Validation(TERMS_ON_FINISHED_LEAD.to_string()));
        }

        self.repo.update_contract_terms(lead_id, &terms).await?;
        Ok(self.repo.get_lead(lead_id).await?)
    }
}
