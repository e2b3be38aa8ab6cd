use std::fmt;
use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use tracing::debug;

use affiliate_core::calculations::{
    CommissionBreakdown, CommissionCalculator, CommissionError, PayoutScheduleError,
    PayoutScheduleGenerator,
};
use affiliate_core::db::RepositoryRegistry;
use affiliate_core::services::{CloseError, CloseOutcome, DealCloser};
use affiliate_core::{AffiliateRepository, LeadView, NewPaymentPeriod};
use affiliate_data::CompanySettingsLoader;
use affiliate_db_sqlite::SqliteRepositoryFactory;

/// Every backend this binary can open.
pub fn build_registry() -> RepositoryRegistry {
    RepositoryRegistry::new().with_factory(Box::new(SqliteRepositoryFactory))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalculationReport {
    pub deal_value: Decimal,
    pub commission_rate: Decimal,
    pub platform_fee_rate: Decimal,
    pub breakdown: CommissionBreakdown,
}

impl fmt::Display for CalculationReport {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        writeln!(f, "Deal value:        {:.2}", self.deal_value)?;
        writeln!(
            f,
            "Commission:        {:.2} ({}% of deal)",
            self.breakdown.commission, self.commission_rate
        )?;
        writeln!(
            f,
            "Platform fee:      {:.2} ({}% of commission)",
            self.breakdown.platform_fee, self.platform_fee_rate
        )?;
        write!(f, "Affiliate payout:  {:.2}", self.breakdown.affiliate_payout)
    }
}

pub fn calculate(
    deal_value: Decimal,
    commission_rate: Decimal,
    platform_fee_rate: Decimal,
) -> Result<CalculationReport, CommissionError> {
    let breakdown = CommissionCalculator::calculate(deal_value, commission_rate, platform_fee_rate)?;
    Ok(CalculationReport {
        deal_value,
        commission_rate,
        platform_fee_rate,
        breakdown,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleReport(pub Vec<NewPaymentPeriod>);

impl fmt::Display for ScheduleReport {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let lines: Vec<String> = self
            .0
            .iter()
            .map(|p| format!("Period {:>3}: {}", p.period_number, p.expected_payment_date))
            .collect();
        write!(f, "{}", lines.join("\n"))
    }
}

pub fn schedule(
    start: NaiveDate,
    months: i32,
) -> Result<ScheduleReport, PayoutScheduleError> {
    PayoutScheduleGenerator::generate(start, months).map(ScheduleReport)
}

/// Parses `path` and provisions every company in it. Returns the count.
pub async fn provision(
    repo: &dyn AffiliateRepository,
    path: &Path,
) -> Result<usize> {
    let file =
        File::open(path).with_context(|| format!("Failed to open: {}", path.display()))?;
    let records = CompanySettingsLoader::parse(file)
        .with_context(|| format!("Failed to parse CSV: {}", path.display()))?;
    debug!(records = records.len(), "parsed settings file");

    CompanySettingsLoader::load(repo, &records)
        .await
        .context("Failed to load company settings")
}

pub async fn close_lead(
    repo: &dyn AffiliateRepository,
    lead_id: i64,
    closed_at: DateTime<Utc>,
) -> Result<CloseOutcome, CloseError> {
    DealCloser::new(repo).close_lead(lead_id, closed_at).await
}

pub fn describe_outcome(outcome: &CloseOutcome) -> String {
    match outcome {
        CloseOutcome::Closed { deal, breakdown } => format!(
            "Closed lead {} as {} deal {} worth {:.2}\nCommission {:.2}, platform fee {:.2}, affiliate payout {:.2}",
            deal.submission_id,
            deal.contract_type.as_str(),
            deal.id,
            deal.deal_value,
            breakdown.commission,
            breakdown.platform_fee,
            breakdown.affiliate_payout,
        ),
        CloseOutcome::AlreadyClosed(deal) => format!(
            "Lead {} was already closed as deal {} on {}",
            deal.submission_id,
            deal.id,
            deal.closed_at.date_naive(),
        ),
    }
}

pub fn describe_lead_view(view: &LeadView) -> String {
    let lead = view.lead();
    let party = match view {
        LeadView::Company(v) => format!(
            "Referred by affiliate {} via {}",
            v.affiliate_id, v.tracking_code
        ),
        LeadView::Affiliate(v) => {
            format!("Handled by {} (company {})", v.company_name, v.company_id)
        }
    };
    let value = lead
        .contract_value
        .map(|v| format!("{:.2}", v))
        .unwrap_or_else(|| "not set".to_string());

    format!(
        "Lead {}: {} <{}>\nStatus: {}\nContract: {} {}\n{}",
        lead.id,
        lead.name,
        lead.email,
        lead.status.as_str(),
        lead.contract_type.as_str(),
        value,
        party,
    )
}
