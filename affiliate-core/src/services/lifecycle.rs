//! Status changes on recorded deals and commissions.

use thiserror::Error;
use tracing::info;

use crate::db::repository::{AffiliateRepository, RepositoryError};
use crate::models::{Commission, CommissionStatus, Deal, DealStatus, TransitionError};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LifecycleError {
    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

pub async fn approve_commission<R: AffiliateRepository + ?Sized>(
    repo: &R,
    commission_id: i64,
) -> Result<Commission, LifecycleError> {
    move_commission(repo, commission_id, CommissionStatus::Approved).await
}

pub async fn mark_commission_paid<R: AffiliateRepository + ?Sized>(
    repo: &R,
    commission_id: i64,
) -> Result<Commission, LifecycleError> {
    move_commission(repo, commission_id, CommissionStatus::Paid).await
}

async fn move_commission<R: AffiliateRepository + ?Sized>(
    repo: &R,
    commission_id: i64,
    next: CommissionStatus,
) -> Result<Commission, LifecycleError> {
    let commission = repo.get_commission(commission_id).await?;
    let status = commission.status.transition_to(next)?;

    repo.update_commission_status(commission_id, status).await?;
    info!(commission_id, status = status.as_str(), "commission status changed");

    Ok(Commission {
        status,
        ..commission
    })
}

/// Cancels or completes an active deal.
pub async fn set_deal_status<R: AffiliateRepository + ?Sized>(
    repo: &R,
    deal_id: i64,
    next: DealStatus,
) -> Result<Deal, LifecycleError> {
    let deal = repo.get_deal(deal_id).await?;
    let status = deal.status.transition_to(next)?;

    repo.update_deal_status(deal_id, status).await?;
    info!(deal_id, status = status.as_str(), "deal status changed");

    Ok(Deal { status, ..deal })
}
