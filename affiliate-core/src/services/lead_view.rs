use crate::db::repository::{AffiliateRepository, RepositoryError};
use crate::models::{LeadView, LeadWithAffiliateView, LeadWithCompanyView, Viewer};

/// Loads a lead from one party's point of view.
///
/// Viewers outside the lead's partnership get [`RepositoryError::NotFound`]
/// rather than a hint that the lead exists.
pub async fn lead_view<R: AffiliateRepository + ?Sized>(
    repo: &R,
    lead_id: i64,
    viewer: Viewer,
) -> Result<LeadView, RepositoryError> {
    let lead = repo.get_lead(lead_id).await?;
    let partnership = repo.get_partnership(lead.partnership_id).await?;

    match viewer {
        Viewer::Company(company_id) if company_id == partnership.company_id => {
            Ok(LeadView::Company(LeadWithCompanyView {
                lead,
                affiliate_id: partnership.affiliate_id,
                tracking_code: partnership.tracking_code,
            }))
        }
        Viewer::Affiliate(affiliate_id) if affiliate_id == partnership.affiliate_id => {
            let company = repo.get_company(partnership.company_id).await?;
            Ok(LeadView::Affiliate(LeadWithAffiliateView {
                lead,
                company_id: company.id,
                company_name: company.name,
            }))
        }
        _ => Err(RepositoryError::NotFound),
    }
}
