use serde::{Deserialize, Serialize};

use super::ContactSubmission;

/// Who is looking at a lead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Viewer {
    Company(i64),
    Affiliate(i64),
}

/// A lead as its owning company sees it: who referred it and through which link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadWithCompanyView {
    pub lead: ContactSubmission,
    pub affiliate_id: i64,
    pub tracking_code: String,
}

/// A lead as the referring affiliate sees it: which company is working it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadWithAffiliateView {
    pub lead: ContactSubmission,
    pub company_id: i64,
    pub company_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LeadView {
    Company(LeadWithCompanyView),
    Affiliate(LeadWithAffiliateView),
}

impl LeadView {
    pub fn lead(&self) -> &ContactSubmission {
        match self {
            Self::Company(view) => &view.lead,
            Self::Affiliate(view) => &view.lead,
        }
    }
}
