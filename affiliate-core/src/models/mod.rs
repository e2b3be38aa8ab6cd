mod commission;
mod company;
mod company_settings;
mod contact_submission;
mod deal;
mod lead_view;
mod partnership;
mod payment_period;
mod product;
mod transition;

pub use commission::{Commission, CommissionStatus, CommissionType, NewCommission};
pub use company::{Company, NewCompany};
pub use company_settings::{CompanySettings, EffectiveRates, FeePayer, RateSource};
pub use contact_submission::{
    ContactSubmission, ContractTerms, ContractType, LeadStatus, NewContactSubmission,
};
pub use deal::{
    BillingFrequency, Deal, DealContractType, DealPayout, DealStatus, NewClosedDeal, NewDeal,
};
pub use lead_view::{LeadView, LeadWithAffiliateView, LeadWithCompanyView, Viewer};
pub use partnership::{NewPartnership, Partnership, PartnershipStatus};
pub use payment_period::{DealPaymentPeriod, NewPaymentPeriod};
pub use product::{NewProduct, Product};
pub use transition::TransitionError;
