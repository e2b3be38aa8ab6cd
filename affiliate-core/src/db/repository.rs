use async_trait::async_trait;
use thiserror::Error;

use crate::models::{
    Commission, CommissionStatus, Company, CompanySettings, ContactSubmission, ContractTerms,
    Deal, DealPaymentPeriod, DealStatus, LeadStatus, NewClosedDeal, NewCompany,
    NewContactSubmission, NewPartnership, NewProduct, Partnership, Product,
};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("Record not found")]
    NotFound,

    /// A uniqueness constraint rejected the write.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

#[async_trait]
pub trait AffiliateRepository: Send + Sync {
    // Companies
    /// Creates the company and provisions its default settings in one step.
    async fn create_company(
        &self,
        company: NewCompany,
    ) -> Result<Company, RepositoryError>;
    async fn get_company(
        &self,
        id: i64,
    ) -> Result<Company, RepositoryError>;

    // Company settings
    async fn get_company_settings(
        &self,
        company_id: i64,
    ) -> Result<Option<CompanySettings>, RepositoryError>;

    /// Inserts `defaults` unless the company already has a row, then returns
    /// whichever row is stored. Never produces a second row per company.
    async fn ensure_company_settings(
        &self,
        defaults: &CompanySettings,
    ) -> Result<CompanySettings, RepositoryError>;

    /// Inserts or replaces the company's row.
    async fn save_company_settings(
        &self,
        settings: &CompanySettings,
    ) -> Result<(), RepositoryError>;

    // Products
    async fn create_product(
        &self,
        product: NewProduct,
    ) -> Result<Product, RepositoryError>;
    async fn get_product(
        &self,
        id: i64,
    ) -> Result<Product, RepositoryError>;

    // Partnerships
    async fn create_partnership(
        &self,
        partnership: NewPartnership,
    ) -> Result<Partnership, RepositoryError>;
    async fn get_partnership(
        &self,
        id: i64,
    ) -> Result<Partnership, RepositoryError>;

    // Leads
    async fn create_lead(
        &self,
        lead: NewContactSubmission,
    ) -> Result<ContactSubmission, RepositoryError>;
    async fn get_lead(
        &self,
        id: i64,
    ) -> Result<ContactSubmission, RepositoryError>;
    async fn update_lead_status(
        &self,
        id: i64,
        status: LeadStatus,
    ) -> Result<(), RepositoryError>;
    async fn update_contract_terms(
        &self,
        id: i64,
        terms: &ContractTerms,
    ) -> Result<(), RepositoryError>;

    // Deals
    /// Writes the deal, its commission or payment periods, and moves the lead
    /// to `closed`, all or nothing. A second deal for the same lead fails with
    /// [`RepositoryError::Conflict`].
    async fn record_closed_deal(
        &self,
        closed: NewClosedDeal,
    ) -> Result<Deal, RepositoryError>;
    async fn get_deal(
        &self,
        id: i64,
    ) -> Result<Deal, RepositoryError>;
    async fn find_deal_by_submission(
        &self,
        submission_id: i64,
    ) -> Result<Option<Deal>, RepositoryError>;
    async fn list_deals(
        &self,
        company_id: Option<i64>,
    ) -> Result<Vec<Deal>, RepositoryError>;
    async fn update_deal_status(
        &self,
        id: i64,
        status: DealStatus,
    ) -> Result<(), RepositoryError>;

    // Commissions
    async fn get_commission(
        &self,
        id: i64,
    ) -> Result<Commission, RepositoryError>;
    async fn list_commissions_for_deal(
        &self,
        deal_id: i64,
    ) -> Result<Vec<Commission>, RepositoryError>;
    async fn update_commission_status(
        &self,
        id: i64,
        status: CommissionStatus,
    ) -> Result<(), RepositoryError>;

    // Payment periods
    async fn list_payment_periods(
        &self,
        deal_id: i64,
    ) -> Result<Vec<DealPaymentPeriod>, RepositoryError>;
}
