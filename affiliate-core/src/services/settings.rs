//! Company settings lookup, provisioning and updates.

use rust_decimal::Decimal;
use thiserror::Error;
use tracing::debug;

use crate::db::repository::{AffiliateRepository, RepositoryError};
use crate::models::CompanySettings;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("{field} must not be negative, got {value}")]
    NegativeRate { field: &'static str, value: Decimal },

    #[error("payout frequency must not be negative, got {0} days")]
    NegativePayoutFrequency(i32),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Rejects negative rates and payout periods. Rates above 100 are accepted.
pub fn validate_settings(settings: &CompanySettings) -> Result<(), SettingsError> {
    if settings.commission_rate < Decimal::ZERO {
        return Err(SettingsError::NegativeRate {
            field: "commission_rate",
            value: settings.commission_rate,
        });
    }
    if settings.platform_fee_rate < Decimal::ZERO {
        return Err(SettingsError::NegativeRate {
            field: "platform_fee_rate",
            value: settings.platform_fee_rate,
        });
    }
    if settings.payout_frequency_days < 0 {
        return Err(SettingsError::NegativePayoutFrequency(
            settings.payout_frequency_days,
        ));
    }
    Ok(())
}

/// Resolves the settings and rates that apply to a company's deals.
pub struct SettingsResolver<'a, R: AffiliateRepository + ?Sized> {
    repo: &'a R,
}

impl<'a, R: AffiliateRepository + ?Sized> SettingsResolver<'a, R> {
    pub fn new(repo: &'a R) -> Self {
        Self { repo }
    }

    /// Returns the company's settings, storing the defaults first if the
    /// company has none yet.
    pub async fn resolve(
        &self,
        company_id: i64,
    ) -> Result<CompanySettings, SettingsError> {
        if let Some(settings) = self.repo.get_company_settings(company_id).await? {
            return Ok(settings);
        }

        debug!(company_id, "no settings stored, provisioning defaults");
        let settings = self
            .repo
            .ensure_company_settings(&CompanySettings::defaults_for(company_id))
            .await?;
        Ok(settings)
    }

    /// Stores a complete settings row for a company, replacing any existing one.
    pub async fn provision(
        &self,
        settings: CompanySettings,
    ) -> Result<CompanySettings, SettingsError> {
        validate_settings(&settings)?;
        self.repo.save_company_settings(&settings).await?;
        debug!(company_id = settings.company_id, "company settings provisioned");
        Ok(settings)
    }

    /// Company-side update. The platform fee rate is kept as stored; only
    /// [`SettingsResolver::update_platform_fee`] changes it.
    pub async fn update(
        &self,
        settings: CompanySettings,
    ) -> Result<CompanySettings, SettingsError> {
        let current = self.resolve(settings.company_id).await?;
        let updated = CompanySettings {
            platform_fee_rate: current.platform_fee_rate,
            ..settings
        };

        validate_settings(&updated)?;
        self.repo.save_company_settings(&updated).await?;
        Ok(updated)
    }

    /// Platform-operator update of the fee rate.
    pub async fn update_platform_fee(
        &self,
        company_id: i64,
        platform_fee_rate: Decimal,
    ) -> Result<CompanySettings, SettingsError> {
        let updated = CompanySettings {
            platform_fee_rate,
            ..self.resolve(company_id).await?
        };

        validate_settings(&updated)?;
        self.repo.save_company_settings(&updated).await?;
        Ok(updated)
    }
}
