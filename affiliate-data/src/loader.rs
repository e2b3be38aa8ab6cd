use std::io::Read;

use affiliate_core::services::{SettingsError, SettingsResolver, validate_settings};
use affiliate_core::{AffiliateRepository, CompanySettings, FeePayer, RepositoryError};
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

/// Errors that can occur when provisioning company settings from CSV.
#[derive(Debug, Error)]
pub enum SettingsLoaderError {
    #[error("CSV parse error: {0}")]
    CsvParse(String),

    #[error("Company {company_id}: unknown fee payer '{value}' (expected company or affiliate)")]
    InvalidFeePayer { company_id: i64, value: String },

    #[error("Company {company_id}: {source}")]
    InvalidSettings {
        company_id: i64,
        #[source]
        source: SettingsError,
    },

    #[error("Company {0} not found in database")]
    CompanyNotFound(i64),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<csv::Error> for SettingsLoaderError {
    fn from(err: csv::Error) -> Self {
        SettingsLoaderError::CsvParse(err.to_string())
    }
}

/// A single record from the company settings CSV file.
///
/// Only `company_id` is required. An empty cell keeps the platform default
/// for that column:
/// - `commission_rate`: percent of the deal value (default 10)
/// - `platform_fee_rate`: percent of the commission (default 20)
/// - `platform_fee_paid_by`: `company` or `affiliate` (default company)
/// - `payout_frequency_days`: days from close to payout (default 30)
/// - `auto_approve_commissions`: `true`/`false`, `yes`/`no` or `1`/`0`
///   (default false)
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct CompanySettingsRecord {
    pub company_id: i64,
    #[serde(default, deserialize_with = "deserialize_optional_decimal")]
    pub commission_rate: Option<Decimal>,
    #[serde(default, deserialize_with = "deserialize_optional_decimal")]
    pub platform_fee_rate: Option<Decimal>,
    #[serde(default, deserialize_with = "deserialize_optional_text")]
    pub platform_fee_paid_by: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_days")]
    pub payout_frequency_days: Option<i32>,
    #[serde(default, deserialize_with = "deserialize_optional_flag")]
    pub auto_approve_commissions: Option<bool>,
}

fn non_empty<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: Option<String> = Option::deserialize(deserializer)?;
    Ok(s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()))
}

fn deserialize_optional_decimal<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    non_empty(deserializer)?
        .map(|s| {
            s.parse::<Decimal>().map_err(|e| {
                serde::de::Error::custom(format!("invalid decimal '{}': {}", s, e))
            })
        })
        .transpose()
}

fn deserialize_optional_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    non_empty(deserializer)
}

fn deserialize_optional_days<'de, D>(deserializer: D) -> Result<Option<i32>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    non_empty(deserializer)?
        .map(|s| {
            s.parse::<i32>()
                .map_err(|e| serde::de::Error::custom(format!("invalid days '{}': {}", s, e)))
        })
        .transpose()
}

fn deserialize_optional_flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    non_empty(deserializer)?
        .map(|s| match s.to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Ok(true),
            "false" | "no" | "0" => Ok(false),
            _ => Err(serde::de::Error::custom(format!("invalid flag '{}'", s))),
        })
        .transpose()
}

impl CompanySettingsRecord {
    /// The company's defaults with every filled-in column applied on top.
    pub fn to_settings(&self) -> Result<CompanySettings, SettingsLoaderError> {
        let defaults = CompanySettings::defaults_for(self.company_id);

        let platform_fee_paid_by = match &self.platform_fee_paid_by {
            Some(value) => FeePayer::parse(&value.to_ascii_lowercase()).ok_or_else(|| {
                SettingsLoaderError::InvalidFeePayer {
                    company_id: self.company_id,
                    value: value.clone(),
                }
            })?,
            None => defaults.platform_fee_paid_by,
        };

        Ok(CompanySettings {
            company_id: self.company_id,
            commission_rate: self.commission_rate.unwrap_or(defaults.commission_rate),
            platform_fee_rate: self.platform_fee_rate.unwrap_or(defaults.platform_fee_rate),
            platform_fee_paid_by,
            payout_frequency_days: self
                .payout_frequency_days
                .unwrap_or(defaults.payout_frequency_days),
            auto_approve_commissions: self
                .auto_approve_commissions
                .unwrap_or(defaults.auto_approve_commissions),
        })
    }
}

/// Loader for per-company commission settings from CSV files.
///
/// Settings are written through the [`AffiliateRepository`] trait, so any
/// backend registered with the application can be provisioned.
pub struct CompanySettingsLoader;

impl CompanySettingsLoader {
    /// Parse settings records from a CSV reader.
    pub fn parse<R: Read>(reader: R) -> Result<Vec<CompanySettingsRecord>, SettingsLoaderError> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let mut records = Vec::new();

        for result in csv_reader.deserialize() {
            let record: CompanySettingsRecord = result?;
            records.push(record);
        }

        Ok(records)
    }

    /// Store each record as its company's settings, replacing what was there.
    ///
    /// Every record is validated before anything is written, so a bad row
    /// leaves the database untouched. Loading the same file twice gives the
    /// same result. Returns the number of companies provisioned.
    pub async fn load<R: AffiliateRepository + ?Sized>(
        repo: &R,
        records: &[CompanySettingsRecord],
    ) -> Result<usize, SettingsLoaderError> {
        let settings = records
            .iter()
            .map(|record| {
                let settings = record.to_settings()?;
                validate_settings(&settings).map_err(|source| {
                    SettingsLoaderError::InvalidSettings {
                        company_id: record.company_id,
                        source,
                    }
                })?;
                Ok(settings)
            })
            .collect::<Result<Vec<_>, SettingsLoaderError>>()?;

        for item in &settings {
            repo.get_company(item.company_id)
                .await
                .map_err(|e| match e {
                    RepositoryError::NotFound => {
                        SettingsLoaderError::CompanyNotFound(item.company_id)
                    }
                    other => SettingsLoaderError::Repository(other),
                })?;
        }

        let resolver = SettingsResolver::new(repo);
        for item in settings.iter().cloned() {
            let company_id = item.company_id;
            resolver.provision(item).await.map_err(|e| match e {
                SettingsError::Repository(inner) => SettingsLoaderError::Repository(inner),
                source => SettingsLoaderError::InvalidSettings { company_id, source },
            })?;
            debug!(company_id, "settings loaded");
        }

        Ok(settings.len())
    }
}
