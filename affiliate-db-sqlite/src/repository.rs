use std::str::FromStr;

use affiliate_core::{
    AffiliateRepository, BillingFrequency, Commission, CommissionStatus, CommissionType, Company,
    CompanySettings, ContactSubmission, ContractTerms, ContractType, Deal, DealContractType,
    DealPaymentPeriod, DealPayout, DealStatus, FeePayer, LeadStatus, NewClosedDeal, NewCompany,
    NewContactSubmission, NewPartnership, NewProduct, Partnership, PartnershipStatus, Product,
    RepositoryError,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::query::Query;
use sqlx::sqlite::{
    Sqlite, SqliteArguments, SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow,
};
use sqlx::{Decode, Row, Type};
use tracing::debug;

use crate::decimal::{decimal_to_text, get_decimal, get_optional_decimal};

const DEAL_COLUMNS: &str = "id, submission_id, partnership_id, company_id, affiliate_id,
    deal_value, contract_type, billing_frequency, contract_length_months, status, closed_at";

const COMMISSION_COLUMNS: &str = "id, deal_id, affiliate_id, company_id, commission_amount,
    platform_fee_amount, affiliate_payout_amount, commission_type, status,
    expected_payout_date, created_at";

const LEAD_COLUMNS: &str = "id, partnership_id, product_id, name, email, phone, message,
    status, contract_value, contract_type, contract_length_months, created_at, updated_at";

pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    /// Opens `connection_string`, which is a file path (created if missing),
    /// a `sqlite:` URL, or `:memory:`.
    pub async fn new(connection_string: &str) -> Result<Self> {
        let in_memory = matches!(connection_string, ":memory:" | "sqlite::memory:");

        let options = if in_memory {
            SqliteConnectOptions::from_str("sqlite::memory:")?
        } else if connection_string.starts_with("sqlite:") {
            SqliteConnectOptions::from_str(connection_string)
                .with_context(|| format!("Invalid SQLite URL: {}", connection_string))?
                .create_if_missing(true)
        } else {
            SqliteConnectOptions::new()
                .filename(connection_string)
                .create_if_missing(true)
        };

        // An in-memory database lives only as long as its single connection.
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new()
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to connect to database: {}", connection_string))?;
        Ok(Self { pool })
    }

    pub async fn new_with_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("Failed to run database migrations")?;
        debug!("database migrations applied");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Maps constraint failures onto the repository's vocabulary: a unique
/// violation is a [`RepositoryError::Conflict`], a dangling reference is
/// [`RepositoryError::NotFound`].
fn db_err(e: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return RepositoryError::Conflict(db.message().to_string());
        }
        if db.is_foreign_key_violation() {
            return RepositoryError::NotFound;
        }
    }
    RepositoryError::Database(e.to_string())
}

fn column<'r, T>(
    row: &'r SqliteRow,
    name: &str,
) -> Result<T, RepositoryError>
where
    T: Decode<'r, Sqlite> + Type<Sqlite>,
{
    row.try_get(name)
        .map_err(|e| RepositoryError::Database(format!("Failed to get {}: {}", name, e)))
}

fn enum_column<T>(
    row: &SqliteRow,
    name: &str,
    parse: fn(&str) -> Option<T>,
) -> Result<T, RepositoryError> {
    let raw: String = column(row, name)?;
    parse(&raw).ok_or_else(|| RepositoryError::Database(format!("Invalid {}: {}", name, raw)))
}

fn settings_upsert<'q>(
    sql: &'q str,
    settings: &CompanySettings,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    sqlx::query(sql)
        .bind(settings.company_id)
        .bind(decimal_to_text(settings.commission_rate))
        .bind(decimal_to_text(settings.platform_fee_rate))
        .bind(settings.platform_fee_paid_by.as_str())
        .bind(settings.payout_frequency_days)
        .bind(settings.auto_approve_commissions)
}

const INSERT_SETTINGS_IF_ABSENT: &str = "INSERT INTO company_settings (
        company_id, commission_rate, platform_fee_rate, platform_fee_paid_by,
        payout_frequency_days, auto_approve_commissions
    ) VALUES (?, ?, ?, ?, ?, ?)
    ON CONFLICT (company_id) DO NOTHING";

const UPSERT_SETTINGS: &str = "INSERT INTO company_settings (
        company_id, commission_rate, platform_fee_rate, platform_fee_paid_by,
        payout_frequency_days, auto_approve_commissions
    ) VALUES (?, ?, ?, ?, ?, ?)
    ON CONFLICT (company_id) DO UPDATE SET
        commission_rate = excluded.commission_rate,
        platform_fee_rate = excluded.platform_fee_rate,
        platform_fee_paid_by = excluded.platform_fee_paid_by,
        payout_frequency_days = excluded.payout_frequency_days,
        auto_approve_commissions = excluded.auto_approve_commissions";

fn row_to_company(row: &SqliteRow) -> Result<Company, RepositoryError> {
    Ok(Company {
        id: column(row, "id")?,
        name: column(row, "name")?,
        created_at: column::<DateTime<Utc>>(row, "created_at")?,
    })
}

fn row_to_settings(row: &SqliteRow) -> Result<CompanySettings, RepositoryError> {
    Ok(CompanySettings {
        company_id: column(row, "company_id")?,
        commission_rate: get_decimal(row, "commission_rate")?,
        platform_fee_rate: get_decimal(row, "platform_fee_rate")?,
        platform_fee_paid_by: enum_column(row, "platform_fee_paid_by", FeePayer::parse)?,
        payout_frequency_days: column(row, "payout_frequency_days")?,
        auto_approve_commissions: column(row, "auto_approve_commissions")?,
    })
}

fn row_to_product(row: &SqliteRow) -> Result<Product, RepositoryError> {
    Ok(Product {
        id: column(row, "id")?,
        company_id: column(row, "company_id")?,
        name: column(row, "name")?,
        commission_rate: get_optional_decimal(row, "commission_rate")?,
    })
}

fn row_to_partnership(row: &SqliteRow) -> Result<Partnership, RepositoryError> {
    Ok(Partnership {
        id: column(row, "id")?,
        affiliate_id: column(row, "affiliate_id")?,
        company_id: column(row, "company_id")?,
        tracking_code: column(row, "tracking_code")?,
        status: enum_column(row, "status", PartnershipStatus::parse)?,
        created_at: column::<DateTime<Utc>>(row, "created_at")?,
    })
}

fn row_to_lead(row: &SqliteRow) -> Result<ContactSubmission, RepositoryError> {
    Ok(ContactSubmission {
        id: column(row, "id")?,
        partnership_id: column(row, "partnership_id")?,
        product_id: column(row, "product_id")?,
        name: column(row, "name")?,
        email: column(row, "email")?,
        phone: column(row, "phone")?,
        message: column(row, "message")?,
        status: enum_column(row, "status", LeadStatus::parse)?,
        contract_value: get_optional_decimal(row, "contract_value")?,
        contract_type: enum_column(row, "contract_type", ContractType::parse)?,
        contract_length_months: column(row, "contract_length_months")?,
        created_at: column::<DateTime<Utc>>(row, "created_at")?,
        updated_at: column::<DateTime<Utc>>(row, "updated_at")?,
    })
}

fn row_to_deal(row: &SqliteRow) -> Result<Deal, RepositoryError> {
    let billing_frequency = column::<Option<String>>(row, "billing_frequency")?
        .map(|raw| {
            BillingFrequency::parse(&raw).ok_or_else(|| {
                RepositoryError::Database(format!("Invalid billing_frequency: {}", raw))
            })
        })
        .transpose()?;

    Ok(Deal {
        id: column(row, "id")?,
        submission_id: column(row, "submission_id")?,
        partnership_id: column(row, "partnership_id")?,
        company_id: column(row, "company_id")?,
        affiliate_id: column(row, "affiliate_id")?,
        deal_value: get_decimal(row, "deal_value")?,
        contract_type: enum_column(row, "contract_type", DealContractType::parse)?,
        billing_frequency,
        contract_length_months: column(row, "contract_length_months")?,
        status: enum_column(row, "status", DealStatus::parse)?,
        closed_at: column::<DateTime<Utc>>(row, "closed_at")?,
    })
}

fn row_to_commission(row: &SqliteRow) -> Result<Commission, RepositoryError> {
    Ok(Commission {
        id: column(row, "id")?,
        deal_id: column(row, "deal_id")?,
        affiliate_id: column(row, "affiliate_id")?,
        company_id: column(row, "company_id")?,
        commission_amount: get_decimal(row, "commission_amount")?,
        platform_fee_amount: get_decimal(row, "platform_fee_amount")?,
        affiliate_payout_amount: get_decimal(row, "affiliate_payout_amount")?,
        commission_type: enum_column(row, "commission_type", CommissionType::parse)?,
        status: enum_column(row, "status", CommissionStatus::parse)?,
        expected_payout_date: column::<NaiveDate>(row, "expected_payout_date")?,
        created_at: column::<DateTime<Utc>>(row, "created_at")?,
    })
}

fn row_to_payment_period(row: &SqliteRow) -> Result<DealPaymentPeriod, RepositoryError> {
    Ok(DealPaymentPeriod {
        id: column(row, "id")?,
        deal_id: column(row, "deal_id")?,
        period_number: column(row, "period_number")?,
        expected_payment_date: column::<NaiveDate>(row, "expected_payment_date")?,
        payment_confirmed: column(row, "payment_confirmed")?,
    })
}

fn ensure_updated(rows_affected: u64) -> Result<(), RepositoryError> {
    if rows_affected == 0 {
        return Err(RepositoryError::NotFound);
    }
    Ok(())
}

#[async_trait]
impl AffiliateRepository for SqliteRepository {
    async fn create_company(
        &self,
        company: NewCompany,
    ) -> Result<Company, RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let id = sqlx::query("INSERT INTO companies (name, created_at) VALUES (?, ?)")
            .bind(&company.name)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await
            .map_err(db_err)?
            .last_insert_rowid();

        settings_upsert(INSERT_SETTINGS_IF_ABSENT, &CompanySettings::defaults_for(id))
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        self.get_company(id).await
    }

    async fn get_company(
        &self,
        id: i64,
    ) -> Result<Company, RepositoryError> {
        let row = sqlx::query("SELECT id, name, created_at FROM companies WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .ok_or(RepositoryError::NotFound)?;

        row_to_company(&row)
    }

    async fn get_company_settings(
        &self,
        company_id: i64,
    ) -> Result<Option<CompanySettings>, RepositoryError> {
        let row = sqlx::query(
            "SELECT company_id, commission_rate, platform_fee_rate, platform_fee_paid_by,
                    payout_frequency_days, auto_approve_commissions
             FROM company_settings WHERE company_id = ?",
        )
        .bind(company_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.as_ref().map(row_to_settings).transpose()
    }

    async fn ensure_company_settings(
        &self,
        defaults: &CompanySettings,
    ) -> Result<CompanySettings, RepositoryError> {
        settings_upsert(INSERT_SETTINGS_IF_ABSENT, defaults)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        self.get_company_settings(defaults.company_id)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    async fn save_company_settings(
        &self,
        settings: &CompanySettings,
    ) -> Result<(), RepositoryError> {
        settings_upsert(UPSERT_SETTINGS, settings)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn create_product(
        &self,
        product: NewProduct,
    ) -> Result<Product, RepositoryError> {
        let id = sqlx::query(
            "INSERT INTO products (company_id, name, commission_rate) VALUES (?, ?, ?)",
        )
        .bind(product.company_id)
        .bind(&product.name)
        .bind(product.commission_rate.map(decimal_to_text))
        .execute(&self.pool)
        .await
        .map_err(db_err)?
        .last_insert_rowid();

        self.get_product(id).await
    }

    async fn get_product(
        &self,
        id: i64,
    ) -> Result<Product, RepositoryError> {
        let row =
            sqlx::query("SELECT id, company_id, name, commission_rate FROM products WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?
                .ok_or(RepositoryError::NotFound)?;

        row_to_product(&row)
    }

    async fn create_partnership(
        &self,
        partnership: NewPartnership,
    ) -> Result<Partnership, RepositoryError> {
        let id = sqlx::query(
            "INSERT INTO affiliate_partnerships
                (affiliate_id, company_id, tracking_code, status, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(partnership.affiliate_id)
        .bind(partnership.company_id)
        .bind(&partnership.tracking_code)
        .bind(partnership.status.as_str())
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(db_err)?
        .last_insert_rowid();

        self.get_partnership(id).await
    }

    async fn get_partnership(
        &self,
        id: i64,
    ) -> Result<Partnership, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, affiliate_id, company_id, tracking_code, status, created_at
             FROM affiliate_partnerships WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?
        .ok_or(RepositoryError::NotFound)?;

        row_to_partnership(&row)
    }

    async fn create_lead(
        &self,
        lead: NewContactSubmission,
    ) -> Result<ContactSubmission, RepositoryError> {
        let now = Utc::now();

        let id = sqlx::query(
            "INSERT INTO contact_submissions (
                partnership_id, product_id, name, email, phone, message,
                status, contract_type, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(lead.partnership_id)
        .bind(lead.product_id)
        .bind(&lead.name)
        .bind(&lead.email)
        .bind(&lead.phone)
        .bind(&lead.message)
        .bind(LeadStatus::New.as_str())
        .bind(ContractType::OneTime.as_str())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(db_err)?
        .last_insert_rowid();

        self.get_lead(id).await
    }

    async fn get_lead(
        &self,
        id: i64,
    ) -> Result<ContactSubmission, RepositoryError> {
        let sql = format!("SELECT {LEAD_COLUMNS} FROM contact_submissions WHERE id = ?");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .ok_or(RepositoryError::NotFound)?;

        row_to_lead(&row)
    }

    async fn update_lead_status(
        &self,
        id: i64,
        status: LeadStatus,
    ) -> Result<(), RepositoryError> {
        let result =
            sqlx::query("UPDATE contact_submissions SET status = ?, updated_at = ? WHERE id = ?")
                .bind(status.as_str())
                .bind(Utc::now())
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(db_err)?;

        ensure_updated(result.rows_affected())
    }

    async fn update_contract_terms(
        &self,
        id: i64,
        terms: &ContractTerms,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE contact_submissions SET
                contract_value = ?, contract_type = ?, contract_length_months = ?,
                updated_at = ?
             WHERE id = ?",
        )
        .bind(decimal_to_text(terms.contract_value))
        .bind(terms.contract_type.as_str())
        .bind(terms.contract_length_months)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        ensure_updated(result.rows_affected())
    }

    async fn record_closed_deal(
        &self,
        closed: NewClosedDeal,
    ) -> Result<Deal, RepositoryError> {
        let NewClosedDeal { deal, payout } = closed;
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        // UNIQUE(submission_id) turns a second close into a Conflict here.
        let deal_id = sqlx::query(
            "INSERT INTO deals (
                submission_id, partnership_id, company_id, affiliate_id, deal_value,
                contract_type, billing_frequency, contract_length_months, status, closed_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(deal.submission_id)
        .bind(deal.partnership_id)
        .bind(deal.company_id)
        .bind(deal.affiliate_id)
        .bind(decimal_to_text(deal.deal_value))
        .bind(deal.contract_type.as_str())
        .bind(deal.billing_frequency.map(|f| f.as_str()))
        .bind(deal.contract_length_months)
        .bind(deal.status.as_str())
        .bind(deal.closed_at)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?
        .last_insert_rowid();

        match &payout {
            DealPayout::Commission(commission) => {
                sqlx::query(
                    "INSERT INTO commissions (
                        deal_id, affiliate_id, company_id, commission_amount,
                        platform_fee_amount, affiliate_payout_amount, commission_type,
                        status, expected_payout_date, created_at
                    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                )
                .bind(deal_id)
                .bind(commission.affiliate_id)
                .bind(commission.company_id)
                .bind(decimal_to_text(commission.commission_amount))
                .bind(decimal_to_text(commission.platform_fee_amount))
                .bind(decimal_to_text(commission.affiliate_payout_amount))
                .bind(commission.commission_type.as_str())
                .bind(commission.status.as_str())
                .bind(commission.expected_payout_date)
                .bind(Utc::now())
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
            }
            DealPayout::Schedule(periods) => {
                for period in periods {
                    sqlx::query(
                        "INSERT INTO deal_payment_periods (
                            deal_id, period_number, expected_payment_date, payment_confirmed
                        ) VALUES (?, ?, ?, ?)",
                    )
                    .bind(deal_id)
                    .bind(period.period_number)
                    .bind(period.expected_payment_date)
                    .bind(period.payment_confirmed)
                    .execute(&mut *tx)
                    .await
                    .map_err(db_err)?;
                }
            }
        }

        let result = sqlx::query(
            "UPDATE contact_submissions SET status = ?, updated_at = ?
             WHERE id = ? AND status NOT IN (?, ?)",
        )
        .bind(LeadStatus::Closed.as_str())
        .bind(Utc::now())
        .bind(deal.submission_id)
        .bind(LeadStatus::Closed.as_str())
        .bind(LeadStatus::NotInterested.as_str())
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;
        // The deal insert already proved the lead exists, so no row means it left the pipeline.
        if result.rows_affected() == 0 {
            return Err(RepositoryError::Conflict(format!(
                "lead {} is no longer open",
                deal.submission_id
            )));
        }

        tx.commit().await.map_err(db_err)?;

        debug!(
            deal_id,
            submission_id = deal.submission_id,
            contract_type = deal.contract_type.as_str(),
            "closed deal recorded"
        );
        self.get_deal(deal_id).await
    }

    async fn get_deal(
        &self,
        id: i64,
    ) -> Result<Deal, RepositoryError> {
        let sql = format!("SELECT {DEAL_COLUMNS} FROM deals WHERE id = ?");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .ok_or(RepositoryError::NotFound)?;

        row_to_deal(&row)
    }

    async fn find_deal_by_submission(
        &self,
        submission_id: i64,
    ) -> Result<Option<Deal>, RepositoryError> {
        let sql = format!("SELECT {DEAL_COLUMNS} FROM deals WHERE submission_id = ?");
        let row = sqlx::query(&sql)
            .bind(submission_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        row.as_ref().map(row_to_deal).transpose()
    }

    async fn list_deals(
        &self,
        company_id: Option<i64>,
    ) -> Result<Vec<Deal>, RepositoryError> {
        let rows = match company_id {
            Some(company_id) => {
                let sql = format!(
                    "SELECT {DEAL_COLUMNS} FROM deals WHERE company_id = ? ORDER BY closed_at, id"
                );
                sqlx::query(&sql)
                    .bind(company_id)
                    .fetch_all(&self.pool)
                    .await
            }
            None => {
                let sql = format!("SELECT {DEAL_COLUMNS} FROM deals ORDER BY closed_at, id");
                sqlx::query(&sql).fetch_all(&self.pool).await
            }
        }
        .map_err(db_err)?;

        rows.iter().map(row_to_deal).collect()
    }

    async fn update_deal_status(
        &self,
        id: i64,
        status: DealStatus,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE deals SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        ensure_updated(result.rows_affected())
    }

    async fn get_commission(
        &self,
        id: i64,
    ) -> Result<Commission, RepositoryError> {
        let sql = format!("SELECT {COMMISSION_COLUMNS} FROM commissions WHERE id = ?");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .ok_or(RepositoryError::NotFound)?;

        row_to_commission(&row)
    }

    async fn list_commissions_for_deal(
        &self,
        deal_id: i64,
    ) -> Result<Vec<Commission>, RepositoryError> {
        let sql =
            format!("SELECT {COMMISSION_COLUMNS} FROM commissions WHERE deal_id = ? ORDER BY id");
        let rows = sqlx::query(&sql)
            .bind(deal_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        rows.iter().map(row_to_commission).collect()
    }

    async fn update_commission_status(
        &self,
        id: i64,
        status: CommissionStatus,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE commissions SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        ensure_updated(result.rows_affected())
    }

    async fn list_payment_periods(
        &self,
        deal_id: i64,
    ) -> Result<Vec<DealPaymentPeriod>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, deal_id, period_number, expected_payment_date, payment_confirmed
             FROM deal_payment_periods WHERE deal_id = ? ORDER BY period_number",
        )
        .bind(deal_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter().map(row_to_payment_period).collect()
    }
}

#[cfg(test)]
mod tests {
    use affiliate_core::{NewCommission, NewDeal, NewPaymentPeriod};
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;

    async fn setup_test_db() -> SqliteRepository {
        let repo = SqliteRepository::new(":memory:")
            .await
            .expect("Failed to create in-memory database");
        repo.run_migrations()
            .await
            .expect("Failed to run migrations");
        repo
    }

    struct Fixture {
        company: Company,
        partnership: Partnership,
        lead: ContactSubmission,
    }

    async fn setup_fixture(repo: &SqliteRepository) -> Fixture {
        let company = repo
            .create_company(NewCompany {
                name: "Acme Hosting".to_string(),
            })
            .await
            .expect("Failed to create company");
        let partnership = repo
            .create_partnership(NewPartnership {
                affiliate_id: 77,
                company_id: company.id,
                tracking_code: "ACME-77".to_string(),
                status: PartnershipStatus::Approved,
            })
            .await
            .expect("Failed to create partnership");
        let lead = repo
            .create_lead(NewContactSubmission {
                partnership_id: partnership.id,
                product_id: None,
                name: "Dana Buyer".to_string(),
                email: "dana@example.com".to_string(),
                phone: None,
                message: Some("Interested in the annual plan".to_string()),
            })
            .await
            .expect("Failed to create lead");

        Fixture {
            company,
            partnership,
            lead,
        }
    }

    fn closed_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 9, 30, 0).unwrap()
    }

    fn new_deal(
        fx: &Fixture,
        contract_type: DealContractType,
    ) -> NewDeal {
        let recurring = contract_type == DealContractType::Recurring;
        NewDeal {
            submission_id: fx.lead.id,
            partnership_id: fx.partnership.id,
            company_id: fx.company.id,
            affiliate_id: fx.partnership.affiliate_id,
            deal_value: dec!(1000.00),
            contract_type,
            billing_frequency: recurring.then_some(BillingFrequency::Monthly),
            contract_length_months: recurring.then_some(3),
            status: DealStatus::Active,
            closed_at: closed_at(),
        }
    }

    fn one_time_close(fx: &Fixture) -> NewClosedDeal {
        NewClosedDeal {
            deal: new_deal(fx, DealContractType::OneTime),
            payout: DealPayout::Commission(NewCommission {
                affiliate_id: fx.partnership.affiliate_id,
                company_id: fx.company.id,
                commission_amount: dec!(100.00),
                platform_fee_amount: dec!(20.00),
                affiliate_payout_amount: dec!(80.00),
                commission_type: CommissionType::OneTime,
                status: CommissionStatus::Pending,
                expected_payout_date: NaiveDate::from_ymd_opt(2024, 2, 14).unwrap(),
            }),
        }
    }

    fn recurring_close(
        fx: &Fixture,
        periods: &[(i32, (i32, u32, u32))],
    ) -> NewClosedDeal {
        NewClosedDeal {
            deal: new_deal(fx, DealContractType::Recurring),
            payout: DealPayout::Schedule(
                periods
                    .iter()
                    .map(|&(period_number, (y, m, d))| NewPaymentPeriod {
                        period_number,
                        expected_payment_date: NaiveDate::from_ymd_opt(y, m, d).unwrap(),
                        payment_confirmed: false,
                    })
                    .collect(),
            ),
        }
    }

    #[tokio::test]
    async fn test_create_company_provisions_default_settings() {
        let repo = setup_test_db().await;

        let company = repo
            .create_company(NewCompany {
                name: "Globex".to_string(),
            })
            .await
            .expect("Should create company");

        let settings = repo
            .get_company_settings(company.id)
            .await
            .expect("Should query settings");
        assert_eq!(settings, Some(CompanySettings::defaults_for(company.id)));
    }

    #[tokio::test]
    async fn test_get_company_not_found() {
        let repo = setup_test_db().await;

        assert_eq!(repo.get_company(404).await, Err(RepositoryError::NotFound));
    }

    #[tokio::test]
    async fn test_ensure_company_settings_keeps_existing_row() {
        let repo = setup_test_db().await;
        let fx = setup_fixture(&repo).await;
        let custom = CompanySettings {
            commission_rate: dec!(12.5),
            auto_approve_commissions: true,
            ..CompanySettings::defaults_for(fx.company.id)
        };
        repo.save_company_settings(&custom)
            .await
            .expect("Should save settings");

        let ensured = repo
            .ensure_company_settings(&CompanySettings::defaults_for(fx.company.id))
            .await
            .expect("Should return stored settings");

        assert_eq!(ensured, custom);
    }

    #[tokio::test]
    async fn test_ensure_company_settings_inserts_when_missing() {
        let repo = setup_test_db().await;
        let fx = setup_fixture(&repo).await;
        sqlx::query("DELETE FROM company_settings")
            .execute(repo.pool())
            .await
            .expect("Failed to clear settings");

        let first = repo
            .ensure_company_settings(&CompanySettings::defaults_for(fx.company.id))
            .await
            .expect("Should insert defaults");
        let second = repo
            .ensure_company_settings(&CompanySettings::defaults_for(fx.company.id))
            .await
            .expect("Should read defaults");

        assert_eq!(first, second);
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM company_settings")
            .fetch_one(repo.pool())
            .await
            .expect("Failed to count settings");
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_ensure_company_settings_for_unknown_company() {
        let repo = setup_test_db().await;

        let result = repo
            .ensure_company_settings(&CompanySettings::defaults_for(999))
            .await;

        assert_eq!(result, Err(RepositoryError::NotFound));
    }

    #[tokio::test]
    async fn test_save_company_settings_replaces_row() {
        let repo = setup_test_db().await;
        let fx = setup_fixture(&repo).await;
        let updated = CompanySettings {
            platform_fee_rate: dec!(15),
            platform_fee_paid_by: FeePayer::Affiliate,
            payout_frequency_days: 14,
            ..CompanySettings::defaults_for(fx.company.id)
        };

        repo.save_company_settings(&updated)
            .await
            .expect("Should save settings");

        assert_eq!(
            repo.get_company_settings(fx.company.id).await,
            Ok(Some(updated))
        );
    }

    #[tokio::test]
    async fn test_product_commission_rate_is_optional() {
        let repo = setup_test_db().await;
        let fx = setup_fixture(&repo).await;

        let with_rate = repo
            .create_product(NewProduct {
                company_id: fx.company.id,
                name: "Enterprise".to_string(),
                commission_rate: Some(dec!(15)),
            })
            .await
            .expect("Should create product");
        let without_rate = repo
            .create_product(NewProduct {
                company_id: fx.company.id,
                name: "Starter".to_string(),
                commission_rate: None,
            })
            .await
            .expect("Should create product");

        assert_eq!(with_rate.commission_rate, Some(dec!(15)));
        assert_eq!(without_rate.commission_rate, None);
    }

    #[tokio::test]
    async fn test_duplicate_tracking_code_is_a_conflict() {
        let repo = setup_test_db().await;
        let fx = setup_fixture(&repo).await;

        let result = repo
            .create_partnership(NewPartnership {
                affiliate_id: 78,
                company_id: fx.company.id,
                tracking_code: fx.partnership.tracking_code.clone(),
                status: PartnershipStatus::Pending,
            })
            .await;

        assert!(matches!(result, Err(RepositoryError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_create_lead_defaults() {
        let repo = setup_test_db().await;
        let fx = setup_fixture(&repo).await;

        assert_eq!(fx.lead.status, LeadStatus::New);
        assert_eq!(fx.lead.contract_type, ContractType::OneTime);
        assert_eq!(fx.lead.contract_value, None);
        assert_eq!(fx.lead.contract_length_months, None);
        assert_eq!(fx.lead.message.as_deref(), Some("Interested in the annual plan"));
    }

    #[tokio::test]
    async fn test_create_lead_for_unknown_partnership() {
        let repo = setup_test_db().await;

        let result = repo
            .create_lead(NewContactSubmission {
                partnership_id: 999,
                product_id: None,
                name: "Nobody".to_string(),
                email: "nobody@example.com".to_string(),
                phone: None,
                message: None,
            })
            .await;

        assert_eq!(result, Err(RepositoryError::NotFound));
    }

    #[tokio::test]
    async fn test_update_contract_terms() {
        let repo = setup_test_db().await;
        let fx = setup_fixture(&repo).await;
        let terms = ContractTerms {
            contract_value: dec!(500.00),
            contract_type: ContractType::Monthly,
            contract_length_months: Some(12),
        };

        repo.update_contract_terms(fx.lead.id, &terms)
            .await
            .expect("Should update terms");

        let lead = repo.get_lead(fx.lead.id).await.expect("Should find lead");
        assert_eq!(lead.contract_value, Some(dec!(500.00)));
        assert_eq!(lead.contract_type, ContractType::Monthly);
        assert_eq!(lead.contract_length_months, Some(12));
    }

    #[tokio::test]
    async fn test_update_lead_status_not_found() {
        let repo = setup_test_db().await;

        let result = repo.update_lead_status(404, LeadStatus::Contacted).await;

        assert_eq!(result, Err(RepositoryError::NotFound));
    }

    #[tokio::test]
    async fn test_record_one_time_deal() {
        let repo = setup_test_db().await;
        let fx = setup_fixture(&repo).await;

        let deal = repo
            .record_closed_deal(one_time_close(&fx))
            .await
            .expect("Should record deal");

        assert_eq!(deal.submission_id, fx.lead.id);
        assert_eq!(deal.deal_value, dec!(1000.00));
        assert_eq!(deal.contract_type, DealContractType::OneTime);
        assert_eq!(deal.billing_frequency, None);
        assert_eq!(deal.status, DealStatus::Active);
        assert_eq!(deal.closed_at, closed_at());

        let commissions = repo
            .list_commissions_for_deal(deal.id)
            .await
            .expect("Should list commissions");
        assert_eq!(commissions.len(), 1);
        assert_eq!(commissions[0].commission_amount, dec!(100.00));
        assert_eq!(commissions[0].platform_fee_amount, dec!(20.00));
        assert_eq!(commissions[0].affiliate_payout_amount, dec!(80.00));
        assert_eq!(
            commissions[0].expected_payout_date,
            NaiveDate::from_ymd_opt(2024, 2, 14).unwrap()
        );

        assert_eq!(
            repo.list_payment_periods(deal.id).await,
            Ok(Vec::new())
        );
        let lead = repo.get_lead(fx.lead.id).await.expect("Should find lead");
        assert_eq!(lead.status, LeadStatus::Closed);
    }

    #[tokio::test]
    async fn test_record_recurring_deal() {
        let repo = setup_test_db().await;
        let fx = setup_fixture(&repo).await;

        let deal = repo
            .record_closed_deal(recurring_close(
                &fx,
                &[(1, (2024, 2, 15)), (2, (2024, 3, 15)), (3, (2024, 4, 15))],
            ))
            .await
            .expect("Should record deal");

        assert_eq!(deal.contract_type, DealContractType::Recurring);
        assert_eq!(deal.billing_frequency, Some(BillingFrequency::Monthly));
        assert_eq!(deal.contract_length_months, Some(3));

        let periods = repo
            .list_payment_periods(deal.id)
            .await
            .expect("Should list periods");
        let dates: Vec<_> = periods
            .iter()
            .map(|p| (p.period_number, p.expected_payment_date.to_string()))
            .collect();
        assert_eq!(
            dates,
            vec![
                (1, "2024-02-15".to_string()),
                (2, "2024-03-15".to_string()),
                (3, "2024-04-15".to_string()),
            ]
        );
        assert!(periods.iter().all(|p| !p.payment_confirmed));
        assert_eq!(
            repo.list_commissions_for_deal(deal.id).await,
            Ok(Vec::new())
        );
    }

    #[tokio::test]
    async fn test_second_deal_for_lead_is_a_conflict() {
        let repo = setup_test_db().await;
        let fx = setup_fixture(&repo).await;
        let first = repo
            .record_closed_deal(one_time_close(&fx))
            .await
            .expect("Should record deal");

        let second = repo.record_closed_deal(one_time_close(&fx)).await;

        assert!(matches!(second, Err(RepositoryError::Conflict(_))));
        assert_eq!(repo.list_deals(None).await.map(|d| d.len()), Ok(1));
        assert_eq!(
            repo.list_commissions_for_deal(first.id)
                .await
                .map(|c| c.len()),
            Ok(1)
        );
    }

    #[tokio::test]
    async fn test_failed_close_writes_nothing() {
        let repo = setup_test_db().await;
        let fx = setup_fixture(&repo).await;

        // Duplicate period numbers fail the last insert of the schedule.
        let result = repo
            .record_closed_deal(recurring_close(
                &fx,
                &[(1, (2024, 2, 15)), (1, (2024, 3, 15))],
            ))
            .await;

        assert!(matches!(result, Err(RepositoryError::Conflict(_))));
        assert_eq!(repo.find_deal_by_submission(fx.lead.id).await, Ok(None));
        let periods: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM deal_payment_periods")
            .fetch_one(repo.pool())
            .await
            .expect("Failed to count periods");
        assert_eq!(periods, 0);
        let lead = repo.get_lead(fx.lead.id).await.expect("Should find lead");
        assert_eq!(lead.status, LeadStatus::New);
    }

    #[tokio::test]
    async fn test_close_of_dropped_lead_rolls_back() {
        let repo = setup_test_db().await;
        let fx = setup_fixture(&repo).await;
        repo.update_lead_status(fx.lead.id, LeadStatus::NotInterested)
            .await
            .expect("Should drop lead");

        let result = repo.record_closed_deal(one_time_close(&fx)).await;

        assert!(matches!(result, Err(RepositoryError::Conflict(_))));
        assert_eq!(repo.find_deal_by_submission(fx.lead.id).await, Ok(None));
        let commissions: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM commissions")
            .fetch_one(repo.pool())
            .await
            .expect("Failed to count commissions");
        assert_eq!(commissions, 0);
        let lead = repo.get_lead(fx.lead.id).await.expect("Should find lead");
        assert_eq!(lead.status, LeadStatus::NotInterested);
    }

    #[tokio::test]
    async fn test_find_deal_by_submission() {
        let repo = setup_test_db().await;
        let fx = setup_fixture(&repo).await;
        assert_eq!(repo.find_deal_by_submission(fx.lead.id).await, Ok(None));

        let deal = repo
            .record_closed_deal(one_time_close(&fx))
            .await
            .expect("Should record deal");

        assert_eq!(
            repo.find_deal_by_submission(fx.lead.id).await,
            Ok(Some(deal))
        );
    }

    #[tokio::test]
    async fn test_list_deals_filters_by_company() {
        let repo = setup_test_db().await;
        let fx = setup_fixture(&repo).await;
        let deal = repo
            .record_closed_deal(one_time_close(&fx))
            .await
            .expect("Should record deal");

        assert_eq!(
            repo.list_deals(Some(fx.company.id)).await,
            Ok(vec![deal.clone()])
        );
        assert_eq!(repo.list_deals(Some(fx.company.id + 1)).await, Ok(Vec::new()));
        assert_eq!(repo.list_deals(None).await, Ok(vec![deal]));
    }

    #[tokio::test]
    async fn test_update_commission_and_deal_status() {
        let repo = setup_test_db().await;
        let fx = setup_fixture(&repo).await;
        let deal = repo
            .record_closed_deal(one_time_close(&fx))
            .await
            .expect("Should record deal");
        let commission_id = repo
            .list_commissions_for_deal(deal.id)
            .await
            .expect("Should list commissions")[0]
            .id;

        repo.update_commission_status(commission_id, CommissionStatus::Approved)
            .await
            .expect("Should update commission");
        repo.update_deal_status(deal.id, DealStatus::Completed)
            .await
            .expect("Should update deal");

        assert_eq!(
            repo.get_commission(commission_id).await.map(|c| c.status),
            Ok(CommissionStatus::Approved)
        );
        assert_eq!(
            repo.get_deal(deal.id).await.map(|d| d.status),
            Ok(DealStatus::Completed)
        );
        assert_eq!(
            repo.update_commission_status(404, CommissionStatus::Paid)
                .await,
            Err(RepositoryError::NotFound)
        );
    }
}
