//! Integration tests for settings provisioning against the SQLite backend.

use affiliate_core::{AffiliateRepository, CompanySettings, FeePayer, NewCompany};
use affiliate_data::{CompanySettingsLoader, SettingsLoaderError};
use affiliate_db_sqlite::SqliteRepository;
use pretty_assertions::assert_eq;
use rust_decimal_macros::dec;
use sqlx::sqlite::SqlitePoolOptions;

const TEST_CSV: &str = include_str!("../test-data/company_settings.csv");

async fn setup_test_db_without_companies() -> SqliteRepository {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory database");

    let repo = SqliteRepository::new_with_pool(pool).await;
    repo.run_migrations()
        .await
        .expect("Failed to run migrations");

    repo
}

/// Companies 1 to 3, matching the ids in the test CSV.
async fn setup_test_db() -> SqliteRepository {
    let repo = setup_test_db_without_companies().await;

    for name in ["Acme", "Globex", "Initech"] {
        repo.create_company(NewCompany {
            name: name.to_string(),
        })
        .await
        .expect("Failed to create company");
    }

    repo
}

async fn settings_for(
    repo: &SqliteRepository,
    company_id: i64,
) -> CompanySettings {
    repo.get_company_settings(company_id)
        .await
        .expect("Failed to read settings")
        .expect("Settings should exist")
}

#[tokio::test]
async fn test_load_all_companies() {
    let repo = setup_test_db().await;

    let records = CompanySettingsLoader::parse(TEST_CSV.as_bytes()).expect("Failed to parse CSV");
    let loaded = CompanySettingsLoader::load(&repo, &records)
        .await
        .expect("Failed to load settings");

    assert_eq!(loaded, 3);
}

#[tokio::test]
async fn test_load_full_row() {
    let repo = setup_test_db().await;

    let records = CompanySettingsLoader::parse(TEST_CSV.as_bytes()).expect("Failed to parse CSV");
    CompanySettingsLoader::load(&repo, &records)
        .await
        .expect("Failed to load settings");

    assert_eq!(
        settings_for(&repo, 1).await,
        CompanySettings {
            company_id: 1,
            commission_rate: dec!(12.5),
            platform_fee_rate: dec!(20),
            platform_fee_paid_by: FeePayer::Company,
            payout_frequency_days: 30,
            auto_approve_commissions: false,
        }
    );
}

#[tokio::test]
async fn test_load_partial_rows_keep_defaults() {
    let repo = setup_test_db().await;

    let records = CompanySettingsLoader::parse(TEST_CSV.as_bytes()).expect("Failed to parse CSV");
    CompanySettingsLoader::load(&repo, &records)
        .await
        .expect("Failed to load settings");

    let globex = settings_for(&repo, 2).await;
    assert_eq!(globex.commission_rate, CompanySettings::DEFAULT_COMMISSION_RATE);
    assert_eq!(globex.platform_fee_rate, dec!(15));
    assert_eq!(globex.platform_fee_paid_by, FeePayer::Affiliate);
    assert_eq!(globex.payout_frequency_days, 14);
    assert!(globex.auto_approve_commissions);

    assert_eq!(
        settings_for(&repo, 3).await,
        CompanySettings {
            commission_rate: dec!(8),
            ..CompanySettings::defaults_for(3)
        }
    );
}

#[tokio::test]
async fn test_load_is_idempotent() {
    let repo = setup_test_db().await;
    let records = CompanySettingsLoader::parse(TEST_CSV.as_bytes()).expect("Failed to parse CSV");

    CompanySettingsLoader::load(&repo, &records)
        .await
        .expect("First load failed");
    let first = settings_for(&repo, 2).await;
    CompanySettingsLoader::load(&repo, &records)
        .await
        .expect("Second load failed");

    assert_eq!(settings_for(&repo, 2).await, first);
    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM company_settings")
        .fetch_one(repo.pool())
        .await
        .expect("Failed to count settings");
    assert_eq!(rows, 3);
}

#[tokio::test]
async fn test_load_replaces_existing_settings() {
    let repo = setup_test_db().await;
    let first = CompanySettingsLoader::parse(TEST_CSV.as_bytes()).expect("Failed to parse CSV");
    CompanySettingsLoader::load(&repo, &first)
        .await
        .expect("First load failed");

    let csv = "company_id,commission_rate,platform_fee_rate,platform_fee_paid_by,payout_frequency_days,auto_approve_commissions\n1,20,,,,";
    let second = CompanySettingsLoader::parse(csv.as_bytes()).expect("Failed to parse CSV");
    CompanySettingsLoader::load(&repo, &second)
        .await
        .expect("Second load failed");

    assert_eq!(
        settings_for(&repo, 1).await,
        CompanySettings {
            commission_rate: dec!(20),
            ..CompanySettings::defaults_for(1)
        }
    );
    // Untouched companies keep what the first file gave them.
    assert_eq!(settings_for(&repo, 3).await.commission_rate, dec!(8));
}

#[tokio::test]
async fn test_load_fails_for_unknown_company() {
    let repo = setup_test_db_without_companies().await;
    let records = CompanySettingsLoader::parse(TEST_CSV.as_bytes()).expect("Failed to parse CSV");

    let result = CompanySettingsLoader::load(&repo, &records).await;

    let err = result.expect_err("Should fail when companies are missing");
    assert!(
        matches!(err, SettingsLoaderError::CompanyNotFound(1)),
        "Expected CompanyNotFound(1), got: {:?}",
        err
    );
}

#[tokio::test]
async fn test_negative_rate_writes_nothing() {
    let repo = setup_test_db().await;
    let csv = "company_id,commission_rate,platform_fee_rate,platform_fee_paid_by,payout_frequency_days,auto_approve_commissions\n1,15,,,,\n2,-5,,,,";
    let records = CompanySettingsLoader::parse(csv.as_bytes()).expect("Failed to parse CSV");

    let err = CompanySettingsLoader::load(&repo, &records)
        .await
        .expect_err("Should reject the negative rate");

    assert!(
        matches!(err, SettingsLoaderError::InvalidSettings { company_id: 2, .. }),
        "Expected InvalidSettings for company 2, got: {:?}",
        err
    );
    assert_eq!(settings_for(&repo, 1).await, CompanySettings::defaults_for(1));
}
