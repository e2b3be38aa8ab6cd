use std::fs::File;
use std::path::PathBuf;

use affiliate_data::CompanySettingsLoader;
use affiliate_db_sqlite::SqliteRepository;
use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Load per-company commission settings from a CSV file into the database.
///
/// The CSV file should have the following columns, all but the first
/// optional (an empty cell keeps the default):
/// - company_id: The company to configure
/// - commission_rate: Percent of the deal value (default 10)
/// - platform_fee_rate: Percent of the commission (default 20)
/// - platform_fee_paid_by: company or affiliate (default company)
/// - payout_frequency_days: Days from close to payout (default 30)
/// - auto_approve_commissions: true or false (default false)
#[derive(Parser, Debug)]
#[command(name = "affiliate-settings-loader")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the CSV file containing company settings
    #[arg(short, long)]
    file: PathBuf,

    /// SQLite database path or URL; the file is created if missing
    #[arg(short, long, default_value = "affiliate.db")]
    database: String,

    /// Run database migrations before loading data
    #[arg(short, long, default_value_t = false)]
    migrate: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::from("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .without_time()
        .with_target(false)
        .init();

    let args = Args::parse();

    let repo = SqliteRepository::new(&args.database)
        .await
        .with_context(|| format!("Failed to connect to database: {}", args.database))?;

    if args.migrate {
        println!("Running migrations...");
        repo.run_migrations()
            .await
            .context("Failed to run migrations")?;
        println!("Migrations complete.");
    }

    println!("Loading company settings from: {}", args.file.display());

    let file = File::open(&args.file)
        .with_context(|| format!("Failed to open: {}", args.file.display()))?;

    let records = CompanySettingsLoader::parse(file)
        .with_context(|| format!("Failed to parse CSV: {}", args.file.display()))?;

    println!("Parsed {} records from CSV", records.len());

    let loaded = CompanySettingsLoader::load(&repo, &records)
        .await
        .context("Failed to load company settings into database")?;

    println!("Successfully provisioned settings for {} companies.", loaded);

    Ok(())
}
