use std::path::PathBuf;

use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use affiliate_cli::app;
use affiliate_cli::config::AppConfig;
use affiliate_core::services::{
    SettingsResolver, approve_commission, lead_view, mark_commission_paid,
};
use affiliate_core::{AffiliateRepository, CompanySettings, Viewer};

// ─── CLI definition ──────────────────────────────────────────────────────────

/// Commission and deal-closing tools for the affiliate platform.
#[derive(Debug, Parser)]
#[command(name = "affiliate", version)]
struct Cli {
    /// TOML file with `[database]` and `log_filter` settings.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Database backend to use.
    #[arg(long, global = true)]
    backend: Option<String>,

    /// Database connection string.
    /// For SQLite this is a file path (e.g. `affiliate.db`) or `:memory:`.
    #[arg(long, global = true)]
    db: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Split a deal value into commission, platform fee and affiliate payout.
    Calculate {
        /// Deal value.
        #[arg(long)]
        value: Decimal,

        /// Commission rate in percent of the deal value.
        #[arg(long, default_value_t = CompanySettings::DEFAULT_COMMISSION_RATE)]
        commission_rate: Decimal,

        /// Platform fee rate in percent of the commission.
        #[arg(long, default_value_t = CompanySettings::DEFAULT_PLATFORM_FEE_RATE)]
        platform_fee_rate: Decimal,
    },

    /// Print the monthly payment dates of a recurring contract.
    Schedule {
        /// Close date (YYYY-MM-DD).
        #[arg(long)]
        start: NaiveDate,

        /// Contract length in months.
        #[arg(long)]
        months: i32,
    },

    /// Load company settings from a CSV file.
    Provision {
        #[arg(long)]
        file: PathBuf,
    },

    /// Show the settings a company's deals are calculated with.
    ShowSettings {
        #[arg(long)]
        company: i64,
    },

    /// Close a lead into a deal.
    CloseLead {
        #[arg(long)]
        lead: i64,

        /// Close timestamp (RFC 3339); defaults to now.
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },

    /// Show a lead as the company or the referring affiliate sees it.
    ShowLead {
        #[arg(long)]
        lead: i64,

        #[arg(long, conflicts_with = "affiliate", required_unless_present = "affiliate")]
        company: Option<i64>,

        #[arg(long)]
        affiliate: Option<i64>,
    },

    /// Approve a pending commission.
    ApproveCommission {
        #[arg(long)]
        id: i64,
    },

    /// Mark an approved commission as paid.
    PayCommission {
        #[arg(long)]
        id: i64,
    },
}

// ─── tracing ─────────────────────────────────────────────────────────────────

/// Initialise the tracing subscriber.
///
/// * Honours `RUST_LOG` when set, then the config file's `log_filter`.
/// * Falls back to `info` so normal runs are quiet.
/// * Strips timestamps and target names to keep CLI output clean.
fn init_tracing(fallback: Option<&str>) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::from(fallback.unwrap_or("info")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .without_time()
        .with_target(false)
        .init();
}

async fn open_repository(config: &AppConfig) -> anyhow::Result<Box<dyn AffiliateRepository>> {
    debug!("connecting to {} backend", config.database.backend);
    let registry = app::build_registry();
    registry
        .create(&config.database)
        .await
        .with_context(|| format!("Failed to open {}", config.database))
}

// ─── entry point ─────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    }
    .with_overrides(cli.backend, cli.db);

    init_tracing(config.log_filter.as_deref());

    match cli.command {
        Command::Calculate {
            value,
            commission_rate,
            platform_fee_rate,
        } => {
            println!("{}", app::calculate(value, commission_rate, platform_fee_rate)?);
        }
        Command::Schedule { start, months } => {
            println!("{}", app::schedule(start, months)?);
        }
        Command::Provision { file } => {
            let repo = open_repository(&config).await?;
            let loaded = app::provision(&*repo, &file).await?;
            println!("Provisioned settings for {} companies.", loaded);
        }
        Command::ShowSettings { company } => {
            let repo = open_repository(&config).await?;
            let settings = SettingsResolver::new(&*repo).resolve(company).await?;
            println!(
                "Company {}: commission {}%, platform fee {}% paid by {}, payout after {} days, auto-approve {}",
                settings.company_id,
                settings.commission_rate,
                settings.platform_fee_rate,
                settings.platform_fee_paid_by.as_str(),
                settings.payout_frequency_days,
                settings.auto_approve_commissions,
            );
        }
        Command::CloseLead { lead, at } => {
            let repo = open_repository(&config).await?;
            let outcome = app::close_lead(&*repo, lead, at.unwrap_or_else(Utc::now)).await?;
            println!("{}", app::describe_outcome(&outcome));
        }
        Command::ShowLead {
            lead,
            company,
            affiliate,
        } => {
            let viewer = match (company, affiliate) {
                (Some(id), _) => Viewer::Company(id),
                (None, Some(id)) => Viewer::Affiliate(id),
                (None, None) => anyhow::bail!("either --company or --affiliate is required"),
            };
            let repo = open_repository(&config).await?;
            let view = lead_view(&*repo, lead, viewer).await?;
            println!("{}", app::describe_lead_view(&view));
        }
        Command::ApproveCommission { id } => {
            let repo = open_repository(&config).await?;
            let commission = approve_commission(&*repo, id).await?;
            println!("Commission {} is {}", commission.id, commission.status.as_str());
        }
        Command::PayCommission { id } => {
            let repo = open_repository(&config).await?;
            let commission = mark_commission_paid(&*repo, id).await?;
            println!("Commission {} is {}", commission.id, commission.status.as_str());
        }
    }

    Ok(())
}
