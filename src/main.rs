use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sales_forecast::import::parse_timestamp;
use sales_forecast::{
    generate_orders, load_csv, write_csv, AppConfig, DashboardConfig, ForecastConfig, RecordQuery,
    RecordSource, SalesAnalytics, SimulationConfig, SqliteStore,
};

/// Sales forecast & BI dashboard over an order database
#[derive(Parser, Debug)]
#[command(name = "sales-forecast", version, about)]
struct Args {
    /// Config file (TOML); defaults apply when missing
    #[arg(short, long, default_value = "sales-forecast.toml", global = true)]
    config: PathBuf,

    /// Database path (overrides config and SALES_FORECAST_DB)
    #[arg(long, global = true)]
    db: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import orders from a CSV file (one row per order line)
    Import { csv: PathBuf },

    /// Export every stored order to CSV
    Export { csv: PathBuf },

    /// Fill the database with a simulated order history
    Seed {
        #[arg(long, default_value_t = 12)]
        months: u32,
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },

    /// Print the revenue forecast as JSON
    Forecast {
        /// Months to predict (non-negative integer)
        #[arg(short, long)]
        months: Option<String>,
    },

    /// Print the dashboard payload as JSON
    Dashboard {
        /// Reference date for monthly/yearly KPIs (defaults to now)
        #[arg(long)]
        as_of: Option<String>,
    },
}

fn main() -> Result<()> {
    // Logs go to stderr so stdout stays valid JSON
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sales_forecast=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    let mut config = AppConfig::load(&args.config)?;
    config.apply_overrides(args.db.as_deref(), None)?;

    let store = SqliteStore::open(&config.database_path)?;

    match args.command {
        Command::Import { csv } => run_import(&store, &csv),
        Command::Export { csv } => run_export(&store, &csv),
        Command::Seed { months, seed } => run_seed(&store, months, seed),
        Command::Forecast { months } => {
            let horizon = match months {
                Some(raw) => ForecastConfig::parse_horizon(&raw)?,
                None => config.forecast.months_to_predict,
            };
            run_forecast(store, horizon)
        }
        Command::Dashboard { as_of } => {
            let as_of = match as_of {
                Some(raw) => parse_timestamp(&raw).context("Invalid --as-of")?,
                None => now(),
            };
            run_dashboard(store, DashboardConfig::from(&config.dashboard), as_of)
        }
    }
}

fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

fn run_import(store: &SqliteStore, csv: &Path) -> Result<()> {
    println!("📂 Loading CSV...");
    let records = load_csv(csv)?;
    println!("✓ Loaded {} orders from {}", records.len(), csv.display());

    println!("💾 Inserting orders...");
    let summary = store.insert(&records)?;
    println!("✓ Inserted: {} orders", summary.inserted);
    println!("✓ Skipped duplicates: {}", summary.duplicates);
    println!("✓ Database contains {} orders", store.count()?);
    Ok(())
}

fn run_export(store: &SqliteStore, csv: &Path) -> Result<()> {
    let records = store.fetch_records(&RecordQuery::all())?;
    write_csv(csv, &records)?;
    println!("✓ Exported {} orders to {}", records.len(), csv.display());
    Ok(())
}

fn run_seed(store: &SqliteStore, months: u32, seed: u64) -> Result<()> {
    println!("📊 Generating sales orders...");
    let config = SimulationConfig {
        months,
        seed,
        ..SimulationConfig::default()
    };
    let records = generate_orders(&config, now());
    let revenue: f64 = records.iter().map(|r| r.amount).sum();

    let summary = store.insert(&records)?;
    println!("✓ Simulated {} orders, ${:.2} revenue", records.len(), revenue);
    println!("✓ Inserted: {} (duplicates skipped: {})", summary.inserted, summary.duplicates);
    Ok(())
}

fn run_forecast(store: SqliteStore, horizon: u32) -> Result<()> {
    let analytics = SalesAnalytics::new(store);
    let outcome = analytics.forecast(horizon)?;
    println!("{}", serde_json::to_string_pretty(&outcome.to_response())?);
    Ok(())
}

fn run_dashboard(store: SqliteStore, config: DashboardConfig, as_of: NaiveDateTime) -> Result<()> {
    let analytics = SalesAnalytics::new(store).with_dashboard_config(config);
    let payload = analytics.dashboard(as_of)?;
    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}
