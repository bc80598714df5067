// Sales Forecast - Core Library
// Monthly revenue series, linear trend forecast and BI dashboard aggregates.
// Shared by the CLI and the API server.

pub mod error;
pub mod period;
pub mod record;
pub mod timeseries;
pub mod forecast;
pub mod dashboard;
pub mod pipeline;
pub mod config;
pub mod db;
pub mod import;
pub mod simulate;

// Re-export commonly used types
pub use error::{AnalyticsError, AnalyticsResult};
pub use period::YearMonth;
pub use record::{
    InMemorySource, LineItem, OrderStatus, RecordQuery, RecordSource, TransactionRecord,
    UNKNOWN_NAME,
};
pub use timeseries::{MonthBucket, StableSum, TimeSeriesAggregator};
pub use forecast::{
    ForecastChart, ForecastPoint, ForecastResult, LinearTrend, PointValue, TrendForecaster,
    DEFAULT_MONTHS_TO_PREDICT, MAX_MONTHS_TO_PREDICT,
};
pub use dashboard::{
    CustomerRanking, DashboardAggregator, DashboardConfig, DashboardPayload, KpiReport,
    ProductRanking, RankedEntity, RevenueChart, StatusCount,
};
pub use pipeline::{ForecastOutcome, ForecastResponse, SalesAnalytics};
pub use config::{AppConfig, ForecastConfig};
pub use db::{
    count_records, fetch_records, insert_records, setup_database, ImportSummary, SqliteStore,
};
pub use import::{load_csv, write_csv};
pub use simulate::{generate_orders, SimulationConfig};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
