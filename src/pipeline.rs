// 🔗 Analytics Pipeline - Snapshot once, then compute
//
//   RecordSource ─┬─> TimeSeriesAggregator ─> TrendForecaster ─> ForecastChart
//                 └─> DashboardAggregator ────────────────────> DashboardPayload
//
// Each call fetches its own snapshot and never re-reads it, so a source
// mutated mid-call cannot produce a mixed view. Nothing here holds state
// between calls; forecast and dashboard can run concurrently.

use crate::dashboard::{DashboardAggregator, DashboardConfig, DashboardPayload};
use crate::error::AnalyticsError;
use crate::forecast::{ForecastChart, ForecastResult, LinearTrend, TrendForecaster};
use crate::record::{RecordQuery, RecordSource};
use crate::timeseries::TimeSeriesAggregator;
use anyhow::Result;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

// ============================================================================
// FORECAST OUTCOME
// ============================================================================

/// Discriminated forecast result.
///
/// `NoData` (zero qualifying orders) and `InsufficientData` (one month of
/// history) are normal states of a young system, not failures.
#[derive(Debug, Clone, PartialEq)]
pub enum ForecastOutcome {
    Ready(ForecastResult),
    NoData,
    InsufficientData { points: usize },
}

impl ForecastOutcome {
    pub fn is_ready(&self) -> bool {
        matches!(self, ForecastOutcome::Ready(_))
    }

    /// Wire shape: `{"status": "ready", labels, historical, predicted, trend}`
    /// or `{"status": "no_data" | "insufficient_data", "error": ...}`
    pub fn to_response(&self) -> ForecastResponse {
        match self {
            ForecastOutcome::Ready(result) => ForecastResponse::Ready {
                chart: result.to_chart(),
                trend: result.trend,
            },
            ForecastOutcome::NoData => ForecastResponse::NoData {
                error: AnalyticsError::NoData.to_string(),
            },
            ForecastOutcome::InsufficientData { points } => ForecastResponse::InsufficientData {
                points: *points,
                error: AnalyticsError::InsufficientData { points: *points }.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ForecastResponse {
    Ready {
        #[serde(flatten)]
        chart: ForecastChart,
        trend: LinearTrend,
    },
    NoData {
        error: String,
    },
    InsufficientData {
        points: usize,
        error: String,
    },
}

// ============================================================================
// SALES ANALYTICS
// ============================================================================

pub struct SalesAnalytics<S: RecordSource> {
    source: S,
    dashboard: DashboardConfig,
}

impl<S: RecordSource> SalesAnalytics<S> {
    pub fn new(source: S) -> Self {
        SalesAnalytics {
            source,
            dashboard: DashboardConfig::default(),
        }
    }

    pub fn with_dashboard_config(mut self, config: DashboardConfig) -> Self {
        self.dashboard = config;
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Monthly series + linear trend over qualifying orders.
    ///
    /// Errors only for source failures and contract violations; empty
    /// and one-month histories come back as outcomes.
    pub fn forecast(&self, horizon: u32) -> Result<ForecastOutcome> {
        let records = self.source.fetch_records(&RecordQuery::qualifying())?;
        debug!(records = records.len(), "Forecast snapshot");

        if records.is_empty() {
            info!("No qualifying orders, nothing to forecast");
            return Ok(ForecastOutcome::NoData);
        }

        let series = TimeSeriesAggregator::new().aggregate_qualifying(&records)?;
        if series.is_empty() {
            return Ok(ForecastOutcome::NoData);
        }

        match TrendForecaster::new().forecast(&series, horizon) {
            Ok(result) => {
                info!(
                    months = series.len(),
                    horizon,
                    slope = result.trend.slope,
                    r_squared = result.trend.r_squared,
                    "Forecast ready"
                );
                Ok(ForecastOutcome::Ready(result))
            }
            Err(AnalyticsError::InsufficientData { points }) => {
                info!(points, "Not enough history for a trend");
                Ok(ForecastOutcome::InsufficientData { points })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// KPIs, rankings and status breakdown as of `as_of`
    pub fn dashboard(&self, as_of: NaiveDateTime) -> Result<DashboardPayload> {
        // One snapshot; the qualifying subset is filtered in memory
        let all_records = self.source.fetch_records(&RecordQuery::all())?;
        debug!(records = all_records.len(), "Dashboard snapshot");

        let payload = DashboardAggregator::with_config(self.dashboard).summarize(
            &all_records,
            &all_records,
            as_of,
        )?;

        info!(
            orders = payload.kpis.total_order_count,
            customers = payload.kpis.unique_customer_count,
            "Dashboard ready"
        );
        Ok(payload)
    }
}
