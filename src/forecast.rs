// 🔮 Trend Forecaster - Least-squares line over the monthly series
//
// Model: amount = slope * index + intercept, index = 0..k-1 in month order.
// Closed-form normal equations, no iterative solver.
//
// Predictions are NOT clamped at zero: a falling trend can forecast
// negative revenue. That is a known limitation of a linear model.

use crate::error::{AnalyticsError, AnalyticsResult};
use crate::period::YearMonth;
use crate::timeseries::MonthBucket;
use serde::{Deserialize, Serialize};

/// Default forecast horizon in months
pub const DEFAULT_MONTHS_TO_PREDICT: u32 = 6;

/// Upper bound on the forecast horizon (ten years)
pub const MAX_MONTHS_TO_PREDICT: u32 = 120;

// ============================================================================
// LINEAR TREND
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearTrend {
    pub slope: f64,
    pub intercept: f64,
    /// Coefficient of determination of the fit (1.0 = perfect)
    pub r_squared: f64,
}

impl LinearTrend {
    /// Fit y over x = 0..n-1. Needs at least two points.
    pub fn fit(values: &[f64]) -> AnalyticsResult<Self> {
        if values.len() <= 1 {
            return Err(AnalyticsError::InsufficientData {
                points: values.len(),
            });
        }

        let n = values.len() as f64;
        let (mut sum_x, mut sum_y, mut sum_xx, mut sum_xy) = (0.0, 0.0, 0.0, 0.0);
        for (i, &y) in values.iter().enumerate() {
            let x = i as f64;
            sum_x += x;
            sum_y += y;
            sum_xx += x * x;
            sum_xy += x * y;
        }

        // n >= 2 with distinct x values: denominator is strictly positive
        let slope = (n * sum_xy - sum_x * sum_y) / (n * sum_xx - sum_x * sum_x);
        let intercept = (sum_y - slope * sum_x) / n;

        let mean_y = sum_y / n;
        let (mut ss_tot, mut ss_res) = (0.0, 0.0);
        for (i, &y) in values.iter().enumerate() {
            let predicted = slope * i as f64 + intercept;
            ss_tot += (y - mean_y).powi(2);
            ss_res += (y - predicted).powi(2);
        }
        let r_squared = if ss_tot > 0.0 {
            (1.0 - ss_res / ss_tot).clamp(0.0, 1.0)
        } else {
            1.0
        };

        Ok(LinearTrend {
            slope,
            intercept,
            r_squared,
        })
    }

    pub fn predict(&self, index: usize) -> f64 {
        self.slope * index as f64 + self.intercept
    }
}

// ============================================================================
// FORECAST RESULT
// ============================================================================

/// Either an observed month or a projected one, never both
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum PointValue {
    Historical(f64),
    Predicted(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub period: YearMonth,
    pub value: PointValue,
}

impl ForecastPoint {
    pub fn historical_value(&self) -> Option<f64> {
        match self.value {
            PointValue::Historical(v) => Some(v),
            PointValue::Predicted(_) => None,
        }
    }

    pub fn predicted_value(&self) -> Option<f64> {
        match self.value {
            PointValue::Predicted(v) => Some(v),
            PointValue::Historical(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    pub trend: LinearTrend,
    /// Historical points first, then `horizon` predicted ones
    pub points: Vec<ForecastPoint>,
    pub historical_count: usize,
}

impl ForecastResult {
    pub fn predicted(&self) -> impl Iterator<Item = &ForecastPoint> {
        self.points.iter().skip(self.historical_count)
    }

    pub fn horizon(&self) -> usize {
        self.points.len() - self.historical_count
    }

    /// Index-aligned chart payload
    pub fn to_chart(&self) -> ForecastChart {
        ForecastChart {
            labels: self.points.iter().map(|p| p.period.label()).collect(),
            historical: self.points.iter().map(ForecastPoint::historical_value).collect(),
            predicted: self.points.iter().map(ForecastPoint::predicted_value).collect(),
        }
    }
}

/// Chart-ready forecast: the three vectors always have the same length.
/// Historical slots after the observed range and predicted slots inside it are null.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastChart {
    pub labels: Vec<String>,
    pub historical: Vec<Option<f64>>,
    pub predicted: Vec<Option<f64>>,
}

// ============================================================================
// TREND FORECASTER
// ============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct TrendForecaster;

impl TrendForecaster {
    pub fn new() -> Self {
        TrendForecaster
    }

    /// Fit a line over `series` (ascending by period) and project `horizon` months.
    ///
    /// `horizon` above [`MAX_MONTHS_TO_PREDICT`] is rejected before any work.
    pub fn forecast(&self, series: &[MonthBucket], horizon: u32) -> AnalyticsResult<ForecastResult> {
        if horizon > MAX_MONTHS_TO_PREDICT {
            return Err(AnalyticsError::InvalidConfiguration(format!(
                "months_to_predict must be at most {}, got {}",
                MAX_MONTHS_TO_PREDICT, horizon
            )));
        }

        let values: Vec<f64> = series.iter().map(|b| b.total_amount).collect();
        let trend = LinearTrend::fit(&values)?;

        let k = series.len();
        let mut points: Vec<ForecastPoint> = series
            .iter()
            .map(|bucket| ForecastPoint {
                period: bucket.period,
                value: PointValue::Historical(bucket.total_amount),
            })
            .collect();
        points.reserve(horizon as usize);

        // fit() guarantees k >= 2
        let mut period = series[k - 1].period;
        for step in 0..horizon as usize {
            period = period.next();
            points.push(ForecastPoint {
                period,
                value: PointValue::Predicted(trend.predict(k + step)),
            });
        }

        Ok(ForecastResult {
            trend,
            points,
            historical_count: k,
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================
