// ⚙️ Configuration - TOML file + environment overrides
//
// Example `sales-forecast.toml`:
//
//   database_path = "sales.db"
//
//   [forecast]
//   months_to_predict = 6
//
//   [dashboard]
//   top_n = 10
//   chart_months = 12
//
//   [server]
//   bind = "0.0.0.0:3000"

use crate::dashboard::{DashboardConfig, DEFAULT_CHART_MONTHS, DEFAULT_TOP_N};
use crate::error::{AnalyticsError, AnalyticsResult};
use crate::forecast::{DEFAULT_MONTHS_TO_PREDICT, MAX_MONTHS_TO_PREDICT};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const ENV_DATABASE: &str = "SALES_FORECAST_DB";
pub const ENV_MONTHS: &str = "SALES_FORECAST_MONTHS";

// ============================================================================
// FORECAST OPTIONS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForecastConfig {
    #[serde(default = "default_months_to_predict")]
    pub months_to_predict: u32,
}

fn default_months_to_predict() -> u32 {
    DEFAULT_MONTHS_TO_PREDICT
}

impl Default for ForecastConfig {
    fn default() -> Self {
        ForecastConfig {
            months_to_predict: DEFAULT_MONTHS_TO_PREDICT,
        }
    }
}

impl ForecastConfig {
    /// Validate a raw horizon (CLI flag, query string, env var).
    ///
    /// Must be an integer in `0..=MAX_MONTHS_TO_PREDICT`; 0 means "history only".
    pub fn parse_horizon(raw: &str) -> AnalyticsResult<u32> {
        let trimmed = raw.trim();
        if trimmed.starts_with('-') {
            return Err(AnalyticsError::InvalidConfiguration(format!(
                "months_to_predict must be non-negative, got {}",
                trimmed
            )));
        }
        let horizon = trimmed.parse::<u32>().map_err(|_| {
            AnalyticsError::InvalidConfiguration(format!(
                "months_to_predict must be an integer, got {:?}",
                trimmed
            ))
        })?;
        Self::check_horizon(horizon)
    }

    pub fn check_horizon(horizon: u32) -> AnalyticsResult<u32> {
        if horizon > MAX_MONTHS_TO_PREDICT {
            return Err(AnalyticsError::InvalidConfiguration(format!(
                "months_to_predict must be at most {}, got {}",
                MAX_MONTHS_TO_PREDICT, horizon
            )));
        }
        Ok(horizon)
    }
}

// ============================================================================
// APPLICATION CONFIG
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardSection {
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    #[serde(default = "default_chart_months")]
    pub chart_months: usize,
}

fn default_top_n() -> usize {
    DEFAULT_TOP_N
}

fn default_chart_months() -> usize {
    DEFAULT_CHART_MONTHS
}

impl Default for DashboardSection {
    fn default() -> Self {
        DashboardSection {
            top_n: DEFAULT_TOP_N,
            chart_months: DEFAULT_CHART_MONTHS,
        }
    }
}

impl From<&DashboardSection> for DashboardConfig {
    fn from(section: &DashboardSection) -> Self {
        DashboardConfig {
            top_n: section.top_n,
            chart_months: section.chart_months,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_bind() -> String {
    "0.0.0.0:3000".to_string()
}

impl Default for ServerSection {
    fn default() -> Self {
        ServerSection {
            bind: default_bind(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
    #[serde(default)]
    pub forecast: ForecastConfig,
    #[serde(default)]
    pub dashboard: DashboardSection,
    #[serde(default)]
    pub server: ServerSection,
}

fn default_database_path() -> PathBuf {
    PathBuf::from("sales.db")
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            database_path: default_database_path(),
            forecast: ForecastConfig::default(),
            dashboard: DashboardSection::default(),
            server: ServerSection::default(),
        }
    }
}

impl AppConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(content).context("Failed to parse configuration")?;
        ForecastConfig::check_horizon(config.forecast.months_to_predict)?;
        Ok(config)
    }

    /// Load from `path` if it exists (defaults otherwise), then apply env overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            Self::from_toml_str(&content)
                .with_context(|| format!("Invalid config file {}", path.display()))?
        } else {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            AppConfig::default()
        };

        config.apply_overrides(
            std::env::var(ENV_DATABASE).ok().as_deref(),
            std::env::var(ENV_MONTHS).ok().as_deref(),
        )?;
        Ok(config)
    }

    /// Apply optional database path / horizon overrides (env vars, CLI flags)
    pub fn apply_overrides(&mut self, database: Option<&str>, months: Option<&str>) -> Result<()> {
        if let Some(db) = database {
            self.database_path = PathBuf::from(db);
        }
        if let Some(raw) = months {
            self.forecast.months_to_predict = ForecastConfig::parse_horizon(raw)?;
        }
        Ok(())
    }
}
