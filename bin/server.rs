// Sales Forecast - Web Server
// REST API with Axum serving chart-ready forecast and dashboard JSON

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sales_forecast::import::parse_timestamp;
use sales_forecast::{AppConfig, DashboardConfig, ForecastConfig, SalesAnalytics, SqliteStore};

/// Shared application state
#[derive(Clone)]
struct AppState {
    analytics: Arc<SalesAnalytics<SqliteStore>>,
    default_months: u32,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(data: T) -> Response {
        (
            StatusCode::OK,
            Json(ApiResponse {
                success: true,
                data: Some(data),
                error: None,
            }),
        )
            .into_response()
    }
}

fn error_response(status: StatusCode, message: String) -> Response {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(message),
        }),
    )
        .into_response()
}

#[derive(Debug, Deserialize)]
struct ForecastParams {
    months: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DashboardParams {
    as_of: Option<String>,
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    ApiResponse::ok("OK")
}

/// GET /api/forecast?months=N - Historical series + linear trend projection
async fn get_forecast(
    State(state): State<AppState>,
    Query(params): Query<ForecastParams>,
) -> Response {
    let horizon = match params.months.as_deref() {
        Some(raw) => match ForecastConfig::parse_horizon(raw) {
            Ok(h) => h,
            Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
        },
        None => state.default_months,
    };

    let analytics = state.analytics.clone();
    let result = tokio::task::spawn_blocking(move || analytics.forecast(horizon)).await;

    match result {
        Ok(Ok(outcome)) => ApiResponse::ok(outcome.to_response()),
        Ok(Err(e)) => {
            error!(error = %e, "Forecast failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
        Err(e) => {
            error!(error = %e, "Forecast task panicked");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "forecast task failed".to_string())
        }
    }
}

/// GET /api/dashboard?as_of=YYYY-MM-DD - KPIs, rankings, status breakdown
async fn get_dashboard(
    State(state): State<AppState>,
    Query(params): Query<DashboardParams>,
) -> Response {
    let as_of: NaiveDateTime = match params.as_of.as_deref() {
        Some(raw) => match parse_timestamp(raw) {
            Ok(ts) => ts,
            Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
        },
        None => Local::now().naive_local(),
    };

    let analytics = state.analytics.clone();
    let result = tokio::task::spawn_blocking(move || analytics.dashboard(as_of)).await;

    match result {
        Ok(Ok(payload)) => ApiResponse::ok(payload),
        Ok(Err(e)) => {
            error!(error = %e, "Dashboard failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
        Err(e) => {
            error!(error = %e, "Dashboard task panicked");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "dashboard task failed".to_string())
        }
    }
}

fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/forecast", get(get_forecast))
        .route("/dashboard", get(get_dashboard))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive())
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sales_forecast=info,forecast_server=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "sales-forecast.toml".to_string());
    let config = AppConfig::load(Path::new(&config_path))?;

    let store = SqliteStore::open(&config.database_path)?;
    info!(path = %config.database_path.display(), orders = store.count()?, "Database opened");

    let analytics = SalesAnalytics::new(store)
        .with_dashboard_config(DashboardConfig::from(&config.dashboard));
    let state = AppState {
        analytics: Arc::new(analytics),
        default_months: config.forecast.months_to_predict,
    };

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    info!(addr = %config.server.bind, "Server running");

    axum::serve(listener, build_router(state)).await?;
    Ok(())
}
