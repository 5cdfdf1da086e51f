use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use premia_core::engine::{AnalysisReport, AnalysisResult, Analyzer};
use premia_core::error::AnalysisError;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = premia_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let config = settings.analysis_config()?;
    let provider = premia_core::market::from_settings(&settings)?;
    let metrics = premia_core::volatility::from_config(&config);
    tracing::info!(
        provider = provider.provider_name(),
        metrics = metrics.name(),
        risk_free_rate = config.risk_free_rate,
        "analyzer configured"
    );

    let state = AppState {
        analyzer: Arc::new(Analyzer::new(provider, metrics, config)),
    };

    let app = router(state);

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/analyze/:ticker", get(analyze_ticker))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Clone)]
struct AppState {
    analyzer: Arc<Analyzer>,
}

#[derive(Debug, Deserialize)]
struct AnalyzeParams {
    as_of_date: Option<String>,
}

async fn analyze_ticker(
    State(state): State<AppState>,
    Path(ticker): Path<String>,
    Query(params): Query<AnalyzeParams>,
) -> Result<(StatusCode, Json<AnalysisReport>), StatusCode> {
    let ticker =
        premia_core::domain::normalize_ticker(&ticker).map_err(|_| StatusCode::BAD_REQUEST)?;

    let as_of_date = match params.as_of_date.as_deref() {
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| StatusCode::BAD_REQUEST)?,
        None => chrono::Utc::now().date_naive(),
    };

    let report = state.analyzer.report(&ticker, as_of_date).await;
    let status = status_for(&report.result);
    if let AnalysisResult::Failed { error } = &report.result {
        sentry_anyhow::capture_anyhow(&anyhow::Error::new(error.clone()));
    }

    Ok((status, Json(report)))
}

fn status_for(result: &AnalysisResult) -> StatusCode {
    match result {
        AnalysisResult::Recommendation(_) | AnalysisResult::NoCandidate(_) => StatusCode::OK,
        AnalysisResult::Failed {
            error: AnalysisError::DataUnavailable { .. },
        } => StatusCode::BAD_GATEWAY,
        AnalysisResult::Failed {
            error: AnalysisError::UnexpectedFailure { .. },
        } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &premia_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use premia_core::engine::FilterDiagnostics;

    #[test]
    fn diagnostics_are_a_successful_response() {
        let result = AnalysisResult::NoCandidate(FilterDiagnostics {
            criteria: Vec::new(),
        });
        assert_eq!(status_for(&result), StatusCode::OK);
    }

    #[test]
    fn provider_failures_map_to_bad_gateway() {
        let result = AnalysisResult::Failed {
            error: AnalysisError::DataUnavailable {
                stage: "option_chain",
                detail: "timeout".to_string(),
            },
        };
        assert_eq!(status_for(&result), StatusCode::BAD_GATEWAY);

        let result = AnalysisResult::Failed {
            error: AnalysisError::UnexpectedFailure {
                detail: "boom".to_string(),
            },
        };
        assert_eq!(status_for(&result), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
