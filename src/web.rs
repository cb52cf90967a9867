//! REST API over the pricing pipeline
//!
//! The four route families (public price check, seller submission, vendor
//! buy, vendor sell) are thin handlers over the one shared `PricingService`;
//! they differ only in the caller context they pass down.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::error::PricingError;
use crate::history;
use crate::index;
use crate::pipeline::{PricingOptions, PricingService};

/// Shared application state
#[derive(Clone)]
struct AppState {
    service: Arc<PricingService>,
}

/// API response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

#[derive(Deserialize)]
struct SearchParams {
    q: String,
    #[serde(default = "default_limit")]
    limit: usize,
}

#[derive(Deserialize)]
struct PriceCheckParams {
    q: String,
}

#[derive(Deserialize)]
struct QuoteRequest {
    query: String,
}

#[derive(Deserialize)]
struct MoversParams {
    date: Option<String>,
    #[serde(default = "default_limit")]
    limit: usize,
}

fn default_limit() -> usize {
    20
}

#[derive(Serialize)]
struct HealthStatus {
    status: &'static str,
    cards_indexed: i64,
    quota_remaining: u32,
}

/// Map a pipeline error onto the HTTP boundary. Quota exhaustion is the
/// one retryable condition and must surface as 429, never be swallowed.
fn error_response(e: PricingError) -> Response {
    match e {
        PricingError::QuotaExceeded { retry_after } => quota_response(retry_after),
        e => {
            log::error!("Request failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<()>::err("internal error")),
            )
                .into_response()
        }
    }
}

fn quota_response(retry_after: DateTime<Utc>) -> Response {
    let seconds = (retry_after - Utc::now()).num_seconds().max(0);
    let mut response = (
        StatusCode::TOO_MANY_REQUESTS,
        Json(ApiResponse::<()>::err(format!(
            "Daily pricing quota exceeded, retry after {}",
            retry_after.to_rfc3339()
        ))),
    )
        .into_response();
    if let Ok(value) = seconds.to_string().parse() {
        response.headers_mut().insert("Retry-After", value);
    }
    response
}

async fn run_pipeline(state: &AppState, query: &str, opts: PricingOptions) -> Response {
    match state.service.price_check(query, opts).await {
        Ok(result) => Json(ApiResponse::ok(result)).into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /api/health
async fn health_handler(State(state): State<AppState>) -> Response {
    let cards_indexed = {
        let conn = state.service.db();
        let conn = conn.lock().unwrap();
        index::card_count(&conn).unwrap_or(0)
    };
    Json(ApiResponse::ok(HealthStatus {
        status: "ok",
        cards_indexed,
        quota_remaining: state.service.quota_remaining(),
    }))
    .into_response()
}

/// GET /api/price-check?q={input} - public price check
async fn price_check_handler(
    State(state): State<AppState>,
    Query(params): Query<PriceCheckParams>,
) -> Response {
    run_pipeline(
        &state,
        &params.q,
        PricingOptions {
            include_graded: false,
            with_recommendation: false,
        },
    )
    .await
}

/// POST /api/submissions/quote - seller self-submission
async fn submission_quote_handler(
    State(state): State<AppState>,
    Json(req): Json<QuoteRequest>,
) -> Response {
    run_pipeline(
        &state,
        &req.query,
        PricingOptions {
            include_graded: true,
            with_recommendation: false,
        },
    )
    .await
}

/// POST /api/vendor/buy/quote - point-of-sale buy, with recommendation
async fn vendor_buy_handler(
    State(state): State<AppState>,
    Json(req): Json<QuoteRequest>,
) -> Response {
    run_pipeline(
        &state,
        &req.query,
        PricingOptions {
            include_graded: true,
            with_recommendation: true,
        },
    )
    .await
}

/// POST /api/vendor/sell/quote - point-of-sale sell at market
async fn vendor_sell_handler(
    State(state): State<AppState>,
    Json(req): Json<QuoteRequest>,
) -> Response {
    run_pipeline(
        &state,
        &req.query,
        PricingOptions {
            include_graded: false,
            with_recommendation: false,
        },
    )
    .await
}

/// GET /api/cards/search?q={query}&limit={limit}
async fn card_search_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Response {
    let conn = state.service.db();
    let conn = conn.lock().unwrap();
    match index::search_by_name(&conn, &params.q, params.limit) {
        Ok(results) => Json(ApiResponse::ok(results)).into_response(),
        Err(e) => {
            log::error!("Card search error: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<()>::err("internal error")),
            )
                .into_response()
        }
    }
}

/// GET /api/history/{set_id}/{number}
async fn history_handler(
    State(state): State<AppState>,
    Path((set_id, number)): Path<(String, String)>,
) -> Response {
    let conn = state.service.db();
    let conn = conn.lock().unwrap();
    match history::get_history(&conn, &set_id, &number) {
        Ok(points) if points.is_empty() => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::<()>::err("no history for card")),
        )
            .into_response(),
        Ok(points) => Json(ApiResponse::ok(points)).into_response(),
        Err(e) => {
            log::error!("History query error: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<()>::err("internal error")),
            )
                .into_response()
        }
    }
}

/// GET /api/movers?date={YYYY-MM-DD}&limit={limit}
async fn movers_handler(
    State(state): State<AppState>,
    Query(params): Query<MoversParams>,
) -> Response {
    let day = match &params.date {
        Some(raw) => match raw.parse::<NaiveDate>() {
            Ok(day) => day,
            Err(_) => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(ApiResponse::<()>::err("invalid date, expected YYYY-MM-DD")),
                )
                    .into_response()
            }
        },
        None => Utc::now().date_naive(),
    };

    let conn = state.service.db();
    let conn = conn.lock().unwrap();
    match history::top_movers(&conn, day, params.limit) {
        Ok(points) => Json(ApiResponse::ok(points)).into_response(),
        Err(e) => {
            log::error!("Movers query error: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<()>::err("internal error")),
            )
                .into_response()
        }
    }
}

fn router(service: Arc<PricingService>) -> Router {
    let state = AppState { service };
    Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/price-check", get(price_check_handler))
        .route("/api/cards/search", get(card_search_handler))
        .route("/api/submissions/quote", post(submission_quote_handler))
        .route("/api/vendor/buy/quote", post(vendor_buy_handler))
        .route("/api/vendor/sell/quote", post(vendor_sell_handler))
        .route("/api/history/{set_id}/{number}", get(history_handler))
        .route("/api/movers", get(movers_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the web server on the given port
pub async fn serve(service: Arc<PricingService>, port: u16) -> std::io::Result<()> {
    let app = router(service);
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    log::info!("Web server listening on {}", addr);
    axum::serve(listener, app).await
}
