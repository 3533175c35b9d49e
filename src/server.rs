//! HTTP API for the deskpulse agent.
//!
//! This module provides the JSON surface callers use to claim desks and
//! read ergonomics metrics:
//! - `POST /api/pair`, `/api/unpair`, `/api/book` mutate occupancy through
//!   the coordinator
//! - `GET /api/metrics/{user}` drives the pull-based sampling pipeline and
//!   returns the aggregated report
//! - `POST /api/admin/force-unpair` evicts a pairing, behind a bearer token
//!
//! Business rejections (conflict, not-found, validation, no identity) are
//! structured `success=false` responses; only store failures become 500s.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;

use crate::config::Config;
use crate::core::{
    analyze, recommended_heights, ErgonomicsReport, ScoreCalculator, TelemetrySampler,
};
use crate::occupancy::{OccupancyCoordinator, OccupancyError};
use crate::store::{Session, SessionStore, StoreError};
use crate::telemetry::TelemetrySource;

/// Shared server state.
pub struct ServerState {
    coordinator: OccupancyCoordinator,
    sampler: TelemetrySampler,
    calculator: ScoreCalculator,
    store: Arc<dyn SessionStore>,
    telemetry: Arc<dyn TelemetrySource>,
    config: Config,
}

impl ServerState {
    pub fn new(
        config: Config,
        store: Arc<dyn SessionStore>,
        telemetry: Arc<dyn TelemetrySource>,
    ) -> Self {
        Self {
            coordinator: OccupancyCoordinator::new(store.clone()),
            sampler: TelemetrySampler::new(
                store.clone(),
                telemetry.clone(),
                config.tick_seconds,
                config.default_height_mm,
            ),
            calculator: ScoreCalculator::new(config.score_config()),
            store,
            telemetry,
            config,
        }
    }
}

/// Envelope for occupancy operations.
#[derive(Debug, Serialize)]
pub struct ApiResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<Uuid>,
}

impl ApiResponse {
    fn ok(message: impl Into<String>, session_id: Uuid) -> Self {
        Self {
            success: true,
            message: message.into(),
            reason: None,
            session_id: Some(session_id),
        }
    }

    fn rejected(message: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            reason: Some(reason.into()),
            session_id: None,
        }
    }
}

/// Infrastructure-failure response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

type ApiResult = Result<(StatusCode, Json<ApiResponse>), (StatusCode, Json<ErrorResponse>)>;

fn store_failure(err: StoreError) -> (StatusCode, Json<ErrorResponse>) {
    tracing::error!("session store failure: {}", err);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: err.to_string(),
            code: "STORE_FAILURE".to_string(),
        }),
    )
}

/// Map a coordinator outcome into the wire envelope. Business outcomes are
/// 200s with `success=false`; an invalid booking window is a 400; store
/// loss is the only 500.
fn occupancy_result(
    result: Result<Session, OccupancyError>,
    ok_message: impl FnOnce(&Session) -> String,
) -> ApiResult {
    match result {
        Ok(session) => Ok((
            StatusCode::OK,
            Json(ApiResponse::ok(ok_message(&session), session.id())),
        )),
        Err(OccupancyError::Store(err)) => Err(store_failure(err)),
        Err(err @ OccupancyError::InvalidWindow) => Ok((
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::rejected(err.to_string(), err.reason())),
        )),
        Err(err) => Ok((
            StatusCode::OK,
            Json(ApiResponse::rejected(err.to_string(), err.reason())),
        )),
    }
}

fn not_logged_in() -> (StatusCode, Json<ApiResponse>) {
    (
        StatusCode::UNAUTHORIZED,
        Json(ApiResponse::rejected("Not logged in", "not_authenticated")),
    )
}

fn validation(message: impl Into<String>) -> (StatusCode, Json<ApiResponse>) {
    (
        StatusCode::BAD_REQUEST,
        Json(ApiResponse::rejected(message, "validation")),
    )
}

/// GET /health
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[derive(Debug, Deserialize)]
struct PairRequest {
    #[serde(default)]
    user_id: String,
    #[serde(default)]
    desk_id: String,
}

/// POST /api/pair
async fn pair(State(state): State<Arc<ServerState>>, Json(req): Json<PairRequest>) -> ApiResult {
    if req.user_id.is_empty() {
        return Ok(not_logged_in());
    }
    if req.desk_id.is_empty() {
        return Ok(validation("No desk selected"));
    }
    occupancy_result(
        state.coordinator.pair(&req.user_id, &req.desk_id, Utc::now()),
        |s| format!("Paired with desk {}", s.desk_id()),
    )
}

#[derive(Debug, Deserialize)]
struct UnpairRequest {
    #[serde(default)]
    user_id: String,
}

/// POST /api/unpair
async fn unpair(
    State(state): State<Arc<ServerState>>,
    Json(req): Json<UnpairRequest>,
) -> ApiResult {
    if req.user_id.is_empty() {
        return Ok(not_logged_in());
    }
    occupancy_result(state.coordinator.unpair(&req.user_id, Utc::now()), |s| {
        format!("Unpaired from desk {}", s.desk_id())
    })
}

#[derive(Debug, Deserialize)]
struct ForceUnpairRequest {
    #[serde(default)]
    desk_id: String,
}

/// POST /api/admin/force-unpair
///
/// The coordinator leaves privilege checks to its caller; this is that
/// caller. Requests without the configured bearer token are rejected.
async fn force_unpair(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Json(req): Json<ForceUnpairRequest>,
) -> ApiResult {
    let authorized = state.config.admin_enabled()
        && headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(|v| v == format!("Bearer {}", state.config.admin_token))
            .unwrap_or(false);
    if !authorized {
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse {
                error: "admin token required".to_string(),
                code: "UNAUTHORIZED".to_string(),
            }),
        ));
    }

    if req.desk_id.is_empty() {
        return Ok(validation("No desk selected"));
    }
    occupancy_result(
        state.coordinator.force_unpair(&req.desk_id, Utc::now()),
        |s| format!("Desk {} unpaired", s.desk_id()),
    )
}

#[derive(Debug, Deserialize)]
struct BookRequest {
    #[serde(default)]
    user_id: String,
    #[serde(default)]
    desk_id: String,
    #[serde(default)]
    start_time: String,
    #[serde(default)]
    end_time: String,
}

/// POST /api/book
async fn book(State(state): State<Arc<ServerState>>, Json(req): Json<BookRequest>) -> ApiResult {
    if req.user_id.is_empty() {
        return Ok(not_logged_in());
    }
    if req.desk_id.is_empty() || req.start_time.is_empty() || req.end_time.is_empty() {
        return Ok(validation("Missing parameters"));
    }

    // Reject unparseable timestamps before any mutation.
    let (start, end) = match (parse_rfc3339(&req.start_time), parse_rfc3339(&req.end_time)) {
        (Some(start), Some(end)) => (start, end),
        _ => return Ok(validation("Invalid datetime format")),
    };

    occupancy_result(
        state.coordinator.book(&req.user_id, &req.desk_id, start, end),
        |s| {
            format!(
                "Desk {} booked from {} to {}",
                s.desk_id(),
                start.to_rfc3339(),
                end.to_rfc3339()
            )
        },
    )
}

fn parse_rfc3339(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// Metrics payload: the aggregated report under the standard envelope.
#[derive(Debug, Serialize)]
pub struct MetricsResponse {
    pub success: bool,
    #[serde(flatten)]
    pub report: ErgonomicsReport,
}

/// GET /api/metrics/{user_id}
///
/// Drives the whole pipeline: opportunistically sample every active
/// session, reconstruct segments per session, aggregate. A user with no
/// active sessions gets the zeroed report.
async fn metrics(
    State(state): State<Arc<ServerState>>,
    Path(user_id): Path<String>,
) -> Result<Json<MetricsResponse>, (StatusCode, Json<ErrorResponse>)> {
    let now = Utc::now();
    // Reporting window: since midnight UTC of the current day.
    let window_start = now.with_time(NaiveTime::MIN).single().unwrap_or(now);

    let sessions = state
        .store
        .list_active_sessions(&user_id, window_start, now)
        .map_err(store_failure)?;

    let mut breakdowns = Vec::with_capacity(sessions.len());
    for session in sessions {
        state.sampler.sample(&session, now).map_err(store_failure)?;
        // Re-read so the breakdown sees the sample just appended.
        let session = state
            .store
            .get(session.id())
            .map_err(store_failure)?
            .unwrap_or(session);
        breakdowns.push(analyze(
            session.height_history(),
            session.elapsed_seconds(now),
            session.start_time(),
            state.config.threshold_mm,
        ));
    }

    let report = state.calculator.aggregate(&breakdowns, now);
    Ok(Json(MetricsResponse {
        success: true,
        report,
    }))
}

#[derive(Debug, Deserialize)]
struct DeskStatusQuery {
    #[serde(default)]
    user_id: String,
}

#[derive(Debug, Serialize)]
pub struct DeskStatusResponse {
    pub is_paired: bool,
    pub current_height_cm: Option<i32>,
    pub is_moving: bool,
}

/// GET /api/desks/{desk_id}/status
///
/// Whether the calling user is paired with this desk, plus live height and
/// motion. Telemetry loss degrades to nulls rather than failing.
async fn desk_status(
    State(state): State<Arc<ServerState>>,
    Path(desk_id): Path<String>,
    Query(query): Query<DeskStatusQuery>,
) -> Result<Json<DeskStatusResponse>, (StatusCode, Json<ErrorResponse>)> {
    let is_paired = !query.user_id.is_empty()
        && state
            .store
            .find_open_pairing_by_desk(&desk_id)
            .map_err(store_failure)?
            .map(|s| s.user_id() == query.user_id)
            .unwrap_or(false);

    let (current_height_cm, is_moving) = if is_paired {
        match state.telemetry.get_state(&desk_id) {
            Ok(telemetry) => (Some(telemetry.position_mm / 10), telemetry.is_moving()),
            Err(err) => {
                tracing::warn!("desk status for {} without telemetry: {}", desk_id, err);
                (None, false)
            }
        }
    } else {
        (None, false)
    };

    Ok(Json(DeskStatusResponse {
        is_paired,
        current_height_cm,
        is_moving,
    }))
}

#[derive(Debug, Deserialize)]
struct RecommendationQuery {
    height_cm: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct RecommendationResponse {
    pub success: bool,
    pub sit_cm: u32,
    pub stand_cm: u32,
}

/// GET /api/recommendations
async fn recommendations(
    Query(query): Query<RecommendationQuery>,
) -> Result<Json<RecommendationResponse>, (StatusCode, Json<ApiResponse>)> {
    let height_cm = match query.height_cm {
        Some(h) if (100..=250).contains(&h) => h,
        _ => return Err(validation("height_cm must be between 100 and 250")),
    };
    let rec = recommended_heights(height_cm);
    Ok(Json(RecommendationResponse {
        success: true,
        sit_cm: rec.sit_cm,
        stand_cm: rec.stand_cm,
    }))
}

fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/pair", post(pair))
        .route("/api/unpair", post(unpair))
        .route("/api/admin/force-unpair", post(force_unpair))
        .route("/api/book", post(book))
        .route("/api/metrics/:user_id", get(metrics))
        .route("/api/desks/:desk_id/status", get(desk_status))
        .route("/api/recommendations", get(recommendations))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Run the HTTP server.
pub async fn run(
    config: Config,
    store: Arc<dyn SessionStore>,
    telemetry: Arc<dyn TelemetrySource>,
) -> anyhow::Result<(SocketAddr, tokio::sync::oneshot::Sender<()>)> {
    let port = config.port;
    let state = Arc::new(ServerState::new(config, store, telemetry));
    let app = router(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    tracing::info!("deskpulse agent listening on http://{}", actual_addr);

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                tracing::info!("Server shutdown signal received");
            })
            .await
        {
            tracing::error!("Server error: {}", e);
        }
    });

    Ok((actual_addr, shutdown_tx))
}
