// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::application::augmentation::ContextAugmentationService;
use crate::application::feedback::{FeedbackEvaluation, FeedbackEvaluator, FeedbackRequest};
use crate::application::healing::HealingOrchestrator;
use crate::application::interaction_recorder::{InteractionRecorder, InteractionReport};
use crate::application::session_manager::SessionContextManager;
use crate::domain::augmentation::{AugmentationRequest, AugmentedContext};
use crate::domain::context::ContextLevel;
use crate::domain::error::CoordinatorError;
use crate::domain::health::HealingStatistics;
use crate::infrastructure::resilience::{BreakerSnapshot, CircuitBreakerRegistry, CircuitState};

pub struct AppState {
    pub augmentation: Arc<ContextAugmentationService>,
    pub feedback: Arc<FeedbackEvaluator>,
    pub recorder: Arc<InteractionRecorder>,
    /// `None` when healing is disabled
    pub healing: Option<Arc<HealingOrchestrator>>,
    pub breakers: Arc<CircuitBreakerRegistry>,
    pub sessions: Arc<SessionContextManager>,
    pub start_time: Instant,
}

pub fn app(state: AppState, request_timeout: Duration) -> Router {
    Router::new()
        .route("/discovery", get(discovery_handler))
        .route("/context/augment", post(augment_handler))
        .route("/feedback/evaluate", post(feedback_handler))
        .route("/interactions/record", post(record_handler))
        .route("/healing/statistics", get(healing_statistics_handler))
        .route("/health", get(health_handler))
        .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, request_timeout))
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

/// [`CoordinatorError`] as an HTTP response
pub struct ApiError(pub CoordinatorError);

impl From<CoordinatorError> for ApiError {
    fn from(error: CoordinatorError) -> Self {
        Self(error)
    }
}

/// Malformed or out-of-range bodies are invalid input, like any other
/// validation failure
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(CoordinatorError::Configuration(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            CoordinatorError::ContextUnavailable(_) | CoordinatorError::DependencyUnavailable(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            CoordinatorError::Configuration(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(json!({
            "error": self.0.code(),
            "message": self.0.to_string(),
        }));
        (status, body).into_response()
    }
}

async fn discovery_handler() -> Json<serde_json::Value> {
    let levels: serde_json::Map<String, serde_json::Value> = [
        ContextLevel::Standard,
        ContextLevel::Detailed,
        ContextLevel::Comprehensive,
    ]
    .iter()
    .map(|level| (level.as_str().to_string(), json!(level.collections())))
    .collect();

    Json(json!({
        "service": "hybrid-coordinator",
        "version": env!("CARGO_PKG_VERSION"),
        "capabilities": [
            "context_augmentation",
            "feedback_evaluation",
            "interaction_recording",
            "self_healing",
        ],
        "context_levels": levels,
        "endpoints": [
            "GET /discovery",
            "POST /context/augment",
            "POST /feedback/evaluate",
            "POST /interactions/record",
            "GET /healing/statistics",
            "GET /health",
        ],
    }))
}

async fn augment_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<AugmentationRequest>, JsonRejection>,
) -> Result<Json<AugmentedContext>, ApiError> {
    let Json(request) = payload?;
    Ok(Json(state.augmentation.augment(request).await?))
}

async fn feedback_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<FeedbackRequest>, JsonRejection>,
) -> Result<Json<FeedbackEvaluation>, ApiError> {
    let Json(request) = payload?;
    Ok(Json(state.feedback.evaluate(&request).await?))
}

/// Accepts the report and records it in the background
async fn record_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<InteractionReport>, JsonRejection>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let Json(report) = payload?;
    report.validate()?;
    let session_id = report.session_id.clone();

    let recorder = state.recorder.clone();
    tokio::spawn(async move {
        let session_id = report.session_id.clone();
        match recorder.record(report).await {
            Ok(recorded) => info!(
                session_id = %session_id,
                composite = recorded.value_score.composite,
                promoted = recorded.promoted.is_some(),
                "Interaction recorded"
            ),
            Err(e) => warn!(session_id = %session_id, error = %e, "Failed to record interaction"),
        }
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "status": "accepted", "session_id": session_id })),
    ))
}

#[derive(Serialize)]
struct HealingStatisticsResponse {
    enabled: bool,
    #[serde(flatten)]
    statistics: HealingStatistics,
    circuit_breakers: Vec<BreakerSnapshot>,
}

async fn healing_statistics_handler(State(state): State<Arc<AppState>>) -> Json<HealingStatisticsResponse> {
    let statistics = match &state.healing {
        Some(healing) => healing.statistics(),
        None => HealingStatistics {
            services: Vec::new(),
            recent_actions: Vec::new(),
            total_actions: 0,
            skipped_remediations: 0,
        },
    };
    Json(HealingStatisticsResponse {
        enabled: state.healing.is_some(),
        statistics,
        circuit_breakers: state.breakers.snapshots(),
    })
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let open_circuits: Vec<String> = state
        .breakers
        .snapshots()
        .into_iter()
        .filter(|snapshot| snapshot.state == CircuitState::Open)
        .map(|snapshot| snapshot.dependency_id)
        .collect();

    Json(json!({
        "status": if open_circuits.is_empty() { "healthy" } else { "degraded" },
        "uptime_seconds": state.start_time.elapsed().as_secs(),
        "active_sessions": state.sessions.len(),
        "open_circuits": open_circuits,
    }))
}
