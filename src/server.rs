//! HTTP API over the retrieval core.
//!
//! Routes: `GET /` (welcome), `GET /health`, and `GET|POST /recommend`.
//! Embedding calls are blocking, so each query runs on the blocking pool under
//! a timeout taken from `embedding.timeout_secs`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::CourseFinderConfig;
use crate::error::RetrievalError;
use crate::recommend::{Recommendation, RetrievalService};

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<RetrievalService>,
    pub default_top_k: usize,
    pub query_timeout: Duration,
}

#[derive(Debug, Deserialize)]
pub struct RecommendRequest {
    pub query: String,
    pub top_k: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct RecommendResponse {
    pub results: Vec<Recommendation>,
}

/// Failure while answering a request.
#[derive(Debug)]
pub enum ApiError {
    Retrieval(RetrievalError),
    Timeout(Duration),
    Internal(String),
}

impl From<RetrievalError> for ApiError {
    fn from(err: RetrievalError) -> Self {
        Self::Retrieval(err)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Retrieval(err) => status_for(err),
            Self::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Retrieval(err) => err.kind(),
            Self::Timeout(_) => "embedding_service_error",
            Self::Internal(_) => "internal_error",
        }
    }

    fn message(&self) -> String {
        match self {
            Self::Retrieval(err) => err.to_string(),
            Self::Timeout(after) => format!("embedding request timed out after {after:?}"),
            Self::Internal(msg) => msg.clone(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(kind = self.kind(), error = %self.message(), "request failed");
        }
        let body = Json(json!({ "error": self.kind(), "message": self.message() }));
        (status, body).into_response()
    }
}

/// HTTP status for a retrieval error.
pub fn status_for(err: &RetrievalError) -> StatusCode {
    match err {
        RetrievalError::InvalidQuery(_) | RetrievalError::InvalidArgument(_) => {
            StatusCode::BAD_REQUEST
        }
        RetrievalError::EmbeddingService(_) | RetrievalError::DimensionMismatch { .. } => {
            StatusCode::BAD_GATEWAY
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/health", get(health))
        .route("/recommend", get(recommend_get).post(recommend_post))
        .with_state(state)
}

async fn home() -> Json<serde_json::Value> {
    Json(json!({ "message": "Welcome to the Course Recommendation API" }))
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let index = state.service.index();
    Json(json!({
        "status": "ok",
        "courses": state.service.catalog().len(),
        "dimensions": index.dim(),
        "model": index.model(),
    }))
}

async fn recommend_get(
    State(state): State<AppState>,
    Query(params): Query<RecommendRequest>,
) -> Result<Json<RecommendResponse>, ApiError> {
    run_recommend(state, params).await
}

async fn recommend_post(
    State(state): State<AppState>,
    Json(body): Json<RecommendRequest>,
) -> Result<Json<RecommendResponse>, ApiError> {
    run_recommend(state, body).await
}

async fn run_recommend(
    state: AppState,
    request: RecommendRequest,
) -> Result<Json<RecommendResponse>, ApiError> {
    let top_k = request.top_k.unwrap_or(state.default_top_k);
    let service = Arc::clone(&state.service);
    let query = request.query;

    let task = tokio::task::spawn_blocking(move || service.recommend_scored(&query, top_k));
    let results = tokio::time::timeout(state.query_timeout, task)
        .await
        .map_err(|_| ApiError::Timeout(state.query_timeout))?
        .map_err(|e| ApiError::Internal(format!("recommend task failed: {e}")))??;

    Ok(Json(RecommendResponse { results }))
}

/// Load the retrieval service and serve the HTTP API until ctrl-c.
pub async fn serve(config: CourseFinderConfig) -> Result<()> {
    let bind_addr = config.bind_addr();
    tracing::info!(addr = %bind_addr, "starting course recommendation API");

    let query_timeout = config.embedding.timeout();
    let default_top_k = config.retrieval.default_top_k.max(1);
    // Loading builds a blocking HTTP client, which must not happen on a runtime thread.
    let service =
        tokio::task::spawn_blocking(move || RetrievalService::open(&config)).await??;
    tracing::info!(
        courses = service.catalog().len(),
        dim = service.index().dim(),
        "retrieval service ready"
    );

    let state = AppState {
        service: Arc::new(service),
        default_top_k,
        query_timeout,
    };
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "listening at http://{bind_addr}/");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
            }
            tracing::info!("shutting down HTTP server");
        })
        .await?;

    Ok(())
}
