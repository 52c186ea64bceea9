use std::{any::Any, sync::Arc, time::Duration};

use axum::{
    Json, Router,
    body::Body,
    extract::{
        Path, State,
        rejection::{JsonRejection, PathRejection},
    },
    http::{HeaderName, Method, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use ctfvm_catalog::ArtifactInfo;
use ctfvm_model::{ChallengeId, TeamId, WorkloadInfo, WorkloadStatus};
use ctfvm_prometheus::{Encoder, PrometheusMetrics, TextEncoder};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio_util::io::ReaderStream;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowOrigin, CorsLayer},
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug};

use crate::{error::ApiError, handler::ApiHandler};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const CORS_MAX_AGE: Duration = Duration::from_secs(300);

/// HTTP API service builder.
pub struct HttpApi<H> {
    handler: Arc<H>,
    metrics: Option<PrometheusMetrics>,
}

struct AppState<H> {
    handler: Arc<H>,
    metrics: Option<PrometheusMetrics>,
}

impl<H> Clone for AppState<H> {
    fn clone(&self) -> Self {
        Self {
            handler: Arc::clone(&self.handler),
            metrics: self.metrics.clone(),
        }
    }
}

impl<H> HttpApi<H>
where
    H: ApiHandler,
{
    pub fn new(handler: Arc<H>) -> Self {
        Self {
            handler,
            metrics: None,
        }
    }

    /// Serve `GET /metrics` from this registry.
    pub fn with_metrics(mut self, metrics: PrometheusMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Build axum router with mounted endpoints.
    ///
    /// Routes:
    /// - GET  /health
    /// - POST /vm/start, /vm/stop, /vm/renew
    /// - GET  /vm
    /// - GET  /artifacts/{challengeId}
    /// - GET  /artifacts/{challengeId}/{artifactName}
    /// - GET  /metrics
    ///
    /// Every route gets CORS, request tracing, panic recovery and a 60s timeout.
    pub fn router(self) -> Router {
        let state = AppState {
            handler: self.handler,
            metrics: self.metrics,
        };
        Router::new()
            .route("/health", get(health))
            .route("/vm", get(list_workloads::<H>))
            .route("/vm/start", post(start_workload::<H>))
            .route("/vm/stop", post(stop_workload::<H>))
            .route("/vm/renew", post(renew_workload::<H>))
            .route("/artifacts/{challenge_id}", get(list_artifacts::<H>))
            .route(
                "/artifacts/{challenge_id}/{artifact_name}",
                get(get_artifact::<H>),
            )
            .route("/metrics", get(metrics::<H>))
            .with_state(state)
            .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
            .layer(CatchPanicLayer::custom(panic_response))
            .layer(cors())
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                    .on_response(DefaultOnResponse::new().level(Level::INFO)),
            )
    }
}

/// Browsers on any scoreboard origin may call the API with credentials.
fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::ACCEPT,
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static("x-csrf-token"),
        ])
        .expose_headers([header::LINK])
        .allow_credentials(true)
        .max_age(CORS_MAX_AGE)
}

fn panic_response(_panic: Box<dyn Any + Send + 'static>) -> Response {
    ApiError::Internal("request handler panicked".into()).into_response()
}

// ---- request / response types ----

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VmRequest {
    #[serde(default)]
    team_id: TeamId,
    #[serde(default)]
    challenge_id: ChallengeId,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    #[serde(with = "time::serde::rfc3339")]
    timestamp: OffsetDateTime,
    uptime_seconds: u64,
    host: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StartResponse {
    success: bool,
    container_id: String,
    container_name: String,
    hostname: String,
    status: WorkloadStatus,
    #[serde(with = "time::serde::rfc3339")]
    expires_at: OffsetDateTime,
}

impl From<WorkloadInfo> for StartResponse {
    fn from(info: WorkloadInfo) -> Self {
        Self {
            success: true,
            container_id: info.runtime_id,
            container_name: info.name,
            hostname: info.hostname,
            status: info.status,
            expires_at: info.expires_at,
        }
    }
}

#[derive(Debug, Serialize)]
struct MessageResponse {
    success: bool,
    message: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RenewResponse {
    success: bool,
    #[serde(with = "time::serde::rfc3339")]
    expires_at: OffsetDateTime,
    message: &'static str,
}

#[derive(Debug, Serialize)]
struct ListResponse {
    success: bool,
    workloads: Vec<WorkloadInfo>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ArtifactsResponse {
    success: bool,
    challenge_id: ChallengeId,
    challenge_title: String,
    artifacts: Vec<ArtifactInfo>,
}

fn body(rejection: JsonRejection) -> ApiError {
    debug!(error = %rejection, "rejected request body");
    ApiError::InvalidRequest("Invalid request body".into())
}

fn challenge_param(raw: &str) -> Result<ChallengeId, ApiError> {
    raw.parse::<ChallengeId>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| ApiError::InvalidRequest("Invalid challenge ID".into()))
}

// ---- handlers ----

/// GET /health
async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        timestamp: OffsetDateTime::now_utc(),
        uptime_seconds: ctfvm_core::uptime_seconds(),
        host: ctfvm_core::host_name(),
    })
}

/// POST /vm/start
async fn start_workload<H>(
    State(state): State<AppState<H>>,
    req: Result<Json<VmRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError>
where
    H: ApiHandler,
{
    let Json(req) = req.map_err(body)?;
    let info = state
        .handler
        .start_workload(req.team_id, req.challenge_id)
        .await?;
    Ok(Json(StartResponse::from(info)))
}

/// POST /vm/stop
async fn stop_workload<H>(
    State(state): State<AppState<H>>,
    req: Result<Json<VmRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError>
where
    H: ApiHandler,
{
    let Json(req) = req.map_err(body)?;
    state
        .handler
        .stop_workload(req.team_id, req.challenge_id)
        .await?;
    Ok(Json(MessageResponse {
        success: true,
        message: "Container stopped successfully",
    }))
}

/// POST /vm/renew
async fn renew_workload<H>(
    State(state): State<AppState<H>>,
    req: Result<Json<VmRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError>
where
    H: ApiHandler,
{
    let Json(req) = req.map_err(body)?;
    let info = state
        .handler
        .renew_workload(req.team_id, req.challenge_id)
        .await?;
    Ok(Json(RenewResponse {
        success: true,
        expires_at: info.expires_at,
        message: "Container timeout renewed",
    }))
}

/// GET /vm
async fn list_workloads<H>(State(state): State<AppState<H>>) -> impl IntoResponse
where
    H: ApiHandler,
{
    Json(ListResponse {
        success: true,
        workloads: state.handler.list_workloads().await,
    })
}

/// GET /artifacts/{challengeId}
async fn list_artifacts<H>(
    State(state): State<AppState<H>>,
    path: Result<Path<String>, PathRejection>,
) -> Result<impl IntoResponse, ApiError>
where
    H: ApiHandler,
{
    let Path(raw) = path.map_err(|_| ApiError::InvalidRequest("Invalid challenge ID".into()))?;
    let challenge_id = challenge_param(&raw)?;
    let (challenge, artifacts) = state.handler.list_artifacts(challenge_id).await?;
    Ok(Json(ArtifactsResponse {
        success: true,
        challenge_id,
        challenge_title: challenge.title,
        artifacts,
    }))
}

/// GET /artifacts/{challengeId}/{artifactName}
async fn get_artifact<H>(
    State(state): State<AppState<H>>,
    path: Result<Path<(String, String)>, PathRejection>,
) -> Result<Response, ApiError>
where
    H: ApiHandler,
{
    let Path((raw, name)) =
        path.map_err(|_| ApiError::InvalidRequest("Invalid artifact path".into()))?;
    let challenge_id = challenge_param(&raw)?;
    let (info, file) = state.handler.get_artifact(challenge_id, &name).await?;

    let headers = [
        (header::CONTENT_TYPE, info.mime_type.clone()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", info.name),
        ),
        (header::CONTENT_LENGTH, info.size.to_string()),
    ];
    let body = Body::from_stream(ReaderStream::new(file));
    Ok((StatusCode::OK, headers, body).into_response())
}

/// GET /metrics
async fn metrics<H>(State(state): State<AppState<H>>) -> Result<Response, ApiError>
where
    H: ApiHandler,
{
    let Some(metrics) = state.metrics else {
        return Err(ApiError::NotFound("metrics are not enabled".into()));
    };
    let text = metrics
        .encode_text()
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    let content_type = TextEncoder::new().format_type().to_string();
    Ok(([(header::CONTENT_TYPE, content_type)], text).into_response())
}
