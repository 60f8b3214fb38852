//! Inbound HTTP surface.
//!
//! Every response carries `cache-control: no-store`. Failures are
//! `{"error": "<message>"}` with a status derived from the error kind.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router, middleware};
use projfill_core::{CandidateEdits, ErrorKind, MergedCandidate, SearchHit};
use projfill_sync::CreatedProject;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::pipeline::{Pipeline, PipelineError};

pub const SEARCH_ROUTE: &str = "/api/projectSearch";
pub const FILL_ROUTE: &str = "/api/projectFill";
pub const CHECK_NAME_ROUTE: &str = "/api/checkProjectName";
pub const SUBMIT_ROUTE: &str = "/api/projectSubmit";

const MALFORMED_JSON: &str = "Request body must be valid JSON.";
const INVALID_PAYLOAD: &str = "Invalid request payload.";
const INVALID_FILL_PARAMS: &str = "Invalid parameter format. Verify projectId.";

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InputInvalid | ErrorKind::ValidationFailure => StatusCode::BAD_REQUEST,
        ErrorKind::ConfigurationMissing => StatusCode::INTERNAL_SERVER_ERROR,
        ErrorKind::UpstreamUnavailable
        | ErrorKind::TransportFailure
        | ErrorKind::ExtractionIncomplete
        | ErrorKind::ProtocolFailure => StatusCode::BAD_GATEWAY,
        ErrorKind::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
    }
}

impl IntoResponse for PipelineError {
    fn into_response(self) -> Response {
        let status = status_for(self.kind());
        warn!(kind = self.kind().as_str(), status = status.as_u16(), error = %self, "request failed");
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, PipelineError>;

pub fn router(pipeline: Arc<Pipeline>) -> Router {
    Router::new()
        .route(SEARCH_ROUTE, get(project_search))
        .route(FILL_ROUTE, post(project_fill))
        .route(CHECK_NAME_ROUTE, post(check_project_name))
        .route(SUBMIT_ROUTE, post(project_submit))
        .layer(middleware::map_response(no_store))
        .with_state(pipeline)
}

pub async fn serve(addr: SocketAddr, pipeline: Arc<Pipeline>) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "listening");
    axum::serve(listener, router(pipeline)).await
}

async fn no_store(mut response: Response) -> Response {
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

/// Two-stage body decoding: syntax errors and shape errors get different
/// messages.
fn parse_body<T: DeserializeOwned>(body: &[u8], invalid: &str) -> Result<T, PipelineError> {
    let value: Value =
        serde_json::from_slice(body).map_err(|_| PipelineError::input(MALFORMED_JSON))?;
    serde_json::from_value(value).map_err(|e| {
        warn!(error = %e, "request body failed schema check");
        PipelineError::input(invalid)
    })
}

#[derive(Deserialize)]
struct SearchParams {
    q: Option<String>,
}

#[derive(Serialize)]
struct SearchResponse {
    query: String,
    results: Vec<SearchHit>,
}

async fn project_search(
    State(pipeline): State<Arc<Pipeline>>,
    Query(params): Query<SearchParams>,
) -> ApiResult<SearchResponse> {
    let query = params.q.unwrap_or_default().trim().to_string();
    let results = pipeline.search(&query).await?;
    Ok(Json(SearchResponse { query, results }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FillRequest {
    project_id: u64,
}

async fn project_fill(
    State(pipeline): State<Arc<Pipeline>>,
    body: Bytes,
) -> ApiResult<MergedCandidate> {
    let request: FillRequest = parse_body(&body, INVALID_FILL_PARAMS)?;
    Ok(Json(pipeline.fill(request.project_id).await?))
}

#[derive(Deserialize)]
struct CheckNameRequest {
    name: String,
}

#[derive(Serialize)]
struct CheckNameResponse {
    exists: bool,
}

async fn check_project_name(
    State(pipeline): State<Arc<Pipeline>>,
    body: Bytes,
) -> ApiResult<CheckNameResponse> {
    pipeline.settings().require_registry()?;
    let request: CheckNameRequest = parse_body(&body, INVALID_PAYLOAD)?;
    let exists = pipeline.check_name(&request.name).await?;
    Ok(Json(CheckNameResponse { exists }))
}

#[derive(Deserialize)]
struct SubmitRequest {
    payload: CandidateEdits,
    candidate: Option<MergedCandidate>,
}

async fn project_submit(
    State(pipeline): State<Arc<Pipeline>>,
    body: Bytes,
) -> ApiResult<CreatedProject> {
    pipeline.settings().require_registry()?;
    let request: SubmitRequest = parse_body(&body, INVALID_PAYLOAD)?;
    let candidate = request.candidate.unwrap_or_default();
    Ok(Json(pipeline.submit(&request.payload, &candidate).await?))
}
