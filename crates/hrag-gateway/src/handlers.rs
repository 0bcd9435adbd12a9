use std::convert::Infallible;
use std::sync::Arc;

use axum::Json;
use axum::body::Body;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use hrag_core::rag::{HealthResponse, IngestResponse, QueryRequest, QueryResponse, RagError};
use hrag_core::research::WebSearch;
use hrag_llm::{LlmProvider, Reranker};
use hrag_memory::ReportId;
use hrag_memory::sqlite::{ReportRow, ReportSummary};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;

use super::error::ApiError;
use super::server::AppState;

pub(crate) const NDJSON: &str = "application/x-ndjson";
const DEFAULT_REPORT_LIMIT: u32 = 100;
const MAX_REPORT_LIMIT: u32 = 1000;

#[derive(serde::Deserialize)]
pub(crate) struct ResearchRequest {
    pub topic: String,
}

#[derive(serde::Deserialize)]
pub(crate) struct ReportsParams {
    #[serde(default = "default_report_limit")]
    pub limit: u32,
}

fn default_report_limit() -> u32 {
    DEFAULT_REPORT_LIMIT
}

pub(crate) async fn health_handler<P, R, S>(State(state): State<AppState<P, R, S>>) -> Json<HealthResponse>
where
    P: LlmProvider + 'static,
    R: Reranker + 'static,
    S: WebSearch + 'static,
{
    Json(state.rag.health())
}

pub(crate) async fn ingest_handler<P, R, S>(
    State(state): State<AppState<P, R, S>>,
) -> Result<Json<IngestResponse>, ApiError>
where
    P: LlmProvider + 'static,
    R: Reranker + 'static,
    S: WebSearch + 'static,
{
    if state.rag.is_ingesting() {
        return Err(RagError::IngestInProgress.into());
    }
    let rag = Arc::clone(&state.rag);
    // The run outlives a dropped connection so a generation is never left half-written.
    let response = tokio::spawn(async move { rag.ingest().await })
        .await
        .map_err(|e| ApiError::Internal(format!("ingestion task failed: {e}")))??;
    Ok(Json(response))
}

pub(crate) async fn query_handler<P, R, S>(
    State(state): State<AppState<P, R, S>>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<QueryResponse>, ApiError>
where
    P: LlmProvider + 'static,
    R: Reranker + 'static,
    S: WebSearch + 'static,
{
    let Json(request) = payload?;
    Ok(Json(state.rag.query(request).await?))
}

/// Streams one NDJSON line per research event.
pub(crate) async fn research_handler<P, R, S>(
    State(state): State<AppState<P, R, S>>,
    payload: Result<Json<ResearchRequest>, JsonRejection>,
) -> Result<Response, ApiError>
where
    P: LlmProvider + 'static,
    R: Reranker + 'static,
    S: WebSearch + 'static,
{
    let Json(request) = payload?;
    let events = Arc::clone(&state.research).start(request.topic)?;
    let lines = ReceiverStream::new(events).map(|event| Ok::<_, Infallible>(event.to_ndjson()));
    Ok(([(header::CONTENT_TYPE, NDJSON)], Body::from_stream(lines)).into_response())
}

pub(crate) async fn list_reports_handler<P, R, S>(
    State(state): State<AppState<P, R, S>>,
    params: Result<Query<ReportsParams>, QueryRejection>,
) -> Result<Json<Vec<ReportSummary>>, ApiError>
where
    P: LlmProvider + 'static,
    R: Reranker + 'static,
    S: WebSearch + 'static,
{
    let Query(params) = params?;
    let limit = params.limit.clamp(1, MAX_REPORT_LIMIT);
    Ok(Json(state.research.store().list_reports(limit).await?))
}

pub(crate) async fn get_report_handler<P, R, S>(
    State(state): State<AppState<P, R, S>>,
    Path(id): Path<i64>,
) -> Result<Json<ReportRow>, ApiError>
where
    P: LlmProvider + 'static,
    R: Reranker + 'static,
    S: WebSearch + 'static,
{
    state
        .research
        .store()
        .get_report(ReportId(id))
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("report {id} not found")))
}
