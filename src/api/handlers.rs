use std::sync::Arc;

use arrow::record_batch::RecordBatch;
use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};

use crate::export::ExportReport;
use crate::preprocess::Policy;
use crate::service::DashService;
use crate::session::{DEFAULT_PREVIEW_ROWS, SessionSummary};

use super::convert::to_arrow_ipc;
use super::error::ApiError;
use super::types::{
    ExportRequest, LimitParams, QueryRequest, SelectionRequest, SessionCreated, SheetRequest,
    TableJson, UploadParams,
};

const ARROW_IPC_MIME: &str = "application/vnd.apache.arrow.stream";

/// Renders a table as JSON, or as an Arrow IPC stream when the client asks
/// for one.
fn table_response(headers: &HeaderMap, batch: &RecordBatch) -> Result<Response, ApiError> {
    let wants_arrow = headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains(ARROW_IPC_MIME));

    if wants_arrow {
        let buf = to_arrow_ipc(batch)?;
        Ok(([(header::CONTENT_TYPE, ARROW_IPC_MIME)], buf).into_response())
    } else {
        Ok(Json(TableJson::try_from(batch)?).into_response())
    }
}

pub async fn health() -> &'static str {
    "OK"
}

pub async fn create_session(State(service): State<Arc<DashService>>) -> impl IntoResponse {
    let id = service.create_session().await;
    (StatusCode::CREATED, Json(SessionCreated { id }))
}

pub async fn get_session(
    State(service): State<Arc<DashService>>,
    Path(id): Path<String>,
) -> Result<Json<SessionSummary>, ApiError> {
    Ok(Json(service.summary(&id).await?))
}

pub async fn delete_session(
    State(service): State<Arc<DashService>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    service.delete_session(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn upload(
    State(service): State<Arc<DashService>>,
    Path(id): Path<String>,
    Query(params): Query<UploadParams>,
    body: Bytes,
) -> Result<Json<SessionSummary>, ApiError> {
    Ok(Json(service.upload(&id, &params.name, body).await?))
}

pub async fn select_sheet(
    State(service): State<Arc<DashService>>,
    Path(id): Path<String>,
    Json(req): Json<SheetRequest>,
) -> Result<Json<SessionSummary>, ApiError> {
    Ok(Json(service.select_sheet(&id, req.sheet).await?))
}

pub async fn preprocess(
    State(service): State<Arc<DashService>>,
    Path(id): Path<String>,
    Json(policy): Json<Policy>,
) -> Result<Json<SessionSummary>, ApiError> {
    Ok(Json(service.set_policy(&id, policy).await?))
}

pub async fn table(
    State(service): State<Arc<DashService>>,
    Path(id): Path<String>,
    Query(params): Query<LimitParams>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let batch = service.table(&id, params.limit).await?;
    table_response(&headers, &batch)
}

pub async fn preview(
    State(service): State<Arc<DashService>>,
    Path(id): Path<String>,
    Query(params): Query<LimitParams>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let limit = params.limit.unwrap_or(DEFAULT_PREVIEW_ROWS);
    let batch = service.preview(&id, limit).await?;
    table_response(&headers, &batch)
}

pub async fn select_rows(
    State(service): State<Arc<DashService>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<SelectionRequest>,
) -> Result<Response, ApiError> {
    let batch = service.select_rows(&id, req.rows).await?;
    table_response(&headers, &batch)
}

pub async fn query(
    State(service): State<Arc<DashService>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<QueryRequest>,
) -> Result<Response, ApiError> {
    let batch = service.run_query(&id, req.sql).await?;
    table_response(&headers, &batch)
}

pub async fn export(
    State(service): State<Arc<DashService>>,
    Path(id): Path<String>,
    Json(req): Json<ExportRequest>,
) -> Result<Json<ExportReport>, ApiError> {
    Ok(Json(service.export(&id, req.format).await?))
}
