use serde::{Deserialize, Serialize};

use crate::export::ExportFormat;

#[derive(Debug, Serialize)]
pub struct SessionCreated {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct UploadParams {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct LimitParams {
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct SheetRequest {
    pub sheet: String,
}

#[derive(Debug, Deserialize)]
pub struct SelectionRequest {
    #[serde(default)]
    pub rows: Vec<usize>,
}

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub sql: String,
}

#[derive(Debug, Deserialize)]
pub struct ExportRequest {
    pub format: ExportFormat,
}

/// JSON rendering of a table.
#[derive(Debug, Serialize)]
pub struct TableJson {
    pub num_rows: usize,
    pub columns: Vec<ColumnJson>,
}

#[derive(Debug, Serialize)]
pub struct ColumnJson {
    pub name: String,
    pub dtype: String,
    pub values: Vec<serde_json::Value>,
}

/// Error response format.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
}
