use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use log::{error, warn};

use crate::core::DashError;

use super::types::ErrorResponse;

/// Wraps a [`DashError`] so handlers can return it with a status code.
#[derive(Debug)]
pub struct ApiError(pub DashError);

impl From<DashError> for ApiError {
    fn from(err: DashError) -> Self {
        ApiError(err)
    }
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match &self.0 {
            DashError::SessionNotFound(_) => (StatusCode::NOT_FOUND, "SESSION_NOT_FOUND"),
            DashError::ParseError(_) => (StatusCode::BAD_REQUEST, "PARSE_ERROR"),
            DashError::QueryError { .. } => (StatusCode::BAD_REQUEST, "QUERY_ERROR"),
            DashError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "INVALID_REQUEST"),
            DashError::NoData(_) => (StatusCode::CONFLICT, "NO_DATA"),
            DashError::IoError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR"),
            DashError::ConfigParsingError(_) | DashError::ArrowError(_) | DashError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            error!("request failed: {}", self.0);
        } else {
            warn!("request rejected: {}", self.0);
        }

        let query = match &self.0 {
            DashError::QueryError { query, .. } => Some(query.clone()),
            _ => None,
        };
        let body = ErrorResponse {
            error: self.0.to_string(),
            code: code.to_string(),
            query,
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(DashError::SessionNotFound("1".into()), StatusCode::NOT_FOUND, "SESSION_NOT_FOUND")]
    #[case(DashError::ParseError("bad".into()), StatusCode::BAD_REQUEST, "PARSE_ERROR")]
    #[case(DashError::query("SELEC", "syntax error"), StatusCode::BAD_REQUEST, "QUERY_ERROR")]
    #[case(DashError::NoData("empty".into()), StatusCode::CONFLICT, "NO_DATA")]
    #[case(DashError::IoError("disk".into()), StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR")]
    #[case(DashError::Internal("boom".into()), StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")]
    fn test_status_mapping(
        #[case] err: DashError,
        #[case] status: StatusCode,
        #[case] code: &str,
    ) {
        assert_eq!(ApiError(err).status_and_code(), (status, code));
    }
}
