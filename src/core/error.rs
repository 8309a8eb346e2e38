use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum DashError {
    #[error("Cannot parse config: {0}")]
    ConfigParsingError(String),
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Arrow error: {0}")]
    ArrowError(String),
    #[error("Cannot parse file: {0}")]
    ParseError(String),
    #[error("Query failed: {message}")]
    QueryError { query: String, message: String },
    #[error("Session '{0}' not found")]
    SessionNotFound(String),
    #[error("No data: {0}")]
    NoData(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DashError {
    pub fn query(query: &str, message: impl ToString) -> Self {
        DashError::QueryError {
            query: query.to_string(),
            message: message.to_string(),
        }
    }
}

impl From<std::io::Error> for DashError {
    fn from(err: std::io::Error) -> Self {
        DashError::IoError(err.to_string())
    }
}

impl From<arrow::error::ArrowError> for DashError {
    fn from(err: arrow::error::ArrowError) -> Self {
        DashError::ArrowError(err.to_string())
    }
}

impl From<rust_xlsxwriter::XlsxError> for DashError {
    fn from(err: rust_xlsxwriter::XlsxError) -> Self {
        DashError::IoError(err.to_string())
    }
}
