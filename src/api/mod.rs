mod convert;
mod error;
mod handlers;
mod types;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post, put};
use log::info;

use crate::core::DashError;
use crate::service::DashService;

pub use error::ApiError;
pub use types::{ColumnJson, ErrorResponse, TableJson};

pub struct DashApi {
    service: Arc<DashService>,
}

impl DashApi {
    pub fn new(service: DashService) -> Self {
        Self {
            service: Arc::new(service),
        }
    }

    pub fn router(&self) -> Router {
        let body_limit = self.service.config().server.max_upload_bytes;
        Router::new()
            .route("/health", get(handlers::health))
            .route("/api/v1/session", post(handlers::create_session))
            .route(
                "/api/v1/session/{id}",
                get(handlers::get_session).delete(handlers::delete_session),
            )
            .route("/api/v1/session/{id}/upload", put(handlers::upload))
            .route("/api/v1/session/{id}/sheet", put(handlers::select_sheet))
            .route("/api/v1/session/{id}/preprocess", put(handlers::preprocess))
            .route("/api/v1/session/{id}/table", get(handlers::table))
            .route("/api/v1/session/{id}/preview", get(handlers::preview))
            .route("/api/v1/session/{id}/selection", put(handlers::select_rows))
            .route("/api/v1/session/{id}/query", post(handlers::query))
            .route("/api/v1/session/{id}/export", post(handlers::export))
            .layer(DefaultBodyLimit::max(body_limit))
            .with_state(self.service.clone())
    }

    pub async fn serve(self, addr: &str) -> Result<(), DashError> {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| DashError::IoError(format!("binding to {addr}: {e}")))?;
        info!("listening on {addr}");
        axum::serve(listener, self.router())
            .await
            .map_err(|e| DashError::IoError(format!("serving: {e}")))?;
        Ok(())
    }
}
