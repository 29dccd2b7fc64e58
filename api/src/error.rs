use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use docqa::{ErrorResponse, PipelineError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("RAG system not initialized. Please upload documents or add PDFs to the '{0}' directory.")]
    NotReady(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Ingestion(String),
    #[error("{0}")]
    Build(String),
    /// Details are logged, never returned to the caller.
    #[error("Error processing query")]
    Query,
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotReady(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Ingestion(_) | ApiError::Build(_) | ApiError::Query => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Ingestion(_) => ApiError::Ingestion(err.to_string()),
            PipelineError::Build(_) => ApiError::Build(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(ErrorResponse::new(self.to_string()))).into_response()
    }
}
