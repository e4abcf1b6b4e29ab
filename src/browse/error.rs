//! Browsing server error types

use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Json, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::browse::html;
use crate::error::ModelError;

/// Main error type for the browsing server
#[derive(Debug, Error)]
pub enum BrowseError {
    /// Request path outside `/` and `/tables`
    #[error("/tables/ is missing from path")]
    MissingTables,

    /// Failed to bind the listener
    #[error("Failed to bind to {address}: {source}")]
    Bind {
        address: String,
        source: std::io::Error,
    },

    /// Server loop failed
    #[error("Server error: {0}")]
    Serve(std::io::Error),

    #[error(transparent)]
    Model(#[from] ModelError),
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl BrowseError {
    /// Get HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingTables => StatusCode::BAD_REQUEST,
            Self::Model(ModelError::Schema(_))
            | Self::Model(ModelError::Query(_))
            | Self::Model(ModelError::Parse { .. }) => StatusCode::BAD_REQUEST,
            Self::Model(ModelError::Connection(_)) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingTables => "MISSING_TABLES",
            Self::Bind { .. } | Self::Serve(_) => "SERVER_ERROR",
            Self::Model(e) => match e {
                ModelError::Schema(_) => "SCHEMA_ERROR",
                ModelError::Query(_) => "QUERY_ERROR",
                ModelError::Parse { .. } => "PARSE_ERROR",
                ModelError::Connection(_) => "CONNECTION_ERROR",
                _ => "DATABASE_ERROR",
            },
        }
    }

    /// Render as an HTML error page with the same status.
    pub fn into_html_response(self) -> Response {
        let status = self.status_code();
        (status, Html(html::error_page(status.as_u16(), &self.to_string()))).into_response()
    }
}

impl IntoResponse for BrowseError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: self.to_string(),
            code: self.code().to_string(),
        };
        (status, Json(body)).into_response()
    }
}
