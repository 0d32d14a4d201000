use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::store::StoreError;

/// Request failures. Responses carry only the generic message; storage
/// detail is logged and never returned.
#[derive(Error, Debug)]
pub enum BrokerError {
    #[error("{0}")]
    Validation(&'static str),

    #[error("Forbidden")]
    Authorization,

    #[error("{message}")]
    Storage {
        message: &'static str,
        #[source]
        source: StoreError,
    },
}

impl BrokerError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Authorization => StatusCode::FORBIDDEN,
            Self::Storage { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for BrokerError {
    fn into_response(self) -> Response {
        if let Self::Storage { message, source } = &self {
            error!(error = %source, "{message}");
        }
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}
