//! Maps the shared error taxonomy (§7) onto HTTP status codes for the
//! REST façade. Unlike the RPC transport, which always returns
//! `isError: true` inside a 200, the HTTP surface uses real status codes
//! — that's the natural idiom for a REST API and what distinguishes it
//! from the JSON-RPC tool server per the design notes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

pub struct ApiError(alchemy_core::Error);

impl From<alchemy_core::Error> for ApiError {
    fn from(e: alchemy_core::Error) -> Self {
        Self(e)
    }
}

impl From<alchemy_engine::Error> for ApiError {
    fn from(e: alchemy_engine::Error) -> Self {
        Self(e.into())
    }
}

impl From<alchemy_storage::Error> for ApiError {
    fn from(e: alchemy_storage::Error) -> Self {
        Self(e.into())
    }
}

impl From<alchemy_providers::Error> for ApiError {
    fn from(e: alchemy_providers::Error) -> Self {
        Self(e.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        use alchemy_core::Error as E;

        let status = match &self.0 {
            E::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            E::NotFound(_) => StatusCode::NOT_FOUND,
            E::EmbeddingDimMismatch { .. } => StatusCode::CONFLICT,
            E::ProviderError { .. } | E::ProviderTimeout { .. } => StatusCode::BAD_GATEWAY,
            E::GenerationFailed(_) => StatusCode::UNPROCESSABLE_ENTITY,
            E::StorageError(_) | E::ProtocolError(_) | E::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            E::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
        };

        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
