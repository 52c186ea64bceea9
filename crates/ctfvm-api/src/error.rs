use ctfvm_catalog::CatalogError;
use ctfvm_core::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    InvalidRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Misconfigured(String),

    #[error("{0}")]
    Runtime(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<CoreError> for ApiError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::WorkloadNotFound(_) | CoreError::ChallengeNotFound(_) => {
                ApiError::NotFound(e.to_string())
            }
            CoreError::ChallengeMisconfigured(_) => ApiError::Misconfigured(e.to_string()),
            CoreError::Runtime { .. } => ApiError::Runtime(e.to_string()),
            CoreError::Interrupted(_) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<CatalogError> for ApiError {
    fn from(e: CatalogError) -> Self {
        match e {
            CatalogError::InvalidArtifactName(_) => ApiError::InvalidRequest(e.to_string()),
            CatalogError::ChallengeDirNotFound(_) | CatalogError::ArtifactNotFound(_) => {
                ApiError::NotFound(e.to_string())
            }
            CatalogError::Io { .. } | CatalogError::Parse { .. } => {
                ApiError::Internal(e.to_string())
            }
        }
    }
}

impl From<ctfvm_model::ModelError> for ApiError {
    fn from(e: ctfvm_model::ModelError) -> Self {
        ApiError::Misconfigured(e.to_string())
    }
}

#[cfg(feature = "http")]
impl axum::response::IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        use axum::{Json, http::StatusCode};

        let status = match &self {
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Misconfigured(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Runtime(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::warn!(status = status.as_u16(), error = %self, "request failed");
        }
        let body = serde_json::json!({ "success": false, "message": self.to_string() });
        (status, Json(body)).into_response()
    }
}
