//! Mapping of core errors onto HTTP responses.

use alinea_core::AccessError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;
use utoipa::ToSchema;

/// Body of every error response.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
}

/// A failed request: status code plus a JSON `{"error": ...}` body.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn internal() -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: "Internal error".into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<AccessError> for ApiError {
    fn from(err: AccessError) -> Self {
        if err.is_invalid_input() {
            Self::bad_request(err.to_string())
        } else if err.is_not_found() {
            Self {
                status: StatusCode::NOT_FOUND,
                message: err.to_string(),
            }
        } else {
            tracing::error!("Request failed: {:?}", err);
            Self::internal()
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                error: self.message,
            }),
        )
            .into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use alinea_core::{ItemId, UserId};

    #[test]
    fn test_error_classes_map_to_status_codes() {
        assert_eq!(
            ApiError::from(AccessError::InvalidStatus("archived".into())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(AccessError::ItemNotFound(ItemId(1))).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(AccessError::UserNotFound(UserId(1))).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(AccessError::StorePoisoned).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
