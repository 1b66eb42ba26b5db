use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use hangar_store::StoreError;

/// Error type returned by REST handlers; maps store failures onto HTTP
/// statuses with a JSON `detail` body.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::Store(StoreError::NotFound(detail)) => (StatusCode::NOT_FOUND, detail),
            ApiError::Store(StoreError::Conflict(detail)) => (StatusCode::CONFLICT, detail),
        };
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_404() {
        let response =
            ApiError::Store(StoreError::NotFound("session sess_x".into())).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn conflict_maps_to_409() {
        let response =
            ApiError::Store(StoreError::Conflict("stt task stt_x already done".into()))
                .into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }
}
