use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::TranscriberError;

pub const MISSING_GCS_PATH: &str = "Missing GCS path in request body.";

#[derive(Debug)]
pub enum HttpError {
    BadRequest { message: String },
    Internal { message: String },
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            HttpError::BadRequest { message } => (StatusCode::BAD_REQUEST, message),
            HttpError::Internal { message } => (StatusCode::INTERNAL_SERVER_ERROR, message),
        };

        (
            status,
            Json(json!({
                "error": message,
            })),
        )
            .into_response()
    }
}

pub fn error_mapper(error: TranscriberError) -> HttpError {
    match error {
        TranscriberError::Validation(message) => HttpError::BadRequest { message },
        TranscriberError::Timeout { .. }
        | TranscriberError::Service(_)
        | TranscriberError::Auth(_)
        | TranscriberError::Unexpected(_) => HttpError::Internal {
            message: format!("Transcription failed: {}", error),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_maps_to_bad_request() {
        let mapped = error_mapper(TranscriberError::Validation(MISSING_GCS_PATH.to_string()));
        assert!(matches!(mapped, HttpError::BadRequest { ref message } if message == MISSING_GCS_PATH));
    }

    #[test]
    fn test_timeout_maps_to_internal() {
        let mapped = error_mapper(TranscriberError::Timeout { seconds: 600 });
        match mapped {
            HttpError::Internal { message } => {
                assert_eq!(message, "Transcription failed: operation did not complete within 600s");
            }
            other => panic!("unexpected mapping: {other:?}"),
        }
    }

    #[test]
    fn test_service_detail_is_embedded() {
        let mapped = error_mapper(TranscriberError::Service("Permission denied (code 7)".to_string()));
        assert!(matches!(
            mapped,
            HttpError::Internal { ref message } if message == "Transcription failed: Permission denied (code 7)"
        ));
    }

    #[test]
    fn test_status_codes() {
        let response = HttpError::BadRequest { message: "x".to_string() }.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let response = HttpError::Internal { message: "x".to_string() }.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
