use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use super::traits::StoreError;
use crate::error::Error;

/// JSON error payload returned by every endpoint.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    upstream_status: Option<u16>,
}

impl Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Auth(_) => StatusCode::UNAUTHORIZED,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Upstream { .. } | Self::Http(_) | Self::Config(_) | Self::Store(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let (message, upstream_status) = match &self {
            Self::Auth(msg)
            | Self::Validation(msg)
            | Self::PayloadTooLarge(msg)
            | Self::NotFound(msg) => (msg.clone(), None),
            Self::Upstream { status, body } => {
                tracing::error!(status, body = %body, "Basecamp request failed");
                (format!("Basecamp returned {status}: {body}"), Some(*status))
            }
            Self::Http(e) => {
                tracing::error!(error = %e, "Basecamp unreachable");
                (e.to_string(), None)
            }
            Self::Config(_) | Self::Store(_) => {
                tracing::error!(error = %self, "Internal error");
                ("Internal error".to_string(), None)
            }
        };
        if matches!(self, Self::Auth(_)) {
            tracing::warn!(error = %self, "Request not authenticated");
        }

        let body = ErrorBody {
            error: self.category(),
            message,
            upstream_status,
        };
        (status, Json(body)).into_response()
    }
}

pub(super) fn store_error(e: StoreError) -> Error {
    Error::Store(e.to_string())
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::*;

    async fn render(error: Error) -> (StatusCode, Value) {
        let response = error.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn auth_is_401() {
        let (status, body) = render(Error::Auth("state mismatch".into())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, json!({"error": "auth_error", "message": "state mismatch"}));
    }

    #[tokio::test]
    async fn validation_is_400() {
        let (status, body) = render(Error::Validation("Title is required".into())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "validation_error");
    }

    #[tokio::test]
    async fn oversized_body_is_413() {
        let (status, body) = render(Error::PayloadTooLarge("length limit exceeded".into())).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body["error"], "payload_too_large");
    }

    #[tokio::test]
    async fn not_found_is_404() {
        let (status, body) = render(Error::NotFound("no todoset".into())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "not_found");
    }

    #[tokio::test]
    async fn upstream_is_500_with_status() {
        let (status, body) = render(Error::Upstream {
            status: 503,
            body: "maintenance".into(),
        })
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "upstream_error");
        assert_eq!(body["upstream_status"], 503);
        assert_eq!(body["message"], "Basecamp returned 503: maintenance");
    }

    #[tokio::test]
    async fn internal_details_are_hidden() {
        let (status, body) = render(Error::Store("redis down at 10.0.0.5".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "Internal error");
    }
}
