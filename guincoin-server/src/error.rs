//! HTTP error mapping
//!
//! Every failure leaves the server as `{ "error": "<message>" }`. The status
//! comes from the core error carried inside the anyhow chain.

use axum::extract::multipart::MultipartError;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use guincoin_core::Error;

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

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        let status = match err.downcast_ref::<Error>() {
            Some(Error::NotFound(_)) => StatusCode::NOT_FOUND,
            Some(core) if core.is_client_error() => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("request failed: {:#}", err);
        }
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        Self::bad_request(format!("Invalid multipart body: {}", err))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_from_core_errors() {
        let not_found: ApiError = anyhow::Error::from(Error::not_found("Import job 1")).into();
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);
        assert_eq!(not_found.message(), "Not found: Import job 1");

        let invalid: ApiError = anyhow::Error::from(Error::validation("Job name is required")).into();
        assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);

        let sheet: ApiError = anyhow::Error::from(Error::spreadsheet("bad file")).into();
        assert_eq!(sheet.status(), StatusCode::BAD_REQUEST);

        let mail: ApiError = anyhow::Error::from(Error::mail("relay down")).into();
        assert_eq!(mail.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let other: ApiError = anyhow::anyhow!("boom").into();
        assert_eq!(other.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_error_body_shape() {
        let response = ApiError::bad_request("balanceFile is required").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value, json!({ "error": "balanceFile is required" }));
    }
}
