//! Maps [`GrcError`] onto HTTP responses.
//!
//! Body shape: `{"error": "<message>", "fields": {"<field>": ["<message>", ..]}}`;
//! `fields` is present for validation failures only.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::error::{FieldErrors, GrcError};

#[derive(Debug)]
pub struct AppError(pub GrcError);

impl From<GrcError> for AppError {
    fn from(e: GrcError) -> Self {
        Self(e)
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self(GrcError::invalid(FieldErrors::NON_FIELD, rejection.body_text()))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let body = match &self.0 {
            GrcError::Validation(fields) => json!({
                "error": "validation failed",
                "fields": fields,
            }),
            GrcError::InvalidEnumValue(invalid) => json!({
                "error": invalid.to_string(),
                "fields": { invalid.field: [invalid.to_string()] },
            }),
            other if status.is_server_error() => {
                tracing::error!("Request failed: {}", other);
                json!({ "error": "internal server error" })
            }
            other => json!({ "error": other.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::EntityKind;
    use grc_types::Likelihood;
    use http_body_util::BodyExt;

    async fn render(e: GrcError) -> (StatusCode, serde_json::Value) {
        let resp = AppError(e).into_response();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn not_found_renders_message() {
        let (status, body) = render(GrcError::not_found(EntityKind::Risk, 8)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "risk 8 not found");
    }

    #[tokio::test]
    async fn validation_renders_fields() {
        let (status, body) = render(GrcError::invalid("title", "This field is required.")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["fields"]["title"][0], "This field is required.");
    }

    #[tokio::test]
    async fn invalid_enum_is_bad_request_with_field() {
        let err: GrcError = Likelihood::parse("SOMETIMES").unwrap_err().into();
        let (status, body) = render(err).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["fields"]["likelihood"].is_array());
    }

    #[tokio::test]
    async fn internal_details_are_not_leaked() {
        let (status, body) = render(GrcError::Internal(anyhow::anyhow!("pool timed out"))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "internal server error");
    }
}
