use aquapi_core::error::AquapiError;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

// ---------------------------------------------------------------------------
// AppError
// ---------------------------------------------------------------------------

/// Unified error type for HTTP responses. The body is always
/// `{"error": "<message>"}`.
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl AppError {
    /// Construct a 422 Unprocessable Entity error.
    pub fn unprocessable(msg: impl Into<String>) -> Self {
        Self(AquapiError::Integrity(msg.into()).into())
    }

    fn status(&self) -> StatusCode {
        // Malformed bodies keep axum's status (400, 415 or 422).
        if let Some(rejection) = self.0.downcast_ref::<JsonRejection>() {
            return rejection.status();
        }
        match self.0.downcast_ref::<AquapiError>() {
            Some(AquapiError::ActuatorNotFound(_) | AquapiError::MeasurementNotFound(_)) => {
                StatusCode::NOT_FOUND
            }
            Some(AquapiError::ActuatorExists(_)) => StatusCode::CONFLICT,
            Some(AquapiError::InvalidId(_) | AquapiError::Integrity(_)) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Some(
                AquapiError::NotConfigured(_)
                | AquapiError::Db(_)
                | AquapiError::Io(_)
                | AquapiError::Yaml(_)
                | AquapiError::Json(_),
            )
            | None => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }
        let body = serde_json::json!({ "error": self.0.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
