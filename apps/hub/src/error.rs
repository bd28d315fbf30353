use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use model::ValidationError;
use road_store_core::IngestError;
use serde_json::json;
use tracing::{debug, error};

pub const NOT_FOUND_DETAIL: &str = "processed_agent_data with passed id was not found";
pub const SERVER_ERROR_DETAIL: &str = "Server error";

/// Maps [`IngestError`] onto a status code. Backend details are logged, never returned.
#[derive(Debug)]
pub struct ApiError(pub IngestError);

impl From<IngestError> for ApiError {
    fn from(e: IngestError) -> Self {
        Self(e)
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        Self(IngestError::Validation(e))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(r: JsonRejection) -> Self {
        ValidationError::malformed(r.body_text()).into()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self.0 {
            IngestError::Validation(e) => {
                debug!(field = %e.field, violation = %e.violation, "rejected payload");
                let body = json!({ "detail": { "field": e.field, "message": e.violation.to_string() } });
                (StatusCode::UNPROCESSABLE_ENTITY, Json(body)).into_response()
            }
            IngestError::NotFound(id) => {
                debug!(id, "record not found");
                (StatusCode::NOT_FOUND, Json(json!({ "detail": NOT_FOUND_DETAIL }))).into_response()
            }
            IngestError::Other(e) => {
                error!(error = ?e, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "detail": SERVER_ERROR_DETAIL })))
                    .into_response()
            }
        }
    }
}
