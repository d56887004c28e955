use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// Body of a bare status response.
///
/// Carries no detail about the failure; clients get the code, its reason
/// phrase and a timestamp.
///
/// # Example
/// ```
/// use catchpoint::common::ErrorBody;
/// use axum::http::StatusCode;
///
/// let body = ErrorBody::new(StatusCode::NOT_FOUND);
/// assert_eq!(body.status_code, 404);
/// assert_eq!(body.message, "Not Found");
/// ```
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub status_code: u16,
    pub message: String,
    pub timestamp: String,

    #[serde(skip)]
    pub http_status: StatusCode,
}

impl ErrorBody {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status_code: status.as_u16(),
            message: status.canonical_reason().unwrap_or("Unknown").to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            http_status: status,
        }
    }
}

impl IntoResponse for ErrorBody {
    fn into_response(self) -> Response {
        (self.http_status, Json(self)).into_response()
    }
}
