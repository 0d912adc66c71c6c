//! The `{status, message, data, success}` envelope spec.md §6 requires for
//! every HTTP response, and the `TickrError -> HTTP` mapping from §7's
//! propagation policy (client-visible errors surface synchronously; the
//! rest never reach here).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tickr_core::TickrError;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub status: u16,
    pub message: String,
    pub data: Option<T>,
    pub success: bool,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(status: StatusCode, message: impl Into<String>, data: T) -> (StatusCode, Json<Self>) {
        (
            status,
            Json(Self {
                status: status.as_u16(),
                message: message.into(),
                data: Some(data),
                success: true,
            }),
        )
    }
}

impl ApiResponse<()> {
    pub fn err(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<Self>) {
        (
            status,
            Json(Self {
                status: status.as_u16(),
                message: message.into(),
                data: None,
                success: false,
            }),
        )
    }
}

/// Maps the client-visible subset of [`TickrError`] (spec.md §7:
/// `ClientError` -> 400, `StorePersistError` -> 500) onto the response
/// envelope. Any other variant reaching here is a bug: those errors are
/// meant to be absorbed inside the scheduler/worker loop, never surfaced to
/// a caller.
impl IntoResponse for TickrError {
    fn into_response(self) -> Response {
        let status = match &self {
            TickrError::ClientError(_) => StatusCode::BAD_REQUEST,
            TickrError::StorePersistError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        ApiResponse::<()>::err(status, self.to_string()).into_response()
    }
}
