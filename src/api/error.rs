use crate::error::CorralError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorMessage,
}

pub mod codes {
    pub const BAD_REQUEST: &str = "bad_request";
    pub const NOT_FOUND: &str = "not_found";
    pub const CONFLICT: &str = "conflict";
    pub const UNAVAILABLE: &str = "unavailable";
    pub const INTERNAL: &str = "internal_error";
}

#[derive(Debug, Serialize)]
pub struct ApiErrorMessage {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

/// Error detail attached to responses for the logging middleware
#[derive(Debug, Clone)]
pub struct ErrorDetail(pub String);

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
    hint: Option<String>,
}

impl ApiError {
    pub fn new(
        status: StatusCode,
        code: &'static str,
        message: impl Into<String>,
        hint: Option<String>,
    ) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            hint,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, codes::BAD_REQUEST, message, None)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<CorralError> for ApiError {
    fn from(err: CorralError) -> Self {
        let (status, code) = match &err {
            CorralError::InvalidArgument(_) => (StatusCode::BAD_REQUEST, codes::BAD_REQUEST),
            CorralError::NotFound { .. } => (StatusCode::NOT_FOUND, codes::NOT_FOUND),
            CorralError::Conflict { .. }
            | CorralError::AlreadyExists { .. }
            | CorralError::ServiceBound { .. } => (StatusCode::CONFLICT, codes::CONFLICT),
            CorralError::Unavailable(_) | CorralError::Timeout { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, codes::UNAVAILABLE)
            }
            _ => (StatusCode::INTERNAL_SERVER_ERROR, codes::INTERNAL),
        };
        let hint = err.hint().map(str::to_string);
        Self::new(status, code, err.to_string(), hint)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let detail = ErrorDetail(format!("{}: {}", self.code, self.message));
        let body = ApiErrorBody {
            error: ApiErrorMessage {
                code: self.code.to_string(),
                message: self.message,
                hint: self.hint,
            },
        };
        let mut response = (self.status, Json(body)).into_response();
        response.extensions_mut().insert(detail);
        response
    }
}
