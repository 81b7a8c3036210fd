use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::application::error::{ErrorReport, ProxyError};

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorMessage,
}

pub mod codes {
    pub const INVALID_INPUT: &str = "invalid_input";
    pub const STORE_UNAVAILABLE: &str = "store_unavailable";
    pub const UPSTREAM_UNREACHABLE: &str = "upstream_unreachable";
    pub const UPSTREAM_STATUS: &str = "upstream_status";
    pub const DECODE: &str = "decode_error";
}

#[derive(Debug, Serialize)]
pub struct ApiErrorMessage {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: &'static str,
    hint: Option<String>,
}

impl ApiError {
    pub fn new(
        status: StatusCode,
        code: &'static str,
        message: &'static str,
        hint: Option<String>,
    ) -> Self {
        Self {
            status,
            code,
            message,
            hint,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> &'static str {
        self.code
    }
}

impl From<&ProxyError> for ApiError {
    fn from(error: &ProxyError) -> Self {
        let status = error.status_code();
        match error {
            ProxyError::InvalidInput(message) => Self::new(
                status,
                codes::INVALID_INPUT,
                "Request could not be processed",
                Some(message.clone()),
            ),
            ProxyError::StoreUnavailable(_) => Self::new(
                status,
                codes::STORE_UNAVAILABLE,
                "Cache store unavailable",
                None,
            ),
            ProxyError::UpstreamUnreachable(err) => Self::new(
                status,
                codes::UPSTREAM_UNREACHABLE,
                "Upstream API unreachable",
                Some(format!("request to `{}` failed", err.path())),
            ),
            ProxyError::UpstreamBadStatus { path, status: code } => Self::new(
                status,
                codes::UPSTREAM_STATUS,
                "Upstream API returned an error",
                Some(format!("`{path}` answered with status {code}")),
            ),
            ProxyError::Decode { what, .. } => Self::new(
                status,
                codes::DECODE,
                "Upstream payload could not be decoded",
                Some(format!("unexpected shape for `{what}`")),
            ),
        }
    }
}

impl From<ProxyError> for ApiError {
    fn from(error: ProxyError) -> Self {
        Self::from(&error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let hint = self.hint.clone();
        let body = ApiErrorBody {
            error: ApiErrorMessage {
                code: self.code.to_string(),
                message: self.message.to_string(),
                hint: self.hint,
            },
        };
        let mut response = (self.status, Json(body)).into_response();
        ErrorReport::from_message(
            "infra::http::error",
            self.status,
            format!("{}: {}", self.code, hint.as_deref().unwrap_or(self.message)),
        )
        .attach(&mut response);
        response
    }
}
