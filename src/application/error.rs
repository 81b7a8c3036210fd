use std::error::Error as StdError;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::{
    cache::StoreError, infra::error::InfraError, infra::http::error::ApiError,
    upstream::FetchError,
};

#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let mut messages = Vec::new();
        messages.push(error.to_string());
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self {
            source,
            status,
            messages,
        }
    }

    pub fn from_message(
        source: &'static str,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source,
            status,
            messages: vec![message.into()],
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

/// Failure of a proxy operation.
///
/// `Clone` so one failed upstream fetch can be handed to every caller that
/// joined it.
#[derive(Debug, Clone, Error)]
pub enum ProxyError {
    #[error("cache store unavailable")]
    StoreUnavailable(#[source] StoreError),
    #[error("upstream unreachable")]
    UpstreamUnreachable(#[source] FetchError),
    #[error("upstream answered `{path}` with status {status}")]
    UpstreamBadStatus { path: String, status: u16 },
    #[error("failed to decode {what}: {message}")]
    Decode { what: String, message: String },
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl ProxyError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn decode(what: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::Decode {
            what: what.into(),
            message: err.to_string(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ProxyError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ProxyError::StoreUnavailable(_)
            | ProxyError::UpstreamUnreachable(_)
            | ProxyError::UpstreamBadStatus { .. }
            | ProxyError::Decode { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for ProxyError {
    fn from(error: StoreError) -> Self {
        Self::StoreUnavailable(error)
    }
}

impl From<FetchError> for ProxyError {
    fn from(error: FetchError) -> Self {
        match error {
            FetchError::BadStatus { path, status } => Self::UpstreamBadStatus { path, status },
            other => Self::UpstreamUnreachable(other),
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let report = ErrorReport::from_error(
            "application::error::ProxyError",
            self.status_code(),
            &self,
        );
        let mut response = ApiError::from(&self).into_response();
        report.attach(&mut response);
        response
    }
}

/// Start-up and command failures outside request handling.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }
}
