use thiserror::Error;

/// Failure of a single upstream request.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("upstream path `{path}` is invalid: {message}")]
    InvalidPath { path: String, message: String },
    #[error("upstream unreachable for `{path}`: {message}")]
    Unreachable { path: String, message: String },
    #[error("upstream answered `{path}` with status {status}")]
    BadStatus { path: String, status: u16 },
    #[error("failed to read upstream body for `{path}`: {message}")]
    Body { path: String, message: String },
}

impl FetchError {
    pub fn unreachable(path: &str, err: impl std::fmt::Display) -> Self {
        Self::Unreachable {
            path: path.to_string(),
            message: err.to_string(),
        }
    }

    pub fn body(path: &str, err: impl std::fmt::Display) -> Self {
        Self::Body {
            path: path.to_string(),
            message: err.to_string(),
        }
    }

    pub fn path(&self) -> &str {
        match self {
            FetchError::InvalidPath { path, .. }
            | FetchError::Unreachable { path, .. }
            | FetchError::BadStatus { path, .. }
            | FetchError::Body { path, .. } => path,
        }
    }

    /// Label value recorded on the upstream fetch counter.
    pub fn outcome(&self) -> &'static str {
        match self {
            FetchError::InvalidPath { .. } => "invalid_path",
            FetchError::Unreachable { .. } => "unreachable",
            FetchError::BadStatus { .. } => "bad_status",
            FetchError::Body { .. } => "body",
        }
    }
}
