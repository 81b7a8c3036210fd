//! Application services layer.

pub mod error;
pub mod service;

pub use error::{AppError, ErrorReport, ProxyError};
pub use service::{ProxyService, Served};
