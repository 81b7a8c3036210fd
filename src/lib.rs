//! Read-through caching proxy for a remote posts/users JSON API.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
pub mod upstream;
