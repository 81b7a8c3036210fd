pub mod error;
mod handlers;
mod middleware;

use std::sync::Arc;

use axum::{
    Router, middleware as axum_middleware,
    routing::{delete, get, post},
};

use crate::application::ProxyService;

pub use handlers::{BATCH_FAILED_IDS_HEADER, CACHE_STATUS_HEADER};
pub use middleware::{REQUEST_ID_HEADER, RequestContext};

#[derive(Clone)]
pub struct HttpState {
    pub service: Arc<ProxyService>,
}

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/posts", get(handlers::list_posts))
        .route("/posts/recent", post(handlers::recent_posts))
        .route("/posts/{id}", get(handlers::get_post))
        .route("/users", get(handlers::list_users))
        .route("/users/{id}", get(handlers::get_user))
        .route("/users/{id}/posts", get(handlers::list_user_posts))
        .route("/cache/posts", delete(handlers::clear_posts))
        .route("/cache/keys/{key}", delete(handlers::invalidate_key))
        .route("/health", get(handlers::health))
        .with_state(state)
        .layer(axum_middleware::from_fn(middleware::log_responses))
        .layer(axum_middleware::from_fn(middleware::set_request_context))
}
