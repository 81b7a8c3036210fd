use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::{HeaderName, HeaderValue, StatusCode, header::CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use postproxy_types::RecentPostsRequest;
use serde_json::json;

use crate::application::{ProxyError, Served};
use crate::cache::Origin;

use super::HttpState;

pub const CACHE_STATUS_HEADER: HeaderName = HeaderName::from_static("x-cache");
pub const BATCH_FAILED_IDS_HEADER: HeaderName = HeaderName::from_static("x-batch-failed-ids");

type IdPath = Result<Path<u64>, PathRejection>;

fn json_response(payload: Bytes, origin: &Origin) -> Response {
    let mut response = (StatusCode::OK, payload).into_response();
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(CACHE_STATUS_HEADER, HeaderValue::from_static(origin.as_str()));
    response
}

fn served(result: Result<Served, ProxyError>) -> Response {
    match result {
        Ok(served) => json_response(served.payload, &served.origin),
        Err(err) => err.into_response(),
    }
}

fn path_id(path: IdPath) -> Result<u64, ProxyError> {
    path.map(|Path(id)| id)
        .map_err(|rejection| ProxyError::invalid_input(rejection.body_text()))
}

pub async fn list_posts(State(state): State<HttpState>) -> Response {
    served(state.service.posts().await)
}

pub async fn get_post(State(state): State<HttpState>, path: IdPath) -> Response {
    match path_id(path) {
        Ok(id) => served(state.service.post(id).await),
        Err(err) => err.into_response(),
    }
}

pub async fn list_users(State(state): State<HttpState>) -> Response {
    served(state.service.users().await)
}

pub async fn get_user(State(state): State<HttpState>, path: IdPath) -> Response {
    match path_id(path) {
        Ok(id) => served(state.service.user(id).await),
        Err(err) => err.into_response(),
    }
}

pub async fn list_user_posts(State(state): State<HttpState>, path: IdPath) -> Response {
    match path_id(path) {
        Ok(id) => served(state.service.user_posts(id).await),
        Err(err) => err.into_response(),
    }
}

pub async fn recent_posts(
    State(state): State<HttpState>,
    payload: Result<Json<RecentPostsRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            return ProxyError::invalid_input(rejection.body_text()).into_response();
        }
    };

    let outcome = match state.service.recent_posts(&request.ids).await {
        Ok(outcome) => outcome,
        Err(err) => return err.into_response(),
    };

    let failed_ids = outcome.failed_ids();
    let mut response = json_response(outcome.payload, &outcome.origin);
    if !failed_ids.is_empty() {
        let joined = failed_ids
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join(",");
        if let Ok(value) = HeaderValue::from_str(&joined) {
            response.headers_mut().insert(BATCH_FAILED_IDS_HEADER, value);
        }
    }
    response
}

pub async fn clear_posts(State(state): State<HttpState>) -> Response {
    match state.service.clear_posts().await {
        Ok(key) => Json(json!({ "invalidated": key.as_str() })).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn invalidate_key(State(state): State<HttpState>, Path(key): Path<String>) -> Response {
    match state.service.invalidate(&key).await {
        Ok(key) => Json(json!({ "invalidated": key.as_str() })).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn health() -> StatusCode {
    StatusCode::NO_CONTENT
}
