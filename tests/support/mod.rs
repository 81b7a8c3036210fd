//! Fakes shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use postproxy::cache::{CacheStore, MemoryStore, StoreError};
use postproxy::upstream::{FetchError, ResourceFetcher};
use serde_json::json;
use tokio::sync::Notify;

pub fn post_json(id: u64, user_id: u64) -> serde_json::Value {
    json!({
        "userId": user_id,
        "id": id,
        "title": format!("title {id}"),
        "body": format!("body {id}"),
    })
}

pub fn user_json(id: u64) -> serde_json::Value {
    json!({
        "id": id,
        "name": format!("User {id}"),
        "username": format!("user{id}"),
        "email": format!("user{id}@example.com"),
        "address": {
            "street": "Kulas Light",
            "suite": "Apt. 556",
            "city": "Gwenborough",
            "zipcode": "92998-3874",
            "geo": { "lat": "-37.3159", "lng": "81.1496" }
        },
        "phone": "1-770-736-8031",
        "website": "example.org",
        "company": {
            "name": "Romaguera-Crona",
            "catchPhrase": "Multi-layered client-server neural-net",
            "bs": "harness real-time e-markets"
        }
    })
}

enum Route {
    Body(Bytes),
    Status(u16),
}

/// In-memory upstream answering by exact path, recording every call.
#[derive(Default)]
pub struct FakeUpstream {
    routes: Mutex<HashMap<String, Route>>,
    calls: Mutex<Vec<String>>,
    gate: Option<Arc<Notify>>,
}

impl FakeUpstream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every fetch waits for [`FakeUpstream::release`] before answering.
    pub fn gated() -> Self {
        Self {
            gate: Some(Arc::new(Notify::new())),
            ..Self::default()
        }
    }

    /// Serves the usual fixtures: posts 1..=5 (user 1 owns odd ids),
    /// users 1..=2 and the filtered list for user 1.
    pub fn with_fixtures(self) -> Self {
        let posts: Vec<_> = (1..=5).map(|id| post_json(id, 2 - id % 2)).collect();
        for post in &posts {
            let id = post["id"].as_u64().unwrap_or_default();
            self.respond_json(&format!("/posts/{id}"), post);
        }
        self.respond_json("/posts", &json!(posts));
        self.respond_json(
            "/posts?userId=1",
            &json!(posts.iter().filter(|post| post["userId"] == 1).collect::<Vec<_>>()),
        );
        self.respond_json("/users", &json!([user_json(1), user_json(2)]));
        self.respond_json("/users/1", &user_json(1));
        self.respond_json("/users/2", &user_json(2));
        self
    }

    pub fn respond(&self, path: &str, body: impl Into<Bytes>) {
        self.routes
            .lock()
            .expect("routes lock")
            .insert(path.to_string(), Route::Body(body.into()));
    }

    pub fn respond_json(&self, path: &str, value: &serde_json::Value) {
        self.respond(path, serde_json::to_vec(value).expect("encode fixture"));
    }

    pub fn fail(&self, path: &str, status: u16) {
        self.routes
            .lock()
            .expect("routes lock")
            .insert(path.to_string(), Route::Status(status));
    }

    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.notify_waiters();
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().expect("calls lock").len()
    }

    pub fn calls_to(&self, path: &str) -> usize {
        self.calls
            .lock()
            .expect("calls lock")
            .iter()
            .filter(|call| call.as_str() == path)
            .count()
    }
}

#[async_trait]
impl ResourceFetcher for FakeUpstream {
    async fn fetch(&self, path: &str) -> Result<Bytes, FetchError> {
        self.calls.lock().expect("calls lock").push(path.to_string());
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }

        let routes = self.routes.lock().expect("routes lock");
        match routes.get(path) {
            Some(Route::Body(body)) => Ok(body.clone()),
            Some(Route::Status(status)) => Err(FetchError::BadStatus {
                path: path.to_string(),
                status: *status,
            }),
            None => Err(FetchError::BadStatus {
                path: path.to_string(),
                status: 404,
            }),
        }
    }
}

/// Memory store that counts operations and can be switched to failing reads.
#[derive(Default)]
pub struct InstrumentedStore {
    inner: MemoryStore,
    unavailable: AtomicBool,
    gets: AtomicUsize,
    sets: AtomicUsize,
    deletes: AtomicUsize,
}

impl InstrumentedStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn operations(&self) -> usize {
        self.gets() + self.sets() + self.deletes.load(Ordering::SeqCst)
    }

    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn sets(&self) -> usize {
        self.sets.load(Ordering::SeqCst)
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.inner.get(key).await.expect("memory get").is_some()
    }

    pub async fn raw(&self, key: &str) -> Option<Bytes> {
        self.inner.get(key).await.expect("memory get")
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::unavailable("connection refused"));
        }
        Ok(())
    }
}

#[async_trait]
impl CacheStore for InstrumentedStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), StoreError> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.inner.set(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.inner.delete(key).await
    }
}

/// Serve `router` on an ephemeral local port and return its base URL.
pub async fn spawn_upstream(router: axum::Router) -> url::Url {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test upstream");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("test upstream");
    });
    url::Url::parse(&format!("http://{addr}/")).expect("upstream url")
}
