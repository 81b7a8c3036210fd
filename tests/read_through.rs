//! Read-through behaviour of the proxy service against an in-memory store
//! and a scripted upstream.

mod support;

use std::sync::Arc;
use std::time::Duration;

use postproxy::application::{ProxyError, ProxyService};
use postproxy::cache::{CacheConfig, Origin};
use support::{FakeUpstream, InstrumentedStore, post_json};

fn service_with(
    store: &Arc<InstrumentedStore>,
    upstream: &Arc<FakeUpstream>,
    config: CacheConfig,
) -> ProxyService {
    ProxyService::new(store.clone(), upstream.clone(), config)
}

fn setup() -> (Arc<InstrumentedStore>, Arc<FakeUpstream>, ProxyService) {
    let store = Arc::new(InstrumentedStore::new());
    let upstream = Arc::new(FakeUpstream::new().with_fixtures());
    let service = service_with(&store, &upstream, CacheConfig::default());
    (store, upstream, service)
}

#[tokio::test]
async fn miss_populates_cache_and_hit_skips_upstream() {
    let (store, upstream, service) = setup();

    let first = service.posts().await.expect("first lookup");
    assert_eq!(first.origin, Origin::Upstream(()));
    assert!(store.contains("posts").await);
    assert_eq!(upstream.calls_to("/posts"), 1);

    let second = service.posts().await.expect("second lookup");
    assert_eq!(second.origin, Origin::Cache);
    assert_eq!(second.payload, first.payload);
    assert_eq!(upstream.calls_to("/posts"), 1);
}

#[tokio::test]
async fn cached_entry_wins_even_if_upstream_changes() {
    let (_store, upstream, service) = setup();

    let before = service.user(1).await.expect("user");
    upstream.respond_json("/users/1", &support::user_json(42));
    let after = service.user(1).await.expect("cached user");

    assert_eq!(before.payload, after.payload);
    assert_eq!(upstream.calls_to("/users/1"), 1);
}

#[tokio::test]
async fn post_detail_is_cached_verbatim() {
    let (store, upstream, service) = setup();
    let raw = "{ \"id\": 7,\n  \"title\": \"spaced\" }";
    upstream.respond("/posts/7", raw);

    let served = service.post(7).await.expect("post");

    assert_eq!(served.payload, raw.as_bytes());
    assert_eq!(store.raw("post_7").await.expect("cached"), raw.as_bytes());
}

#[tokio::test]
async fn checked_payloads_are_cached_as_upstream_sent_them() {
    let (store, upstream, service) = setup();
    let posts = r#"[{"userId":1,"id":1,"title":"t","body":"b","tags":["x"]}]"#;
    let user = r#"{"id":3,"name":"N","extra":{"nested":true}}"#;
    upstream.respond("/posts", posts);
    upstream.respond("/users/3", user);

    let served_posts = service.posts().await.expect("posts");
    let served_user = service.user(3).await.expect("user");

    assert_eq!(served_posts.payload, posts.as_bytes());
    assert_eq!(store.raw("posts").await.expect("cached"), posts.as_bytes());
    assert_eq!(served_user.payload, user.as_bytes());
    assert_eq!(store.raw("user_3").await.expect("cached"), user.as_bytes());

    let cached = service.posts().await.expect("cached posts");
    assert_eq!(cached.origin, Origin::Cache);
    assert_eq!(cached.payload, posts.as_bytes());
}

#[tokio::test]
async fn user_posts_use_filtered_upstream_path() {
    let (store, upstream, service) = setup();

    let served = service.user_posts(1).await.expect("user posts");
    let posts: Vec<serde_json::Value> = serde_json::from_slice(&served.payload).expect("json");

    assert_eq!(upstream.calls(), vec!["/posts?userId=1"]);
    assert!(posts.iter().all(|post| post["userId"] == 1));
    assert!(store.contains("user_posts_1").await);
}

#[tokio::test]
async fn failed_fetch_leaves_cache_untouched() {
    let (store, upstream, service) = setup();
    upstream.fail("/users/9", 404);

    let error = service.user(9).await.expect_err("missing user");
    assert!(matches!(error, ProxyError::UpstreamBadStatus { status: 404, .. }));
    assert!(!store.contains("user_9").await);
    assert_eq!(store.sets(), 0);

    service.user(9).await.expect_err("still missing");
    assert_eq!(upstream.calls_to("/users/9"), 2);
}

#[tokio::test]
async fn undecodable_payload_is_not_cached() {
    let (store, upstream, service) = setup();
    upstream.respond("/users", "{\"not\":\"a list\"}");

    let error = service.users().await.expect_err("wrong shape");
    assert!(matches!(error, ProxyError::Decode { .. }));
    assert!(!store.contains("users").await);
}

#[tokio::test]
async fn unavailable_store_is_reported_without_upstream_call() {
    let (store, upstream, service) = setup();
    store.set_unavailable(true);

    let error = service.posts().await.expect_err("store down");

    assert!(matches!(error, ProxyError::StoreUnavailable(_)));
    assert_eq!(upstream.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn entries_expire_per_ttl_class() {
    let (_store, upstream, service) = setup();

    service.posts().await.expect("posts");
    service.post(1).await.expect("post");

    tokio::time::advance(Duration::from_secs(121)).await;
    assert_eq!(
        service.posts().await.expect("posts").origin,
        Origin::Upstream(())
    );
    assert_eq!(service.post(1).await.expect("post").origin, Origin::Cache);

    tokio::time::advance(Duration::from_secs(180)).await;
    assert_eq!(
        service.post(1).await.expect("post").origin,
        Origin::Upstream(())
    );
    assert_eq!(upstream.calls_to("/posts"), 2);
    assert_eq!(upstream.calls_to("/posts/1"), 2);
}

#[tokio::test]
async fn invalidation_forces_refetch() {
    let (store, upstream, service) = setup();

    service.post(2).await.expect("post");
    upstream.respond_json("/posts/2", &post_json(2, 9));

    let key = service.invalidate("post_2").await.expect("invalidate");
    assert_eq!(key.as_str(), "post_2");
    assert!(!store.contains("post_2").await);

    let refreshed = service.post(2).await.expect("post");
    assert_eq!(refreshed.origin, Origin::Upstream(()));
    let value: serde_json::Value = serde_json::from_slice(&refreshed.payload).expect("json");
    assert_eq!(value["userId"], 9);
}

#[tokio::test]
async fn clear_posts_only_drops_the_post_list() {
    let (store, _upstream, service) = setup();
    service.posts().await.expect("posts");
    service.post(1).await.expect("post");

    let key = service.clear_posts().await.expect("clear");

    assert_eq!(key.as_str(), "posts");
    assert!(!store.contains("posts").await);
    assert!(store.contains("post_1").await);
}

#[tokio::test]
async fn invalidating_absent_key_succeeds() {
    let (_store, _upstream, service) = setup();
    service.invalidate("user_404").await.expect("absent key");
    service.invalidate("user_404").await.expect("absent key again");
}

#[tokio::test]
async fn blank_invalidation_key_is_rejected() {
    let (store, _upstream, service) = setup();

    let error = service.invalidate("  ").await.expect_err("blank key");

    assert!(matches!(error, ProxyError::InvalidInput(_)));
    assert_eq!(store.operations(), 0);
}

#[tokio::test]
async fn concurrent_misses_share_one_upstream_fetch() {
    let store = Arc::new(InstrumentedStore::new());
    let upstream = Arc::new(FakeUpstream::gated().with_fixtures());
    let service = service_with(&store, &upstream, CacheConfig::default());

    let mut first = Box::pin(service.users());
    assert!(futures::poll!(first.as_mut()).is_pending());
    let mut second = Box::pin(service.users());
    assert!(futures::poll!(second.as_mut()).is_pending());

    upstream.release();
    let (first, second) = tokio::join!(first, second);

    assert_eq!(upstream.calls_to("/users"), 1);
    assert_eq!(first.expect("first").origin, Origin::Upstream(()));
    let second = second.expect("second");
    assert_eq!(second.origin, Origin::Joined(()));
    assert_eq!(store.sets(), 1);
}

#[tokio::test]
async fn without_coalescing_concurrent_misses_each_fetch() {
    let store = Arc::new(InstrumentedStore::new());
    let upstream = Arc::new(FakeUpstream::gated().with_fixtures());
    let config = CacheConfig {
        coalesce_misses: false,
        ..Default::default()
    };
    let service = service_with(&store, &upstream, config);

    let mut first = Box::pin(service.users());
    let mut second = Box::pin(service.users());
    assert!(futures::poll!(first.as_mut()).is_pending());
    assert!(futures::poll!(second.as_mut()).is_pending());

    upstream.release();
    let (first, second) = tokio::join!(first, second);

    assert_eq!(upstream.calls_to("/users"), 2);
    assert_eq!(first.expect("first").origin, Origin::Upstream(()));
    assert_eq!(second.expect("second").origin, Origin::Upstream(()));
    assert_eq!(store.sets(), 2);
}
