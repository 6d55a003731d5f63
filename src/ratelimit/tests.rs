//! Rate Limiting Module Tests
//!
//! Validates the tier policies, the window/block state machine and the HTTP layer.
//!
//! ## Test Scopes
//! - **Limiter**: window accounting, blocking, probing, key isolation and purging.
//! - **Concurrency**: simultaneous attempts for one key never over-admit.
//! - **Middleware**: 429 responses, `Retry-After` and `X-RateLimit-*` headers.
//!
//! Limiter tests drive `consume_at` with explicit timestamps instead of sleeping.

#[cfg(test)]
mod tests {
    use crate::app::{build_router, AppState, HealthResponse};
    use crate::config::SearchSettings;
    use crate::ratelimit::limiter::TieredRateLimiter;
    use crate::ratelimit::middleware::{
        iso_timestamp, ClientKeys, RateLimitedBody, HEADER_LIMIT, HEADER_REMAINING, HEADER_RESET,
    };
    use crate::ratelimit::types::{Decision, Tier};
    use crate::search::aggregator::Aggregator;
    use crate::search::external::DisabledSearch;
    use crate::storage::memory::MemoryRecordStore;

    use axum::body::Body;
    use axum::extract::ConnectInfo;
    use axum::http::{Request, StatusCode};
    use std::net::SocketAddr;
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    const T0: u64 = 1_700_000_000_000;

    // ============================================================
    // POLICY TESTS
    // ============================================================

    #[test]
    fn test_tier_policies() {
        let expected = [
            (Tier::Api, 100, 60, 60),
            (Tier::Search, 30, 60, 120),
            (Tier::DataMutation, 10, 60, 300),
            (Tier::Import, 3, 3600, 3600),
        ];

        for (tier, capacity, window, block) in expected {
            let policy = tier.policy();
            assert_eq!(policy.capacity, capacity, "{}", tier);
            assert_eq!(policy.window, Duration::from_secs(window), "{}", tier);
            assert_eq!(policy.block, Duration::from_secs(block), "{}", tier);
        }
        assert_eq!(Tier::ALL.len(), 4);
    }

    // ============================================================
    // WINDOW AND BLOCK TESTS
    // ============================================================

    #[test]
    fn test_search_tier_blocks_after_capacity() {
        // ARRANGE
        let limiter = TieredRateLimiter::new();

        // ACT & ASSERT: 30 requests inside the window are admitted
        for i in 0..30 {
            let decision = limiter.consume_at(Tier::Search, "10.0.0.1", 1, T0 + i);
            assert!(decision.is_allowed(), "request {} should pass", i + 1);
            assert_eq!(decision.remaining(), 29 - i as u32);
        }

        // The 31st is rejected with a two-minute retry
        let rejected = limiter.consume_at(Tier::Search, "10.0.0.1", 1, T0 + 30);
        match rejected {
            Decision::Rejected { limit, retry_after, reset_at } => {
                assert_eq!(limit, 30);
                assert_eq!(retry_after, Duration::from_secs(120));
                assert_eq!(reset_at, T0 + 30 + 120_000);
            }
            other => panic!("expected rejection, got {:?}", other),
        }

        // Still blocked even though the window itself has elapsed
        let during_block = limiter.consume_at(Tier::Search, "10.0.0.1", 1, T0 + 90_000);
        assert!(!during_block.is_allowed());
        if let Decision::Rejected { retry_after, .. } = during_block {
            assert_eq!(retry_after, Duration::from_millis(30 + 120_000 - 90_000));
        }

        // After the block a fresh window starts
        let after = limiter.consume_at(Tier::Search, "10.0.0.1", 1, T0 + 30 + 120_000);
        assert!(after.is_allowed());
        assert_eq!(after.remaining(), 29);
        let counter = limiter.counter(Tier::Search, "10.0.0.1").unwrap();
        assert_eq!(counter.consumed, 1);
        assert_eq!(counter.blocked_until, None);
    }

    #[test]
    fn test_window_resets_without_block() {
        let limiter = TieredRateLimiter::new();

        for _ in 0..10 {
            assert!(limiter.consume_at(Tier::DataMutation, "k", 1, T0).is_allowed());
        }
        let next_window = limiter.consume_at(Tier::DataMutation, "k", 1, T0 + 60_000);

        assert!(next_window.is_allowed());
        assert_eq!(limiter.counter(Tier::DataMutation, "k").unwrap().consumed, 1);
        assert_eq!(next_window.reset_at(), T0 + 120_000);
    }

    #[test]
    fn test_multi_point_consumption() {
        let limiter = TieredRateLimiter::new();

        assert!(limiter.consume_at(Tier::Import, "k", 2, T0).is_allowed());
        assert!(!limiter.consume_at(Tier::Import, "k", 2, T0 + 1).is_allowed());
    }

    #[test]
    fn test_import_tier_hour_long_block() {
        let limiter = TieredRateLimiter::new();

        for _ in 0..3 {
            assert!(limiter.consume_at(Tier::Import, "k", 1, T0).is_allowed());
        }
        assert!(!limiter.consume_at(Tier::Import, "k", 1, T0).is_allowed());
        assert!(!limiter.consume_at(Tier::Import, "k", 1, T0 + 3_599_999).is_allowed());
        assert!(limiter.consume_at(Tier::Import, "k", 1, T0 + 3_600_000).is_allowed());
    }

    // ============================================================
    // PROBE AND ISOLATION TESTS
    // ============================================================

    #[test]
    fn test_probe_never_mutates() {
        let limiter = TieredRateLimiter::new();

        let untouched = limiter.consume_at(Tier::Api, "k", 0, T0);
        assert_eq!(untouched.remaining(), 100);
        assert_eq!(limiter.tracked_keys(), 0);

        limiter.consume_at(Tier::Api, "k", 1, T0);
        let before = limiter.counter(Tier::Api, "k").unwrap();
        let probed = limiter.consume_at(Tier::Api, "k", 0, T0 + 5);
        let after = limiter.counter(Tier::Api, "k").unwrap();

        assert_eq!(probed.remaining(), 99);
        assert_eq!(before, after);
    }

    #[test]
    fn test_probe_reports_block() {
        let limiter = TieredRateLimiter::new();
        for _ in 0..4 {
            limiter.consume_at(Tier::Import, "k", 1, T0);
        }

        let probed = limiter.consume_at(Tier::Import, "k", 0, T0 + 1_000);

        assert!(!probed.is_allowed());
        assert_eq!(probed.remaining(), 0);
    }

    #[test]
    fn test_keys_and_tiers_are_independent() {
        let limiter = TieredRateLimiter::new();
        for _ in 0..4 {
            limiter.consume_at(Tier::Import, "a", 1, T0);
        }

        assert!(!limiter.consume_at(Tier::Import, "a", 1, T0).is_allowed());
        assert!(limiter.consume_at(Tier::Import, "b", 1, T0).is_allowed());
        assert!(limiter.consume_at(Tier::Api, "a", 1, T0).is_allowed());
    }

    #[test]
    fn test_separate_instances_share_nothing() {
        let first = TieredRateLimiter::new();
        let second = TieredRateLimiter::new();
        for _ in 0..4 {
            first.consume_at(Tier::Import, "k", 1, T0);
        }

        assert!(second.consume_at(Tier::Import, "k", 1, T0).is_allowed());
    }

    // ============================================================
    // PURGE TESTS
    // ============================================================

    #[test]
    fn test_purge_drops_idle_counters_only() {
        // ARRANGE: an idle API counter and a blocked search counter
        let limiter = TieredRateLimiter::new();
        limiter.consume_at(Tier::Api, "idle", 1, T0);
        for _ in 0..31 {
            limiter.consume_at(Tier::Search, "blocked", 1, T0);
        }
        assert_eq!(limiter.tracked_keys(), 2);

        // ACT & ASSERT: API idle TTL is 60s + 60s
        assert_eq!(limiter.purge_stale(T0 + 119_999), 0);
        assert_eq!(limiter.purge_stale(T0 + 120_000), 1);
        assert!(limiter.counter(Tier::Api, "idle").is_none());
        assert!(limiter.counter(Tier::Search, "blocked").is_some());

        // Search idle TTL is 60s + 120s
        assert_eq!(limiter.purge_stale(T0 + 180_000), 1);
        assert_eq!(limiter.tracked_keys(), 0);
    }

    #[tokio::test]
    async fn test_sweeper_runs_in_background() {
        let limiter = TieredRateLimiter::new();
        // Far in the past, so the counter is stale right away.
        limiter.consume_at(Tier::Api, "old", 1, 1_000);

        let handle = limiter.clone().spawn_sweeper(Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.abort();

        assert_eq!(limiter.tracked_keys(), 0);
    }

    // ============================================================
    // CONCURRENCY TESTS
    // ============================================================

    #[test]
    fn test_concurrent_attempts_never_over_admit() {
        let limiter = TieredRateLimiter::new();

        let allowed: usize = std::thread::scope(|scope| {
            let workers: Vec<_> = (0..8)
                .map(|_| {
                    let limiter = limiter.clone();
                    scope.spawn(move || {
                        (0..10)
                            .filter(|_| limiter.consume_at(Tier::Search, "shared", 1, T0).is_allowed())
                            .count()
                    })
                })
                .collect();
            workers.into_iter().map(|w| w.join().unwrap()).sum()
        });

        assert_eq!(allowed, 30);
        assert_eq!(limiter.counter(Tier::Search, "shared").unwrap().consumed, 31);
    }

    // ============================================================
    // MIDDLEWARE TESTS
    // ============================================================

    fn test_state(trust_forwarded_for: bool) -> AppState {
        let store = Arc::new(MemoryRecordStore::new());
        let aggregator = Arc::new(Aggregator::new(
            store.clone(),
            Arc::new(DisabledSearch),
            std::env::temp_dir(),
        ));
        AppState {
            aggregator,
            store,
            limiter: TieredRateLimiter::new(),
            settings: Arc::new(SearchSettings::default()),
            client_keys: ClientKeys::new(trust_forwarded_for),
        }
    }

    fn suggestions_from(ip: &str) -> Request<Body> {
        Request::builder()
            .uri("/search/suggestions?q=ab")
            .header("x-forwarded-for", ip)
            .body(Body::empty())
            .unwrap()
    }

    fn header<'a>(response: &'a axum::response::Response, name: &str) -> &'a str {
        response.headers()[name].to_str().unwrap()
    }

    #[tokio::test]
    async fn test_search_routes_rejected_after_thirty() {
        // ARRANGE
        let app = build_router(test_state(true));

        // ACT: exhaust the search tier for one caller
        for i in 0..30 {
            let response = app.clone().oneshot(suggestions_from("10.0.0.7")).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK, "request {}", i + 1);
            assert_eq!(header(&response, HEADER_LIMIT), "30");
            assert_eq!(header(&response, HEADER_REMAINING), (29 - i).to_string());
        }
        let response = app.clone().oneshot(suggestions_from("10.0.0.7")).await.unwrap();

        // ASSERT
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(header(&response, "retry-after"), "120");
        assert_eq!(header(&response, HEADER_LIMIT), "30");
        assert_eq!(header(&response, HEADER_REMAINING), "0");
        assert!(header(&response, HEADER_RESET).ends_with('Z'));

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: RateLimitedBody = serde_json::from_slice(&bytes).unwrap();
        assert!(!body.success);
        assert_eq!(body.retry_after, 120);
        assert!(body.message.contains("search"));

        // Another caller is unaffected
        let other = app.clone().oneshot(suggestions_from("10.0.0.8")).await.unwrap();
        assert_eq!(other.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_health_is_not_charged() {
        let app = build_router(test_state(true));
        app.clone().oneshot(suggestions_from("10.0.0.9")).await.unwrap();

        for _ in 0..3 {
            let response = app
                .clone()
                .oneshot(
                    Request::builder()
                        .uri("/health")
                        .header("x-forwarded-for", "10.0.0.9")
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);

            let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap();
            let health: HealthResponse = serde_json::from_slice(&bytes).unwrap();
            assert_eq!(health.status, "ok");
            assert_eq!(health.rate_limit.limit, 100);
            assert_eq!(health.rate_limit.remaining, 99);
        }
    }

    fn from_peer(ip: &str, forwarded_for: &str) -> Request<Body> {
        let mut request = Request::builder()
            .uri("/search/suggestions?q=ab")
            .header("x-forwarded-for", forwarded_for)
            .body(Body::empty())
            .unwrap();
        let peer: SocketAddr = format!("{}:40000", ip).parse().unwrap();
        request.extensions_mut().insert(ConnectInfo(peer));
        request
    }

    #[tokio::test]
    async fn test_forged_forwarded_for_does_not_reset_budget() {
        // ARRANGE: default keying, one peer rotating the header
        let app = build_router(test_state(false));

        // ACT
        let mut admitted = 0;
        for i in 0..40 {
            let request = from_peer("198.51.100.20", &format!("10.1.0.{}", i));
            let response = app.clone().oneshot(request).await.unwrap();
            if response.status() == StatusCode::OK {
                admitted += 1;
            }
        }

        // ASSERT
        assert_eq!(admitted, 30);
        let other_peer = app
            .clone()
            .oneshot(from_peer("198.51.100.21", "10.1.0.1"))
            .await
            .unwrap();
        assert_eq!(other_peer.status(), StatusCode::OK);
    }

    #[test]
    fn test_client_keys_default_to_peer_address() {
        let keys = ClientKeys::default();

        let request = from_peer("192.0.2.44", "203.0.113.5");
        assert_eq!(keys.key_for(&request), "192.0.2.44");

        let anonymous = Request::builder()
            .header("x-forwarded-for", "203.0.113.5")
            .body(Body::empty())
            .unwrap();
        assert_eq!(keys.key_for(&anonymous), "unknown");
    }

    #[test]
    fn test_client_keys_trusting_proxy() {
        let keys = ClientKeys::new(true);

        let forwarded = from_peer("192.0.2.44", "203.0.113.5, 10.0.0.1");
        assert_eq!(keys.key_for(&forwarded), "203.0.113.5");

        let blank = from_peer("192.0.2.44", " ");
        assert_eq!(keys.key_for(&blank), "192.0.2.44");
    }

    #[test]
    fn test_iso_timestamp() {
        assert_eq!(iso_timestamp(0), "1970-01-01T00:00:00.000Z");
        assert_eq!(iso_timestamp(1_500), "1970-01-01T00:00:01.500Z");
    }
}
