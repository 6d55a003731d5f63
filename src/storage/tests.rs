//! Storage Module Tests
//!
//! Validates the in-memory record store and the record HTTP endpoints.
//!
//! ## Test Scopes
//! - **MemoryRecordStore**: CRUD, validation, snapshot ordering, bulk import, JSON seeding.
//! - **Endpoints**: status codes and envelopes of the `/records` routes.

#[cfg(test)]
mod tests {
    use crate::app::{build_router, AppState};
    use crate::config::SearchSettings;
    use crate::error::SearchError;
    use crate::ratelimit::limiter::TieredRateLimiter;
    use crate::ratelimit::middleware::ClientKeys;
    use crate::search::aggregator::Aggregator;
    use crate::search::external::DisabledSearch;
    use crate::storage::memory::MemoryRecordStore;
    use crate::storage::protocol::{ImportResponse, RecordListResponse, RecordResponse};
    use crate::storage::types::{RecordInput, MAX_TITLE_CHARS};
    use crate::storage::RecordStore;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::io::Write;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn input(title: &str) -> RecordInput {
        RecordInput {
            title: title.to_string(),
            content: format!("{} body", title),
            ..RecordInput::default()
        }
    }

    // ============================================================
    // MEMORY STORE TESTS
    // ============================================================

    #[test]
    fn test_create_and_get() {
        // ARRANGE
        let store = MemoryRecordStore::new();
        let mut new = input("  Meeting notes  ");
        new.tags = vec!["work".into(), " work ".into(), "".into(), "q3".into()];
        new.category = Some("   ".into());

        // ACT
        let created = store.create(new).unwrap();

        // ASSERT
        assert_eq!(created.title, "Meeting notes");
        assert_eq!(created.tags, vec!["work".to_string(), "q3".to_string()]);
        assert_eq!(created.category, None);
        assert_eq!(created.created_at, created.updated_at);
        assert_eq!(store.get(&created.id), Some(created.clone()));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_create_rejects_invalid_input() {
        let store = MemoryRecordStore::new();

        let empty = store.create(input("   "));
        let too_long = store.create(input(&"x".repeat(MAX_TITLE_CHARS + 1)));

        assert!(matches!(empty, Err(SearchError::Validation(_))));
        assert!(matches!(too_long, Err(SearchError::Validation(_))));
        assert!(store.is_empty());
    }

    #[test]
    fn test_update_existing_and_missing() {
        let store = MemoryRecordStore::new();
        let created = store.create(input("Draft")).unwrap();

        let updated = store.update(&created.id, input("Final")).unwrap().unwrap();
        let missing = store.update("no-such-id", input("Final")).unwrap();

        assert_eq!(updated.id, created.id);
        assert_eq!(updated.title, "Final");
        assert_eq!(updated.created_at, created.created_at);
        assert!(updated.updated_at >= created.updated_at);
        assert!(missing.is_none());
    }

    #[test]
    fn test_delete() {
        let store = MemoryRecordStore::new();
        let created = store.create(input("Temporary")).unwrap();

        assert!(store.delete(&created.id));
        assert!(!store.delete(&created.id));
        assert!(store.get(&created.id).is_none());
    }

    #[test]
    fn test_snapshot_most_recent_first() {
        let store = MemoryRecordStore::new();
        let first = store.create(input("First")).unwrap();
        let second = store.create(input("Second")).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        store.update(&first.id, input("First, edited")).unwrap();

        let snapshot = store.snapshot();

        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].id, first.id);
        assert_eq!(snapshot[1].id, second.id);
    }

    #[test]
    fn test_snapshot_is_detached_from_later_writes() {
        let store = MemoryRecordStore::new();
        store.create(input("Before")).unwrap();

        let snapshot = store.snapshot();
        store.create(input("After")).unwrap();

        assert_eq!(snapshot.len(), 1);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_import_reports_rejections_by_index() {
        let store = MemoryRecordStore::new();

        let report = store.import(vec![input("One"), input(""), input("Three")]);

        assert_eq!(report.imported.len(), 2);
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.rejected[0].index, 1);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_load_json_seed_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[
                {{"title": "Lokale Suche verwenden", "content": "Anleitung", "tags": ["hilfe"]}},
                {{"title": ""}},
                {{"title": "Second", "category": "docs"}}
            ]"#
        )
        .unwrap();
        let store = MemoryRecordStore::new();

        let loaded = store.load_json(file.path()).unwrap();

        assert_eq!(loaded, 2);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_load_json_rejects_malformed_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();

        assert!(MemoryRecordStore::new().load_json(file.path()).is_err());
    }

    // ============================================================
    // ENDPOINT TESTS
    // ============================================================

    fn test_app() -> (axum::Router, Arc<MemoryRecordStore>) {
        let store = Arc::new(MemoryRecordStore::new());
        let aggregator = Arc::new(Aggregator::new(
            store.clone(),
            Arc::new(DisabledSearch),
            std::env::temp_dir(),
        ));
        let app = build_router(AppState {
            aggregator,
            store: store.clone(),
            limiter: TieredRateLimiter::new(),
            settings: Arc::new(SearchSettings::default()),
            client_keys: ClientKeys::default(),
        });
        (app, store)
    }

    fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn read_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_record_lifecycle_over_http() {
        let (app, store) = test_app();

        // Create
        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/records",
                serde_json::json!({"title": "Release plan", "content": "ship it"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let created: RecordResponse = read_json(response).await;
        let id = created.record.unwrap().id;

        // Update
        let response = app
            .clone()
            .oneshot(json_request(
                "PUT",
                &format!("/records/{}", id),
                serde_json::json!({"title": "Release plan v2"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(store.get(&id).unwrap().title, "Release plan v2");

        // List
        let response = app
            .clone()
            .oneshot(Request::builder().uri("/records").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let list: RecordListResponse = read_json(response).await;
        assert_eq!(list.count, 1);

        // Delete, then the record is gone
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri(format!("/records/{}", id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!("/records/{}", id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_create_invalid_is_bad_request() {
        let (app, store) = test_app();

        let response = app
            .oneshot(json_request("POST", "/records", serde_json::json!({"title": ""})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: RecordResponse = read_json(response).await;
        assert!(!body.success);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_bodies_get_json_errors() {
        let (app, store) = test_app();
        let cases = [
            ("POST", "/records".to_string(), serde_json::json!({"content": "no title"})),
            ("PUT", "/records/some-id".to_string(), serde_json::json!(["not", "an", "object"])),
            ("POST", "/records/import".to_string(), serde_json::json!({"entries": []})),
        ];

        for (method, uri, body) in cases {
            let response = app
                .clone()
                .oneshot(json_request(method, &uri, body))
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{} {}", method, uri);
            let body: RecordResponse = read_json(response).await;
            assert!(!body.success);
            assert!(body.message.is_some());
        }
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_import_endpoint() {
        let (app, store) = test_app();

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/records/import",
                serde_json::json!({"records": [{"title": "A"}, {"title": " "}, {"title": "C"}]}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body: ImportResponse = read_json(response).await;
        assert!(body.success);
        assert_eq!(body.imported, 2);
        assert_eq!(body.rejected[0].index, 1);
        assert_eq!(store.len(), 2);

        let response = app
            .oneshot(json_request(
                "POST",
                "/records/import",
                serde_json::json!({"records": [{"title": ""}]}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_mutation_tier_limits_writes() {
        let (app, _store) = test_app();

        for _ in 0..10 {
            let response = app
                .clone()
                .oneshot(json_request("POST", "/records", serde_json::json!({"title": "x"})))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::CREATED);
        }
        let response = app
            .clone()
            .oneshot(json_request("POST", "/records", serde_json::json!({"title": "x"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

        // Reads only pass through the API tier
        let response = app
            .oneshot(Request::builder().uri("/records").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
