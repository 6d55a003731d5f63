//! HTTP Application Assembly
//!
//! Wires handlers, rate-limit tiers and shared state into one Axum router.
//!
//! ## Tier Layout
//! - **API**: every route except `/health`.
//! - **Search**: additionally on `/search/*`.
//! - **DataMutation**: additionally on record create/update/delete.
//! - **Import**: additionally on `/records/import`.

use crate::config::SearchSettings;
use crate::ratelimit::limiter::TieredRateLimiter;
use crate::ratelimit::middleware::{enforce, ClientKeys, TierGate};
use crate::ratelimit::types::Tier;
use crate::search::aggregator::Aggregator;
use crate::search::handlers::{
    handle_search_advanced, handle_search_files, handle_search_local, handle_search_web,
    handle_suggestions,
};
use crate::storage::handlers::{
    handle_create_record, handle_delete_record, handle_get_record, handle_import_records,
    handle_list_records, handle_update_record,
};
use crate::storage::memory::MemoryRecordStore;
use crate::storage::protocol::{ENDPOINT_IMPORT, ENDPOINT_RECORD, ENDPOINT_RECORDS};
use crate::storage::RecordStore;

use axum::extract::Request;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post, put};
use axum::{Extension, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Shared, explicitly constructed service state.
#[derive(Clone)]
pub struct AppState {
    pub aggregator: Arc<Aggregator>,
    pub store: Arc<MemoryRecordStore>,
    pub limiter: Arc<TieredRateLimiter>,
    pub settings: Arc<SearchSettings>,
    pub client_keys: ClientKeys,
}

pub fn build_router(state: AppState) -> Router {
    let gate = |tier| {
        from_fn_with_state(
            TierGate::new(state.limiter.clone(), tier, state.client_keys),
            enforce,
        )
    };

    let search_routes = Router::new()
        .route("/search/local", post(handle_search_local))
        .route("/search/files", post(handle_search_files))
        .route("/search/web", post(handle_search_web))
        .route("/search/advanced", post(handle_search_advanced))
        .route("/search/suggestions", get(handle_suggestions))
        .route_layer(gate(Tier::Search));

    let read_routes = Router::new()
        .route(ENDPOINT_RECORDS, get(handle_list_records))
        .route(ENDPOINT_RECORD, get(handle_get_record));

    let mutation_routes = Router::new()
        .route(ENDPOINT_RECORDS, post(handle_create_record))
        .route(
            ENDPOINT_RECORD,
            put(handle_update_record).delete(handle_delete_record),
        )
        .route_layer(gate(Tier::DataMutation));

    let import_routes = Router::new()
        .route(ENDPOINT_IMPORT, post(handle_import_records))
        .route_layer(gate(Tier::Import));

    let api_routes = Router::new()
        .merge(search_routes)
        .merge(read_routes)
        .merge(mutation_routes)
        .merge(import_routes)
        .route_layer(gate(Tier::Api));

    Router::new()
        .route("/health", get(handle_health))
        .merge(api_routes)
        .layer(Extension(state.aggregator))
        .layer(Extension(state.store))
        .layer(Extension(state.limiter))
        .layer(Extension(state.settings))
        .layer(Extension(state.client_keys))
        .layer(TraceLayer::new_for_http())
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub records: usize,
    pub rate_limit: RateLimitStatus,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RateLimitStatus {
    pub limit: u32,
    pub remaining: u32,
}

/// Liveness plus the caller's API-tier budget, read with a zero-cost probe.
pub async fn handle_health(
    Extension(store): Extension<Arc<MemoryRecordStore>>,
    Extension(limiter): Extension<Arc<TieredRateLimiter>>,
    Extension(keys): Extension<ClientKeys>,
    request: Request,
) -> Json<HealthResponse> {
    let decision = limiter.probe(Tier::Api, &keys.key_for(&request));

    Json(HealthResponse {
        status: "ok".to_string(),
        records: store.len(),
        rate_limit: RateLimitStatus {
            limit: decision.limit(),
            remaining: decision.remaining(),
        },
    })
}
