use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use unified_search::app::{build_router, AppState};
use unified_search::config::ServerConfig;
use unified_search::ratelimit::limiter::{TieredRateLimiter, SWEEP_INTERVAL};
use unified_search::search::aggregator::Aggregator;
use unified_search::search::external::{DisabledSearch, ExternalSearch, HttpSearchProvider};
use unified_search::storage::memory::MemoryRecordStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "unified_search=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::parse();
    tracing::info!("Starting search service on {}", config.bind);

    // 1. Record store:
    let store = Arc::new(MemoryRecordStore::new());
    if let Some(path) = &config.records {
        let loaded = store.load_json(path)?;
        tracing::info!("Loaded {} records from {}", loaded, path.display());
    }

    // 2. Web search provider:
    let external: Arc<dyn ExternalSearch> = match &config.web_endpoint {
        Some(endpoint) => Arc::new(HttpSearchProvider::new(
            endpoint.clone(),
            config.source_timeout(),
        )),
        None => Arc::new(DisabledSearch),
    };
    tracing::info!("Web search provider: {}", external.name());

    // 3. Aggregator:
    let root = config.root.canonicalize()?;
    tracing::info!("Filesystem search root: {}", root.display());
    let aggregator = Arc::new(
        Aggregator::new(store.clone(), external, root).with_timeout(config.source_timeout()),
    );

    // 4. Rate limiter + stale counter sweeper:
    let limiter = TieredRateLimiter::new();
    limiter.clone().spawn_sweeper(SWEEP_INTERVAL);

    // 5. HTTP Router:
    let client_keys = config.client_keys();
    if client_keys.trust_forwarded_for {
        tracing::warn!("Rate limits keyed on X-Forwarded-For; run only behind a trusted proxy");
    }
    let app = build_router(AppState {
        aggregator,
        store,
        limiter,
        settings: Arc::new(config.search_settings()),
        client_keys,
    });

    // 6. Start HTTP server:
    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    tracing::info!("HTTP server listening on {}", config.bind);
    tracing::info!("Press Ctrl+C to shutdown");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
