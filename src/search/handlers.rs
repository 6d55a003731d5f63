use super::aggregator::{Aggregator, SourceOptions};
use super::relevance::{RelevanceIndex, DEFAULT_THRESHOLD};
use super::types::{
    ErrorResponse, SearchRequest, SearchResponse, SourceKind, SuggestionParams,
    SuggestionResponse,
};
use crate::config::SearchSettings;
use crate::error::{Result, SearchError};

use axum::extract::rejection::JsonRejection;
use axum::extract::Query;
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::Utc;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

type HandlerResult = std::result::Result<Json<SearchResponse>, (StatusCode, Json<ErrorResponse>)>;

/// Which route a search came through; decides the default source set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchType {
    Local,
    Files,
    Web,
    Advanced,
}

impl SearchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchType::Local => "local",
            SearchType::Files => "files",
            SearchType::Web => "web",
            SearchType::Advanced => "advanced",
        }
    }
}

pub async fn handle_search_local(
    Extension(aggregator): Extension<Arc<Aggregator>>,
    Extension(settings): Extension<Arc<SearchSettings>>,
    body: std::result::Result<Json<SearchRequest>, JsonRejection>,
) -> HandlerResult {
    run_search(SearchType::Local, &aggregator, &settings, body).await
}

pub async fn handle_search_files(
    Extension(aggregator): Extension<Arc<Aggregator>>,
    Extension(settings): Extension<Arc<SearchSettings>>,
    body: std::result::Result<Json<SearchRequest>, JsonRejection>,
) -> HandlerResult {
    run_search(SearchType::Files, &aggregator, &settings, body).await
}

pub async fn handle_search_web(
    Extension(aggregator): Extension<Arc<Aggregator>>,
    Extension(settings): Extension<Arc<SearchSettings>>,
    body: std::result::Result<Json<SearchRequest>, JsonRejection>,
) -> HandlerResult {
    run_search(SearchType::Web, &aggregator, &settings, body).await
}

pub async fn handle_search_advanced(
    Extension(aggregator): Extension<Arc<Aggregator>>,
    Extension(settings): Extension<Arc<SearchSettings>>,
    body: std::result::Result<Json<SearchRequest>, JsonRejection>,
) -> HandlerResult {
    run_search(SearchType::Advanced, &aggregator, &settings, body).await
}

pub async fn handle_suggestions(
    Query(params): Query<SuggestionParams>,
    Extension(aggregator): Extension<Arc<Aggregator>>,
    Extension(settings): Extension<Arc<SearchSettings>>,
) -> Json<SuggestionResponse> {
    let query = params.q.trim();
    if query.chars().count() < 2 || query.chars().count() > settings.max_query_len {
        return Json(SuggestionResponse {
            suggestions: Vec::new(),
        });
    }

    let index = RelevanceIndex::build(aggregator.store().snapshot());
    let suggestions = index.suggest(
        query,
        settings.suggestion_threshold,
        settings.max_suggestions,
    );
    tracing::debug!("{} suggestions for '{}'", suggestions.len(), query);

    Json(SuggestionResponse { suggestions })
}

async fn run_search(
    search_type: SearchType,
    aggregator: &Aggregator,
    settings: &SearchSettings,
    body: std::result::Result<Json<SearchRequest>, JsonRejection>,
) -> HandlerResult {
    let Json(req) = body.map_err(|rejection| error_response(rejection.into()))?;
    let prepared = prepare(search_type, aggregator, settings, &req).map_err(error_response)?;

    match aggregator
        .search(&prepared.query, &prepared.sources, prepared.limit, &prepared.options)
        .await
    {
        Ok(outcome) => Ok(Json(SearchResponse {
            success: true,
            results: outcome.results,
            query: prepared.query,
            timestamp: Utc::now(),
            search_type: search_type.as_str().to_string(),
            failed_sources: outcome.failures,
        })),
        Err(e) => Err(error_response(e)),
    }
}

/// A validated search, ready for the aggregator.
#[derive(Debug)]
pub(crate) struct PreparedSearch {
    pub query: String,
    pub sources: BTreeSet<SourceKind>,
    pub limit: usize,
    pub options: SourceOptions,
}

pub(crate) fn prepare(
    search_type: SearchType,
    aggregator: &Aggregator,
    settings: &SearchSettings,
    req: &SearchRequest,
) -> Result<PreparedSearch> {
    let query = validate_query(&req.query, settings.max_query_len)?;

    let sources: BTreeSet<SourceKind> = match search_type {
        SearchType::Local => BTreeSet::from([SourceKind::LocalStore]),
        SearchType::Files => BTreeSet::from([SourceKind::FileSystem]),
        SearchType::Web => BTreeSet::from([SourceKind::External]),
        SearchType::Advanced => match &req.sources {
            None => SourceKind::ALL.into_iter().collect(),
            Some(names) => names
                .iter()
                .map(|name| name.parse::<SourceKind>().map_err(SearchError::Validation))
                .collect::<Result<_>>()?,
        },
    };

    let limit = req
        .options
        .limit
        .unwrap_or(settings.default_limit)
        .clamp(1, settings.max_limit);

    let threshold = req.options.threshold.unwrap_or(DEFAULT_THRESHOLD);
    if !(0.0..=1.0).contains(&threshold) {
        return Err(SearchError::Validation(
            "threshold must be between 0 and 1".to_string(),
        ));
    }

    let root = match req.path.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
        Some(requested) if sources.contains(&SourceKind::FileSystem) => {
            Some(resolve_root(aggregator.default_root(), requested)?)
        }
        _ => None,
    };

    Ok(PreparedSearch {
        query,
        sources,
        limit,
        options: SourceOptions {
            threshold,
            category: req.options.category.clone().filter(|c| !c.trim().is_empty()),
            root,
            extensions: req.options.extensions.clone(),
        },
    })
}

pub fn validate_query(query: &str, max_len: usize) -> Result<String> {
    let query = query.trim();
    if query.is_empty() {
        return Err(SearchError::Validation("query must not be empty".to_string()));
    }
    if query.chars().count() > max_len {
        return Err(SearchError::Validation(format!(
            "query exceeds {} characters",
            max_len
        )));
    }
    Ok(query.to_string())
}

/// Resolves a requested search path against the configured root and refuses
/// anything that ends up outside of it.
pub fn resolve_root(root: &Path, requested: &str) -> Result<PathBuf> {
    let base = root
        .canonicalize()
        .map_err(|e| SearchError::Validation(format!("search root unavailable: {}", e)))?;
    let candidate = base
        .join(requested)
        .canonicalize()
        .map_err(|_| SearchError::Validation(format!("path '{}' not found", requested)))?;

    if !candidate.starts_with(&base) {
        return Err(SearchError::Validation(format!(
            "path '{}' is outside the search root",
            requested
        )));
    }
    Ok(candidate)
}

fn error_response(err: SearchError) -> (StatusCode, Json<ErrorResponse>) {
    let status = match &err {
        SearchError::Validation(_) | SearchError::NoSources => StatusCode::BAD_REQUEST,
        SearchError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        tracing::error!("Search failed: {}", err);
    } else {
        tracing::debug!("Search rejected: {}", err);
    }

    (
        status,
        Json(ErrorResponse {
            success: false,
            error: err.kind().to_string(),
            message: err.to_string(),
        }),
    )
}
