//! Multi-Source Aggregation
//!
//! Fans one query out to the selected sources, waits for all of them (each one
//! bounded by its own deadline), then deduplicates, ranks and truncates the
//! merged list.
//!
//! ## Ranking
//! Scores (distance, lower is better) and match counts (higher is better) are
//! never folded into one number. Scored results come first in ascending score
//! order, then count-only results in descending count order, then results with
//! no ranking signal. Sorting is stable, so ties keep source order.

use super::external::ExternalSearch;
use super::files;
use super::relevance::{RelevanceIndex, DEFAULT_THRESHOLD};
use super::types::{SearchResult, SourceFailure, SourceKind};
use crate::error::{Result, SearchError};
use crate::storage::RecordStore;

use futures::future::join_all;
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_SOURCE_TIMEOUT: Duration = Duration::from_secs(3);

/// Per-source knobs for one aggregated search.
#[derive(Debug, Clone)]
pub struct SourceOptions {
    /// Relevance cut-off for the local store (0 = exact only, 1 = anything).
    pub threshold: f64,
    /// Only local records in this category are scored.
    pub category: Option<String>,
    /// Filesystem root; the aggregator's default root when `None`.
    pub root: Option<PathBuf>,
    pub extensions: Vec<String>,
}

impl Default for SourceOptions {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            category: None,
            root: None,
            extensions: Vec::new(),
        }
    }
}

/// Merged results plus the sources that contributed nothing because they failed.
#[derive(Debug, Default)]
pub struct AggregateOutcome {
    pub results: Vec<SearchResult>,
    pub failures: Vec<SourceFailure>,
}

pub struct Aggregator {
    store: Arc<dyn RecordStore>,
    external: Arc<dyn ExternalSearch>,
    default_root: PathBuf,
    source_timeout: Duration,
}

impl Aggregator {
    pub fn new(
        store: Arc<dyn RecordStore>,
        external: Arc<dyn ExternalSearch>,
        default_root: PathBuf,
    ) -> Self {
        Self {
            store,
            external,
            default_root,
            source_timeout: DEFAULT_SOURCE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, source_timeout: Duration) -> Self {
        self.source_timeout = source_timeout;
        self
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    pub fn default_root(&self) -> &PathBuf {
        &self.default_root
    }

    /// Runs `query` against every source in `sources` concurrently.
    ///
    /// Each source gets `ceil(limit / sources.len())` as its own cap. Failing or
    /// timed-out sources are reported in [`AggregateOutcome::failures`] and
    /// contribute nothing; the only hard error is an empty source set.
    pub async fn search(
        &self,
        query: &str,
        sources: &BTreeSet<SourceKind>,
        limit: usize,
        options: &SourceOptions,
    ) -> Result<AggregateOutcome> {
        if sources.is_empty() {
            return Err(SearchError::NoSources);
        }
        if limit == 0 {
            return Ok(AggregateOutcome::default());
        }

        let per_source = limit.div_ceil(sources.len());
        let deadline = self.source_timeout;
        tracing::debug!(
            "Dispatching '{}' to {:?} ({} per source, deadline {:?})",
            query,
            sources,
            per_source,
            deadline
        );

        let calls = sources.iter().map(|&kind| {
            let cancel = CancellationToken::new();
            let handle = self.spawn_source(kind, query, per_source, options, cancel.clone());
            async move { (kind, settle(kind, handle, deadline, cancel).await) }
        });
        // Join barrier: every dispatched call has settled or hit its deadline.
        let settled = join_all(calls).await;

        let mut outcome = AggregateOutcome::default();
        for (kind, result) in settled {
            match result {
                Ok(results) => {
                    tracing::debug!("Source {} returned {} results", kind, results.len());
                    outcome.results.extend(results);
                }
                Err(e) => {
                    tracing::warn!("Source {} failed, continuing without it: {}", kind, e);
                    outcome.failures.push(SourceFailure {
                        source: kind,
                        reason: e.to_string(),
                    });
                }
            }
        }

        outcome.results = rank(dedup(outcome.results));
        outcome.results.truncate(limit);

        tracing::info!(
            "Search '{}' finished: {} results, {} failed sources",
            query,
            outcome.results.len(),
            outcome.failures.len()
        );
        Ok(outcome)
    }

    /// Explicit dispatch table: one arm per source kind.
    ///
    /// Blocking sources cannot be aborted once running, so they poll `cancel`
    /// and stop on their own when the deadline passes.
    fn spawn_source(
        &self,
        kind: SourceKind,
        query: &str,
        cap: usize,
        options: &SourceOptions,
        cancel: CancellationToken,
    ) -> JoinHandle<Result<Vec<SearchResult>>> {
        let query = query.to_string();

        match kind {
            SourceKind::LocalStore => {
                let store = self.store.clone();
                let category = options.category.clone();
                let threshold = options.threshold;
                tokio::task::spawn_blocking(move || {
                    let mut corpus = store.snapshot();
                    if let Some(category) = &category {
                        corpus.retain(|r| r.category.as_deref() == Some(category.as_str()));
                    }
                    RelevanceIndex::build(corpus)
                        .search_until(&query, threshold, cap, &cancel)
                        .ok_or_else(|| SearchError::unavailable(kind, "search cancelled"))
                })
            }
            SourceKind::FileSystem => {
                let root = options
                    .root
                    .clone()
                    .unwrap_or_else(|| self.default_root.clone());
                let extensions = options.extensions.clone();
                tokio::task::spawn_blocking(move || {
                    files::search_until(&query, &root, &extensions, cap, &cancel)
                })
            }
            SourceKind::External => {
                let external = self.external.clone();
                tokio::spawn(async move { external.search(&query, cap).await })
            }
        }
    }
}

/// Waits for one source call up to `deadline`.
///
/// `cancel` fires whenever this returns or is dropped, so a source that
/// outlives its deadline (or an abandoned request) is told to stop.
pub(crate) async fn settle(
    kind: SourceKind,
    handle: JoinHandle<Result<Vec<SearchResult>>>,
    deadline: Duration,
    cancel: CancellationToken,
) -> Result<Vec<SearchResult>> {
    let _cancel_on_exit = cancel.drop_guard();
    let abort = handle.abort_handle();

    match tokio::time::timeout(deadline, handle).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_error)) => Err(SearchError::unavailable(
            kind,
            format!("task failed: {}", join_error),
        )),
        Err(_) => {
            abort.abort();
            Err(SearchError::Timeout {
                source_kind: kind,
                after_ms: deadline.as_millis() as u64,
            })
        }
    }
}

/// Drops later results whose title, or full body, was already seen.
///
/// Bodies are compared through [`SearchResult::content_fingerprint`], never
/// through the snippet: unrelated files often share the excerpt around a hit.
/// Results without a body (unreadable files, empty records) only dedup by title.
pub fn dedup(results: Vec<SearchResult>) -> Vec<SearchResult> {
    let mut titles: HashSet<String> = HashSet::new();
    let mut bodies: HashSet<u64> = HashSet::new();
    let mut unique = Vec::with_capacity(results.len());

    for result in results {
        let body = result.content_fingerprint;
        if titles.contains(&result.title) || body.is_some_and(|b| bodies.contains(&b)) {
            continue;
        }
        titles.insert(result.title.clone());
        if let Some(body) = body {
            bodies.insert(body);
        }
        unique.push(result);
    }

    unique
}

/// Scored first (ascending), then count-only (descending), then neither.
pub fn rank(mut results: Vec<SearchResult>) -> Vec<SearchResult> {
    results.sort_by(compare_results);
    results
}

fn compare_results(a: &SearchResult, b: &SearchResult) -> Ordering {
    match (a.score, b.score) {
        (Some(x), Some(y)) => return x.total_cmp(&y),
        (Some(_), None) => return Ordering::Less,
        (None, Some(_)) => return Ordering::Greater,
        (None, None) => {}
    }

    match (a.match_count, b.match_count) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
