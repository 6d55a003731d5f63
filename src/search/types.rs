//! Search Data Types
//!
//! The result unit shared by every source, the closed set of source kinds,
//! and the JSON request/response envelopes used by the HTTP handlers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// Upper bound (in chars, marker excluded) for any snippet returned to clients.
pub const MAX_SNIPPET_CHARS: usize = 200;
pub const ELLIPSIS: &str = "...";

/// The origin of a search result.
///
/// Declaration order is the dispatch and merge order used by the aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SourceKind {
    #[serde(rename = "local")]
    LocalStore,
    #[serde(rename = "files")]
    FileSystem,
    #[serde(rename = "web")]
    External,
}

impl SourceKind {
    pub const ALL: [SourceKind; 3] = [
        SourceKind::LocalStore,
        SourceKind::FileSystem,
        SourceKind::External,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::LocalStore => "local",
            SourceKind::FileSystem => "files",
            SourceKind::External => "web",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(SourceKind::LocalStore),
            "files" => Ok(SourceKind::FileSystem),
            "web" => Ok(SourceKind::External),
            other => Err(format!("unknown source '{}'", other)),
        }
    }
}

/// A single hit produced by any source.
///
/// `score` is a distance (lower is better, 0 = exact) and only local-store
/// hits carry it. `match_count` counts literal occurrences and comes from the
/// filesystem. Web results carry neither: the provider returns no usable
/// relevance, so they rank after every local and file hit.
///
/// `content_fingerprint` identifies the full body the snippet was cut from and
/// is what deduplication compares; two different bodies can share a snippet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub title: String,
    pub snippet: String,
    pub source: SourceKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip)]
    pub content_fingerprint: Option<u64>,
}

impl SearchResult {
    pub fn new(title: impl Into<String>, snippet: &str, source: SourceKind) -> Self {
        Self {
            title: title.into(),
            snippet: make_snippet(snippet),
            source,
            score: None,
            match_count: None,
            category: None,
            modified_at: None,
            path: None,
            url: None,
            content_fingerprint: None,
        }
    }

    /// Records the full body behind this result for deduplication.
    /// Whitespace-only bodies leave the result without a fingerprint.
    pub fn with_body(mut self, body: &str) -> Self {
        self.content_fingerprint = fingerprint(body);
        self
    }

    pub fn has_ranking_signal(&self) -> bool {
        self.score.is_some() || self.match_count.is_some()
    }
}

/// Hash of `body` with whitespace runs collapsed, `None` when nothing is left.
pub fn fingerprint(body: &str) -> Option<u64> {
    let mut hasher = DefaultHasher::new();
    let mut empty = true;
    for word in body.split_whitespace() {
        word.hash(&mut hasher);
        empty = false;
    }
    (!empty).then(|| hasher.finish())
}

/// Collapses whitespace and cuts the text to `MAX_SNIPPET_CHARS`, appending
/// `ELLIPSIS` when something was dropped.
pub fn make_snippet(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= MAX_SNIPPET_CHARS {
        return collapsed;
    }

    let mut cut: String = collapsed.chars().take(MAX_SNIPPET_CHARS).collect();
    // Prefer a word boundary when one is reasonably close.
    if let Some(idx) = cut.rfind(' ') {
        if idx > MAX_SNIPPET_CHARS / 2 {
            cut.truncate(idx);
        }
    }
    format!("{}{}", cut.trim_end(), ELLIPSIS)
}

/// Body accepted by every `POST /search/*` route.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default)]
    pub options: SearchRequestOptions,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub sources: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchRequestOptions {
    pub limit: Option<usize>,
    pub threshold: Option<f64>,
    pub category: Option<String>,
    #[serde(default)]
    pub extensions: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub success: bool,
    pub results: Vec<SearchResult>,
    pub query: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub search_type: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_sources: Vec<SourceFailure>,
}

/// A source that failed or timed out during one aggregated search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceFailure {
    pub source: SourceKind,
    pub reason: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct SuggestionParams {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SuggestionResponse {
    pub suggestions: Vec<String>,
}
