//! Filesystem Text Search
//!
//! Walks a directory tree and matches the query against file names and, for
//! text-like files, file contents. Unreadable entries are skipped one by one;
//! a bad entry never aborts the walk.

use super::types::{make_snippet, SearchResult, SourceKind};
use crate::error::{Result, SearchError};

use chrono::{DateTime, Utc};
use regex::{Regex, RegexBuilder};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use walkdir::{DirEntry, WalkDir};

/// Extensions whose content is read and scanned for the query.
pub const TEXT_EXTENSIONS: &[&str] = &[
    "txt", "md", "markdown", "rst", "log", "csv", "tsv", "json", "xml", "yaml", "yml", "toml",
    "ini", "cfg", "conf", "env", "html", "htm", "css", "js", "jsx", "ts", "tsx", "rs", "py",
    "rb", "go", "java", "kt", "c", "h", "cpp", "hpp", "cs", "php", "sh", "sql",
];

/// Ranking bonus for a file whose name contains the query.
pub const FILENAME_BONUS: usize = 10;
pub const UNREADABLE_SNIPPET: &str = "[binary or unreadable file]";
/// Only the head of very large files is scanned.
pub const MAX_SCAN_BYTES: u64 = 2 * 1024 * 1024;
const SNIPPET_LEAD_BYTES: usize = 80;

struct FileHit {
    result: SearchResult,
    relevance: usize,
}

/// Searches `root` for files matching `query`.
///
/// `extensions` (with or without a leading dot) widens the candidate set; an
/// empty list admits every extension. At most `limit` files are collected,
/// then the collected files are ordered by relevance, highest first.
pub fn search(
    query: &str,
    root: &Path,
    extensions: &[String],
    limit: usize,
) -> Result<Vec<SearchResult>> {
    search_until(query, root, extensions, limit, &CancellationToken::new())
}

/// [`search`] that stops walking as soon as `cancel` fires.
pub fn search_until(
    query: &str,
    root: &Path,
    extensions: &[String],
    limit: usize,
    cancel: &CancellationToken,
) -> Result<Vec<SearchResult>> {
    let query = query.trim();
    if query.is_empty() {
        return Err(SearchError::Validation("query must not be empty".to_string()));
    }
    if !root.is_dir() {
        return Err(SearchError::unavailable(
            SourceKind::FileSystem,
            format!("'{}' is not a readable directory", root.display()),
        ));
    }
    if limit == 0 {
        return Ok(Vec::new());
    }

    let matcher = RegexBuilder::new(&regex::escape(query))
        .case_insensitive(true)
        .build()
        .map_err(|e| SearchError::Validation(e.to_string()))?;
    let wanted: Vec<String> = extensions
        .iter()
        .map(|ext| ext.trim().trim_start_matches('.').to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
        .collect();

    let mut hits: Vec<FileHit> = Vec::new();
    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_hidden_dir(entry));

    for entry in walker {
        if cancel.is_cancelled() {
            tracing::debug!("File search for '{}' cancelled after {} hits", query, hits.len());
            return Err(SearchError::unavailable(
                SourceKind::FileSystem,
                "search cancelled",
            ));
        }
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let denied = SearchError::AccessDenied(
                    e.path()
                        .map(|p| p.display().to_string())
                        .unwrap_or_else(|| e.to_string()),
                );
                tracing::warn!("Skipping entry: {}", denied);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        if let Some(hit) = inspect_file(&entry, &matcher, &wanted) {
            hits.push(hit);
            if hits.len() >= limit {
                tracing::debug!("File search reached limit of {} results", limit);
                break;
            }
        }
    }

    // Stable: equal relevance keeps walk order.
    hits.sort_by(|a, b| b.relevance.cmp(&a.relevance));
    Ok(hits.into_iter().map(|hit| hit.result).collect())
}

fn inspect_file(entry: &DirEntry, matcher: &Regex, wanted: &[String]) -> Option<FileHit> {
    let name = entry.file_name().to_string_lossy();
    let extension = entry
        .path()
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase());

    let name_match = matcher.is_match(&name);
    let extension_match = wanted.is_empty()
        || extension
            .as_deref()
            .is_some_and(|ext| wanted.iter().any(|w| w == ext));
    if !name_match && !extension_match {
        return None;
    }

    let is_text = extension
        .as_deref()
        .is_some_and(|ext| TEXT_EXTENSIONS.contains(&ext));
    let content = if is_text { read_text(entry.path()) } else { None };
    let (match_count, snippet) = match &content {
        Some(content) => scan_content(content, matcher),
        None => (0, UNREADABLE_SNIPPET.to_string()),
    };

    if !name_match && match_count == 0 {
        return None;
    }

    let mut result = SearchResult::new(name.to_string(), &snippet, SourceKind::FileSystem);
    if let Some(content) = &content {
        result = result.with_body(content);
    }
    result.match_count = Some(match_count);
    result.category = extension;
    result.path = Some(entry.path().display().to_string());
    result.modified_at = entry
        .metadata()
        .ok()
        .and_then(|meta| meta.modified().ok())
        .map(DateTime::<Utc>::from);

    let relevance = match_count + if name_match { FILENAME_BONUS } else { 0 };
    Some(FileHit { result, relevance })
}

/// Reads the head of a file as UTF-8 text; `None` for binary or unreadable files.
fn read_text(path: &Path) -> Option<String> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) => {
            let denied = SearchError::AccessDenied(format!("{}: {}", path.display(), e));
            tracing::debug!("Skipping entry: {}", denied);
            return None;
        }
    };

    let mut bytes = Vec::new();
    if let Err(e) = file.take(MAX_SCAN_BYTES).read_to_end(&mut bytes) {
        tracing::debug!("Failed to read {}: {}", path.display(), e);
        return None;
    }
    if bytes.contains(&0) {
        return None;
    }
    String::from_utf8(bytes).ok()
}

/// Occurrence count of the query plus a snippet built around the first hit
/// (or from the start of the file when there is none).
fn scan_content(content: &str, matcher: &Regex) -> (usize, String) {
    let count = matcher.find_iter(content).count();
    let snippet = match matcher.find(content) {
        Some(found) => {
            let mut line_start = content[..found.start()].rfind('\n').map_or(0, |i| i + 1);
            // Keep the hit inside the snippet on long lines.
            if found.start() - line_start > SNIPPET_LEAD_BYTES {
                line_start = found.start() - SNIPPET_LEAD_BYTES;
                while !content.is_char_boundary(line_start) {
                    line_start += 1;
                }
            }
            let line_end = content[found.end()..]
                .find('\n')
                .map_or(content.len(), |i| found.end() + i);
            make_snippet(&content[line_start..line_end])
        }
        None => make_snippet(content.lines().next().unwrap_or_default()),
    };
    (count, snippet)
}

fn is_hidden_dir(entry: &DirEntry) -> bool {
    entry.file_type().is_dir() && entry.file_name().to_string_lossy().starts_with('.')
}
