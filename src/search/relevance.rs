//! Approximate Relevance Matching
//!
//! Scores stored records against a free-text query with a bounded approximate
//! substring distance (Sellers' variant of Levenshtein): the query may match
//! anywhere inside a field, and the score is the number of edits needed for
//! the best match divided by the query length. 0 means the query occurs
//! verbatim, 1 means nothing useful matched.
//!
//! The same metric is applied to the title, the content and every tag so scores
//! are comparable across records. A record's score is its best field.

use super::types::{SearchResult, SourceKind};
use crate::storage::types::Record;

use tokio_util::sync::CancellationToken;

pub const DEFAULT_THRESHOLD: f64 = 0.6;
/// Queries (and matches) shorter than this are never scored.
pub const MIN_MATCH_CHARS: usize = 2;

/// Lower-cased, char-split copy of the searchable fields of one record.
struct IndexedRecord {
    record: Record,
    fields: Vec<Vec<char>>,
}

/// Searchable view over a corpus snapshot.
///
/// Records keep the order they were given in; that order breaks score ties.
pub struct RelevanceIndex {
    entries: Vec<IndexedRecord>,
}

impl RelevanceIndex {
    pub fn build(corpus: Vec<Record>) -> Self {
        let entries = corpus
            .into_iter()
            .map(|record| {
                let mut fields = Vec::with_capacity(2 + record.tags.len());
                fields.push(fold(&record.title));
                fields.push(fold(&record.content));
                for tag in &record.tags {
                    fields.push(fold(tag));
                }
                IndexedRecord { record, fields }
            })
            .collect();

        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns `(record, score)` pairs with `score <= threshold`, best first.
    pub fn matches(&self, query: &str, threshold: f64) -> Vec<(&Record, f64)> {
        self.matches_until(query, threshold, &CancellationToken::new())
            .unwrap_or_default()
    }

    /// [`Self::matches`] that gives up with `None` once `cancel` fires.
    /// The token is checked before every record.
    pub fn matches_until(
        &self,
        query: &str,
        threshold: f64,
        cancel: &CancellationToken,
    ) -> Option<Vec<(&Record, f64)>> {
        let pattern = fold(query.trim());
        if pattern.len() < MIN_MATCH_CHARS {
            return Some(Vec::new());
        }
        let threshold = threshold.clamp(0.0, 1.0);

        let mut hits: Vec<(&Record, f64)> = Vec::new();
        for entry in &self.entries {
            if cancel.is_cancelled() {
                return None;
            }
            let best = entry
                .fields
                .iter()
                .filter_map(|field| field_distance(&pattern, field, threshold))
                .min_by(|a, b| a.total_cmp(b));
            if let Some(score) = best {
                hits.push((&entry.record, score));
            }
        }

        // Stable: equal scores keep corpus order.
        hits.sort_by(|a, b| a.1.total_cmp(&b.1));
        Some(hits)
    }

    /// Local-store search results for `query`, at most `limit` of them.
    pub fn search(&self, query: &str, threshold: f64, limit: usize) -> Vec<SearchResult> {
        self.search_until(query, threshold, limit, &CancellationToken::new())
            .unwrap_or_default()
    }

    pub fn search_until(
        &self,
        query: &str,
        threshold: f64,
        limit: usize,
        cancel: &CancellationToken,
    ) -> Option<Vec<SearchResult>> {
        let hits = self.matches_until(query, threshold, cancel)?;
        Some(
            hits.into_iter()
                .take(limit)
                .map(|(record, score)| to_result(record, score))
                .collect(),
        )
    }

    /// Titles and tags of matching records, best records first, without
    /// case-insensitive duplicates.
    pub fn suggest(&self, query: &str, threshold: f64, limit: usize) -> Vec<String> {
        let pattern = fold(query.trim());
        let mut seen: Vec<Vec<char>> = Vec::new();
        let mut suggestions = Vec::new();

        for (record, _) in self.matches(query, threshold) {
            let tags = record
                .tags
                .iter()
                .filter(|tag| field_distance(&pattern, &fold(tag), threshold).is_some());

            for candidate in std::iter::once(&record.title).chain(tags) {
                let folded = fold(candidate);
                if seen.contains(&folded) {
                    continue;
                }
                seen.push(folded);
                suggestions.push(candidate.clone());
                if suggestions.len() >= limit {
                    return suggestions;
                }
            }
        }

        suggestions
    }
}

/// One-shot search over a corpus without keeping the index around.
pub fn search(query: &str, corpus: Vec<Record>, threshold: f64) -> Vec<SearchResult> {
    RelevanceIndex::build(corpus).search(query, threshold, usize::MAX)
}

fn to_result(record: &Record, score: f64) -> SearchResult {
    let body = if record.content.trim().is_empty() {
        record.title.as_str()
    } else {
        record.content.as_str()
    };

    let mut result = SearchResult::new(record.title.clone(), body, SourceKind::LocalStore)
        .with_body(&record.content);
    result.score = Some(score);
    result.category = record.category.clone();
    result.modified_at = Some(record.updated_at);
    result.path = Some(format!("/records/{}", record.id));
    result
}

fn fold(text: &str) -> Vec<char> {
    text.chars().flat_map(char::to_lowercase).collect()
}

/// Normalized approximate-substring distance of `pattern` inside `text`, or
/// `None` if it exceeds `threshold` or fewer than `MIN_MATCH_CHARS` pattern
/// characters would actually match.
pub(crate) fn field_distance(pattern: &[char], text: &[char], threshold: f64) -> Option<f64> {
    let m = pattern.len();
    if m < MIN_MATCH_CHARS {
        return None;
    }

    let max_edits = (threshold * m as f64).floor() as usize;
    let edits = bounded_substring_edits(pattern, text, max_edits)?;
    if m - edits.min(m) < MIN_MATCH_CHARS {
        return None;
    }

    Some(edits as f64 / m as f64)
}

/// Minimum edit distance between `pattern` and any substring of `text`,
/// giving up as soon as it is known to exceed `max_edits`.
pub(crate) fn bounded_substring_edits(
    pattern: &[char],
    text: &[char],
    max_edits: usize,
) -> Option<usize> {
    let n = text.len();
    // Row 0: the match may start at any text position for free.
    let mut prev = vec![0usize; n + 1];
    let mut curr = vec![0usize; n + 1];

    for (i, &pc) in pattern.iter().enumerate() {
        curr[0] = i + 1;
        let mut row_min = curr[0];

        for j in 1..=n {
            let cost = usize::from(text[j - 1] != pc);
            curr[j] = (prev[j] + 1)
                .min(curr[j - 1] + 1)
                .min(prev[j - 1] + cost);
            row_min = row_min.min(curr[j]);
        }

        // Row minima never decrease, so nothing below can come back under the bound.
        if row_min > max_edits {
            return None;
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    let best = prev.iter().copied().min().unwrap_or(pattern.len());
    (best <= max_edits).then_some(best)
}
