//! External Search Providers
//!
//! The aggregator only sees the [`ExternalSearch`] contract. Which provider sits
//! behind it (a live HTTP API, a disabled stub, a test fake) is decided at
//! startup.

use super::types::{SearchResult, SourceKind};
use crate::error::{Result, SearchError};

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

#[async_trait]
pub trait ExternalSearch: Send + Sync {
    /// Human-readable provider name for logs.
    fn name(&self) -> &str;

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>>;
}

/// Provider used when no external endpoint is configured. Always unavailable.
pub struct DisabledSearch;

#[async_trait]
impl ExternalSearch for DisabledSearch {
    fn name(&self) -> &str {
        "disabled"
    }

    async fn search(&self, _query: &str, _limit: usize) -> Result<Vec<SearchResult>> {
        Err(SearchError::unavailable(
            SourceKind::External,
            "web search is not configured",
        ))
    }
}

/// Queries an instant-answer style JSON API
/// (`GET {endpoint}?q=..&format=json&no_html=1`).
pub struct HttpSearchProvider {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl HttpSearchProvider {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            timeout,
        }
    }
}

#[async_trait]
impl ExternalSearch for HttpSearchProvider {
    fn name(&self) -> &str {
        &self.endpoint
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>> {
        let unavailable = |reason: String| SearchError::unavailable(SourceKind::External, reason);

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("q", query),
                ("format", "json"),
                ("no_html", "1"),
                ("skip_disambig", "1"),
            ])
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(unavailable(format!(
                "provider answered {}",
                response.status()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| unavailable(e.to_string()))?;
        parse_instant_answer(&body, limit)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct InstantAnswer {
    #[serde(rename = "Heading")]
    heading: String,
    #[serde(rename = "AbstractText")]
    abstract_text: String,
    #[serde(rename = "AbstractURL")]
    abstract_url: String,
    #[serde(rename = "RelatedTopics")]
    related_topics: Vec<RelatedTopic>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RelatedTopic {
    Group {
        #[serde(rename = "Name")]
        name: String,
        #[serde(rename = "Topics")]
        topics: Vec<TopicEntry>,
    },
    Entry(TopicEntry),
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TopicEntry {
    #[serde(rename = "Text")]
    text: String,
    #[serde(rename = "FirstURL")]
    first_url: String,
}

/// Maps an instant-answer document to at most `limit` external results.
pub(crate) fn parse_instant_answer(body: &str, limit: usize) -> Result<Vec<SearchResult>> {
    let answer: InstantAnswer = serde_json::from_str(body).map_err(|e| {
        SearchError::unavailable(SourceKind::External, format!("malformed response: {}", e))
    })?;

    let mut results = Vec::new();
    if !answer.abstract_text.trim().is_empty() {
        let title = if answer.heading.trim().is_empty() {
            topic_title(&answer.abstract_text)
        } else {
            answer.heading.trim().to_string()
        };
        results.push(external_result(title, &answer.abstract_text, &answer.abstract_url));
    }

    for topic in answer.related_topics {
        match topic {
            RelatedTopic::Entry(entry) => push_topic(&mut results, entry, None),
            RelatedTopic::Group { name, topics } => {
                for entry in topics {
                    push_topic(&mut results, entry, Some(&name));
                }
            }
        }
    }

    results.truncate(limit);
    Ok(results)
}

fn push_topic(results: &mut Vec<SearchResult>, entry: TopicEntry, group: Option<&str>) {
    if entry.text.trim().is_empty() {
        return;
    }
    let mut result = external_result(topic_title(&entry.text), &entry.text, &entry.first_url);
    result.category = group.map(str::to_string);
    results.push(result);
}

fn external_result(title: String, text: &str, url: &str) -> SearchResult {
    let mut result = SearchResult::new(title, text, SourceKind::External).with_body(text);
    if !url.trim().is_empty() {
        result.url = Some(url.trim().to_string());
    }
    result
}

/// Topic texts look like "Title - description"; the part before the dash is the title.
fn topic_title(text: &str) -> String {
    let head = text.split(" - ").next().unwrap_or(text).trim();
    head.chars().take(80).collect()
}
