//! Record Types
//!
//! The stored record that the local-store search source reads, and the input
//! shape accepted when records are created, updated or bulk-imported.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const MAX_TITLE_CHARS: usize = 200;
pub const MAX_CONTENT_CHARS: usize = 100_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub id: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record {
    /// Builds a fresh record with a random id and both timestamps set to now.
    pub fn from_input(input: RecordInput) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: input.title.trim().to_string(),
            content: input.content,
            tags: normalize_tags(input.tags),
            category: input.category.filter(|c| !c.trim().is_empty()),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Client-supplied fields of a record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordInput {
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub category: Option<String>,
}

impl RecordInput {
    pub fn validate(&self) -> Result<(), String> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err("title must not be empty".to_string());
        }
        if title.chars().count() > MAX_TITLE_CHARS {
            return Err(format!("title exceeds {} characters", MAX_TITLE_CHARS));
        }
        if self.content.chars().count() > MAX_CONTENT_CHARS {
            return Err(format!("content exceeds {} characters", MAX_CONTENT_CHARS));
        }
        Ok(())
    }
}

fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim().to_string();
        if !tag.is_empty() && !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}
