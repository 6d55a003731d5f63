//! Error Types
//!
//! A single error enum shared by every search source, the aggregator and the
//! rate limiter. Source failures are normally recovered inside the aggregator;
//! only validation and configuration errors travel back to the HTTP layer.

use crate::ratelimit::types::Tier;
use crate::search::types::SourceKind;
use axum::extract::rejection::JsonRejection;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum SearchError {
    /// Empty, oversized or otherwise malformed request input.
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Source '{source_kind}' unavailable: {reason}")]
    SourceUnavailable {
        source_kind: SourceKind,
        reason: String,
    },

    #[error("Source '{source_kind}' timed out after {after_ms} ms")]
    Timeout { source_kind: SourceKind, after_ms: u64 },

    /// A single filesystem entry could not be read. Never aborts a walk.
    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("No search sources selected")]
    NoSources,

    #[error("Rate limit exceeded for tier '{tier}', retry after {retry_after_ms} ms")]
    RateLimited { tier: Tier, retry_after_ms: u64 },
}

impl SearchError {
    pub fn unavailable(source_kind: SourceKind, reason: impl Into<String>) -> Self {
        Self::SourceUnavailable {
            source_kind,
            reason: reason.into(),
        }
    }

    /// Short machine-readable label used in JSON error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "ValidationError",
            Self::SourceUnavailable { .. } => "SourceUnavailable",
            Self::Timeout { .. } => "SourceUnavailable",
            Self::AccessDenied(_) => "AccessDenied",
            Self::NoSources => "ValidationError",
            Self::RateLimited { .. } => "RateLimitExceeded",
        }
    }
}

/// Unreadable or incomplete JSON bodies are client input errors like any other.
impl From<JsonRejection> for SearchError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

pub type Result<T> = std::result::Result<T, SearchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_labels() {
        assert_eq!(SearchError::Validation("x".into()).kind(), "ValidationError");
        assert_eq!(SearchError::NoSources.kind(), "ValidationError");
        assert_eq!(
            SearchError::Timeout {
                source_kind: SourceKind::External,
                after_ms: 5
            }
            .kind(),
            "SourceUnavailable"
        );
        assert_eq!(
            SearchError::unavailable(SourceKind::FileSystem, "gone").kind(),
            "SourceUnavailable"
        );
        assert_eq!(SearchError::AccessDenied("/x".into()).kind(), "AccessDenied");
        assert_eq!(
            SearchError::RateLimited {
                tier: Tier::Api,
                retry_after_ms: 1000
            }
            .kind(),
            "RateLimitExceeded"
        );
    }
}
