//! Service Configuration
//!
//! Command-line flags, each of which can also be supplied through the
//! environment. Rate-limit tier policies are constants of the `ratelimit`
//! module and have no flags.

use crate::ratelimit::middleware::ClientKeys;

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Parser)]
#[command(name = "unified-search", about = "Search local records, files and the web in one query")]
pub struct ServerConfig {
    /// Address the HTTP server binds to.
    #[arg(long, env = "SEARCH_BIND", default_value = "127.0.0.1:3000")]
    pub bind: SocketAddr,

    /// Root directory for filesystem search; requested paths must stay inside it.
    #[arg(long, env = "SEARCH_ROOT", default_value = ".")]
    pub root: PathBuf,

    /// JSON file with an array of records to load at startup.
    #[arg(long, env = "SEARCH_RECORDS")]
    pub records: Option<PathBuf>,

    /// Instant-answer endpoint for web search. Web search is disabled when unset.
    #[arg(long, env = "SEARCH_WEB_ENDPOINT")]
    pub web_endpoint: Option<String>,

    /// Deadline for each source call, in milliseconds.
    #[arg(long, env = "SEARCH_SOURCE_TIMEOUT_MS", default_value_t = 3000)]
    pub source_timeout_ms: u64,

    #[arg(long, env = "SEARCH_DEFAULT_LIMIT", default_value_t = 20)]
    pub default_limit: usize,

    /// Longest accepted query, in characters.
    #[arg(long, env = "SEARCH_MAX_QUERY_LEN", default_value_t = 200)]
    pub max_query_len: usize,

    /// Key rate limits on the first `X-Forwarded-For` hop instead of the peer
    /// address. Only for deployments behind a proxy that sets the header.
    #[arg(long = "trust-forwarded-for", env = "SEARCH_TRUST_PROXY")]
    pub trust_forwarded_for: bool,
}

impl ServerConfig {
    pub fn source_timeout(&self) -> Duration {
        Duration::from_millis(self.source_timeout_ms)
    }

    pub fn client_keys(&self) -> ClientKeys {
        ClientKeys::new(self.trust_forwarded_for)
    }

    pub fn search_settings(&self) -> SearchSettings {
        SearchSettings {
            default_limit: self.default_limit.max(1),
            max_query_len: self.max_query_len.max(1),
            ..SearchSettings::default()
        }
    }
}

/// Request-validation settings shared by the search handlers.
#[derive(Debug, Clone)]
pub struct SearchSettings {
    pub default_limit: usize,
    pub max_limit: usize,
    pub max_query_len: usize,
    /// Relevance cut-off for suggestions (stricter than search).
    pub suggestion_threshold: f64,
    pub max_suggestions: usize,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            default_limit: 20,
            max_limit: 100,
            max_query_len: 200,
            suggestion_threshold: 0.4,
            max_suggestions: 8,
        }
    }
}
