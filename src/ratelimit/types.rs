//! Rate Limiting Types
//!
//! Tier policies, per-(tier, key) counter state and the decision returned for
//! every consumption attempt. Timestamps are milliseconds since the Unix epoch.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// An independent rate-limiting policy class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tier {
    /// General API traffic.
    Api,
    Search,
    /// Routes that create, change or delete records.
    DataMutation,
    /// Bulk import.
    Import,
}

impl Tier {
    pub const ALL: [Tier; 4] = [Tier::Api, Tier::Search, Tier::DataMutation, Tier::Import];

    /// Fixed policy of the tier. Not adjustable at runtime.
    pub const fn policy(&self) -> TierPolicy {
        match self {
            Tier::Api => TierPolicy::new(100, 60, 60),
            Tier::Search => TierPolicy::new(30, 60, 120),
            Tier::DataMutation => TierPolicy::new(10, 60, 300),
            Tier::Import => TierPolicy::new(3, 3600, 3600),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Api => "api",
            Tier::Search => "search",
            Tier::DataMutation => "data-mutation",
            Tier::Import => "import",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierPolicy {
    /// Points available per window.
    pub capacity: u32,
    pub window: Duration,
    /// How long a key stays blocked once it exceeds `capacity`.
    pub block: Duration,
}

impl TierPolicy {
    const fn new(capacity: u32, window_secs: u64, block_secs: u64) -> Self {
        Self {
            capacity,
            window: Duration::from_secs(window_secs),
            block: Duration::from_secs(block_secs),
        }
    }

    pub fn window_ms(&self) -> u64 {
        self.window.as_millis() as u64
    }

    pub fn block_ms(&self) -> u64 {
        self.block.as_millis() as u64
    }

    /// Idle time after which a counter carries no information any more.
    pub fn idle_ttl_ms(&self) -> u64 {
        self.window_ms() + self.block_ms()
    }
}

/// Mutable state for one (tier, key) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Counter {
    pub consumed: u32,
    pub window_start: u64,
    pub blocked_until: Option<u64>,
    pub last_seen: u64,
}

impl Counter {
    pub fn fresh(now: u64) -> Self {
        Self {
            consumed: 0,
            window_start: now,
            blocked_until: None,
            last_seen: now,
        }
    }

    pub(crate) fn restart_window(&mut self, now: u64) {
        self.consumed = 0;
        self.window_start = now;
        self.blocked_until = None;
    }
}

/// Outcome of a consumption attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed {
        limit: u32,
        remaining: u32,
        /// When the current window ends.
        reset_at: u64,
    },
    Rejected {
        limit: u32,
        retry_after: Duration,
        /// When the block is lifted.
        reset_at: u64,
    },
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed { .. })
    }

    pub fn limit(&self) -> u32 {
        match self {
            Decision::Allowed { limit, .. } | Decision::Rejected { limit, .. } => *limit,
        }
    }

    pub fn remaining(&self) -> u32 {
        match self {
            Decision::Allowed { remaining, .. } => *remaining,
            Decision::Rejected { .. } => 0,
        }
    }

    pub fn reset_at(&self) -> u64 {
        match self {
            Decision::Allowed { reset_at, .. } | Decision::Rejected { reset_at, .. } => *reset_at,
        }
    }
}

/// Current system time in milliseconds.
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
