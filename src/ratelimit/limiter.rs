//! Tiered Rate Limiter
//!
//! Fixed-window counters with a penalty block, one counter per (tier, key).
//!
//! ## State Machine
//! - **Open**: each attempt adds points; while `consumed <= capacity` it is allowed.
//! - **Blocked**: the attempt that pushes `consumed` over `capacity` sets
//!   `blocked_until = now + block` and every attempt before that instant is rejected.
//! - Once the block has elapsed (or the window has run out) the next attempt
//!   starts a fresh window.
//!
//! All updates for a key happen under that key's map-shard lock, so concurrent
//! requests from one caller observe a serialized view; different keys never
//! contend on a global lock.

use super::types::{now_ms, Counter, Decision, Tier};

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;

pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

pub struct TieredRateLimiter {
    counters: DashMap<(Tier, String), Counter>,
}

impl TieredRateLimiter {
    /// Creates an empty, independent limiter.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Consumes one point of `tier` for `key`.
    pub fn consume(&self, tier: Tier, key: &str) -> Decision {
        self.consume_at(tier, key, 1, now_ms())
    }

    /// Reports what `consume` would see without consuming anything.
    pub fn probe(&self, tier: Tier, key: &str) -> Decision {
        self.consume_at(tier, key, 0, now_ms())
    }

    /// Consumes `points` at time `now` (ms). Zero points is a read-only probe:
    /// it neither creates nor changes a counter.
    pub fn consume_at(&self, tier: Tier, key: &str, points: u32, now: u64) -> Decision {
        if points == 0 {
            return self.peek(tier, key, now);
        }

        let policy = tier.policy();
        let mut counter = self
            .counters
            .entry((tier, key.to_string()))
            .or_insert_with(|| Counter::fresh(now));
        counter.last_seen = now;

        if let Some(until) = counter.blocked_until {
            if now >= until {
                counter.restart_window(now);
            }
        }
        if counter.blocked_until.is_none()
            && now.saturating_sub(counter.window_start) >= policy.window_ms()
        {
            counter.restart_window(now);
        }

        if let Some(until) = counter.blocked_until {
            return Decision::Rejected {
                limit: policy.capacity,
                retry_after: Duration::from_millis(until - now),
                reset_at: until,
            };
        }

        counter.consumed = counter.consumed.saturating_add(points);
        if counter.consumed <= policy.capacity {
            return Decision::Allowed {
                limit: policy.capacity,
                remaining: policy.capacity - counter.consumed,
                reset_at: counter.window_start + policy.window_ms(),
            };
        }

        let until = now + policy.block_ms();
        counter.blocked_until = Some(until);
        tracing::warn!(
            "Rate limit exceeded: tier={} key={} blocked for {:?}",
            tier,
            key,
            policy.block
        );
        Decision::Rejected {
            limit: policy.capacity,
            retry_after: policy.block,
            reset_at: until,
        }
    }

    fn peek(&self, tier: Tier, key: &str, now: u64) -> Decision {
        let policy = tier.policy();
        let fresh = Decision::Allowed {
            limit: policy.capacity,
            remaining: policy.capacity,
            reset_at: now + policy.window_ms(),
        };

        let Some(counter) = self.counters.get(&(tier, key.to_string())) else {
            return fresh;
        };

        match counter.blocked_until {
            Some(until) if now < until => Decision::Rejected {
                limit: policy.capacity,
                retry_after: Duration::from_millis(until - now),
                reset_at: until,
            },
            Some(_) => fresh,
            None if now.saturating_sub(counter.window_start) >= policy.window_ms() => fresh,
            None => Decision::Allowed {
                limit: policy.capacity,
                remaining: policy.capacity.saturating_sub(counter.consumed),
                reset_at: counter.window_start + policy.window_ms(),
            },
        }
    }

    /// Snapshot of the counter for (tier, key), if one exists.
    pub fn counter(&self, tier: Tier, key: &str) -> Option<Counter> {
        self.counters
            .get(&(tier, key.to_string()))
            .map(|entry| entry.value().clone())
    }

    pub fn tracked_keys(&self) -> usize {
        self.counters.len()
    }

    /// Drops counters idle for longer than `window + block` of their tier.
    /// Returns how many were removed.
    pub fn purge_stale(&self, now: u64) -> usize {
        let before = self.counters.len();
        self.counters.retain(|(tier, _), counter| {
            let blocked = counter.blocked_until.is_some_and(|until| now < until);
            blocked || now.saturating_sub(counter.last_seen) < tier.policy().idle_ttl_ms()
        });
        before.saturating_sub(self.counters.len())
    }

    /// Periodically purges stale counters in the background.
    pub fn spawn_sweeper(self: Arc<Self>, every: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                let removed = self.purge_stale(now_ms());
                if removed > 0 {
                    tracing::debug!(
                        "Purged {} stale rate-limit counters ({} remain)",
                        removed,
                        self.tracked_keys()
                    );
                }
            }
        })
    }
}

impl Default for TieredRateLimiter {
    fn default() -> Self {
        Self {
            counters: DashMap::new(),
        }
    }
}
