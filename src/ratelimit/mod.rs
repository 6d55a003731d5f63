//! Tiered Rate Limiting Module
//!
//! Independent fixed-window limits per operation class, gating every route.
//!
//! ## Tiers
//! | Tier          | Capacity | Window | Block  |
//! |---------------|----------|--------|--------|
//! | API           | 100      | 60 s   | 60 s   |
//! | Search        | 30       | 60 s   | 120 s  |
//! | DataMutation  | 10       | 60 s   | 300 s  |
//! | Import        | 3        | 3600 s | 3600 s |
//!
//! ## Submodules
//! - **`types`**: tiers, policies, counters and decisions.
//! - **`limiter`**: the per-(tier, key) state machine and stale-counter sweeping.
//! - **`middleware`**: the axum layer that turns rejections into HTTP 429 responses.

pub mod limiter;
pub mod middleware;
pub mod types;

#[cfg(test)]
mod tests;
