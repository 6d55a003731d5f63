//! Unified Search Service Library
//!
//! This library crate defines the modules behind the `unified-search` binary
//! (`main.rs`): one query fanned out to several sources, merged into one ranked
//! list, with every route protected by tiered rate limits.
//!
//! ## Architecture Modules
//! - **`search`**: the sources (local relevance index, filesystem text search,
//!   pluggable web search), the aggregator that fans out and merges, and the
//!   search HTTP handlers.
//! - **`ratelimit`**: independent fixed-window limits per operation class
//!   (API, Search, DataMutation, Import) and the axum layer enforcing them.
//! - **`storage`**: the record set the local source reads, with CRUD and bulk import.
//! - **`app`**: router assembly and shared state.
//! - **`config`** / **`error`**: command-line configuration and the shared error type.

pub mod app;
pub mod config;
pub mod error;
pub mod ratelimit;
pub mod search;
pub mod storage;
