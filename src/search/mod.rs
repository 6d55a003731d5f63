//! Search Service Module
//!
//! Answers one query from several heterogeneous sources at once.
//!
//! ## Overview
//! A query is validated by the HTTP layer, then handed to the [`aggregator::Aggregator`],
//! which dispatches it concurrently to the selected sources, waits for all of them,
//! and returns one deduplicated, ranked list. A failing source costs its results,
//! never the whole search.
//!
//! ## Submodules
//! - **`relevance`**: approximate matching over stored records (distance score, lower is better).
//! - **`files`**: recursive directory walk with name and content matching (match counts).
//! - **`external`**: the pluggable web-search contract and its providers.
//! - **`aggregator`**: fan-out/fan-in, deduplication, ranking and truncation.
//! - **`handlers`**: HTTP request handlers for the Axum web server.
//! - **`types`**: the shared result type and API request/response shapes.

pub mod aggregator;
pub mod external;
pub mod files;
pub mod handlers;
pub mod relevance;
pub mod types;
