//! Persistent semantic memory for AI coding sessions.
//!
//! Engram stores free-text session summaries, retrieves semantically related
//! past entries before new work begins, and keeps the corpus useful over time
//! through automated curation. A small hook protocol binds an external
//! tool-use lifecycle (session start, pre-action, post-action, session end)
//! to retrieval and storage, so the memory engages without being asked.
//!
//! # Architecture
//!
//! - **Storage**: SQLite with [sqlite-vec](https://github.com/asg017/sqlite-vec)
//!   for vector search; one `memories` row plus one `memories_vec` row per
//!   record, written atomically
//! - **Embeddings**: injected capability behind [`embedding::EmbeddingProvider`]
//!   (default: deterministic feature hashing, 384 dimensions, L2-normalized)
//! - **Retrieval**: cosine similarity blended with recency and
//!   complexity match, thresholded and capped
//! - **Curation**: deduplicate, consolidate, archive, enhance, auto-curate —
//!   all dry-runnable
//! - **Transport**: axum HTTP API on localhost; `engram hook` subcommands are
//!   the fail-open client side
//!
//! # Modules
//!
//! - [`config`] — TOML configuration with env overrides
//! - [`db`] — SQLite initialization, schema, migrations
//! - [`embedding`] — text-to-vector capability
//! - [`memory`] — record store, quality heuristics, ranked search
//! - [`curator`] — corpus maintenance operations
//! - [`session`] — active context tracker and hook event protocol
//! - [`api`] — HTTP surface
//! - [`hooks`] — hook client subcommands

pub mod api;
pub mod config;
pub mod curator;
pub mod db;
pub mod embedding;
pub mod error;
pub mod hooks;
pub mod memory;
pub mod session;
