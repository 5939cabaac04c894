//! Curation Engine — batch maintenance over the whole corpus.
//!
//! Five independently invocable operations plus a read-only health report:
//!
//! - [`dedup::deduplicate`] — collapse near-duplicate records (lexical
//!   similarity, distinct from the embedding similarity used for retrieval)
//! - [`consolidate::consolidate`] — merge an explicit list of related records
//! - [`archive::archive_older_than`] — flag old records out of default search
//! - [`enhance::enhance`] — re-score quality and backfill missing fields
//! - [`auto::auto_curate`] — the fixed dedup → detect → archive → enhance
//!   sequence
//! - [`health::analyze`] — aggregate corpus report, no mutation
//!
//! Every mutating operation takes a `dry_run` flag and reports intended
//! changes without touching the store when it is set. Batch operations
//! accumulate per-item failures instead of aborting.

pub mod archive;
pub mod auto;
pub mod consolidate;
pub mod dedup;
pub mod enhance;
pub mod health;
