//! Auto-curate: the fixed curation sequence.
//!
//! Deduplicate → consolidation-candidate detection → archive → enhance, in
//! that order, so later steps operate on the already-deduplicated population.
//! One top-level `dry_run` flows into every step. Consolidation itself is
//! never executed automatically — only detected and reported.

use rusqlite::Connection;
use serde::Serialize;

use crate::config::CurationConfig;
use crate::error::EngramError;
use crate::memory::store::fetch_all_records;

use super::archive::{archive_older_than, ArchiveReport};
use super::dedup::{deduplicate, DedupReport};
use super::enhance::{enhance, EnhanceReport};
use super::health::{consolidation_candidates, ConsolidationCandidate};

#[derive(Debug, Serialize)]
pub struct AutoCurateReport {
    pub dry_run: bool,
    pub dedup: DedupReport,
    pub consolidation_candidates: Vec<ConsolidationCandidate>,
    pub archive: ArchiveReport,
    pub enhance: EnhanceReport,
    /// Human-readable description of each action taken (or planned).
    pub actions: Vec<String>,
    pub summary: String,
}

/// Run the full curation sequence.
pub fn auto_curate(
    conn: &mut Connection,
    config: &CurationConfig,
    dry_run: bool,
) -> Result<AutoCurateReport, EngramError> {
    let mut actions = Vec::new();
    let verb = |done: &str, planned: &str| -> String {
        if dry_run { planned.to_string() } else { done.to_string() }
    };

    // 1. Deduplicate
    let dedup = deduplicate(conn, config.near_duplicate_threshold, dry_run)?;
    if dedup.duplicates_found > 0 {
        actions.push(format!(
            "{} {} near-duplicate memories",
            verb("Removed", "Would remove"),
            dedup.duplicates_found
        ));
    }

    // 2. Detect consolidation candidates on the deduplicated population
    let records = fetch_all_records(conn, false)?;
    let record_refs: Vec<_> = records.iter().collect();
    let candidates = consolidation_candidates(&record_refs);
    if !candidates.is_empty() {
        actions.push(format!(
            "Found {} consolidation opportunities (run consolidate with explicit ids)",
            candidates.len()
        ));
    }

    // 3. Archive old records
    let archive = archive_older_than(conn, config.auto_archive_age_days, dry_run)?;
    if archive.found > 0 {
        actions.push(format!(
            "{} {} memories older than {} days",
            verb("Archived", "Would archive"),
            archive.found,
            config.auto_archive_age_days
        ));
    }

    // 4. Enhance what remains
    let enhance = enhance_step(conn, dry_run)?;
    if enhance.enhanced > 0 {
        actions.push(format!(
            "{} {} low-quality memories",
            verb("Enhanced", "Would enhance"),
            enhance.enhanced
        ));
    }

    let summary = format!(
        "{} curation actions {}",
        actions.len(),
        if dry_run { "identified" } else { "completed" }
    );

    tracing::info!(dry_run, actions = actions.len(), "auto-curation complete");

    Ok(AutoCurateReport {
        dry_run,
        dedup,
        consolidation_candidates: candidates,
        archive,
        enhance,
        actions,
        summary,
    })
}

fn enhance_step(conn: &mut Connection, dry_run: bool) -> Result<EnhanceReport, EngramError> {
    enhance(conn, None, dry_run)
}
