//! Quality re-scoring and metadata backfill.
//!
//! Enhancement recomputes each record's quality score and fills in a missing
//! title or empty technology list from content heuristics. It never touches
//! `content` itself.

use rusqlite::{params, Connection};
use serde::Serialize;

use crate::error::EngramError;
use crate::memory::quality;
use crate::memory::store::{fetch_all_records, get_memory, write_audit_log};
use crate::memory::types::MemoryRecord;

#[derive(Debug, Serialize)]
pub struct EnhanceChange {
    pub id: String,
    pub title_added: bool,
    pub technologies_added: bool,
    pub old_quality: f64,
    pub new_quality: f64,
}

#[derive(Debug, Serialize)]
pub struct EnhanceReport {
    pub scanned: usize,
    pub enhanced: usize,
    pub titles_added: usize,
    pub technologies_added: usize,
    pub dry_run: bool,
    pub changes: Vec<EnhanceChange>,
    /// Per-record failures (unknown ids in an explicit list).
    pub failures: Vec<String>,
}

/// Enhance the given records, or every active record when `ids` is `None`.
pub fn enhance(
    conn: &mut Connection,
    ids: Option<&[String]>,
    dry_run: bool,
) -> Result<EnhanceReport, EngramError> {
    let mut failures = Vec::new();
    let targets: Vec<MemoryRecord> = match ids {
        Some(ids) => {
            let mut records = Vec::new();
            for id in ids {
                match get_memory(conn, id) {
                    Ok(record) => records.push(record),
                    Err(e) => failures.push(format!("{id}: {e}")),
                }
            }
            records
        }
        None => fetch_all_records(conn, false)?,
    };

    let scanned = targets.len();
    let planned: Vec<(&MemoryRecord, EnhanceChange)> = targets
        .iter()
        .filter_map(|record| plan_change(record).map(|change| (record, change)))
        .collect();

    let titles_added = planned.iter().filter(|(_, c)| c.title_added).count();
    let technologies_added = planned.iter().filter(|(_, c)| c.technologies_added).count();

    if dry_run {
        let changes: Vec<EnhanceChange> = planned.into_iter().map(|(_, c)| c).collect();
        let enhanced = changes.len();
        return Ok(EnhanceReport {
            scanned,
            enhanced,
            titles_added,
            technologies_added,
            dry_run: true,
            changes,
            failures,
        });
    }

    let tx = conn.transaction()?;
    let now = chrono::Utc::now().to_rfc3339();
    for (record, change) in &planned {
        let title = if change.title_added {
            quality::derive_title(&record.content)
        } else {
            record.title.clone()
        };
        let technologies = if change.technologies_added {
            quality::detect_technologies(&record.content)
        } else {
            record.technologies.clone()
        };

        tx.execute(
            "UPDATE memories SET title = ?1, technologies = ?2, quality_score = ?3, updated_at = ?4 \
             WHERE id = ?5",
            params![
                title,
                serde_json::to_string(&technologies)?,
                change.new_quality,
                now,
                change.id,
            ],
        )?;
        write_audit_log(
            &tx,
            "enhance",
            &change.id,
            Some(&serde_json::json!({
                "title_added": change.title_added,
                "technologies_added": change.technologies_added,
                "quality": change.new_quality,
            })),
        )?;
    }
    tx.commit()?;

    let changes: Vec<EnhanceChange> = planned.into_iter().map(|(_, c)| c).collect();
    let enhanced = changes.len();
    tracing::info!(scanned, enhanced, "enhancement complete");

    Ok(EnhanceReport {
        scanned,
        enhanced,
        titles_added,
        technologies_added,
        dry_run: false,
        changes,
        failures,
    })
}

/// Decide what enhancement a record needs, if any.
fn plan_change(record: &MemoryRecord) -> Option<EnhanceChange> {
    let needs_title =
        record.title.is_empty() || record.title == quality::PLACEHOLDER_TITLE;
    let derived_title = if needs_title {
        quality::derive_title(&record.content)
    } else {
        record.title.clone()
    };
    let title_added = needs_title && derived_title != quality::PLACEHOLDER_TITLE;

    let detected = if record.technologies.is_empty() {
        quality::detect_technologies(&record.content)
    } else {
        record.technologies.clone()
    };
    let technologies_added = record.technologies.is_empty() && !detected.is_empty();

    let final_title = if title_added { derived_title } else { record.title.clone() };
    let new_quality = quality::score(
        &record.content,
        &final_title,
        &detected,
        &record.file_paths,
        &record.project,
    );

    let quality_changed = (new_quality - record.quality_score).abs() > 1e-9;
    if !title_added && !technologies_added && !quality_changed {
        return None;
    }

    Some(EnhanceChange {
        id: record.id.clone(),
        title_added,
        technologies_added,
        old_quality: record.quality_score,
        new_quality,
    })
}
