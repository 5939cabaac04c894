//! Age-based archival.
//!
//! Archival flips the `archived` visibility flag — it never deletes. Archived
//! records drop out of default search and list but stay fully retrievable.

use rusqlite::{params, Connection};
use serde::Serialize;

use crate::error::EngramError;
use crate::memory::store::write_audit_log;

#[derive(Debug, Serialize)]
pub struct ArchiveCandidate {
    pub id: String,
    pub title: String,
    pub date: String,
}

#[derive(Debug, Serialize)]
pub struct ArchiveReport {
    pub found: usize,
    pub archived: usize,
    pub dry_run: bool,
    /// First few candidates, for display.
    pub sample: Vec<ArchiveCandidate>,
}

/// Archive active records whose `date` is older than `days` days.
pub fn archive_older_than(
    conn: &mut Connection,
    days: u32,
    dry_run: bool,
) -> Result<ArchiveReport, EngramError> {
    let cutoff = (chrono::Utc::now().date_naive() - chrono::Days::new(days as u64))
        .format("%Y-%m-%d")
        .to_string();

    let candidates: Vec<ArchiveCandidate> = {
        let mut stmt = conn.prepare(
            "SELECT id, title, date FROM memories \
             WHERE archived = 0 AND date < ?1 ORDER BY date",
        )?;
        let rows = stmt
            .query_map(params![cutoff], |row| {
                Ok(ArchiveCandidate {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    date: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        rows
    };

    let found = candidates.len();
    let sample: Vec<ArchiveCandidate> = candidates
        .iter()
        .take(5)
        .map(|c| ArchiveCandidate {
            id: c.id.clone(),
            title: c.title.clone(),
            date: c.date.clone(),
        })
        .collect();

    if dry_run {
        return Ok(ArchiveReport {
            found,
            archived: 0,
            dry_run: true,
            sample,
        });
    }

    let tx = conn.transaction()?;
    let now = chrono::Utc::now().to_rfc3339();
    let archived = tx.execute(
        "UPDATE memories SET archived = 1, updated_at = ?1 \
         WHERE archived = 0 AND date < ?2",
        params![now, cutoff],
    )?;
    if archived > 0 {
        write_audit_log(
            &tx,
            "archive",
            "batch",
            Some(&serde_json::json!({ "cutoff": cutoff, "archived": archived })),
        )?;
    }
    tx.commit()?;

    tracing::info!(found, archived, %cutoff, "archival complete");

    Ok(ArchiveReport {
        found,
        archived,
        dry_run: false,
        sample,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::embedding::EMBEDDING_DIM;
    use crate::memory::store::{add_memory, count_memories, get_memory, list_memories};
    use crate::memory::types::{NewMemory, Source};

    fn test_db() -> Connection {
        db::open_memory_database().unwrap()
    }

    fn unit(dim: usize) -> Vec<f32> {
        let mut v = vec![0.0f32; EMBEDDING_DIM];
        v[dim % EMBEDDING_DIM] = 1.0;
        v
    }

    fn insert_aged(conn: &mut Connection, content: &str, days_ago: u64, dim: usize) -> String {
        let date = (chrono::Utc::now().date_naive() - chrono::Days::new(days_ago))
            .format("%Y-%m-%d")
            .to_string();
        let mut new = NewMemory::new(content, Source::Manual);
        new.date = Some(date);
        add_memory(conn, new, &unit(dim)).unwrap().id
    }

    #[test]
    fn old_records_archive_recent_ones_stay() {
        let mut conn = test_db();
        let old = insert_aged(&mut conn, "two hundred days old entry", 200, 0);
        let recent = insert_aged(&mut conn, "ten days old entry", 10, 1);

        let report = archive_older_than(&mut conn, 90, false).unwrap();
        assert_eq!(report.found, 1);
        assert_eq!(report.archived, 1);

        assert!(get_memory(&conn, &old).unwrap().archived);
        assert!(!get_memory(&conn, &recent).unwrap().archived);
    }

    #[test]
    fn dry_run_flags_nothing() {
        let mut conn = test_db();
        let old = insert_aged(&mut conn, "stale but safe in dry run", 120, 0);

        let report = archive_older_than(&mut conn, 90, true).unwrap();
        assert!(report.dry_run);
        assert_eq!(report.found, 1);
        assert_eq!(report.archived, 0);
        assert_eq!(report.sample.len(), 1);
        assert!(!get_memory(&conn, &old).unwrap().archived);
    }

    #[test]
    fn archival_never_reduces_total_count() {
        let mut conn = test_db();
        for i in 0..4 {
            insert_aged(&mut conn, &format!("aged entry {i}"), 150, i as usize);
        }
        let before = count_memories(&conn, true).unwrap();

        archive_older_than(&mut conn, 90, false).unwrap();

        let after = count_memories(&conn, true).unwrap();
        assert_eq!(before, after);

        // Default listing shrinks, full listing does not
        let (visible, _) = list_memories(&conn, 1, 10, false).unwrap();
        assert!(visible.is_empty());
        let (all, _) = list_memories(&conn, 1, 10, true).unwrap();
        assert_eq!(all.len(), 4);
    }

    #[test]
    fn already_archived_records_are_not_recounted() {
        let mut conn = test_db();
        insert_aged(&mut conn, "previously archived entry", 200, 0);
        archive_older_than(&mut conn, 90, false).unwrap();

        let second = archive_older_than(&mut conn, 90, false).unwrap();
        assert_eq!(second.found, 0);
        assert_eq!(second.archived, 0);
    }
}
