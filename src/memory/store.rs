//! Record Store — durable persistence for memory records and their vectors.
//!
//! [`add_memory`] is the single write entry point. It runs the full pipeline
//! inside one transaction: validate, derive missing fields, score quality,
//! insert into the memories table, insert the embedding vector, and write an
//! audit log. Either the record and its embedding are both persisted or
//! neither is.

use rusqlite::{params, Connection, OptionalExtension, Transaction};
use serde::Serialize;

use crate::embedding::{EmbeddingProvider, EMBEDDING_DIM};
use crate::error::EngramError;
use crate::memory::quality;
use crate::memory::types::{MemoryRecord, NewMemory};

/// Result returned from an add operation.
#[derive(Debug, Serialize)]
pub struct AddResult {
    pub id: String,
    pub title: String,
    pub quality_score: f64,
}

/// Statistics from an index rebuild.
#[derive(Debug, Serialize)]
pub struct ReindexReport {
    pub records: usize,
    pub reindexed: usize,
    /// Per-record failures; a bad record never aborts the batch.
    pub failures: Vec<String>,
}

/// Columns selected whenever a full record is hydrated. Order must match
/// [`row_to_record`].
pub(crate) const RECORD_COLUMNS: &str = "id, content, title, date, source, technologies, \
     file_paths, complexity, project, metadata, quality_score, archived, created_at, updated_at";

/// Full write path: validate → derive → score → insert record + vector + audit.
pub fn add_memory(
    conn: &mut Connection,
    new: NewMemory,
    embedding: &[f32],
) -> Result<AddResult, EngramError> {
    if new.content.trim().is_empty() {
        return Err(EngramError::Validation("content must not be empty".into()));
    }
    if embedding.len() != EMBEDDING_DIM {
        return Err(EngramError::Validation(format!(
            "embedding has {} dimensions, store requires {EMBEDDING_DIM}",
            embedding.len()
        )));
    }

    let date = match new.date {
        Some(d) => {
            chrono::NaiveDate::parse_from_str(&d, "%Y-%m-%d").map_err(|_| {
                EngramError::Validation(format!("date must be YYYY-MM-DD, got: {d}"))
            })?;
            d
        }
        None => chrono::Utc::now().format("%Y-%m-%d").to_string(),
    };

    let title = match new.title.map(|t| t.trim().to_string()) {
        Some(t) if !t.is_empty() => t,
        _ => quality::derive_title(&new.content),
    };

    let technologies = dedup_preserving_order(new.technologies);
    let quality_score = quality::score(
        &new.content,
        &title,
        &technologies,
        &new.file_paths,
        &new.project,
    );

    let now = chrono::Utc::now().to_rfc3339();
    let record = MemoryRecord {
        id: uuid::Uuid::now_v7().to_string(),
        content: new.content,
        title,
        date,
        source: new.source,
        technologies,
        file_paths: new.file_paths,
        complexity: new.complexity,
        project: new.project,
        metadata: new.metadata,
        quality_score,
        archived: false,
        created_at: now.clone(),
        updated_at: now,
    };

    let tx = conn.transaction()?;
    insert_record(&tx, &record, embedding)?;
    write_audit_log(&tx, "create", &record.id, None)?;
    tx.commit()?;

    tracing::debug!(id = %record.id, title = %record.title, "memory stored");

    Ok(AddResult {
        id: record.id,
        title: record.title,
        quality_score,
    })
}

/// Insert a record row and its embedding inside an open transaction.
/// Shared by the add path and the consolidate merge path.
pub(crate) fn insert_record(
    tx: &Transaction,
    record: &MemoryRecord,
    embedding: &[f32],
) -> Result<(), EngramError> {
    let metadata_json = record
        .metadata
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    tx.execute(
        "INSERT INTO memories (id, content, title, date, source, technologies, file_paths, \
         complexity, project, metadata, quality_score, archived, created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        params![
            record.id,
            record.content,
            record.title,
            record.date,
            record.source.as_str(),
            serde_json::to_string(&record.technologies)?,
            serde_json::to_string(&record.file_paths)?,
            record.complexity.as_str(),
            record.project,
            metadata_json,
            record.quality_score,
            record.archived,
            record.created_at,
            record.updated_at,
        ],
    )?;

    tx.execute(
        "INSERT INTO memories_vec (id, embedding) VALUES (?1, ?2)",
        params![record.id, super::embedding_to_bytes(embedding)],
    )?;

    Ok(())
}

/// Fetch a single record by id. Archived records are returned too — archival
/// is a search-visibility flag, not deletion.
pub fn get_memory(conn: &Connection, id: &str) -> Result<MemoryRecord, EngramError> {
    let sql = format!("SELECT {RECORD_COLUMNS} FROM memories WHERE id = ?1");
    conn.query_row(&sql, params![id], row_to_record)
        .optional()?
        .ok_or_else(|| EngramError::NotFound(id.to_string()))
}

/// Delete a record from both tables. `NotFound` for unknown ids — callers in
/// a batch can treat that as a per-item failure rather than aborting.
pub fn delete_memory(conn: &mut Connection, id: &str) -> Result<(), EngramError> {
    let tx = conn.transaction()?;
    let existed = delete_record(&tx, id, "explicit delete")?;
    tx.commit()?;

    if existed {
        Ok(())
    } else {
        Err(EngramError::NotFound(id.to_string()))
    }
}

/// Remove a record row, its vector, and log the deletion, inside an open
/// transaction. Returns false when the id did not exist.
pub(crate) fn delete_record(
    tx: &Transaction,
    id: &str,
    reason: &str,
) -> Result<bool, EngramError> {
    let removed = tx.execute("DELETE FROM memories WHERE id = ?1", params![id])?;
    if removed == 0 {
        return Ok(false);
    }
    tx.execute("DELETE FROM memories_vec WHERE id = ?1", params![id])?;
    write_audit_log(
        tx,
        "delete",
        id,
        Some(&serde_json::json!({ "reason": reason })),
    )?;
    Ok(true)
}

/// Page through records, newest first. Returns the page and the total count
/// of the visible population.
pub fn list_memories(
    conn: &Connection,
    page: usize,
    page_size: usize,
    include_archived: bool,
) -> Result<(Vec<MemoryRecord>, u64), EngramError> {
    let page = page.max(1);
    let page_size = page_size.max(1);
    let offset = (page - 1) * page_size;

    let where_clause = if include_archived { "" } else { "WHERE archived = 0" };
    let total = count_memories(conn, include_archived)?;

    let sql = format!(
        "SELECT {RECORD_COLUMNS} FROM memories {where_clause} \
         ORDER BY created_at DESC, id DESC LIMIT ?1 OFFSET ?2"
    );
    let mut stmt = conn.prepare(&sql)?;
    let records = stmt
        .query_map(params![page_size as i64, offset as i64], row_to_record)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok((records, total))
}

/// Count records, optionally including archived ones.
pub fn count_memories(conn: &Connection, include_archived: bool) -> Result<u64, EngramError> {
    let sql = if include_archived {
        "SELECT COUNT(*) FROM memories"
    } else {
        "SELECT COUNT(*) FROM memories WHERE archived = 0"
    };
    let count: i64 = conn.query_row(sql, [], |row| row.get(0))?;
    Ok(count as u64)
}

/// Fetch every record, for curation full scans.
pub(crate) fn fetch_all_records(
    conn: &Connection,
    include_archived: bool,
) -> Result<Vec<MemoryRecord>, EngramError> {
    let where_clause = if include_archived { "" } else { "WHERE archived = 0" };
    let sql = format!("SELECT {RECORD_COLUMNS} FROM memories {where_clause} ORDER BY created_at");
    let mut stmt = conn.prepare(&sql)?;
    let records = stmt
        .query_map([], row_to_record)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(records)
}

/// Rebuild the vector index from the record table: wipe `memories_vec`,
/// re-embed every record's content, reinsert. Per-record embedding failures
/// are collected, not fatal.
pub fn rebuild_index(
    conn: &mut Connection,
    provider: &dyn EmbeddingProvider,
) -> Result<ReindexReport, EngramError> {
    let records = fetch_all_records(conn, true)?;

    let tx = conn.transaction()?;
    tx.execute("DELETE FROM memories_vec", [])?;

    let mut reindexed = 0;
    let mut failures = Vec::new();
    for record in &records {
        match provider.embed(&record.content) {
            Ok(embedding) => {
                tx.execute(
                    "INSERT INTO memories_vec (id, embedding) VALUES (?1, ?2)",
                    params![record.id, super::embedding_to_bytes(&embedding)],
                )?;
                reindexed += 1;
            }
            Err(e) => failures.push(format!("{}: {e}", record.id)),
        }
    }

    write_audit_log(
        &tx,
        "reindex",
        "batch",
        Some(&serde_json::json!({
            "records": records.len(),
            "reindexed": reindexed,
        })),
    )?;
    tx.commit()?;

    tracing::info!(records = records.len(), reindexed, "vector index rebuilt");

    Ok(ReindexReport {
        records: records.len(),
        reindexed,
        failures,
    })
}

/// Write an entry to the memory_log audit table.
pub(crate) fn write_audit_log(
    conn: &Connection,
    operation: &str,
    memory_id: &str,
    details: Option<&serde_json::Value>,
) -> Result<(), EngramError> {
    let now = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO memory_log (operation, memory_id, details, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![operation, memory_id, details.map(|d| d.to_string()), now],
    )?;
    Ok(())
}

/// Map a row selected with [`RECORD_COLUMNS`] to a [`MemoryRecord`].
pub(crate) fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<MemoryRecord> {
    let source_str: String = row.get(4)?;
    let technologies_str: String = row.get(5)?;
    let file_paths_str: String = row.get(6)?;
    let complexity_str: String = row.get(7)?;
    let metadata_str: Option<String> = row.get(9)?;

    Ok(MemoryRecord {
        id: row.get(0)?,
        content: row.get(1)?,
        title: row.get(2)?,
        date: row.get(3)?,
        source: parse_text_col(4, &source_str)?,
        technologies: serde_json::from_str(&technologies_str).unwrap_or_default(),
        file_paths: serde_json::from_str(&file_paths_str).unwrap_or_default(),
        complexity: parse_text_col(7, &complexity_str)?,
        project: row.get(8)?,
        metadata: metadata_str.and_then(|s| serde_json::from_str(&s).ok()),
        quality_score: row.get(10)?,
        archived: row.get(11)?,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
    })
}

fn parse_text_col<T: std::str::FromStr<Err = String>>(
    idx: usize,
    s: &str,
) -> rusqlite::Result<T> {
    s.parse().map_err(|e: String| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, e.into())
    })
}

fn dedup_preserving_order(items: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}
