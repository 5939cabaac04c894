//! Merge an explicit list of related records into one.
//!
//! The merged record is persisted before the originals are deleted, inside a
//! single transaction — a crash can leave both, never neither. Consolidation
//! is caller-driven: the curator never picks ids on its own (auto-curate only
//! reports candidates).

use rusqlite::Connection;
use serde::Serialize;

use crate::embedding::EmbeddingProvider;
use crate::error::EngramError;
use crate::memory::quality;
use crate::memory::store::{delete_record, get_memory, insert_record, write_audit_log};
use crate::memory::types::{Complexity, MemoryRecord, Source};

#[derive(Debug, Serialize)]
pub struct ConsolidateReport {
    /// Id of the merged record; absent under dry run.
    pub consolidated_id: Option<String>,
    pub title: String,
    pub original_count: usize,
    pub merged_technologies: Vec<String>,
    pub dry_run: bool,
}

/// Merge the given records into one new record and delete the originals.
///
/// Ids that are missing or already archived make the whole request a
/// `Conflict` — a partial merge would silently lose provenance.
pub fn consolidate(
    conn: &mut Connection,
    provider: &dyn EmbeddingProvider,
    ids: &[String],
    title: Option<&str>,
    dry_run: bool,
) -> Result<ConsolidateReport, EngramError> {
    let ids = unique_in_order(ids);
    if ids.len() < 2 {
        return Err(EngramError::Validation(
            "consolidation needs at least two distinct memory ids".into(),
        ));
    }

    let mut originals = Vec::with_capacity(ids.len());
    for id in &ids {
        let record = get_memory(conn, id)
            .map_err(|e| match e {
                EngramError::NotFound(id) => {
                    EngramError::Conflict(format!("cannot consolidate: memory not found: {id}"))
                }
                other => other,
            })?;
        if record.archived {
            return Err(EngramError::Conflict(format!(
                "cannot consolidate archived memory: {id}"
            )));
        }
        originals.push(record);
    }

    let merged = build_merged(&originals, title);

    if dry_run {
        return Ok(ConsolidateReport {
            consolidated_id: None,
            title: merged.title,
            original_count: originals.len(),
            merged_technologies: merged.technologies,
            dry_run: true,
        });
    }

    let embedding = provider
        .embed(&merged.content)
        .map_err(EngramError::Internal)?;

    let tx = conn.transaction()?;
    // Persist the merge first; originals go only after it exists.
    insert_record(&tx, &merged, &embedding)?;
    write_audit_log(
        &tx,
        "consolidate",
        &merged.id,
        Some(&serde_json::json!({ "consolidated_from": ids })),
    )?;
    for id in &ids {
        delete_record(&tx, id, "consolidated")?;
    }
    tx.commit()?;

    tracing::info!(id = %merged.id, originals = originals.len(), "memories consolidated");

    Ok(ConsolidateReport {
        consolidated_id: Some(merged.id),
        title: merged.title,
        original_count: originals.len(),
        merged_technologies: merged.technologies,
        dry_run: false,
    })
}

/// Build the merged record: sectioned content with provenance headers, union
/// of technologies, ordered union of file paths.
fn build_merged(originals: &[MemoryRecord], title: Option<&str>) -> MemoryRecord {
    let content = originals
        .iter()
        .map(|r| format!("## {} ({})\n{}", r.title, r.date, r.content))
        .collect::<Vec<_>>()
        .join("\n---\n");

    let title = match title.map(str::trim) {
        Some(t) if !t.is_empty() => t.to_string(),
        _ => format!("Consolidated Memory ({} entries)", originals.len()),
    };

    let technologies = unique_in_order(
        &originals
            .iter()
            .flat_map(|r| r.technologies.iter().cloned())
            .collect::<Vec<_>>(),
    );
    let file_paths = unique_in_order(
        &originals
            .iter()
            .flat_map(|r| r.file_paths.iter().cloned())
            .collect::<Vec<_>>(),
    );

    // Project carries over only when unambiguous
    let project = match originals.split_first() {
        Some((first, rest)) if rest.iter().all(|r| r.project == first.project) => {
            first.project.clone()
        }
        _ => String::new(),
    };

    let metadata = serde_json::json!({
        "consolidated_from": originals.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(),
        "original_count": originals.len(),
    });

    let quality_score = quality::score(&content, &title, &technologies, &file_paths, &project);
    let now = chrono::Utc::now().to_rfc3339();

    MemoryRecord {
        id: uuid::Uuid::now_v7().to_string(),
        content,
        title,
        date: chrono::Utc::now().format("%Y-%m-%d").to_string(),
        source: Source::Consolidation,
        technologies,
        file_paths,
        complexity: Complexity::High,
        project,
        metadata: Some(metadata),
        quality_score,
        archived: false,
        created_at: now.clone(),
        updated_at: now,
    }
}

fn unique_in_order(items: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    items
        .iter()
        .filter(|item| seen.insert(item.as_str().to_string()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::embedding::hashed::HashedEmbeddingProvider;
    use crate::embedding::EMBEDDING_DIM;
    use crate::memory::store::{add_memory, count_memories, get_memory};
    use crate::memory::types::NewMemory;

    fn test_db() -> Connection {
        db::open_memory_database().unwrap()
    }

    fn unit(dim: usize) -> Vec<f32> {
        let mut v = vec![0.0f32; EMBEDDING_DIM];
        v[dim % EMBEDDING_DIM] = 1.0;
        v
    }

    fn insert(conn: &mut Connection, content: &str, techs: &[&str], dim: usize) -> String {
        let mut new = NewMemory::new(content, Source::Manual);
        new.technologies = techs.iter().map(|t| t.to_string()).collect();
        add_memory(conn, new, &unit(dim)).unwrap().id
    }

    #[test]
    fn merged_content_contains_every_original() {
        let mut conn = test_db();
        let provider = HashedEmbeddingProvider::new();
        let a = insert(&mut conn, "First note about the indexer rewrite", &["rust"], 0);
        let b = insert(&mut conn, "Second note about indexer batching", &["sql"], 1);

        let report = consolidate(
            &mut conn,
            &provider,
            &[a.clone(), b.clone()],
            Some("Indexer work"),
            false,
        )
        .unwrap();

        let merged = get_memory(&conn, report.consolidated_id.as_deref().unwrap()).unwrap();
        assert!(merged.content.contains("First note about the indexer rewrite"));
        assert!(merged.content.contains("Second note about indexer batching"));
        assert_eq!(merged.title, "Indexer work");
        assert_eq!(merged.source, Source::Consolidation);
        assert_eq!(merged.complexity, Complexity::High);
        assert_eq!(
            merged.technologies,
            vec!["rust".to_string(), "sql".to_string()]
        );

        // Originals are gone
        assert!(get_memory(&conn, &a).is_err());
        assert!(get_memory(&conn, &b).is_err());
        assert_eq!(count_memories(&conn, true).unwrap(), 1);
    }

    #[test]
    fn derived_title_counts_entries() {
        let mut conn = test_db();
        let provider = HashedEmbeddingProvider::new();
        let a = insert(&mut conn, "alpha content for merging", &[], 0);
        let b = insert(&mut conn, "beta content for merging", &[], 1);

        let report = consolidate(&mut conn, &provider, &[a, b], None, false).unwrap();
        assert_eq!(report.title, "Consolidated Memory (2 entries)");
    }

    #[test]
    fn dry_run_reports_without_merging() {
        let mut conn = test_db();
        let provider = HashedEmbeddingProvider::new();
        let a = insert(&mut conn, "dry run candidate one", &[], 0);
        let b = insert(&mut conn, "dry run candidate two", &[], 1);

        let report = consolidate(&mut conn, &provider, &[a, b], None, true).unwrap();
        assert!(report.dry_run);
        assert!(report.consolidated_id.is_none());
        assert_eq!(count_memories(&conn, true).unwrap(), 2);
    }

    #[test]
    fn missing_id_is_conflict() {
        let mut conn = test_db();
        let provider = HashedEmbeddingProvider::new();
        let a = insert(&mut conn, "only existing record", &[], 0);

        let result = consolidate(
            &mut conn,
            &provider,
            &[a, "ghost-id".to_string()],
            None,
            false,
        );
        assert!(matches!(result, Err(EngramError::Conflict(_))));
        // Nothing was touched
        assert_eq!(count_memories(&conn, true).unwrap(), 1);
    }

    #[test]
    fn archived_id_is_conflict() {
        let mut conn = test_db();
        let provider = HashedEmbeddingProvider::new();
        let a = insert(&mut conn, "active record here", &[], 0);
        let b = insert(&mut conn, "archived record here", &[], 1);
        conn.execute(
            "UPDATE memories SET archived = 1 WHERE id = ?1",
            rusqlite::params![b],
        )
        .unwrap();

        let result = consolidate(&mut conn, &provider, &[a, b], None, false);
        assert!(matches!(result, Err(EngramError::Conflict(_))));
    }

    #[test]
    fn fewer_than_two_ids_is_validation_error() {
        let mut conn = test_db();
        let provider = HashedEmbeddingProvider::new();
        let a = insert(&mut conn, "lonely record", &[], 0);

        let result = consolidate(&mut conn, &provider, &[a.clone(), a], None, false);
        assert!(matches!(result, Err(EngramError::Validation(_))));
    }
}
