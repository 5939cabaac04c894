//! Similarity-ranked retrieval.
//!
//! [`search`] embeds nothing itself — the caller supplies the query embedding
//! (the embedding capability is injected). Candidates come from the vector
//! index (sqlite-vec KNN) on the fast path, or a filtered full scan when a
//! source filter restricts the population first (filter-then-rank, so the
//! similarity threshold applies to the filtered population). Final ranking
//! blends similarity with recency and complexity match.

use rusqlite::{params, Connection};
use serde::Serialize;

use crate::config::RetrievalConfig;
use crate::error::EngramError;
use crate::memory::quality::truncate_preview;
use crate::memory::store::{row_to_record, RECORD_COLUMNS};
use crate::memory::types::{Complexity, MemoryRecord, Source};

/// Oversampling multiplier for the KNN candidate fetch, so that archived and
/// below-threshold candidates can be dropped without starving the result set.
const KNN_OVERSAMPLE: usize = 5;

/// Search request parameters.
#[derive(Debug, Clone)]
pub struct SearchParams {
    pub query: String,
    pub max_results: usize,
    pub similarity_threshold: f64,
    /// Restricts candidates by source before similarity scoring.
    pub source_filter: Option<Source>,
    /// Caller context complexity for the complexity-match relevance term.
    pub complexity_context: Option<Complexity>,
    pub include_archived: bool,
}

impl SearchParams {
    pub fn new(query: impl Into<String>, config: &RetrievalConfig) -> Self {
        Self {
            query: query.into(),
            max_results: config.default_max_results,
            similarity_threshold: config.default_similarity_threshold,
            source_filter: None,
            complexity_context: None,
            include_archived: false,
        }
    }
}

/// A single ranked search result.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub id: String,
    pub title: String,
    /// Raw cosine similarity between the query and the record.
    pub similarity: f64,
    /// Blended relevance used for ranking.
    pub relevance: f64,
    pub preview: String,
    pub date: String,
    pub source: Source,
    pub technologies: Vec<String>,
    pub project: String,
    pub quality_score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

struct Candidate {
    record: MemoryRecord,
    similarity: f64,
}

/// Rank records against a query embedding.
///
/// An empty corpus or no candidate above the threshold is a valid empty
/// result, never an error.
pub fn search(
    conn: &Connection,
    query_embedding: &[f32],
    params: &SearchParams,
    config: &RetrievalConfig,
) -> Result<Vec<SearchHit>, EngramError> {
    if params.query.trim().is_empty() {
        return Err(EngramError::Validation("query must not be empty".into()));
    }

    let max_results = params.max_results.clamp(1, config.max_results_cap);

    let candidates = if params.source_filter.is_some() || params.include_archived {
        scan_candidates(conn, query_embedding, params)?
    } else {
        knn_candidates(conn, query_embedding, config.max_results_cap * KNN_OVERSAMPLE)?
    };

    let today = chrono::Utc::now().date_naive();
    let mut scored: Vec<(Candidate, f64)> = candidates
        .into_iter()
        .filter(|c| c.similarity >= params.similarity_threshold)
        .map(|c| {
            let relevance = relevance_score(
                c.similarity,
                &c.record,
                params.complexity_context,
                config,
                today,
            );
            (c, relevance)
        })
        .collect();

    // Relevance desc, then more-recent date, then lexicographic id
    scored.sort_by(|(a, ra), (b, rb)| {
        rb.partial_cmp(ra)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.record.date.cmp(&a.record.date))
            .then_with(|| a.record.id.cmp(&b.record.id))
    });
    scored.truncate(max_results);

    Ok(scored
        .into_iter()
        .map(|(c, relevance)| SearchHit {
            id: c.record.id,
            title: c.record.title,
            similarity: c.similarity,
            relevance,
            preview: truncate_preview(&c.record.content, 300),
            date: c.record.date,
            source: c.record.source,
            technologies: c.record.technologies,
            project: c.record.project,
            quality_score: c.record.quality_score,
            metadata: c.record.metadata,
        })
        .collect())
}

/// Blend similarity, recency, and complexity match into one relevance score.
fn relevance_score(
    similarity: f64,
    record: &MemoryRecord,
    complexity_context: Option<Complexity>,
    config: &RetrievalConfig,
    today: chrono::NaiveDate,
) -> f64 {
    let recency = recency_factor(&record.date, today, config.recency_half_life_days);
    let complexity_match = match complexity_context {
        Some(ctx) if ctx == record.complexity => 1.0,
        _ => config.complexity_partial,
    };

    similarity * config.similarity_weight
        + recency * config.recency_weight
        + complexity_match * config.complexity_weight
}

/// Exponential decay: halves every `half_life_days`.
fn recency_factor(date: &str, today: chrono::NaiveDate, half_life_days: f64) -> f64 {
    let record_date = match chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d") {
        Ok(d) => d,
        Err(_) => return 0.0,
    };
    let age_days = (today - record_date).num_days().max(0) as f64;
    0.5f64.powf(age_days / half_life_days)
}

/// Fast path: KNN over the vector index, hydrate, drop archived.
///
/// Similarity is derived from the L2 distance, which equals cosine similarity
/// for the L2-normalized vectors the embedding contract guarantees.
fn knn_candidates(
    conn: &Connection,
    query_embedding: &[f32],
    limit: usize,
) -> Result<Vec<Candidate>, EngramError> {
    let embedding_bytes = super::embedding_to_bytes(query_embedding);
    let mut stmt = conn.prepare(
        "SELECT id, distance FROM memories_vec \
         WHERE embedding MATCH ?1 ORDER BY distance LIMIT ?2",
    )?;
    let neighbors: Vec<(String, f64)> = stmt
        .query_map(params![embedding_bytes, limit.max(50) as i64], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let sql = format!("SELECT {RECORD_COLUMNS} FROM memories WHERE id = ?1 AND archived = 0");
    let mut fetch = conn.prepare(&sql)?;

    let mut candidates = Vec::new();
    for (id, distance) in neighbors {
        let record = fetch
            .query_map(params![id], row_to_record)?
            .next()
            .transpose()?;
        if let Some(record) = record {
            candidates.push(Candidate {
                record,
                similarity: super::l2_distance_to_cosine(distance),
            });
        }
    }
    Ok(candidates)
}

/// Filtered path: scan the (source-restricted) population and compute cosine
/// similarity per record, so the threshold applies after filtering.
fn scan_candidates(
    conn: &Connection,
    query_embedding: &[f32],
    params: &SearchParams,
) -> Result<Vec<Candidate>, EngramError> {
    let mut clauses: Vec<&str> = Vec::new();
    if !params.include_archived {
        clauses.push("m.archived = 0");
    }
    if params.source_filter.is_some() {
        clauses.push("m.source = ?1");
    }
    let where_clause = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };

    let cols: String = RECORD_COLUMNS
        .split(", ")
        .map(|c| format!("m.{c}"))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "SELECT {cols}, v.embedding FROM memories m \
         JOIN memories_vec v ON m.id = v.id {where_clause}"
    );

    let mut stmt = conn.prepare(&sql)?;
    let map_row = |row: &rusqlite::Row<'_>| {
        let record = row_to_record(row)?;
        let embedding_bytes: Vec<u8> = row.get(14)?;
        Ok((record, embedding_bytes))
    };
    let rows: Vec<(MemoryRecord, Vec<u8>)> = match params.source_filter {
        Some(source) => stmt
            .query_map(params![source.as_str()], map_row)?
            .collect::<Result<Vec<_>, _>>()?,
        None => stmt
            .query_map([], map_row)?
            .collect::<Result<Vec<_>, _>>()?,
    };

    Ok(rows
        .into_iter()
        .map(|(record, bytes)| {
            let embedding = super::bytes_to_embedding(&bytes);
            let similarity = super::cosine_similarity(query_embedding, &embedding);
            Candidate { record, similarity }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::embedding::hashed::HashedEmbeddingProvider;
    use crate::embedding::{EmbeddingProvider, EMBEDDING_DIM};
    use crate::memory::store::add_memory;
    use crate::memory::types::NewMemory;

    fn test_db() -> Connection {
        db::open_memory_database().unwrap()
    }

    fn config() -> RetrievalConfig {
        RetrievalConfig::default()
    }

    /// Unit vector along the given dimension.
    fn unit(dim: usize) -> Vec<f32> {
        let mut v = vec![0.0f32; EMBEDDING_DIM];
        v[dim % EMBEDDING_DIM] = 1.0;
        v
    }

    /// Unit vector close to `unit(dim)` (cosine ~0.95).
    fn near_unit(dim: usize) -> Vec<f32> {
        let mut v = vec![0.0f32; EMBEDDING_DIM];
        v[dim % EMBEDDING_DIM] = 0.95;
        v[(dim + 1) % EMBEDDING_DIM] = 0.31;
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        v.iter_mut().for_each(|x| *x /= norm);
        v
    }

    fn insert(
        conn: &mut Connection,
        content: &str,
        source: Source,
        date: Option<&str>,
        embedding: &[f32],
    ) -> String {
        let mut new = NewMemory::new(content, source);
        new.date = date.map(|d| d.to_string());
        add_memory(conn, new, embedding).unwrap().id
    }

    fn params_for(query: &str) -> SearchParams {
        SearchParams::new(query, &config())
    }

    #[test]
    fn empty_corpus_returns_empty_not_error() {
        let conn = test_db();
        let hits = search(&conn, &unit(0), &params_for("anything"), &config()).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn empty_query_is_validation_error() {
        let conn = test_db();
        let result = search(&conn, &unit(0), &params_for("  "), &config());
        assert!(matches!(result, Err(EngramError::Validation(_))));
    }

    #[test]
    fn nearest_record_ranks_first() {
        let mut conn = test_db();
        let id_near = insert(&mut conn, "about websockets", Source::Manual, None, &near_unit(0));
        let _id_far = insert(&mut conn, "about css grids", Source::Manual, None, &unit(200));

        let hits = search(&conn, &unit(0), &params_for("websockets"), &config()).unwrap();
        assert!(!hits.is_empty());
        assert_eq!(hits[0].id, id_near);
        assert!(hits[0].similarity > 0.9);
    }

    #[test]
    fn threshold_above_one_returns_nothing() {
        let mut conn = test_db();
        insert(&mut conn, "some stored content", Source::Manual, None, &unit(0));

        let mut params = params_for("some stored content");
        params.similarity_threshold = 1.1;
        let hits = search(&conn, &unit(0), &params, &config()).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn self_retrieval_scores_near_one() {
        let mut conn = test_db();
        let provider = HashedEmbeddingProvider::new();
        let content = "Resolved deadlock in the job scheduler by splitting the queue lock";
        let emb = provider.embed(content).unwrap();
        let id = insert(&mut conn, content, Source::Manual, None, &emb);

        let query_emb = provider.embed(content).unwrap();
        let hits = search(&conn, &query_emb, &params_for(content), &config()).unwrap();
        assert_eq!(hits[0].id, id);
        assert!(hits[0].similarity > 0.99, "got {}", hits[0].similarity);
    }

    #[test]
    fn scenario_null_pointer_auth() {
        let mut conn = test_db();
        let provider = HashedEmbeddingProvider::new();
        let content = "Fixed null pointer in auth module by adding a guard clause";
        let emb = provider.embed(content).unwrap();
        let mut new = NewMemory::new(content, Source::Manual);
        new.title = Some("Auth Fix".into());
        new.technologies = vec!["auth".into()];
        let id = add_memory(&mut conn, new, &emb).unwrap().id;

        let query_emb = provider.embed("null pointer auth").unwrap();
        let mut params = params_for("null pointer auth");
        params.max_results = 3;
        params.similarity_threshold = 0.3;
        let hits = search(&conn, &query_emb, &params, &config()).unwrap();
        assert!(!hits.is_empty());
        assert_eq!(hits[0].id, id);
        assert_eq!(hits[0].title, "Auth Fix");
    }

    #[test]
    fn source_filter_restricts_before_ranking() {
        let mut conn = test_db();
        // The desktop record is far more similar, but the filter excludes it
        let _desktop = insert(
            &mut conn,
            "desktop note about indexing",
            Source::DesktopClient,
            None,
            &unit(0),
        );
        let manual = insert(
            &mut conn,
            "manual note about indexing",
            Source::Manual,
            None,
            &near_unit(0),
        );

        let mut params = params_for("indexing");
        params.source_filter = Some(Source::Manual);
        let hits = search(&conn, &unit(0), &params, &config()).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, manual);
    }

    #[test]
    fn archived_records_are_excluded_by_default() {
        let mut conn = test_db();
        let id = insert(&mut conn, "archived knowledge", Source::Manual, None, &unit(0));
        conn.execute("UPDATE memories SET archived = 1 WHERE id = ?1", params![id])
            .unwrap();

        let hits = search(&conn, &unit(0), &params_for("archived knowledge"), &config()).unwrap();
        assert!(hits.is_empty());

        let mut with_archived = params_for("archived knowledge");
        with_archived.include_archived = true;
        let hits = search(&conn, &unit(0), &with_archived, &config()).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, id);
    }

    #[test]
    fn max_results_is_hard_capped() {
        let mut conn = test_db();
        for i in 0..15 {
            insert(&mut conn, &format!("entry {i}"), Source::Manual, None, &near_unit(0));
        }

        let mut params = params_for("entry");
        params.max_results = 50; // above the cap
        params.similarity_threshold = 0.0;
        let hits = search(&conn, &unit(0), &params, &config()).unwrap();
        assert_eq!(hits.len(), config().max_results_cap);
    }

    #[test]
    fn recency_breaks_similarity_ties() {
        let mut conn = test_db();
        let old = insert(
            &mut conn,
            "identical similarity old",
            Source::Manual,
            Some("2025-01-15"),
            &unit(0),
        );
        let recent = insert(
            &mut conn,
            "identical similarity recent",
            Source::Manual,
            Some("2026-08-01"),
            &unit(0),
        );

        let mut params = params_for("identical similarity");
        params.similarity_threshold = 0.5;
        let hits = search(&conn, &unit(0), &params, &config()).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, recent);
        assert_eq!(hits[1].id, old);
    }

    #[test]
    fn complexity_context_boosts_matching_records() {
        let mut conn = test_db();
        let mut high = NewMemory::new("tricky migration work", Source::Manual);
        high.complexity = Complexity::High;
        let high_id = add_memory(&mut conn, high, &unit(0)).unwrap().id;

        let mut low = NewMemory::new("tricky migration work too", Source::Manual);
        low.complexity = Complexity::Low;
        let _low_id = add_memory(&mut conn, low, &unit(0)).unwrap().id;

        let mut params = params_for("tricky migration");
        params.similarity_threshold = 0.5;
        params.complexity_context = Some(Complexity::High);
        let hits = search(&conn, &unit(0), &params, &config()).unwrap();
        assert_eq!(hits[0].id, high_id);
        assert!(hits[0].relevance > hits[1].relevance);
    }

    #[test]
    fn recency_factor_decays() {
        let today = chrono::NaiveDate::from_ymd_opt(2026, 8, 6).unwrap();
        let fresh = recency_factor("2026-08-06", today, 30.0);
        let month_old = recency_factor("2026-07-07", today, 30.0);
        let ancient = recency_factor("2020-01-01", today, 30.0);
        assert!((fresh - 1.0).abs() < 1e-9);
        assert!((month_old - 0.5).abs() < 0.01);
        assert!(ancient < 0.001);
        // Unparseable dates contribute nothing
        assert_eq!(recency_factor("garbage", today, 30.0), 0.0);
    }
}
