//! Near-duplicate detection and removal.
//!
//! Uses cheap lexical similarity — term-frequency cosine over the first 500
//! content chars — so curation does not depend on the embedding capability.
//! Clusters are built transitively over pairs above the threshold; each
//! cluster keeps its highest-quality record and removes the rest.

use rusqlite::Connection;
use serde::Serialize;
use std::collections::HashMap;

use crate::error::EngramError;
use crate::memory::store::{delete_record, fetch_all_records, write_audit_log};
use crate::memory::types::MemoryRecord;

/// Content prefix length compared for lexical similarity.
const CONTENT_PREFIX: usize = 500;

#[derive(Debug, Serialize)]
pub struct DuplicateCluster {
    /// Record kept (highest quality score; ties go to the newer record).
    pub kept: String,
    /// Records removed (or to be removed, under dry run).
    pub removed: Vec<String>,
    /// Highest pairwise similarity observed inside the cluster.
    pub max_similarity: f64,
}

#[derive(Debug, Serialize)]
pub struct DedupReport {
    pub clusters: Vec<DuplicateCluster>,
    pub duplicates_found: usize,
    pub removed: usize,
    pub dry_run: bool,
    /// Per-record deletion failures; one bad record never aborts the batch.
    pub failures: Vec<String>,
}

/// Find and optionally remove near-duplicate records.
///
/// Idempotent: a second run with no intervening adds finds nothing, because
/// every surviving pair scored below the threshold.
pub fn deduplicate(
    conn: &mut Connection,
    threshold: f64,
    dry_run: bool,
) -> Result<DedupReport, EngramError> {
    let records = fetch_all_records(conn, false)?;
    let clusters = find_clusters(&records, threshold);
    let duplicates_found = clusters.iter().map(|c| c.removed.len()).sum();

    if dry_run {
        return Ok(DedupReport {
            clusters,
            duplicates_found,
            removed: 0,
            dry_run: true,
            failures: Vec::new(),
        });
    }

    let mut removed = 0;
    let mut failures = Vec::new();
    let tx = conn.transaction()?;
    for cluster in &clusters {
        for id in &cluster.removed {
            match delete_record(&tx, id, "near-duplicate") {
                Ok(true) => removed += 1,
                Ok(false) => failures.push(format!("{id}: already gone")),
                Err(e) => failures.push(format!("{id}: {e}")),
            }
        }
        write_audit_log(
            &tx,
            "dedup",
            &cluster.kept,
            Some(&serde_json::json!({
                "removed": cluster.removed,
                "max_similarity": cluster.max_similarity,
            })),
        )?;
    }
    tx.commit()?;

    tracing::info!(duplicates_found, removed, "deduplication complete");

    Ok(DedupReport {
        clusters,
        duplicates_found,
        removed,
        dry_run: false,
        failures,
    })
}

/// Cluster records transitively over pairs whose lexical similarity meets the
/// threshold, and pick each cluster's keeper.
fn find_clusters(records: &[MemoryRecord], threshold: f64) -> Vec<DuplicateCluster> {
    let vectors: Vec<HashMap<String, f64>> = records
        .iter()
        .map(|r| term_frequencies(&r.content))
        .collect();

    // Union-find over record indices
    let mut parent: Vec<usize> = (0..records.len()).collect();

    for i in 0..records.len() {
        for j in (i + 1)..records.len() {
            let sim = tf_cosine(&vectors[i], &vectors[j]);
            if sim >= threshold {
                let (ri, rj) = (find(&mut parent, i), find(&mut parent, j));
                if ri != rj {
                    parent[rj] = ri;
                }
            }
        }
    }

    // Gather members by root
    let mut groups: HashMap<usize, Vec<usize>> = HashMap::new();
    for i in 0..records.len() {
        let root = find(&mut parent, i);
        groups.entry(root).or_default().push(i);
    }

    let mut clusters: Vec<DuplicateCluster> = groups
        .into_values()
        .filter(|members| members.len() > 1)
        .map(|mut members| {
            let max_similarity = members
                .iter()
                .enumerate()
                .flat_map(|(n, &a)| members[n + 1..].iter().map(move |&b| (a, b)))
                .map(|(a, b)| tf_cosine(&vectors[a], &vectors[b]))
                .fold(0.0f64, f64::max);
            // Keeper: highest quality, then newer date, then smaller id
            members.sort_by(|&a, &b| {
                let (ra, rb) = (&records[a], &records[b]);
                rb.quality_score
                    .partial_cmp(&ra.quality_score)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| rb.date.cmp(&ra.date))
                    .then_with(|| ra.id.cmp(&rb.id))
            });
            DuplicateCluster {
                kept: records[members[0]].id.clone(),
                removed: members[1..].iter().map(|&i| records[i].id.clone()).collect(),
                max_similarity,
            }
        })
        .collect();

    clusters.sort_by(|a, b| a.kept.cmp(&b.kept));
    clusters
}

fn find(parent: &mut Vec<usize>, mut i: usize) -> usize {
    while parent[i] != i {
        parent[i] = parent[parent[i]];
        i = parent[i];
    }
    i
}

/// Term-frequency map over the lowercased alphanumeric tokens of the content
/// prefix.
fn term_frequencies(content: &str) -> HashMap<String, f64> {
    let prefix: String = content.chars().take(CONTENT_PREFIX).collect();
    let mut counts: HashMap<String, f64> = HashMap::new();
    for token in prefix
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
    {
        *counts.entry(token.to_lowercase()).or_insert(0.0) += 1.0;
    }
    counts
}

/// Cosine similarity between two sparse term-frequency vectors.
pub(crate) fn tf_cosine(a: &HashMap<String, f64>, b: &HashMap<String, f64>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let dot: f64 = a
        .iter()
        .filter_map(|(term, wa)| b.get(term).map(|wb| wa * wb))
        .sum();
    let norm_a: f64 = a.values().map(|w| w * w).sum::<f64>().sqrt();
    let norm_b: f64 = b.values().map(|w| w * w).sum::<f64>().sqrt();
    dot / (norm_a * norm_b)
}
