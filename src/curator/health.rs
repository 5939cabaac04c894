//! Read-only corpus health report.
//!
//! A full scan producing quality buckets, technology frequency, error-kind
//! frequency (from records whose metadata marks them as error records), age
//! distribution, duplicate and staleness estimates, consolidation candidates,
//! and actionable recommendations. Never mutates.

use rusqlite::Connection;
use serde::Serialize;
use std::collections::HashMap;

use crate::config::CurationConfig;
use crate::error::EngramError;
use crate::memory::quality;
use crate::memory::store::fetch_all_records;
use crate::memory::types::MemoryRecord;

#[derive(Debug, Default, Serialize)]
pub struct QualityDistribution {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

#[derive(Debug, Serialize)]
pub struct TechnologyCount {
    pub technology: String,
    pub count: usize,
}

#[derive(Debug, Default, Serialize)]
pub struct ErrorPatternStats {
    pub total_error_memories: usize,
    /// Error-kind tag → occurrence count.
    pub error_kinds: std::collections::BTreeMap<String, usize>,
    pub error_rate: f64,
}

#[derive(Debug, Default, Serialize)]
pub struct AgeDistribution {
    pub today: usize,
    pub this_week: usize,
    pub this_month: usize,
    pub this_quarter: usize,
    pub older: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConsolidationCandidate {
    /// `same_date` or `similar_title`.
    pub kind: String,
    pub key: String,
    pub count: usize,
    pub memory_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub total_memories: usize,
    pub active_memories: usize,
    pub archived_memories: usize,
    pub quality_distribution: QualityDistribution,
    pub technology_distribution: Vec<TechnologyCount>,
    pub error_patterns: ErrorPatternStats,
    pub age_distribution: AgeDistribution,
    pub stale_memories: usize,
    pub exact_duplicates: usize,
    pub consolidation_candidates: Vec<ConsolidationCandidate>,
    pub recommendations: Vec<String>,
}

/// Analyze the whole corpus. Read-only.
pub fn analyze(conn: &Connection, config: &CurationConfig) -> Result<HealthReport, EngramError> {
    let all = fetch_all_records(conn, true)?;
    let active: Vec<&MemoryRecord> = all.iter().filter(|r| !r.archived).collect();
    let archived_memories = all.len() - active.len();

    let quality_distribution = quality_distribution(&active, config);
    let technology_distribution = technology_distribution(&active);
    let error_patterns = error_patterns(&active);
    let today = chrono::Utc::now().date_naive();
    let age_distribution = age_distribution(&active, today);
    let stale_memories = active
        .iter()
        .filter(|r| age_days(&r.date, today).map_or(false, |d| d > config.stale_age_days as i64))
        .count();
    let exact_duplicates = exact_duplicates(&active);
    let consolidation_candidates = consolidation_candidates(&active);

    let report = HealthReport {
        total_memories: all.len(),
        active_memories: active.len(),
        archived_memories,
        quality_distribution,
        technology_distribution,
        error_patterns,
        age_distribution,
        stale_memories,
        exact_duplicates,
        consolidation_candidates,
        recommendations: Vec::new(),
    };

    Ok(HealthReport {
        recommendations: recommendations(&report, config),
        ..report
    })
}

/// Detect groups worth consolidating: several records on the same day, or
/// sharing a normalized title prefix. Detection only — consolidation itself
/// stays caller-driven.
pub fn consolidation_candidates(records: &[&MemoryRecord]) -> Vec<ConsolidationCandidate> {
    let mut by_title: HashMap<String, Vec<&MemoryRecord>> = HashMap::new();
    let mut by_date: HashMap<String, Vec<&MemoryRecord>> = HashMap::new();

    for record in records {
        if record.title != quality::PLACEHOLDER_TITLE {
            let key: String = record
                .title
                .to_lowercase()
                .chars()
                .filter(|c| c.is_alphanumeric())
                .take(20)
                .collect();
            if !key.is_empty() {
                by_title.entry(key).or_default().push(record);
            }
        }
        by_date.entry(record.date.clone()).or_default().push(record);
    }

    let mut candidates = Vec::new();
    for (key, group) in by_title {
        if group.len() > 2 {
            candidates.push(ConsolidationCandidate {
                kind: "similar_title".into(),
                key,
                count: group.len(),
                memory_ids: group.iter().take(5).map(|r| r.id.clone()).collect(),
            });
        }
    }
    for (key, group) in by_date {
        if group.len() > 3 {
            candidates.push(ConsolidationCandidate {
                kind: "same_date".into(),
                key,
                count: group.len(),
                memory_ids: group.iter().take(5).map(|r| r.id.clone()).collect(),
            });
        }
    }

    candidates.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.key.cmp(&b.key)));
    candidates.truncate(10);
    candidates
}

fn quality_distribution(records: &[&MemoryRecord], config: &CurationConfig) -> QualityDistribution {
    let mut dist = QualityDistribution::default();
    for record in records {
        match quality::bucket(record.quality_score, config.quality_high, config.quality_medium) {
            "high" => dist.high += 1,
            "medium" => dist.medium += 1,
            _ => dist.low += 1,
        }
    }
    dist
}

fn technology_distribution(records: &[&MemoryRecord]) -> Vec<TechnologyCount> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for record in records {
        for tech in &record.technologies {
            *counts.entry(tech.as_str()).or_insert(0) += 1;
        }
    }
    let mut sorted: Vec<TechnologyCount> = counts
        .into_iter()
        .map(|(technology, count)| TechnologyCount {
            technology: technology.to_string(),
            count,
        })
        .collect();
    sorted.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.technology.cmp(&b.technology)));
    sorted.truncate(10);
    sorted
}

fn error_patterns(records: &[&MemoryRecord]) -> ErrorPatternStats {
    let mut stats = ErrorPatternStats::default();
    for record in records {
        let kind = record
            .metadata
            .as_ref()
            .and_then(|m| m.get("error_kind"))
            .and_then(|k| k.as_str());
        if let Some(kind) = kind {
            stats.total_error_memories += 1;
            *stats.error_kinds.entry(kind.to_string()).or_insert(0) += 1;
        }
    }
    if !records.is_empty() {
        stats.error_rate = stats.total_error_memories as f64 / records.len() as f64;
    }
    stats
}

fn age_distribution(records: &[&MemoryRecord], today: chrono::NaiveDate) -> AgeDistribution {
    let mut dist = AgeDistribution::default();
    for record in records {
        match age_days(&record.date, today) {
            Some(0) => dist.today += 1,
            Some(d) if d <= 7 => dist.this_week += 1,
            Some(d) if d <= 30 => dist.this_month += 1,
            Some(d) if d <= 90 => dist.this_quarter += 1,
            Some(_) => dist.older += 1,
            None => dist.older += 1,
        }
    }
    dist
}

fn age_days(date: &str, today: chrono::NaiveDate) -> Option<i64> {
    chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .ok()
        .map(|d| (today - d).num_days().max(0))
}

fn exact_duplicates(records: &[&MemoryRecord]) -> usize {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for record in records {
        *counts.entry(record.content.as_str()).or_insert(0) += 1;
    }
    counts.values().filter(|&&c| c > 1).map(|&c| c - 1).sum()
}

fn recommendations(report: &HealthReport, config: &CurationConfig) -> Vec<String> {
    let mut recs = Vec::new();

    if report.exact_duplicates > 0 {
        recs.push(format!(
            "Remove {} exact duplicate memories",
            report.exact_duplicates
        ));
    }
    if report.stale_memories > 10 {
        recs.push(format!(
            "Archive {} stale memories (>{} days old)",
            report.stale_memories, config.stale_age_days
        ));
    }
    if report.quality_distribution.low > report.quality_distribution.high {
        recs.push(
            "Improve memory quality by adding titles, technologies, and structure".into(),
        );
    }
    if report.error_patterns.error_rate > 0.3 {
        recs.push("High error rate detected - consider implementing preventive measures".into());
    }
    if !report.consolidation_candidates.is_empty() {
        recs.push(format!(
            "Found {} consolidation opportunities",
            report.consolidation_candidates.len()
        ));
    }
    if report.total_memories > 500 {
        recs.push("Consider a tighter archival policy to keep the corpus compact".into());
    } else if report.total_memories < 10 {
        recs.push("Memory database is sparse - ensure memories are being captured".into());
    }

    recs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::embedding::EMBEDDING_DIM;
    use crate::memory::store::add_memory;
    use crate::memory::types::{NewMemory, Source};

    fn test_db() -> Connection {
        db::open_memory_database().unwrap()
    }

    fn config() -> CurationConfig {
        CurationConfig::default()
    }

    fn unit(dim: usize) -> Vec<f32> {
        let mut v = vec![0.0f32; EMBEDDING_DIM];
        v[dim % EMBEDDING_DIM] = 1.0;
        v
    }

    #[test]
    fn empty_corpus_report() {
        let conn = test_db();
        let report = analyze(&conn, &config()).unwrap();
        assert_eq!(report.total_memories, 0);
        assert_eq!(report.error_patterns.error_rate, 0.0);
        assert!(report
            .recommendations
            .iter()
            .any(|r| r.contains("sparse")));
    }

    #[test]
    fn counts_quality_technologies_and_errors() {
        let mut conn = test_db();

        let mut rich = NewMemory::new(
            format!("Detailed summary\n\n```sql\nSELECT 1;\n```\n{}", "x".repeat(600)),
            Source::Manual,
        );
        rich.title = Some("Rich record".into());
        rich.technologies = vec!["sql".into(), "python".into()];
        rich.file_paths = vec!["db/schema.sql".into()];
        rich.project = "warehouse".into();
        add_memory(&mut conn, rich, &unit(0)).unwrap();

        let mut error = NewMemory::new("Error: type mismatch in parser", Source::InteractiveSession);
        error.metadata = Some(serde_json::json!({"error_kind": "type_mismatch"}));
        add_memory(&mut conn, error, &unit(1)).unwrap();

        let report = analyze(&conn, &config()).unwrap();
        assert_eq!(report.total_memories, 2);
        assert_eq!(report.quality_distribution.high, 1);
        assert_eq!(report.error_patterns.total_error_memories, 1);
        assert_eq!(report.error_patterns.error_kinds["type_mismatch"], 1);
        assert!((report.error_patterns.error_rate - 0.5).abs() < 1e-9);
        assert!(report
            .technology_distribution
            .iter()
            .any(|t| t.technology == "sql"));
    }

    #[test]
    fn same_date_groups_become_candidates() {
        let mut conn = test_db();
        for i in 0..4 {
            let mut new = NewMemory::new(format!("independent note number {i}"), Source::Manual);
            new.date = Some("2026-08-01".into());
            add_memory(&mut conn, new, &unit(i)).unwrap();
        }

        let report = analyze(&conn, &config()).unwrap();
        let candidate = report
            .consolidation_candidates
            .iter()
            .find(|c| c.kind == "same_date")
            .expect("expected a same_date candidate");
        assert_eq!(candidate.count, 4);
        assert_eq!(candidate.key, "2026-08-01");
    }

    #[test]
    fn similar_titles_become_candidates() {
        let mut conn = test_db();
        for i in 0..3 {
            let mut new = NewMemory::new(format!("distinct body text variant {i}"), Source::Manual);
            new.title = Some(format!("Indexer rebuild session {i}"));
            new.date = Some(format!("2026-07-0{}", i + 1));
            add_memory(&mut conn, new, &unit(i)).unwrap();
        }

        let report = analyze(&conn, &config()).unwrap();
        assert!(report
            .consolidation_candidates
            .iter()
            .any(|c| c.kind == "similar_title" && c.count == 3));
    }

    #[test]
    fn archived_records_are_counted_separately() {
        let mut conn = test_db();
        let id = add_memory(
            &mut conn,
            NewMemory::new("soon to be archived", Source::Manual),
            &unit(0),
        )
        .unwrap()
        .id;
        add_memory(
            &mut conn,
            NewMemory::new("stays active", Source::Manual),
            &unit(1),
        )
        .unwrap();
        conn.execute(
            "UPDATE memories SET archived = 1 WHERE id = ?1",
            rusqlite::params![id],
        )
        .unwrap();

        let report = analyze(&conn, &config()).unwrap();
        assert_eq!(report.total_memories, 2);
        assert_eq!(report.active_memories, 1);
        assert_eq!(report.archived_memories, 1);
    }

    #[test]
    fn exact_duplicate_estimate() {
        let mut conn = test_db();
        for i in 0..3 {
            add_memory(
                &mut conn,
                NewMemory::new("byte identical content", Source::Manual),
                &unit(i),
            )
            .unwrap();
        }
        add_memory(
            &mut conn,
            NewMemory::new("something else entirely", Source::Manual),
            &unit(5),
        )
        .unwrap();

        let report = analyze(&conn, &config()).unwrap();
        assert_eq!(report.exact_duplicates, 2);
        assert!(report.recommendations.iter().any(|r| r.contains("duplicate")));
    }
}
