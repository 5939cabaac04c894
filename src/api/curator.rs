//! Curation endpoints.
//!
//! Mutating operations hold the store-wide lock for their whole batch, so
//! they never race a concurrent add. Dedup, archive, and auto-curate default
//! to dry run; the caller opts into execution.

use axum::extract::State;
use axum::response::Response;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::curator::{archive, auto, consolidate, dedup, enhance, health as curator_health};
use crate::error::EngramError;

use super::{respond, AppState};

fn default_true() -> bool {
    true
}

// ── Health / analyze ──────────────────────────────────────────────────────────

pub async fn health(State(state): State<AppState>) -> Response {
    let result = async {
        let conn = state.lock_db().await?;
        curator_health::analyze(&conn, &state.config.curation)
    }
    .await;
    respond("curator_health", result)
}

#[derive(Serialize)]
pub struct AnalyzeData {
    pub total_memories: usize,
    pub key_insights: Vec<String>,
    pub error_patterns: curator_health::ErrorPatternStats,
    pub technology_trends: Vec<curator_health::TechnologyCount>,
    pub temporal_patterns: curator_health::AgeDistribution,
    pub consolidation_opportunities: usize,
}

pub async fn analyze(State(state): State<AppState>) -> Response {
    let result = async {
        let conn = state.lock_db().await?;
        let report = curator_health::analyze(&conn, &state.config.curation)?;

        let mut key_insights = Vec::new();
        if !report.error_patterns.error_kinds.is_empty() {
            key_insights.push(format!(
                "Found {} recurring error kinds",
                report.error_patterns.error_kinds.len()
            ));
        }
        if let Some(top) = report.technology_distribution.first() {
            key_insights.push(format!("Most common technology: {}", top.technology));
        }
        key_insights.push(format!(
            "Memory quality: {} high, {} medium, {} low",
            report.quality_distribution.high,
            report.quality_distribution.medium,
            report.quality_distribution.low
        ));

        Ok(AnalyzeData {
            total_memories: report.total_memories,
            key_insights,
            error_patterns: report.error_patterns,
            technology_trends: report.technology_distribution,
            temporal_patterns: report.age_distribution,
            consolidation_opportunities: report.consolidation_candidates.len(),
        })
    }
    .await;
    respond("curator_analyze", result)
}

// ── Deduplicate ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct DeduplicateRequest {
    #[serde(default = "default_true")]
    pub dry_run: bool,
    pub threshold: Option<f64>,
}

pub async fn deduplicate(
    State(state): State<AppState>,
    Json(req): Json<DeduplicateRequest>,
) -> Response {
    let result = async {
        let threshold = req
            .threshold
            .unwrap_or(state.config.curation.near_duplicate_threshold);
        if !(0.0..=1.0).contains(&threshold) {
            return Err(EngramError::Validation(
                "threshold must be between 0.0 and 1.0".into(),
            ));
        }
        let mut conn = state.lock_db().await?;
        dedup::deduplicate(&mut conn, threshold, req.dry_run)
    }
    .await;
    respond("deduplicate", result)
}

// ── Consolidate ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ConsolidateRequest {
    #[serde(default)]
    pub memory_ids: Vec<String>,
    pub title: Option<String>,
    #[serde(default)]
    pub dry_run: bool,
}

pub async fn consolidate(
    State(state): State<AppState>,
    Json(req): Json<ConsolidateRequest>,
) -> Response {
    let result = async {
        if req.memory_ids.is_empty() {
            return Err(EngramError::Validation("memory_ids required".into()));
        }
        let mut conn = state.lock_db().await?;
        consolidate::consolidate(
            &mut conn,
            state.embedding.as_ref(),
            &req.memory_ids,
            req.title.as_deref(),
            req.dry_run,
        )
    }
    .await;
    respond("consolidate", result)
}

// ── Archive ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ArchiveRequest {
    pub days: Option<u32>,
    #[serde(default = "default_true")]
    pub dry_run: bool,
}

pub async fn archive(State(state): State<AppState>, Json(req): Json<ArchiveRequest>) -> Response {
    let result = async {
        let days = req.days.unwrap_or(state.config.curation.archive_age_days);
        let mut conn = state.lock_db().await?;
        archive::archive_older_than(&mut conn, days, req.dry_run)
    }
    .await;
    respond("archive", result)
}

// ── Enhance ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct EnhanceRequest {
    /// Specific records to enhance; the whole active corpus when absent.
    pub memory_ids: Option<Vec<String>>,
    #[serde(default)]
    pub dry_run: bool,
}

pub async fn enhance(State(state): State<AppState>, Json(req): Json<EnhanceRequest>) -> Response {
    let result = async {
        let mut conn = state.lock_db().await?;
        enhance::enhance(&mut conn, req.memory_ids.as_deref(), req.dry_run)
    }
    .await;
    respond("enhance", result)
}

// ── Auto-curate ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct AutoCurateRequest {
    #[serde(default = "default_true")]
    pub dry_run: bool,
}

pub async fn auto_curate(
    State(state): State<AppState>,
    Json(req): Json<AutoCurateRequest>,
) -> Response {
    let result = async {
        let mut conn = state.lock_db().await?;
        auto::auto_curate(&mut conn, &state.config.curation, req.dry_run)
    }
    .await;
    respond("auto_curate", result)
}
