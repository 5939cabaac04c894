//! Record store and retrieval endpoints.

use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::EngramError;
use crate::memory::quality::truncate_preview;
use crate::memory::search::{search as run_search, SearchHit, SearchParams};
use crate::memory::store;
use crate::memory::types::{Complexity, NewMemory, Source};

use super::{respond, AppState};

// ── Health ────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct HealthData {
    pub status: &'static str,
    pub version: &'static str,
    pub record_count: u64,
    pub active_record_count: u64,
    pub uptime_seconds: u64,
}

pub async fn health(State(state): State<AppState>) -> Response {
    let result = async {
        let conn = state.lock_db().await?;
        let record_count = store::count_memories(&conn, true)?;
        let active_record_count = store::count_memories(&conn, false)?;
        Ok(HealthData {
            status: "healthy",
            version: env!("CARGO_PKG_VERSION"),
            record_count,
            active_record_count,
            uptime_seconds: state.started_at.elapsed().as_secs(),
        })
    }
    .await;
    respond("health", result)
}

// ── Search ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub query: String,
    pub max_results: Option<usize>,
    pub similarity_threshold: Option<f64>,
    pub source_filter: Option<String>,
    pub complexity: Option<String>,
    #[serde(default)]
    pub include_archived: bool,
}

#[derive(Serialize)]
pub struct SearchData {
    pub query: String,
    pub results: Vec<SearchHit>,
    pub total_results: usize,
    pub search_time_ms: f64,
}

pub async fn search(State(state): State<AppState>, Json(req): Json<SearchRequest>) -> Response {
    let result = do_search(&state, req).await;
    respond("search", result)
}

async fn do_search(state: &AppState, req: SearchRequest) -> Result<SearchData, EngramError> {
    if req.query.trim().is_empty() {
        return Err(EngramError::Validation("query must not be empty".into()));
    }

    let retrieval = &state.config.retrieval;
    let mut params = SearchParams::new(req.query.clone(), retrieval);
    if let Some(max) = req.max_results {
        params.max_results = max;
    }
    if let Some(threshold) = req.similarity_threshold {
        params.similarity_threshold = threshold;
    }
    params.source_filter = parse_opt::<Source>(req.source_filter.as_deref())?;
    params.complexity_context = parse_opt::<Complexity>(req.complexity.as_deref())?;
    params.include_archived = req.include_archived;

    let embedding = state
        .embedding
        .embed(&req.query)
        .map_err(EngramError::Internal)?;

    let started = std::time::Instant::now();
    let conn = state.lock_db().await?;
    let results = run_search(&conn, &embedding, &params, retrieval)?;
    let search_time_ms = started.elapsed().as_secs_f64() * 1000.0;

    Ok(SearchData {
        query: req.query,
        total_results: results.len(),
        results,
        search_time_ms,
    })
}

// ── Add ───────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct AddMemoryRequest {
    #[serde(default)]
    pub content: String,
    pub title: Option<String>,
    pub date: Option<String>,
    pub source: Option<String>,
    #[serde(default)]
    pub technologies: Vec<String>,
    #[serde(default)]
    pub file_paths: Vec<String>,
    pub complexity: Option<String>,
    #[serde(default)]
    pub project: String,
    pub metadata: Option<serde_json::Value>,
}

pub async fn add(State(state): State<AppState>, Json(req): Json<AddMemoryRequest>) -> Response {
    let result = do_add(&state, req).await;
    respond("add_memory", result)
}

async fn do_add(
    state: &AppState,
    req: AddMemoryRequest,
) -> Result<store::AddResult, EngramError> {
    if req.content.trim().is_empty() {
        return Err(EngramError::Validation("content must not be empty".into()));
    }

    let source = parse_opt::<Source>(req.source.as_deref())?.unwrap_or(Source::DesktopClient);
    let complexity =
        parse_opt::<Complexity>(req.complexity.as_deref())?.unwrap_or(Complexity::Medium);

    let new = NewMemory {
        content: req.content,
        title: req.title,
        date: req.date,
        source,
        technologies: req.technologies,
        file_paths: req.file_paths,
        complexity,
        project: req.project,
        metadata: req.metadata,
    };

    let embedding = state
        .embedding
        .embed(&new.content)
        .map_err(EngramError::Internal)?;

    let mut conn = state.lock_db().await?;
    store::add_memory(&mut conn, new, &embedding)
}

// ── List ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub page: Option<usize>,
    pub limit: Option<usize>,
    #[serde(default)]
    pub include_archived: bool,
}

#[derive(Serialize)]
pub struct ListEntry {
    pub id: String,
    pub title: String,
    pub date: String,
    pub source: Source,
    pub complexity: Complexity,
    pub technologies: Vec<String>,
    pub project: String,
    pub quality_score: f64,
    pub archived: bool,
    pub preview: String,
}

#[derive(Serialize)]
pub struct Pagination {
    pub page: usize,
    pub limit: usize,
    pub total_count: u64,
    pub total_pages: u64,
    pub has_next: bool,
    pub has_prev: bool,
}

#[derive(Serialize)]
pub struct ListData {
    pub memories: Vec<ListEntry>,
    pub pagination: Pagination,
}

pub async fn list(State(state): State<AppState>, Query(query): Query<ListQuery>) -> Response {
    let result = async {
        let page = query.page.unwrap_or(1).max(1);
        let limit = query.limit.unwrap_or(10).clamp(1, 50);

        let conn = state.lock_db().await?;
        let (records, total_count) =
            store::list_memories(&conn, page, limit, query.include_archived)?;

        let memories = records
            .into_iter()
            .map(|r| ListEntry {
                preview: truncate_preview(&r.content, 200),
                id: r.id,
                title: r.title,
                date: r.date,
                source: r.source,
                complexity: r.complexity,
                technologies: r.technologies,
                project: r.project,
                quality_score: r.quality_score,
                archived: r.archived,
            })
            .collect();

        let total_pages = total_count.div_ceil(limit as u64);
        Ok(ListData {
            memories,
            pagination: Pagination {
                page,
                limit,
                total_count,
                total_pages,
                has_next: (page as u64) < total_pages,
                has_prev: page > 1,
            },
        })
    }
    .await;
    respond("list_memories", result)
}

// ── Delete ────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct DeleteData {
    pub deleted: String,
}

pub async fn remove(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let result = async {
        let mut conn = state.lock_db().await?;
        store::delete_memory(&mut conn, &id)?;
        Ok(DeleteData { deleted: id })
    }
    .await;
    respond("delete_memory", result)
}

// ── Reindex ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ReindexRequest {
    #[serde(default)]
    pub confirm: bool,
}

pub async fn reindex(State(state): State<AppState>, Json(req): Json<ReindexRequest>) -> Response {
    let result = async {
        if !req.confirm {
            return Err(EngramError::Validation(
                "reindexing requires confirmation: send {\"confirm\": true}".into(),
            ));
        }
        let mut conn = state.lock_db().await?;
        store::rebuild_index(&mut conn, state.embedding.as_ref())
    }
    .await;
    respond("reindex", result)
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn parse_opt<T: std::str::FromStr<Err = String>>(
    value: Option<&str>,
) -> Result<Option<T>, EngramError> {
    value
        .map(|s| s.parse::<T>().map_err(EngramError::Validation))
        .transpose()
}
