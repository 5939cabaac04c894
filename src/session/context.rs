//! Per-session context and hook event dispatch.
//!
//! A [`SessionContext`] exists from session-start to session-end and is the
//! only mutable session state in the engine — no ambient globals. The
//! lifecycle: `Idle → Active (session-start) → Active (pre/post-action loop)
//! → Ended (session-end)`.
//!
//! [`handle_event`] is the single dispatch point. Pre-action handling is
//! advisory-only: internal retrieval failures degrade to "no advisory" and
//! are never surfaced as errors to the wrapped action.

use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use rusqlite::Connection;

use crate::config::EngramConfig;
use crate::embedding::EmbeddingProvider;
use crate::error::EngramError;
use crate::memory::search::{search, SearchParams};
use crate::memory::store::add_memory;
use crate::memory::types::{Complexity, NewMemory, Source};

use super::classify::{classify, ErrorKind};
use super::events::HookEvent;

/// Upper bound on queued advisories per session.
const MAX_PENDING: usize = 20;

/// A non-blocking warning derived from past records.
#[derive(Debug, Clone, Serialize)]
pub struct Advisory {
    pub message: String,
    pub memory_id: String,
    pub similarity: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    pub created_at: String,
}

/// A past record attached read-only at session start.
#[derive(Debug, Clone, Serialize)]
pub struct RelevantMemory {
    pub id: String,
    pub title: String,
    pub relevance: f64,
}

/// Mutable per-session state.
#[derive(Debug, Serialize)]
pub struct SessionContext {
    pub session_id: String,
    pub project: String,
    pub start_time: String,
    pub pending_decisions: VecDeque<Advisory>,
    pub last_action: Option<String>,
    pub files_touched: Vec<String>,
    pub technologies: BTreeSet<String>,
    pub error_count: usize,
    /// Error kinds already stored or advised this session (write-time dedup).
    #[serde(skip)]
    pub seen_error_kinds: HashSet<ErrorKind>,
    /// Attached at session start; never queued as advisories.
    pub relevant_memories: Vec<RelevantMemory>,
}

impl SessionContext {
    fn new(session_id: String, project: String) -> Self {
        Self {
            session_id,
            project,
            start_time: chrono::Utc::now().to_rfc3339(),
            pending_decisions: VecDeque::new(),
            last_action: None,
            files_touched: Vec::new(),
            technologies: BTreeSet::new(),
            error_count: 0,
            seen_error_kinds: HashSet::new(),
            relevant_memories: Vec::new(),
        }
    }

    fn touch_file(&mut self, path: &str) {
        if !self.files_touched.iter().any(|f| f == path) {
            self.files_touched.push(path.to_string());
        }
        if let Some(tech) = technology_for_path(path) {
            self.technologies.insert(tech.to_string());
        }
    }
}

/// All live session contexts, keyed by session id.
#[derive(Debug, Default)]
pub struct SessionTracker {
    sessions: HashMap<String, SessionContext>,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, session_id: &str) -> Option<&SessionContext> {
        self.sessions.get(session_id)
    }

    pub fn get_mut(&mut self, session_id: &str) -> Option<&mut SessionContext> {
        self.sessions.get_mut(session_id)
    }

    pub fn contexts(&self) -> impl Iterator<Item = &SessionContext> {
        self.sessions.values()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Drain up to `limit` pending advisories for a session, oldest first.
    pub fn drain_advisories(&mut self, session_id: &str, limit: usize) -> Vec<Advisory> {
        match self.sessions.get_mut(session_id) {
            Some(ctx) => {
                let take = limit.min(ctx.pending_decisions.len());
                ctx.pending_decisions.drain(..take).collect()
            }
            None => Vec::new(),
        }
    }
}

/// Outcome of dispatching one hook event.
#[derive(Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum HookOutcome {
    Started {
        session_id: String,
        relevant_memories: Vec<RelevantMemory>,
    },
    Advised {
        advisories: Vec<Advisory>,
    },
    Recorded {
        #[serde(skip_serializing_if = "Option::is_none")]
        memory_id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error_kind: Option<ErrorKind>,
    },
    Ended {
        #[serde(skip_serializing_if = "Option::is_none")]
        summary_id: Option<String>,
    },
}

/// Dispatch a validated hook event against the tracker and the store.
pub fn handle_event(
    tracker: &mut SessionTracker,
    conn: &mut Connection,
    provider: &dyn EmbeddingProvider,
    config: &EngramConfig,
    event: HookEvent,
) -> Result<HookOutcome, EngramError> {
    event.validate()?;

    match event {
        HookEvent::SessionStart { session_id, project } => {
            let mut ctx = SessionContext::new(session_id.clone(), project.clone());
            ctx.relevant_memories = opening_retrieval(conn, provider, config, &project);
            let relevant = ctx.relevant_memories.clone();
            tracker.sessions.insert(session_id.clone(), ctx);
            tracing::info!(session = %session_id, relevant = relevant.len(), "session started");
            Ok(HookOutcome::Started {
                session_id,
                relevant_memories: relevant,
            })
        }

        HookEvent::PreAction { session_id, action, file_path } => {
            // Advisory-only: an unknown session or failed retrieval yields no
            // advisory, never an error.
            let advisories =
                pre_action_advisories(conn, provider, config, &action, file_path.as_deref());

            if let Some(ctx) = tracker.get_mut(&session_id) {
                ctx.last_action = Some(action);
                if let Some(path) = file_path.as_deref() {
                    ctx.touch_file(path);
                }
                for advisory in &advisories {
                    if let Some(kind) = advisory.error_kind {
                        ctx.seen_error_kinds.insert(kind);
                    }
                    if ctx.pending_decisions.len() < MAX_PENDING {
                        ctx.pending_decisions.push_back(advisory.clone());
                    }
                }
            }

            Ok(HookOutcome::Advised { advisories })
        }

        HookEvent::PostAction { session_id, action, output, success, file_path } => {
            let Some(ctx) = tracker.get_mut(&session_id) else {
                tracing::warn!(session = %session_id, "post-action for unknown session");
                return Ok(HookOutcome::Recorded { memory_id: None, error_kind: None });
            };
            ctx.last_action = Some(action.clone());
            if let Some(path) = file_path.as_deref() {
                ctx.touch_file(path);
            }

            if success {
                return Ok(HookOutcome::Recorded { memory_id: None, error_kind: None });
            }

            ctx.error_count += 1;
            let kind = classify(&output);

            // Write-time dedup: one stored record per error kind per session
            if !ctx.seen_error_kinds.insert(kind) {
                tracing::debug!(session = %session_id, %kind, "error kind already recorded");
                return Ok(HookOutcome::Recorded { memory_id: None, error_kind: Some(kind) });
            }

            let record = error_record(ctx, &action, &output, kind);
            let embedding = provider
                .embed(&record.content)
                .map_err(EngramError::Internal)?;
            let result = add_memory(conn, record, &embedding)?;
            tracing::info!(session = %session_id, %kind, id = %result.id, "error pattern stored");

            Ok(HookOutcome::Recorded {
                memory_id: Some(result.id),
                error_kind: Some(kind),
            })
        }

        HookEvent::SessionEnd { session_id } => {
            let Some(ctx) = tracker.sessions.remove(&session_id) else {
                tracing::warn!(session = %session_id, "session-end for unknown session");
                return Ok(HookOutcome::Ended { summary_id: None });
            };

            let summary = summary_record(&ctx);
            let embedding = provider
                .embed(&summary.content)
                .map_err(EngramError::Internal)?;
            let result = add_memory(conn, summary, &embedding)?;
            tracing::info!(session = %session_id, id = %result.id, "session summary stored");

            Ok(HookOutcome::Ended { summary_id: Some(result.id) })
        }
    }
}

/// Session-start retrieval: project name as query; failures degrade to empty.
fn opening_retrieval(
    conn: &Connection,
    provider: &dyn EmbeddingProvider,
    config: &EngramConfig,
    project: &str,
) -> Vec<RelevantMemory> {
    let embedding = match provider.embed(project) {
        Ok(e) => e,
        Err(e) => {
            tracing::warn!(error = %e, "opening retrieval embed failed");
            return Vec::new();
        }
    };
    let params = SearchParams::new(project, &config.retrieval);
    match search(conn, &embedding, &params, &config.retrieval) {
        Ok(hits) => hits
            .into_iter()
            .filter(|h| h.relevance >= config.hooks.relevant_memory_floor)
            .map(|h| RelevantMemory {
                id: h.id,
                title: h.title,
                relevance: h.relevance,
            })
            .collect(),
        Err(e) => {
            tracing::warn!(error = %e, "opening retrieval failed");
            Vec::new()
        }
    }
}

/// Pre-action retrieval: action subject + error/fix query. High-similarity
/// hits that describe past errors become advisories.
fn pre_action_advisories(
    conn: &Connection,
    provider: &dyn EmbeddingProvider,
    config: &EngramConfig,
    action: &str,
    file_path: Option<&str>,
) -> Vec<Advisory> {
    let mut query_parts = vec![action.to_string()];
    if let Some(path) = file_path {
        if let Some(name) = std::path::Path::new(path).file_name() {
            query_parts.push(name.to_string_lossy().into_owned());
        }
    }
    query_parts.push("error bug fix".into());
    let query = query_parts.join(" ");

    let embedding = match provider.embed(&query) {
        Ok(e) => e,
        Err(e) => {
            tracing::warn!(error = %e, "advisory embed failed");
            return Vec::new();
        }
    };

    let mut params = SearchParams::new(&query, &config.retrieval);
    params.similarity_threshold = config.hooks.search_threshold;
    params.max_results = config.hooks.max_advisories;

    let hits = match search(conn, &embedding, &params, &config.retrieval) {
        Ok(hits) => hits,
        Err(e) => {
            tracing::warn!(error = %e, "advisory search failed");
            return Vec::new();
        }
    };

    let now = chrono::Utc::now().to_rfc3339();
    hits.into_iter()
        .filter(|h| h.similarity > config.hooks.advisory_similarity)
        .filter_map(|h| {
            let kind = h
                .metadata
                .as_ref()
                .and_then(|m| m.get("error_kind"))
                .and_then(|k| k.as_str())
                .and_then(parse_error_kind);
            // Only past-error records become advisories
            if kind.is_none() && !h.preview.to_lowercase().contains("error") {
                return None;
            }
            Some(Advisory {
                message: format!("Similar issue found ({}): {}", h.date, h.title),
                memory_id: h.id,
                similarity: h.similarity,
                error_kind: kind,
                created_at: now.clone(),
            })
        })
        .collect()
}

fn parse_error_kind(s: &str) -> Option<ErrorKind> {
    serde_json::from_value(serde_json::Value::String(s.to_string())).ok()
}

/// Build the error record stored by a failed post-action.
fn error_record(ctx: &SessionContext, action: &str, output: &str, kind: ErrorKind) -> NewMemory {
    let truncated: String = output.chars().take(1000).collect();
    let mut record = NewMemory::new(
        format!(
            "Error kind: {kind}\nAction: {action}\nOutput: {truncated}\nStatus: Unresolved - needs solution"
        ),
        Source::InteractiveSession,
    );
    record.title = Some(format!("Error: {kind} in {action}"));
    record.technologies = ctx.technologies.iter().cloned().collect();
    record.complexity = Complexity::High;
    record.project = ctx.project.clone();
    record.metadata = Some(serde_json::json!({
        "error_kind": kind.as_str(),
        "session_id": ctx.session_id,
    }));
    record
}

/// Build the summary record written at session end.
fn summary_record(ctx: &SessionContext) -> NewMemory {
    let technologies: Vec<String> = ctx.technologies.iter().cloned().collect();
    let mut lines = vec![format!("Session summary for project {}", ctx.project)];
    if !ctx.files_touched.is_empty() {
        lines.push(format!("Files touched: {}", ctx.files_touched.join(", ")));
    }
    if !technologies.is_empty() {
        lines.push(format!("Technologies: {}", technologies.join(", ")));
    }
    lines.push(format!("Errors encountered: {}", ctx.error_count));
    if let Some(action) = &ctx.last_action {
        lines.push(format!("Last action: {action}"));
    }

    let complexity = if ctx.error_count > 2 || ctx.files_touched.len() > 5 {
        Complexity::High
    } else if ctx.files_touched.is_empty() {
        Complexity::Low
    } else {
        Complexity::Medium
    };

    let mut record = NewMemory::new(lines.join("\n"), Source::InteractiveSession);
    record.title = Some(format!("Session summary: {}", ctx.project));
    record.technologies = technologies;
    record.file_paths = ctx.files_touched.clone();
    record.complexity = complexity;
    record.project = ctx.project.clone();
    record.metadata = Some(serde_json::json!({
        "session_summary": true,
        "session_id": ctx.session_id,
        "error_count": ctx.error_count,
    }));
    record
}

/// Infer a technology tag from a file extension.
fn technology_for_path(path: &str) -> Option<&'static str> {
    let ext = std::path::Path::new(path).extension()?.to_str()?;
    match ext.to_lowercase().as_str() {
        "ts" | "tsx" => Some("typescript"),
        "js" | "jsx" => Some("javascript"),
        "py" => Some("python"),
        "rs" => Some("rust"),
        "sql" => Some("sql"),
        "css" => Some("css"),
        "html" => Some("html"),
        _ => None,
    }
}
