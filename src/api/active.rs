//! Active-context endpoints — the hook protocol's HTTP boundary.
//!
//! `POST /api/active/context` accepts any validated [`HookEvent`] and
//! dispatches it; `POST /api/active/check` is the dedicated pre-action path
//! and only accepts that variant. Lock order is always sessions before db.

use axum::extract::{Query, State};
use axum::response::Response;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::EngramError;
use crate::session::context::{handle_event, Advisory, HookOutcome};
use crate::session::events::HookEvent;

use super::{respond, AppState};

// ── Status ────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub project: String,
    pub start_time: String,
    pub pending_decisions: usize,
    pub files_touched: usize,
    pub error_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_action: Option<String>,
}

#[derive(Serialize)]
pub struct StatusData {
    pub active_sessions: usize,
    pub sessions: Vec<SessionSummary>,
}

pub async fn status(State(state): State<AppState>) -> Response {
    let sessions = state.sessions.lock().await;
    let mut summaries: Vec<SessionSummary> = sessions
        .contexts()
        .map(|ctx| SessionSummary {
            session_id: ctx.session_id.clone(),
            project: ctx.project.clone(),
            start_time: ctx.start_time.clone(),
            pending_decisions: ctx.pending_decisions.len(),
            files_touched: ctx.files_touched.len(),
            error_count: ctx.error_count,
            last_action: ctx.last_action.clone(),
        })
        .collect();
    summaries.sort_by(|a, b| a.session_id.cmp(&b.session_id));

    respond::<StatusData>(
        "active_status",
        Ok(StatusData {
            active_sessions: summaries.len(),
            sessions: summaries,
        }),
    )
}

// ── Pending advisories ────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct DecisionsQuery {
    pub session_id: String,
    pub limit: Option<usize>,
}

#[derive(Serialize)]
pub struct DecisionsData {
    pub decisions: Vec<Advisory>,
    pub count: usize,
}

/// Drain pending advisories for a session, oldest first.
pub async fn decisions(
    State(state): State<AppState>,
    Query(query): Query<DecisionsQuery>,
) -> Response {
    let result = async {
        if query.session_id.trim().is_empty() {
            return Err(EngramError::Validation("session_id must not be empty".into()));
        }
        let limit = query.limit.unwrap_or(10).clamp(1, 50);
        let mut sessions = state.sessions.lock().await;
        let decisions = sessions.drain_advisories(&query.session_id, limit);
        Ok(DecisionsData {
            count: decisions.len(),
            decisions,
        })
    }
    .await;
    respond("active_decisions", result)
}

// ── Event dispatch ────────────────────────────────────────────────────────────

pub async fn context(State(state): State<AppState>, Json(event): Json<HookEvent>) -> Response {
    let result = dispatch(&state, event).await;
    respond("active_context", result)
}

#[derive(Serialize)]
pub struct CheckData {
    pub warnings: Vec<Advisory>,
    /// Advisories never block: the wrapped action always proceeds.
    pub should_proceed: bool,
}

/// Pre-action advisory check. Accepts only the `pre_action` event variant.
pub async fn check(State(state): State<AppState>, Json(event): Json<HookEvent>) -> Response {
    let result = async {
        if !matches!(event, HookEvent::PreAction { .. }) {
            return Err(EngramError::Validation(
                "check accepts only pre_action events".into(),
            ));
        }
        match dispatch(&state, event).await? {
            HookOutcome::Advised { advisories } => Ok(CheckData {
                warnings: advisories,
                should_proceed: true,
            }),
            _ => unreachable!("pre_action dispatch always advises"),
        }
    }
    .await;
    respond("active_check", result)
}

async fn dispatch(state: &AppState, event: HookEvent) -> Result<HookOutcome, EngramError> {
    // Lock order: sessions, then db
    let mut sessions = state.sessions.lock().await;
    let mut conn = state.lock_db().await?;
    handle_event(
        &mut sessions,
        &mut conn,
        state.embedding.as_ref(),
        &state.config,
        event,
    )
}
