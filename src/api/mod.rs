//! HTTP surface for the memory engine.
//!
//! All endpoints share one envelope: `{success, data | null, error | null}`.
//! Non-2xx statuses are reserved for malformed requests (bad JSON, unknown
//! routes); domain failures — not-found, conflict, validation — come back as
//! `success: false` with a typed error code, still 200.

pub mod active;
pub mod curator;
pub mod memory;

use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use rusqlite::Connection;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::EngramConfig;
use crate::embedding::EmbeddingProvider;
use crate::error::EngramError;
use crate::session::context::SessionTracker;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<tokio::sync::Mutex<Connection>>,
    pub embedding: Arc<dyn EmbeddingProvider>,
    pub config: Arc<EngramConfig>,
    pub sessions: Arc<tokio::sync::Mutex<SessionTracker>>,
    pub started_at: std::time::Instant,
}

impl AppState {
    pub fn new(
        conn: Connection,
        embedding: Arc<dyn EmbeddingProvider>,
        config: Arc<EngramConfig>,
    ) -> Self {
        Self {
            db: Arc::new(tokio::sync::Mutex::new(conn)),
            embedding,
            config,
            sessions: Arc::new(tokio::sync::Mutex::new(SessionTracker::new())),
            started_at: std::time::Instant::now(),
        }
    }

    /// Acquire the store-wide lock within the configured bound.
    ///
    /// Curation handlers hold this guard for their whole batch, so a
    /// concurrent `add` blocks here rather than failing silently; past the
    /// timeout the caller gets `ENGINE_UNAVAILABLE`.
    pub(crate) async fn lock_db(
        &self,
    ) -> Result<tokio::sync::MutexGuard<'_, Connection>, EngramError> {
        let timeout = Duration::from_secs(self.config.server.lock_timeout_secs);
        tokio::time::timeout(timeout, self.db.lock())
            .await
            .map_err(|_| {
                EngramError::Unavailable("record store is busy, retry shortly".into())
            })
    }
}

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiErrorBody>,
}

/// Wrap a handler result in the uniform envelope.
pub(crate) fn respond<T: Serialize>(
    operation: &str,
    result: Result<T, EngramError>,
) -> Response {
    match result {
        Ok(data) => Json(Envelope {
            success: true,
            data: Some(data),
            error: None,
        })
        .into_response(),
        Err(e) => {
            tracing::warn!(operation, code = e.code(), error = %e, "request failed");
            Json(Envelope::<serde_json::Value> {
                success: false,
                data: None,
                error: Some(ApiErrorBody {
                    code: e.code().to_string(),
                    message: e.to_string(),
                    operation: Some(operation.to_string()),
                }),
            })
            .into_response()
        }
    }
}

/// Build the full API router.
pub fn router(state: AppState) -> Router {
    let request_timeout = Duration::from_secs(state.config.server.request_timeout_secs);
    Router::new()
        .route("/api/health", get(memory::health))
        .route("/api/search", post(memory::search))
        .route("/api/add_memory", post(memory::add))
        .route("/api/memories", get(memory::list))
        .route("/api/memory/{id}", delete(memory::remove))
        .route("/api/reindex", post(memory::reindex))
        .route("/api/curator/health", get(curator::health))
        .route("/api/curator/analyze", get(curator::analyze))
        .route("/api/curator/deduplicate", post(curator::deduplicate))
        .route("/api/curator/consolidate", post(curator::consolidate))
        .route("/api/curator/archive", post(curator::archive))
        .route("/api/curator/enhance", post(curator::enhance))
        .route("/api/curator/auto-curate", post(curator::auto_curate))
        .route("/api/active/status", get(active::status))
        .route("/api/active/decisions", get(active::decisions))
        .route("/api/active/context", post(active::context))
        .route("/api/active/check", post(active::check))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(request_timeout))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Open the database, wire up state, and serve until ctrl-c.
pub async fn serve(config: EngramConfig) -> anyhow::Result<()> {
    let db_path = config.resolved_db_path();
    let conn = crate::db::open_database(&db_path)?;
    tracing::info!(db = %db_path.display(), "database ready");

    // Warn when the stored provider does not match the configured one — the
    // vectors in the index would not be comparable to fresh query embeddings.
    if let Ok(Some(stored)) = crate::db::migrations::get_embedding_provider(&conn) {
        if stored != config.embedding.provider {
            tracing::warn!(
                stored = %stored,
                configured = %config.embedding.provider,
                "embedding provider changed — POST /api/reindex to rebuild all vectors"
            );
        }
    }

    let provider = crate::embedding::create_provider(&config.embedding)?;
    let embedding: Arc<dyn EmbeddingProvider> = Arc::from(provider);
    tracing::info!(provider = %config.embedding.provider, "embedding provider ready");

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState::new(conn, embedding, Arc::new(config));
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "memory engine listening at http://{bind_addr}/api");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c()
                .await
                .expect("failed to listen for ctrl-c");
            tracing::info!("shutting down");
        })
        .await?;

    Ok(())
}
