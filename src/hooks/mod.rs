//! Hook client — the external side of the hook protocol.
//!
//! Each `engram hook <event>` subcommand reads the wrapping tool's JSON
//! payload from stdin, calls the engine's HTTP API with a short timeout, and
//! prints any advisory text for the tool to surface. Every path is fail-open:
//! a missing server, a timeout, or malformed input produces no output and a
//! zero exit, never a propagated failure.

pub mod post_action;
pub mod pre_action;
pub mod session_end;
pub mod session_start;

use serde::Serialize;
use std::io::Read;
use std::time::Duration;

use crate::config::HooksConfig;

/// Thin reqwest wrapper with the hook timeout baked in. Construction and
/// every call return `Option` — `None` means "no advisory", never an error.
pub(crate) struct HookClient {
    base: String,
    client: reqwest::Client,
}

impl HookClient {
    pub fn new(config: &HooksConfig) -> Option<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .ok()?;
        Some(Self {
            base: config.api_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub async fn get(&self, path: &str) -> Option<serde_json::Value> {
        let resp = self
            .client
            .get(format!("{}{path}", self.base))
            .send()
            .await
            .ok()?;
        resp.json().await.ok()
    }

    pub async fn post(&self, path: &str, body: &impl Serialize) -> Option<serde_json::Value> {
        let resp = self
            .client
            .post(format!("{}{path}", self.base))
            .json(body)
            .send()
            .await
            .ok()?;
        resp.json().await.ok()
    }
}

/// Read the tool's JSON payload from stdin, tolerating absent or bad input.
pub(crate) fn read_stdin_payload() -> Option<serde_json::Value> {
    let mut input = String::new();
    std::io::stdin().read_to_string(&mut input).ok()?;
    serde_json::from_str(&input).ok()
}

/// Session id: payload field, then environment, then a stable default.
pub(crate) fn session_id_from(payload: Option<&serde_json::Value>) -> String {
    payload
        .and_then(|p| p.get("session_id"))
        .and_then(|s| s.as_str())
        .map(|s| s.to_string())
        .or_else(|| std::env::var("ENGRAM_SESSION_ID").ok())
        .unwrap_or_else(|| "default".to_string())
}

/// Project name: the payload's working directory basename, then environment.
pub(crate) fn project_from(payload: Option<&serde_json::Value>) -> String {
    payload
        .and_then(|p| p.get("cwd"))
        .and_then(|c| c.as_str())
        .and_then(|cwd| {
            std::path::Path::new(cwd)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
        })
        .or_else(|| std::env::var("ENGRAM_PROJECT").ok())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Envelope accessor: `data` when the engine reported success.
pub(crate) fn success_data(response: &serde_json::Value) -> Option<&serde_json::Value> {
    if response.get("success")?.as_bool()? {
        response.get("data")
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_id_falls_back_to_default() {
        std::env::remove_var("ENGRAM_SESSION_ID");
        assert_eq!(session_id_from(None), "default");

        let payload = serde_json::json!({"session_id": "abc"});
        assert_eq!(session_id_from(Some(&payload)), "abc");
    }

    #[test]
    fn project_uses_cwd_basename() {
        let payload = serde_json::json!({"cwd": "/home/dev/projects/warehouse"});
        assert_eq!(project_from(Some(&payload)), "warehouse");
    }

    #[test]
    fn success_data_requires_success_flag() {
        let ok = serde_json::json!({"success": true, "data": {"x": 1}});
        assert_eq!(success_data(&ok).unwrap()["x"], 1);

        let failed = serde_json::json!({"success": false, "data": {"x": 1}});
        assert!(success_data(&failed).is_none());

        let malformed = serde_json::json!({"data": {"x": 1}});
        assert!(success_data(&malformed).is_none());
    }
}
