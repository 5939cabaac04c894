//! Post-action hook: report the action's outcome so failures are classified
//! and remembered for future sessions.

use anyhow::Result;

use crate::config::EngramConfig;
use crate::session::events::HookEvent;

use super::{read_stdin_payload, session_id_from, success_data, HookClient};

/// Markers that flag a tool response as a failure.
const FAILURE_MARKERS: &[&str] = &["error", "failed", "failure", "exception", "traceback"];

pub async fn run(config: &EngramConfig) -> Result<()> {
    let Some(payload) = read_stdin_payload() else {
        return Ok(());
    };

    let tool_name = payload
        .get("tool_name")
        .and_then(|t| t.as_str())
        .unwrap_or("unknown");
    let output = payload
        .get("tool_response")
        .map(response_text)
        .unwrap_or_default();
    let file_path = payload
        .get("tool_input")
        .and_then(|i| i.get("file_path"))
        .and_then(|p| p.as_str())
        .map(|p| p.to_string());

    let Some(client) = HookClient::new(&config.hooks) else {
        return Ok(());
    };

    let event = HookEvent::PostAction {
        session_id: session_id_from(Some(&payload)),
        action: tool_name.to_string(),
        success: !looks_like_failure(&output),
        output,
        file_path,
    };

    let Some(response) = client.post("/api/active/context", &event).await else {
        return Ok(());
    };
    if let Some(data) = success_data(&response) {
        if data.get("memory_id").and_then(|m| m.as_str()).is_some() {
            let kind = data
                .get("error_kind")
                .and_then(|k| k.as_str())
                .unwrap_or("generic");
            println!("[engram] error pattern stored ({kind}) for future sessions");
        }
    }

    Ok(())
}

fn response_text(response: &serde_json::Value) -> String {
    match response {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn looks_like_failure(output: &str) -> bool {
    let lower = output.to_lowercase();
    FAILURE_MARKERS.iter().any(|m| lower.contains(m))
}
