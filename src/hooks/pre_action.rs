//! Pre-action hook: check memory for past trouble with the file about to be
//! touched. Advisory-only — warnings are printed, the action always proceeds.

use anyhow::Result;

use crate::config::EngramConfig;
use crate::session::events::HookEvent;

use super::{read_stdin_payload, session_id_from, success_data, HookClient};

/// Tool names whose input carries a file path worth checking.
const FILE_TOOLS: &[&str] = &["Edit", "Write", "MultiEdit"];

pub async fn run(config: &EngramConfig) -> Result<()> {
    let Some(payload) = read_stdin_payload() else {
        return Ok(());
    };

    let tool_name = payload
        .get("tool_name")
        .and_then(|t| t.as_str())
        .unwrap_or_default();
    if !FILE_TOOLS.contains(&tool_name) {
        return Ok(());
    }
    let Some(file_path) = payload
        .get("tool_input")
        .and_then(|i| i.get("file_path"))
        .and_then(|p| p.as_str())
    else {
        return Ok(());
    };

    let Some(client) = HookClient::new(&config.hooks) else {
        return Ok(());
    };

    let event = HookEvent::PreAction {
        session_id: session_id_from(Some(&payload)),
        action: tool_name.to_string(),
        file_path: Some(file_path.to_string()),
    };

    let Some(response) = client.post("/api/active/check", &event).await else {
        return Ok(());
    };
    if let Some(data) = success_data(&response) {
        if let Some(warnings) = data.get("warnings").and_then(|w| w.as_array()) {
            for warning in warnings {
                if let Some(message) = warning.get("message").and_then(|m| m.as_str()) {
                    println!("[engram] warning: {message}");
                }
            }
            if !warnings.is_empty() {
                println!("[engram] consider checking memory for past solutions before proceeding");
            }
        }
    }

    Ok(())
}
