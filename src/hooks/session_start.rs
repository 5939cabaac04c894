//! Session-start hook: announce the memory system and surface relevant
//! past work for the opening context.

use anyhow::Result;

use crate::config::EngramConfig;
use crate::session::events::HookEvent;

use super::{project_from, read_stdin_payload, session_id_from, success_data, HookClient};

pub async fn run(config: &EngramConfig) -> Result<()> {
    let payload = read_stdin_payload();
    let Some(client) = HookClient::new(&config.hooks) else {
        return Ok(());
    };

    // Engine reachable? Silently bow out if not.
    let Some(health) = client.get("/api/health").await else {
        return Ok(());
    };
    if let Some(data) = success_data(&health) {
        let count = data
            .get("active_record_count")
            .and_then(|c| c.as_u64())
            .unwrap_or(0);
        println!("[engram] memory system active: {count} memories available");
    }

    let event = HookEvent::SessionStart {
        session_id: session_id_from(payload.as_ref()),
        project: project_from(payload.as_ref()),
    };

    let Some(response) = client.post("/api/active/context", &event).await else {
        return Ok(());
    };
    if let Some(data) = success_data(&response) {
        if let Some(relevant) = data.get("relevant_memories").and_then(|r| r.as_array()) {
            if !relevant.is_empty() {
                println!("[engram] relevant past work:");
                for (i, memory) in relevant.iter().take(3).enumerate() {
                    let title = memory
                        .get("title")
                        .and_then(|t| t.as_str())
                        .unwrap_or("Untitled");
                    println!("  {}. {title}", i + 1);
                }
            }
        }
    }

    Ok(())
}
