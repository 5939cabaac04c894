//! Session-end hook: ask the engine to distill the session into a summary
//! record and discard the live context.

use anyhow::Result;

use crate::config::EngramConfig;
use crate::session::events::HookEvent;

use super::{read_stdin_payload, session_id_from, success_data, HookClient};

pub async fn run(config: &EngramConfig) -> Result<()> {
    let payload = read_stdin_payload();
    let Some(client) = HookClient::new(&config.hooks) else {
        return Ok(());
    };

    let event = HookEvent::SessionEnd {
        session_id: session_id_from(payload.as_ref()),
    };

    let Some(response) = client.post("/api/active/context", &event).await else {
        return Ok(());
    };
    if let Some(data) = success_data(&response) {
        if data.get("summary_id").and_then(|s| s.as_str()).is_some() {
            println!("[engram] session summary stored");
        }
    }

    Ok(())
}
