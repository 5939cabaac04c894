//! The hook event contract.
//!
//! External lifecycle events arrive as a tagged union with explicit required
//! fields per variant, validated at the boundary before dispatch.

use serde::{Deserialize, Serialize};

use crate::error::EngramError;

/// A lifecycle event from the external tool-use loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HookEvent {
    /// A session began; `project` scopes the opening retrieval.
    SessionStart {
        session_id: String,
        project: String,
    },
    /// An action (file edit, write, command) is about to run.
    PreAction {
        session_id: String,
        action: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        file_path: Option<String>,
    },
    /// An action finished; `output` carries captured tool output.
    PostAction {
        session_id: String,
        action: String,
        #[serde(default)]
        output: String,
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        file_path: Option<String>,
    },
    /// The session ended; a summary record is derived and the context dropped.
    SessionEnd { session_id: String },
}

impl HookEvent {
    pub fn session_id(&self) -> &str {
        match self {
            Self::SessionStart { session_id, .. }
            | Self::PreAction { session_id, .. }
            | Self::PostAction { session_id, .. }
            | Self::SessionEnd { session_id } => session_id,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::SessionStart { .. } => "session_start",
            Self::PreAction { .. } => "pre_action",
            Self::PostAction { .. } => "post_action",
            Self::SessionEnd { .. } => "session_end",
        }
    }

    /// Boundary validation: required fields must be present and non-empty.
    pub fn validate(&self) -> Result<(), EngramError> {
        if self.session_id().trim().is_empty() {
            return Err(EngramError::Validation("session_id must not be empty".into()));
        }
        match self {
            Self::SessionStart { project, .. } if project.trim().is_empty() => Err(
                EngramError::Validation("project must not be empty".into()),
            ),
            Self::PreAction { action, .. } | Self::PostAction { action, .. }
                if action.trim().is_empty() =>
            {
                Err(EngramError::Validation("action must not be empty".into()))
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tagged_deserialization() {
        let event: HookEvent = serde_json::from_str(
            r#"{"event": "session_start", "session_id": "s1", "project": "webapp"}"#,
        )
        .unwrap();
        assert!(matches!(event, HookEvent::SessionStart { .. }));
        assert_eq!(event.session_id(), "s1");
        assert_eq!(event.name(), "session_start");
    }

    #[test]
    fn pre_action_file_path_is_optional() {
        let event: HookEvent = serde_json::from_str(
            r#"{"event": "pre_action", "session_id": "s1", "action": "edit"}"#,
        )
        .unwrap();
        match event {
            HookEvent::PreAction { file_path, .. } => assert!(file_path.is_none()),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let result: Result<HookEvent, _> =
            serde_json::from_str(r#"{"event": "compact", "session_id": "s1"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn missing_required_field_is_rejected() {
        // post_action without `success`
        let result: Result<HookEvent, _> = serde_json::from_str(
            r#"{"event": "post_action", "session_id": "s1", "action": "bash"}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn validation_catches_empty_fields() {
        let event = HookEvent::SessionStart {
            session_id: "s1".into(),
            project: "  ".into(),
        };
        assert!(event.validate().is_err());

        let event = HookEvent::PreAction {
            session_id: "".into(),
            action: "edit".into(),
            file_path: None,
        };
        assert!(event.validate().is_err());

        let event = HookEvent::SessionEnd { session_id: "s1".into() };
        assert!(event.validate().is_ok());
    }
}
