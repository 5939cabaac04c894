//! Core memory record definitions.
//!
//! Defines [`Source`] (where a memory came from), [`Complexity`], and
//! [`MemoryRecord`] (a full row of the `memories` table). [`NewMemory`]
//! carries caller-supplied fields into the add path before an id exists.

use serde::{Deserialize, Serialize};

/// Where a memory record originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    /// Written by the hook protocol during an interactive coding session.
    InteractiveSession,
    /// Added explicitly by a user or script.
    Manual,
    /// Added by the desktop client surface.
    DesktopClient,
    /// Produced by the consolidate curation operation.
    Consolidation,
}

impl Source {
    /// SQL-compatible string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InteractiveSession => "interactive_session",
            Self::Manual => "manual",
            Self::DesktopClient => "desktop_client",
            Self::Consolidation => "consolidation",
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Source {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "interactive_session" => Ok(Self::InteractiveSession),
            "manual" => Ok(Self::Manual),
            "desktop_client" => Ok(Self::DesktopClient),
            "consolidation" => Ok(Self::Consolidation),
            _ => Err(format!("unknown source: {s}")),
        }
    }
}

/// Rough complexity rating of the work a memory describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    Low,
    Medium,
    High,
}

impl Complexity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl std::fmt::Display for Complexity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Complexity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            _ => Err(format!("unknown complexity: {s}")),
        }
    }
}

/// A memory record, matching the `memories` table schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// UUID v7 (time-sortable) primary key.
    pub id: String,
    /// The full text content of the memory.
    pub content: String,
    /// Short display title, derived from content when not supplied.
    pub title: String,
    /// ISO calendar date (`YYYY-MM-DD`) of the session this memory records.
    pub date: String,
    pub source: Source,
    /// Technologies mentioned, deduplicated.
    pub technologies: Vec<String>,
    /// File paths referenced, in order.
    pub file_paths: Vec<String>,
    pub complexity: Complexity,
    /// Owning project name; may be empty.
    pub project: String,
    /// Open string-keyed map for caller-supplied extras.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    /// Quality score in `[0.0, 1.0]`, recomputed by curation.
    pub quality_score: f64,
    /// Visibility flag — archived records are excluded from default search.
    pub archived: bool,
    /// RFC 3339 creation timestamp.
    pub created_at: String,
    /// RFC 3339 last-modification timestamp.
    pub updated_at: String,
}

impl MemoryRecord {
    /// True if metadata marks this as an error record written by the
    /// post-action hook.
    pub fn is_error_record(&self) -> bool {
        self.metadata
            .as_ref()
            .and_then(|m| m.get("error_kind"))
            .is_some()
    }
}

/// Caller-supplied fields for a new memory, before an id is assigned.
#[derive(Debug, Clone)]
pub struct NewMemory {
    pub content: String,
    pub title: Option<String>,
    /// Defaults to today when absent.
    pub date: Option<String>,
    pub source: Source,
    pub technologies: Vec<String>,
    pub file_paths: Vec<String>,
    pub complexity: Complexity,
    pub project: String,
    pub metadata: Option<serde_json::Value>,
}

impl NewMemory {
    /// A minimal new memory with the given content and source.
    pub fn new(content: impl Into<String>, source: Source) -> Self {
        Self {
            content: content.into(),
            title: None,
            date: None,
            source,
            technologies: Vec::new(),
            file_paths: Vec::new(),
            complexity: Complexity::Medium,
            project: String::new(),
            metadata: None,
        }
    }
}
