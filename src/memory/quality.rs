//! Quality scoring and content heuristics.
//!
//! The quality score is a pure function of a record's content and metadata
//! fields, so curation can recompute it deterministically at any time. The
//! same module houses the title derivation and technology detection used to
//! backfill missing fields at add and enhance time.

/// Title used when nothing better can be derived from content.
pub const PLACEHOLDER_TITLE: &str = "Untitled Memory";

/// Technology names detected by word match over content.
const TECH_KEYWORDS: &[&str] = &[
    "python", "javascript", "typescript", "react", "flask", "sql", "html",
    "css", "node", "npm", "git", "docker", "rust",
];

/// Compute the quality score for a record's fields.
///
/// Components: content length (up to 0.2), a real title (0.2), technologies
/// (0.15), file paths (0.1), project (0.1), code fences (0.15), multi-line
/// structure (0.1). Capped at 1.0.
pub fn score(
    content: &str,
    title: &str,
    technologies: &[String],
    file_paths: &[String],
    project: &str,
) -> f64 {
    let mut score: f64 = 0.0;

    if content.len() > 500 {
        score += 0.2;
    } else if content.len() > 200 {
        score += 0.1;
    }

    if !title.is_empty() && title != PLACEHOLDER_TITLE {
        score += 0.2;
    }

    if !technologies.is_empty() {
        score += 0.15;
    }

    if !file_paths.is_empty() {
        score += 0.1;
    }

    if !project.is_empty() {
        score += 0.1;
    }

    if content.contains("```") {
        score += 0.15;
    }

    if content.lines().filter(|l| !l.trim().is_empty()).count() > 1 {
        score += 0.1;
    }

    score.min(1.0)
}

/// Quality bucket labels used by the health report.
pub fn bucket(score: f64, high: f64, medium: f64) -> &'static str {
    if score >= high {
        "high"
    } else if score >= medium {
        "medium"
    } else {
        "low"
    }
}

/// Derive a title from the first meaningful content line.
///
/// A meaningful line is 10–100 chars after trimming markdown heading markers.
/// Truncated to 80 chars on a char boundary. Falls back to
/// [`PLACEHOLDER_TITLE`].
pub fn derive_title(content: &str) -> String {
    for line in content.lines() {
        let line = line.trim().trim_start_matches('#').trim();
        if line.len() >= 10 && line.len() <= 100 {
            return truncate_chars(line, 80);
        }
    }
    PLACEHOLDER_TITLE.to_string()
}

/// Detect technologies by whole-word match over lowercased content.
pub fn detect_technologies(content: &str) -> Vec<String> {
    let words: std::collections::HashSet<String> = content
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect();

    TECH_KEYWORDS
        .iter()
        .filter(|tech| words.contains(**tech))
        .map(|tech| tech.to_string())
        .collect()
}

/// Truncate to `max_chars` on a char boundary.
fn truncate_chars(s: &str, max_chars: usize) -> String {
    if s.len() <= max_chars {
        return s.to_string();
    }
    let end = s
        .char_indices()
        .take_while(|(i, _)| *i < max_chars)
        .last()
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(max_chars);
    s[..end].to_string()
}

/// Truncate content for previews, appending "..." if truncated.
pub fn truncate_preview(content: &str, max_chars: usize) -> String {
    if content.len() <= max_chars {
        content.to_string()
    } else {
        format!("{}...", truncate_chars(content, max_chars))
    }
}
