//! Failure-output classification.
//!
//! [`classify`] is a pure function from captured tool output to the fixed
//! [`ErrorKind`] taxonomy, testable in isolation from any I/O.

use serde::{Deserialize, Serialize};

/// Fixed taxonomy for post-action failure classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    TypeMismatch,
    SyntaxError,
    ModuleNotFound,
    FileNotFound,
    PermissionDenied,
    NullReference,
    Generic,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TypeMismatch => "type_mismatch",
            Self::SyntaxError => "syntax_error",
            Self::ModuleNotFound => "module_not_found",
            Self::FileNotFound => "file_not_found",
            Self::PermissionDenied => "permission_denied",
            Self::NullReference => "null_reference",
            Self::Generic => "generic",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify captured failure output into an [`ErrorKind`].
///
/// Checks are ordered from most to least specific; anything unrecognized is
/// [`ErrorKind::Generic`].
pub fn classify(output: &str) -> ErrorKind {
    let lower = output.to_lowercase();

    if contains_any(&lower, &["typeerror", "type mismatch", "mismatched types", "incompatible types"]) {
        ErrorKind::TypeMismatch
    } else if contains_any(&lower, &["syntaxerror", "syntax error", "unexpected token", "parse error"]) {
        ErrorKind::SyntaxError
    } else if contains_any(
        &lower,
        &["cannot find module", "module not found", "modulenotfounderror", "unresolved import", "no module named"],
    ) {
        ErrorKind::ModuleNotFound
    } else if contains_any(&lower, &["enoent", "no such file", "file not found"]) {
        ErrorKind::FileNotFound
    } else if contains_any(&lower, &["permission denied", "eacces", "access is denied"]) {
        ErrorKind::PermissionDenied
    } else if contains_any(
        &lower,
        &["nullpointerexception", "null pointer", "undefined is not", "nonetype", "null reference", "is null", "is undefined"],
    ) {
        ErrorKind::NullReference
    } else {
        ErrorKind::Generic
    }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}
