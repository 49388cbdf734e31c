//! DOT format utilities for graph visualization.
//!
//! Instruction labels may contain resolved constant-pool text such as quoted strings or
//! `Vector.<int>` type names, which must be escaped before being embedded in a DOT label.

/// Escapes a string for safe use in DOT format labels and identifiers.
///
/// This function handles all characters that have special meaning in DOT format,
/// including quotes, backslashes, newlines, and angle brackets.
///
/// # Examples
///
/// ```rust
/// use abcscope::utils::escape_dot;
///
/// assert_eq!(escape_dot("Vector.<int>"), "Vector.\\<int\\>");
/// ```
#[must_use]
pub fn escape_dot(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\r', "")
        .replace('<', "\\<")
        .replace('>', "\\>")
}
