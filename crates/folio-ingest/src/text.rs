//! Text normalization applied before embedding.

use once_cell::sync::Lazy;
use regex::Regex;

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static DISALLOWED_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s.,!?\-:]").unwrap());

/// Collapse whitespace and strip everything but word characters and basic
/// punctuation. Stored chunk text is never normalized, only embedder input.
pub fn clean_text(text: &str) -> String {
    let collapsed = WHITESPACE_RE.replace_all(text, " ");
    DISALLOWED_RE.replace_all(&collapsed, "").trim().to_string()
}
