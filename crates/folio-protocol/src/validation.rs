//! Question validation and answer formatting.

const BANNED_WORDS: &[&str] = &["hack", "crack", "illegal", "spam"];

/// At least three non-blank characters and no banned word (substring match).
pub fn validate_question(question: &str) -> bool {
    let trimmed = question.trim();
    if trimmed.chars().count() < 3 {
        return false;
    }
    let lower = trimmed.to_lowercase();
    !BANNED_WORDS.iter().any(|w| lower.contains(w))
}

/// Break sentences onto separate paragraphs for display.
pub fn format_response(response: &str) -> String {
    response.replace(". ", ".\n\n").trim().to_string()
}
