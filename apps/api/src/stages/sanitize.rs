use std::sync::OnceLock;

use regex::Regex;

const MAX_INPUT_CHARS: usize = 100;

/// Strips `<>"'` and backticks, keeps the first 100 characters, then trims.
pub fn sanitize_input(input: &str) -> String {
    let stripped: String = input
        .chars()
        .filter(|c| !matches!(c, '<' | '>' | '"' | '\'' | '`'))
        .take(MAX_INPUT_CHARS)
        .collect();
    stripped.trim().to_string()
}

fn allowed_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // Literal pattern; compiling it cannot fail.
    PATTERN.get_or_init(|| Regex::new(r"^[a-zA-Z0-9\s\x{3131}-\x{D79D}]+$").unwrap())
}

/// Allow-list check run before any stage: ASCII letters, digits, whitespace
/// and Hangul only.
pub fn is_allowed_input(input: &str) -> bool {
    allowed_pattern().is_match(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_strips_dangerous_characters() {
        assert_eq!(sanitize_input(r#"<script>"x"</script>"#), "scriptx/script");
        assert_eq!(sanitize_input("  서울대학교 `rm` "), "서울대학교 rm");
    }

    #[test]
    fn test_sanitize_truncates_before_trimming() {
        let long = format!("{}{}", "가".repeat(99), "  끝");
        let out = sanitize_input(&long);
        assert_eq!(out.chars().count(), 99);
    }

    #[test]
    fn test_allow_list() {
        assert!(is_allowed_input("한국대학교"));
        assert!(is_allowed_input("Seoul National University 2"));
        assert!(!is_allowed_input("한국대학교; DROP TABLE"));
        assert!(!is_allowed_input("ignore <previous>"));
        assert!(!is_allowed_input(""));
    }
}
