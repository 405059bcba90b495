//! Role Handle Validation

use regex::Regex;

/// Handle format: leading letter, trailing letter or digit, interior letters,
/// digits, underscores and hyphens. 2-64 characters.
fn handle_pattern() -> &'static Regex {
    static PATTERN: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_-]{0,62}[A-Za-z0-9]$").unwrap())
}

/// Whether the string is a well-formed role handle. Empty is not valid.
pub fn is_valid(handle: &str) -> bool {
    handle_pattern().is_match(handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_handles() {
        assert!(is_valid("admins"));
        assert!(is_valid("ab"));
        assert!(is_valid("team-leads"));
        assert!(is_valid("tier_2_support"));
        assert!(is_valid("A1"));
        assert!(is_valid(&format!("a{}", "b".repeat(63))));
    }

    #[test]
    fn test_invalid_handles() {
        assert!(!is_valid(""));
        assert!(!is_valid("a"));
        assert!(!is_valid("1admins"));
        assert!(!is_valid("-admins"));
        assert!(!is_valid("admins-"));
        assert!(!is_valid("has space"));
        assert!(!is_valid("has.dot"));
        assert!(!is_valid(&format!("a{}", "b".repeat(64))));
    }
}
