//! Field checks shared by settings and domain records.

use std::sync::LazyLock;

use regex::Regex;

static EMAIL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap());

static PHONE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[0-9 ()\-.]{6,20}$").unwrap());

pub fn is_valid_email(value: &str) -> bool {
    EMAIL_PATTERN.is_match(value)
}

pub fn is_valid_phone(value: &str) -> bool {
    PHONE_PATTERN.is_match(value)
}

/// Trim a value, mapping blank to `None`.
pub fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shapes() {
        assert!(is_valid_email("admin@medlinkx.com"));
        assert!(is_valid_email("a.b+c@clinic.co.uk"));
        assert!(!is_valid_email("admin@"));
        assert!(!is_valid_email("admin medlinkx.com"));
        assert!(!is_valid_email("a@b"));
    }

    #[test]
    fn phone_shapes() {
        assert!(is_valid_phone("+1 (555) 010-2030"));
        assert!(is_valid_phone("0123456789"));
        assert!(!is_valid_phone("call me"));
        assert!(!is_valid_phone("12"));
    }

    #[test]
    fn non_blank_trims_and_drops_empty() {
        assert_eq!(non_blank(Some("  x ".into())), Some("x".into()));
        assert_eq!(non_blank(Some("   ".into())), None);
        assert_eq!(non_blank(None), None);
    }
}
