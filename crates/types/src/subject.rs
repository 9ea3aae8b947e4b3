//! Subject validation and wildcard matching.
//!
//! Subjects are dot-separated token lists. Within a filter, `*` matches
//! exactly one token and `>` matches one or more trailing tokens. `>` is
//! only meaningful as the final token.

/// Token separator within a subject.
pub const SUBJECT_SEP: char = '.';

/// Single-token wildcard.
pub const TOKEN_WILDCARD: &str = "*";

/// Trailing multi-token wildcard.
pub const FULL_WILDCARD: &str = ">";

/// Returns true when `subject` is structurally valid: non-empty tokens
/// only, no embedded whitespace, and `>` nowhere but the final position.
pub fn is_valid_subject(subject: &str) -> bool {
    if subject.is_empty() {
        return false;
    }
    let tokens: Vec<&str> = subject.split(SUBJECT_SEP).collect();
    for (i, token) in tokens.iter().enumerate() {
        if token.is_empty() || token.contains(char::is_whitespace) {
            return false;
        }
        if *token == FULL_WILDCARD && i != tokens.len() - 1 {
            return false;
        }
    }
    true
}

/// Returns true when `subject` (a literal, no wildcards) matches
/// `filter` (which may contain wildcards).
pub fn subject_matches(filter: &str, subject: &str) -> bool {
    let mut filter_tokens = filter.split(SUBJECT_SEP);
    let mut subject_tokens = subject.split(SUBJECT_SEP);
    loop {
        match (filter_tokens.next(), subject_tokens.next()) {
            (None, None) => return true,
            (Some(FULL_WILDCARD), Some(_)) => return true,
            (Some(TOKEN_WILDCARD), Some(_)) => {},
            (Some(f), Some(s)) if f == s => {},
            _ => return false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_subjects() {
        assert!(is_valid_subject("foo"));
        assert!(is_valid_subject("foo.bar"));
        assert!(is_valid_subject("foo.*.bar"));
        assert!(is_valid_subject("foo.>"));
    }

    #[test]
    fn test_invalid_subjects() {
        assert!(!is_valid_subject(""));
        assert!(!is_valid_subject("foo..bar"));
        assert!(!is_valid_subject(".foo"));
        assert!(!is_valid_subject("foo."));
        assert!(!is_valid_subject("foo bar"));
        assert!(!is_valid_subject("foo.>.bar"));
    }

    #[test]
    fn test_literal_match() {
        assert!(subject_matches("foo.bar", "foo.bar"));
        assert!(!subject_matches("foo.bar", "foo.baz"));
        assert!(!subject_matches("foo.bar", "foo"));
        assert!(!subject_matches("foo", "foo.bar"));
    }

    #[test]
    fn test_token_wildcard() {
        assert!(subject_matches("foo.*", "foo.bar"));
        assert!(subject_matches("*.bar", "foo.bar"));
        assert!(!subject_matches("foo.*", "foo.bar.baz"));
        assert!(!subject_matches("foo.*", "foo"));
    }

    #[test]
    fn test_full_wildcard() {
        assert!(subject_matches("foo.>", "foo.bar"));
        assert!(subject_matches("foo.>", "foo.bar.baz.qux"));
        assert!(!subject_matches("foo.>", "foo"));
        assert!(subject_matches(">", "anything"));
    }
}
