//! Scrubbing of secrets and size bounding for error text that leaves the
//! process (status events, caller-visible failure messages, stored
//! collaborator error bodies).

use regex::Regex;
use std::sync::OnceLock;

/// Maximum number of characters kept in an outward error message.
pub const MAX_ERROR_MESSAGE_CHARS: usize = 10_000;

const TRUNCATION_SUFFIX: &str = "... (truncated)";
const REDACTED: &str = "[REDACTED]";

#[allow(clippy::expect_used)]
fn bearer_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(bearer\s+)[A-Za-z0-9_\-\.=]+").expect("static pattern compiles")
    })
}

#[allow(clippy::expect_used)]
fn prefixed_key_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b(?:sk-|sk_|pk_|ghp_|gho_|ghs_|ghu_|github_pat_)[A-Za-z0-9_\-]{8,}")
            .expect("static pattern compiles")
    })
}

#[allow(clippy::expect_used)]
fn long_token_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b[A-Za-z0-9_\-]{32,}\b").expect("static pattern compiles"))
}

/// Replaces anything that looks like a credential with `[REDACTED]`.
///
/// Covers bearer tokens, well-known key prefixes (`sk-`, `ghp_`, ...), and
/// any standalone run of 32 or more token characters.
#[must_use]
pub fn redact_secrets(text: &str) -> String {
    let redacted = bearer_regex().replace_all(text, format!("${{1}}{REDACTED}"));
    let redacted = prefixed_key_regex().replace_all(&redacted, REDACTED);
    long_token_regex().replace_all(&redacted, REDACTED).into_owned()
}

/// Truncates `text` to at most `max_chars` characters (not bytes).
#[must_use]
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Scrubs `text`, then keeps at most `max_chars` characters of the result.
#[must_use]
pub fn redacted_excerpt(text: &str, max_chars: usize) -> String {
    truncate_chars(&redact_secrets(text), max_chars).to_string()
}

/// Produces the outward form of an error message.
///
/// Returns `None` for empty or whitespace-only input. Secrets are scrubbed
/// from the whole message first; the scrubbed text is then cut so that,
/// including the truncation suffix, it never exceeds `max_chars`.
#[must_use]
pub fn sanitize_error_message(message: &str, max_chars: usize) -> Option<String> {
    if message.trim().is_empty() {
        return None;
    }

    let scrubbed = redact_secrets(message);
    if scrubbed.chars().count() <= max_chars {
        return Some(scrubbed);
    }

    let suffix_chars = TRUNCATION_SUFFIX.chars().count();
    if max_chars <= suffix_chars {
        return Some(truncate_chars(&scrubbed, max_chars).to_string());
    }
    let keep = max_chars - suffix_chars;
    Some(format!("{}{TRUNCATION_SUFFIX}", truncate_chars(&scrubbed, keep)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_token_redacted() {
        let out = redact_secrets("upstream said: Authorization: Bearer abc.def-123");
        assert_eq!(out, "upstream said: Authorization: Bearer [REDACTED]");
    }

    #[test]
    fn test_prefixed_keys_redacted() {
        let out = redact_secrets("key sk-proj12345678 and ghp_abcdefgh1234 leaked");
        assert!(!out.contains("sk-proj"));
        assert!(!out.contains("ghp_"));
        assert_eq!(out.matches(REDACTED).count(), 2);
    }

    #[test]
    fn test_long_token_redacted() {
        let token = "a".repeat(40);
        let out = redact_secrets(&format!("token={token}"));
        assert!(!out.contains(&token));
    }

    #[test]
    fn test_short_words_untouched() {
        let msg = "Minting service returned status 503";
        assert_eq!(redact_secrets(msg), msg);
    }

    #[test]
    fn test_sanitize_whitespace_is_none() {
        assert_eq!(sanitize_error_message("   \n", 100), None);
    }

    #[test]
    fn test_sanitize_truncates_by_chars() {
        let msg = "é ".repeat(50);
        let out = sanitize_error_message(&msg, 40).unwrap();
        assert!(out.ends_with(TRUNCATION_SUFFIX));
        assert_eq!(out.chars().count(), 40);
    }

    #[test]
    fn test_sanitize_default_bound() {
        let msg = "x ".repeat(MAX_ERROR_MESSAGE_CHARS);
        let out = sanitize_error_message(&msg, MAX_ERROR_MESSAGE_CHARS).unwrap();
        assert!(out.chars().count() <= MAX_ERROR_MESSAGE_CHARS);
    }

    #[test]
    fn test_sanitize_bound_holds_when_redaction_grows_text() {
        let msg = "Bearer a ".repeat(2000);
        let out = sanitize_error_message(&msg, MAX_ERROR_MESSAGE_CHARS).unwrap();
        assert!(out.chars().count() <= MAX_ERROR_MESSAGE_CHARS);
        assert!(out.ends_with(TRUNCATION_SUFFIX));
        assert!(!out.contains("Bearer a"));
    }

    #[test]
    fn test_sanitize_secret_at_cut_point_is_not_leaked() {
        let secret = "Q7xv9Lk2Pm4Rt8Ws3Yz6Hb1Nc5Df0Gj2Kl4Mn6";
        let msg = format!("{}{secret} {}", "ab ".repeat(22), "cd ".repeat(20));
        let out = sanitize_error_message(&msg, 100).unwrap();
        assert_eq!(out.chars().count(), 100);
        assert!(out.ends_with(TRUNCATION_SUFFIX));
        assert!(!out.contains(&secret[..8]));
        assert!(out.contains(REDACTED));
    }

    #[test]
    fn test_excerpt_redacts_before_cutting() {
        let secret = "Zk4Qm8Lp2Xv6Tn0Rb3Wc7Yd1Hf5Js9Ga";
        let out = redacted_excerpt(&format!("body {secret}"), 20);
        assert_eq!(out, "body [REDACTED]");
    }

    #[test]
    fn test_sanitize_tiny_bound() {
        let out = sanitize_error_message("a fairly long message", 5).unwrap();
        assert_eq!(out, "a fai");
    }

    #[test]
    fn test_truncate_chars_short_input() {
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("abcdef", 3), "abc");
    }
}
