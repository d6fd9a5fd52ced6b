//! Log Redaction Layer
//!
//! Scrubs API keys, bearer tokens, and key-bearing query parameters from strings prior to logging.

use regex::Regex;
use std::sync::LazyLock;

static API_KEY_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(sk-[a-zA-Z0-9_\-]{20,})|(Bearer\s+[a-zA-Z0-9\-\._~+/]+=*)").unwrap());
static QUERY_KEY_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)([?&](?:api_?key|key|token)=)[^&\s]+").unwrap());

/// Redacts sensitive patterns in a string.
pub fn redact_sensitive_data(input: &str) -> String {
    // Redact API keys and bearer tokens
    let redacted = API_KEY_RE.replace_all(input, "[REDACTED_TOKEN]");

    // Redact credentials passed as URL query parameters
    QUERY_KEY_RE.replace_all(&redacted, "${1}[REDACTED]").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redaction() {
        let raw = "POST http://host/v1?api_key=abc123 with Bearer eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9";
        let clean = redact_sensitive_data(raw);
        assert!(!clean.contains("abc123"));
        assert!(!clean.contains("eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9"));
        assert!(clean.contains("api_key=[REDACTED]"));
    }

    #[test]
    fn plain_answers_pass_through() {
        let raw = "The dog crosses the street at 00:12, frames 120-150.";
        assert_eq!(redact_sensitive_data(raw), raw);
    }

    #[test]
    fn openai_style_keys_are_removed() {
        let clean = redact_sensitive_data("key sk-proj-0123456789abcdefghijklmnop leaked");
        assert_eq!(clean, "key [REDACTED_TOKEN] leaked");
    }
}
