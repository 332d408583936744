//! Credential redaction and text truncation for log output.

use std::collections::BTreeMap;

/// Placeholder written in place of secrets.
pub const REDACTED: &str = "[REDACTED]";

const SENSITIVE_HEADER_FRAGMENTS: &[&str] = &[
    "authorization",
    "api-key",
    "api_key",
    "apikey",
    "token",
    "secret",
    "cookie",
    "password",
];

/// Whether a header/field name looks like it carries a credential.
pub fn is_sensitive_name(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    SENSITIVE_HEADER_FRAGMENTS
        .iter()
        .any(|fragment| lower.contains(fragment))
}

/// Copy of `headers` with credential values replaced by `[REDACTED]`.
pub fn redact_headers(headers: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    headers
        .iter()
        .map(|(k, v)| {
            let value = if is_sensitive_name(k) {
                REDACTED.to_string()
            } else {
                v.clone()
            };
            (k.clone(), value)
        })
        .collect()
}

/// Mask a secret for display, keeping a short prefix and suffix.
///
/// Secrets of 8 characters or fewer are fully masked.
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len().max(3));
    }
    let prefix: String = chars[..3].iter().collect();
    let suffix: String = chars[chars.len() - 4..].iter().collect();
    format!("{prefix}...{suffix}")
}

/// Truncate `text` to at most `max_chars` characters, noting how much was cut.
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    let total = text.chars().count();
    if total <= max_chars {
        return text.to_string();
    }
    let kept: String = text.chars().take(max_chars).collect();
    format!("{kept}... ({} more chars)", total - max_chars)
}
