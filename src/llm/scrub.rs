use std::borrow::Cow;

const MAX_API_ERROR_CHARS: usize = 200;
const REDACTED: &str = "[REDACTED]";

/// Key prefixes issued by the supported backends.
const KEY_PREFIXES: [&str; 3] = ["sk-", "AIza", "ya29."];

/// Markers after which a secret value follows.
const VALUE_MARKERS: [&str; 6] = [
    "Authorization: Bearer ",
    "authorization: bearer ",
    "x-api-key: ",
    "api_key=",
    "key=",
    "\"api_key\":\"",
];

fn is_secret_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '+' | '/' | '=')
}

/// Replace every `marker<token>` with the redaction marker. Bare markers
/// without a token are left alone.
fn redact_after(text: &mut String, marker: &str) {
    let mut from = 0;
    while let Some(rel) = text[from..].find(marker) {
        let start = from + rel;
        let value_start = start + marker.len();
        let value_len: usize = text[value_start..]
            .chars()
            .take_while(|c| is_secret_char(*c))
            .map(char::len_utf8)
            .sum();
        if value_len == 0 {
            from = value_start;
            continue;
        }
        text.replace_range(start..value_start + value_len, REDACTED);
        from = start + REDACTED.len();
    }
}

/// Scrub API keys and bearer tokens out of backend error text.
pub fn scrub_secret_patterns(input: &str) -> Cow<'_, str> {
    let hit = KEY_PREFIXES
        .iter()
        .chain(VALUE_MARKERS.iter())
        .any(|p| input.contains(p));
    if !hit {
        return Cow::Borrowed(input);
    }
    let mut scrubbed = input.to_string();
    for pattern in KEY_PREFIXES.iter().chain(VALUE_MARKERS.iter()) {
        redact_after(&mut scrubbed, pattern);
    }
    Cow::Owned(scrubbed)
}

/// Scrub secrets and cap the length of an error body.
pub fn sanitize_api_error(input: &str) -> String {
    let scrubbed = scrub_secret_patterns(input);
    if scrubbed.chars().count() <= MAX_API_ERROR_CHARS {
        return scrubbed.into_owned();
    }
    let end = scrubbed
        .char_indices()
        .nth(MAX_API_ERROR_CHARS)
        .map_or(scrubbed.len(), |(i, _)| i);
    format!("{}...", &scrubbed[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_text_is_borrowed() {
        assert!(matches!(scrub_secret_patterns("plain error"), Cow::Borrowed(_)));
    }

    #[test]
    fn redacts_prefixed_keys() {
        let out = scrub_secret_patterns("invalid key sk-ant-api03-abcDEF used");
        assert_eq!(out, "invalid key [REDACTED] used");
    }

    #[test]
    fn redacts_query_and_header_values() {
        let out = scrub_secret_patterns(
            "GET /v1/models?key=AIzaSyXYZ failed; Authorization: Bearer tok.en-1",
        );
        assert!(!out.contains("AIzaSyXYZ"));
        assert!(!out.contains("tok.en-1"));
    }

    #[test]
    fn bare_marker_is_kept() {
        assert_eq!(scrub_secret_patterns("missing api_key= value"), "missing api_key= value");
    }

    #[test]
    fn long_errors_are_truncated_on_char_boundary() {
        let long = "é".repeat(300);
        let out = sanitize_api_error(&long);
        assert!(out.ends_with("..."));
        assert_eq!(out.chars().count(), MAX_API_ERROR_CHARS + 3);
    }
}
