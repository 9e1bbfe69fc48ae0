//! Plain-text utilities for fetched sources and quote matching.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref SCRIPT_OR_STYLE: Regex =
        Regex::new(r"(?is)<(script|style|noscript)\b[^>]*>.*?</(script|style|noscript)\s*>")
            .expect("valid regex");
    static ref COMMENT: Regex = Regex::new(r"(?s)<!--.*?-->").expect("valid regex");
    static ref BLOCK_TAG: Regex =
        Regex::new(r"(?i)</?(p|div|br|li|tr|h[1-6]|section|article|table)\b[^>]*>")
            .expect("valid regex");
    static ref TAG: Regex = Regex::new(r"(?s)<[^>]+>").expect("valid regex");
    static ref NUMERIC_ENTITY: Regex = Regex::new(r"&#(x[0-9a-fA-F]+|[0-9]+);").expect("valid regex");
}

/// Convert an HTML document into whitespace-collapsed text. Script and style
/// content is dropped and common entities are decoded.
pub fn html_to_text(html: &str) -> String {
    let text = SCRIPT_OR_STYLE.replace_all(html, " ");
    let text = COMMENT.replace_all(&text, " ");
    let text = BLOCK_TAG.replace_all(&text, "\n");
    let text = TAG.replace_all(&text, " ");
    let text = decode_entities(&text);

    text.lines()
        .map(normalize_whitespace)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn decode_entities(text: &str) -> String {
    let text = NUMERIC_ENTITY.replace_all(text, |caps: &regex::Captures<'_>| {
        let raw = &caps[1];
        let code = match raw.strip_prefix('x') {
            Some(hex) => u32::from_str_radix(hex, 16).ok(),
            None => raw.parse::<u32>().ok(),
        };
        code.and_then(char::from_u32)
            .map(String::from)
            .unwrap_or_default()
    });

    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Collapse runs of whitespace into single spaces and trim.
pub fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Case- and whitespace-insensitive containment.
pub fn contains_normalized(haystack: &str, needle: &str) -> bool {
    let needle = normalize_whitespace(needle).to_lowercase();
    if needle.is_empty() {
        return false;
    }
    normalize_whitespace(haystack).to_lowercase().contains(&needle)
}

/// Truncate to at most `max_chars` characters on a char boundary.
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
