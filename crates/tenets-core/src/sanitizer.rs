//! Sanitizer (spec.md §4.3).
//!
//! A pure function library applied to every merger output before it's
//! written back to the store. Deterministic and idempotent
//! (`sanitize(sanitize(x)) == sanitize(x)`, Testable Property 4).

use crate::behavior::WhenValue;
use regex::Regex;
use std::sync::LazyLock;

/// Maximum stored length for content strings (canonical/expanded/summary).
pub const MAX_CONTENT_LENGTH: usize = 2000;
/// Maximum stored length for names and tags — tighter than content.
pub const MAX_NAME_LENGTH: usize = 120;

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());
static COMMENT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").unwrap());
static PI_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<\?.*?\?>").unwrap());
static HEADING_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^#{1,6} ").unwrap());
static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t]+").unwrap());
static BLANK_LINES_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());
static NAME_DISALLOWED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_\- ]").unwrap());
static DASH_RUN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"-{2,}").unwrap());

/// Strip markup-based injection payloads (XML/HTML tags, comments,
/// processing instructions), fold markdown headings into list markers,
/// collapse whitespace, and enforce `MAX_CONTENT_LENGTH`.
pub fn sanitize_content(s: &str) -> String {
    let mut out = PI_RE.replace_all(s, "").to_string();
    out = COMMENT_RE.replace_all(&out, "").to_string();
    out = TAG_RE.replace_all(&out, "").to_string();
    out = HEADING_RE.replace_all(&out, "- ").to_string();
    out = WHITESPACE_RE.replace_all(&out, " ").to_string();
    out = BLANK_LINES_RE.replace_all(&out, "\n\n").to_string();
    out = out.trim().to_string();

    if out.chars().count() > MAX_CONTENT_LENGTH {
        let truncated: String = out.chars().take(MAX_CONTENT_LENGTH).collect();
        out = format!("{truncated}...");
    }
    out
}

/// Restrict a name/tag to a conservative character class (letters, digits,
/// `-`, `_`, spaces collapsed to `-`), disallowing angle brackets,
/// parentheses, and quotes, bounded to `MAX_NAME_LENGTH`.
pub fn sanitize_name(s: &str) -> String {
    let stripped = TAG_RE.replace_all(s, "");
    let cleaned = NAME_DISALLOWED_RE.replace_all(&stripped, "");
    let with_dashes = cleaned.trim().replace(' ', "-");
    let collapsed = DASH_RUN_RE
        .replace_all(&with_dashes, "-")
        .trim_matches('-')
        .to_string();

    if collapsed.chars().count() > MAX_NAME_LENGTH {
        collapsed.chars().take(MAX_NAME_LENGTH).collect()
    } else {
        collapsed
    }
}

/// Sanitize a when-condition key (via `sanitize_name`) and value
/// (string → `sanitize_content`; list → element-wise with empties dropped;
/// other scalars pass through untouched). Returns `None` when the
/// sanitized key is empty, signalling the pair should be dropped.
pub fn sanitize_when_entry(key: &str, value: &WhenValue) -> Option<(String, WhenValue)> {
    let key = sanitize_name(key);
    if key.is_empty() {
        return None;
    }
    let value = match value {
        WhenValue::String(s) => WhenValue::String(sanitize_content(s)),
        WhenValue::List(items) => WhenValue::List(
            items
                .iter()
                .map(|s| sanitize_content(s))
                .filter(|s| !s.is_empty())
                .collect(),
        ),
        WhenValue::Scalar(v) => WhenValue::Scalar(v.clone()),
    };
    Some((key, value))
}
