//! Id-list cache keys.

use regex::{Captures, Regex};
use sqlbean_core::Value;
use std::sync::LazyLock;

/// A quoted literal or identifier (kept verbatim), or a whitespace run.
static TOKENS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"'(?:[^']|'')*'?|"(?:[^"]|"")*"?|`[^`]*`?|\[[^\]]*\]?|\s+"#)
        .expect("cache key token pattern is valid")
});

/// The id-list key for a rendered query: whitespace-normalized SQL plus the
/// canonical form of its arguments.
///
/// Whitespace inside quoted literals and identifiers is significant and kept
/// as written. Two renderings that differ only in spacing between tokens, or
/// in the integer width of an argument, share a key.
pub fn cache_key(sql: &str, args: &[Value]) -> String {
    let sql = TOKENS.replace_all(sql.trim(), |caps: &Captures<'_>| {
        let token = &caps[0];
        if token.starts_with(char::is_whitespace) {
            " ".to_string()
        } else {
            token.to_string()
        }
    });
    let args = serde_json::Value::Array(args.iter().map(Value::canonical).collect());
    format!("{sql}-{args}")
}
