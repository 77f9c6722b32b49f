//! UTF-8 safe string helpers.
//!
//! Everything here counts Unicode scalar values (chars), never bytes, so a
//! cut can never land inside a multibyte character.

/// Return the first `n` characters of `s` as a `String` (no ellipsis).
pub fn prefix_chars(s: &str, n: usize) -> String {
    s.chars().take(n).collect()
}

/// Return a preview of `s` up to `n` characters. If `s` is longer than `n`
/// characters, the returned string will include a trailing ellipsis `...`.
pub fn preview(s: &str, n: usize) -> String {
    let mut prefix = prefix_chars(s, n);
    if s.chars().count() > n {
        prefix.push_str("...");
    }
    prefix
}

/// Cut `s` to `max` characters, appending `...[truncated N chars]` where `N`
/// is the number of characters removed.
pub fn truncate_with_marker(s: &str, max: usize) -> String {
    let total = s.chars().count();
    if total <= max {
        return s.to_string();
    }
    let mut out = prefix_chars(s, max);
    out.push_str(&format!("...[truncated {} chars]", total - max));
    out
}
