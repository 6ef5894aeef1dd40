//! Continuation markers and prefix merging across a context handoff.

use crate::codec::{is_tag, TokenKind, CONTINUATION};

/// An unterminated continuation marker as it appears at the end of a trace.
pub const OPEN_MARKER: &str = "$>";

pub fn has_open_continuation(trace: &str) -> bool {
    trace.ends_with(OPEN_MARKER)
}

/// The trace without its trailing open marker.
pub fn partial_of(trace: &str) -> &str {
    trace.strip_suffix(OPEN_MARKER).unwrap_or(trace)
}

/// Point an open marker at the slot that picked the journey up.
pub fn terminate_continuation(trace: &str, successor: u32) -> String {
    if has_open_continuation(trace) {
        format!("{trace}{successor}")
    } else {
        trace.to_string()
    }
}

/// Whether `c` starts a unit: any token except a Method, which belongs to the
/// Action before it.
fn starts_unit(c: char) -> bool {
    is_tag(c) && c != TokenKind::Method.tag()
}

fn is_unit_boundary(s: &str, index: usize) -> bool {
    index == s.len() || s[index..].chars().next().is_some_and(starts_unit)
}

/// Length of the longest common prefix of `a` and `b` that ends on a unit
/// boundary in both.
pub fn common_prefix_len(a: &str, b: &str) -> usize {
    let mut raw = a
        .char_indices()
        .zip(b.chars())
        .take_while(|((_, x), y)| x == y)
        .last()
        .map(|((i, c), _)| i + c.len_utf8())
        .unwrap_or(0);
    while !b.is_char_boundary(raw) {
        raw -= 1;
    }

    if is_unit_boundary(a, raw) && is_unit_boundary(b, raw) {
        return raw;
    }
    b[..raw].rfind(starts_unit).unwrap_or(0)
}

/// The part of `own` beyond its common prefix with `partial`.
pub fn suffix_beyond_common<'a>(partial: &str, own: &'a str) -> &'a str {
    &own[common_prefix_len(partial, own)..]
}
