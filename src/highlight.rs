use regex::{Regex, RegexBuilder};
use std::collections::HashSet;

/// Builds a literal, case-sensitive alternation of `tokens`, longest first, so
/// that highlighted text agrees with identifier matching.
pub fn build_highlight_regex(tokens: &[String]) -> Option<Regex> {
    let mut unique = Vec::new();
    let mut seen = HashSet::new();
    for token in tokens {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        if seen.insert(token) {
            unique.push(token);
        }
    }
    if unique.is_empty() {
        return None;
    }
    unique.sort_by(|a, b| b.len().cmp(&a.len()));
    let pattern = unique
        .into_iter()
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join("|");
    RegexBuilder::new(&pattern)
        .case_insensitive(false)
        .build()
        .ok()
}
