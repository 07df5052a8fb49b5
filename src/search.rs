//! Fuzzy matching for the process search box
//!
//! Candidates are compared by normalized edit distance: a name matches when
//! `(max_len - distance) / max_len * 100` is above the similarity threshold.
//! Names are compared without their extension so "chrme" finds "chrome.exe".

use std::collections::HashMap;

use crate::constants::{MAX_QUERY_CHARS, SIMILARITY_THRESHOLD};
use crate::models::{ProcessInstance, ProcessMatch, ProcessName, ProcessSnapshot};

/// Levenshtein distance between two strings, counted in characters.
///
/// Memoized recursion over pairs of suffixes: each state is the pair of
/// offsets into `a` and `b`. Recursion depth grows with `a.len() + b.len()`,
/// so callers bound their inputs (see [`similarity`]).
pub fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut memo = HashMap::new();
    suffix_distance(&a, &b, 0, 0, &mut memo)
}

fn suffix_distance(
    a: &[char],
    b: &[char],
    i: usize,
    j: usize,
    memo: &mut HashMap<(usize, usize), usize>,
) -> usize {
    if i == a.len() {
        return b.len() - j;
    }
    if j == b.len() {
        return a.len() - i;
    }
    if let Some(&cached) = memo.get(&(i, j)) {
        return cached;
    }

    let distance = if a[i] == b[j] {
        suffix_distance(a, b, i + 1, j + 1, memo)
    } else {
        1 + suffix_distance(a, b, i + 1, j, memo)
            .min(suffix_distance(a, b, i, j + 1, memo))
            .min(suffix_distance(a, b, i + 1, j + 1, memo))
    };

    memo.insert((i, j), distance);
    distance
}

/// Similarity in percent between a query and a process name stem
pub fn similarity(query: &str, name: &ProcessName) -> f64 {
    let query: String = query.trim().to_lowercase().chars().take(MAX_QUERY_CHARS).collect();
    let stem: String = name.stem().chars().take(MAX_QUERY_CHARS).collect();

    let max_len = query.chars().count().max(stem.chars().count());
    if max_len == 0 {
        return 100.0;
    }

    let distance = edit_distance(&query, &stem) as f64;
    let max_len = max_len as f64;
    (max_len - distance) / max_len * 100.0
}

/// Whether `name` should be listed for `query`. An empty query matches everything.
pub fn matches(query: &str, name: &ProcessName) -> bool {
    query.trim().is_empty() || similarity(query, name) > SIMILARITY_THRESHOLD
}

/// Lazily filter a snapshot down to the entries matching `query`
pub fn search<'a>(
    query: &'a str,
    snapshot: &'a ProcessSnapshot,
) -> impl Iterator<Item = (&'a ProcessName, &'a [ProcessInstance])> + 'a {
    snapshot.iter().filter(move |(name, _)| matches(query, name))
}

/// Collect the matches of `query` into owned rows, best match first
pub fn search_matches(query: &str, snapshot: &ProcessSnapshot) -> Vec<ProcessMatch> {
    let mut rows: Vec<ProcessMatch> = search(query, snapshot)
        .map(|(name, instances)| ProcessMatch {
            name: name.clone(),
            pids: instances.iter().map(|instance| instance.pid).collect(),
            similarity: similarity(query, name),
        })
        .collect();

    rows.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.name.cmp(&b.name))
    });
    rows
}
