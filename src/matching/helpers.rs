//! Shared similarity scoring on a 0-100 scale. All functions work on Unicode
//! scalar values, so kana and kanji count as one unit each.

use std::collections::BTreeSet;

use strsim::{jaro_winkler, levenshtein};

/// Length of the longest common subsequence.
fn lcs_len(a: &[char], b: &[char]) -> usize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let mut prev = vec![0usize; b.len() + 1];
    let mut cur = vec![0usize; b.len() + 1];
    for &ca in a {
        for (j, &cb) in b.iter().enumerate() {
            cur[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                prev[j + 1].max(cur[j])
            };
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    prev[b.len()]
}

fn ratio_chars(a: &[char], b: &[char]) -> f64 {
    let total = a.len() + b.len();
    if total == 0 {
        return 100.0;
    }
    200.0 * lcs_len(a, b) as f64 / total as f64
}

/// Indel-normalized similarity: `(1 - indel_distance / (len_a + len_b)) * 100`.
pub(crate) fn ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    ratio_chars(&a, &b)
}

/// Best `ratio` of the shorter string against every same-length window of the
/// longer one, including windows clipped at either end.
pub(crate) fn partial_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    if short.is_empty() {
        return if long.is_empty() { 100.0 } else { 0.0 };
    }
    let n = short.len();
    let mut best = 0.0f64;
    for k in 1..n {
        best = best.max(ratio_chars(&short, &long[..k]));
        best = best.max(ratio_chars(&short, &long[long.len() - k..]));
    }
    for start in 0..=(long.len() - n) {
        best = best.max(ratio_chars(&short, &long[start..start + n]));
        if best >= 100.0 {
            break;
        }
    }
    best
}

fn tokens(s: &str) -> BTreeSet<&str> {
    s.split_whitespace().collect()
}

fn sorted_tokens(s: &str) -> String {
    let mut t: Vec<&str> = s.split_whitespace().collect();
    t.sort_unstable();
    t.join(" ")
}

fn join_nonempty(a: &str, b: &str) -> String {
    match (a.is_empty(), b.is_empty()) {
        (true, _) => b.to_string(),
        (_, true) => a.to_string(),
        _ => format!("{} {}", a, b),
    }
}

pub(crate) fn token_sort_ratio(a: &str, b: &str) -> f64 {
    ratio(&sorted_tokens(a), &sorted_tokens(b))
}

pub(crate) fn token_set_ratio(a: &str, b: &str) -> f64 {
    let ta = tokens(a);
    let tb = tokens(b);
    if ta.is_empty() || tb.is_empty() {
        return 0.0;
    }
    let sect: Vec<&str> = ta.intersection(&tb).copied().collect();
    let diff_ab: Vec<&str> = ta.difference(&tb).copied().collect();
    let diff_ba: Vec<&str> = tb.difference(&ta).copied().collect();
    if !sect.is_empty() && (diff_ab.is_empty() || diff_ba.is_empty()) {
        return 100.0;
    }
    let t0 = sect.join(" ");
    let t1 = join_nonempty(&t0, &diff_ab.join(" "));
    let t2 = join_nonempty(&t0, &diff_ba.join(" "));
    let mut best = ratio(&t1, &t2);
    if !t0.is_empty() {
        best = best.max(ratio(&t0, &t1)).max(ratio(&t0, &t2));
    }
    best
}

fn partial_token_ratio(a: &str, b: &str) -> f64 {
    let ta = tokens(a);
    let tb = tokens(b);
    if ta.is_empty() || tb.is_empty() {
        return 0.0;
    }
    if ta.intersection(&tb).next().is_some() {
        return 100.0;
    }
    partial_ratio(&sorted_tokens(a), &sorted_tokens(b))
}

/// Weighted ratio: plain ratio, blended with token and partial variants depending
/// on how different the two lengths are.
pub(crate) fn weighted_ratio(a: &str, b: &str) -> f64 {
    const TOKEN_SCALE: f64 = 0.95;
    let len_a = a.chars().count();
    let len_b = b.chars().count();
    if len_a == 0 || len_b == 0 {
        return 0.0;
    }
    let len_ratio = len_a.max(len_b) as f64 / len_a.min(len_b) as f64;
    let mut best = ratio(a, b);

    if len_ratio < 1.5 {
        let token = token_sort_ratio(a, b).max(token_set_ratio(a, b));
        return best.max(token * TOKEN_SCALE);
    }

    let partial_scale = if len_ratio < 8.0 { 0.9 } else { 0.6 };
    best = best.max(partial_ratio(a, b) * partial_scale);
    best.max(partial_token_ratio(a, b) * TOKEN_SCALE * partial_scale)
}

/// Compute Levenshtein similarity as a percentage (0.0-100.0).
pub(crate) fn sim_levenshtein_pct(a: &str, b: &str) -> f64 {
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 100.0;
    }
    let dist = levenshtein(a, b);
    (1.0 - (dist as f64 / max_len as f64)) * 100.0
}

pub(crate) fn sim_jaro_winkler_pct(a: &str, b: &str) -> f64 {
    jaro_winkler(a, b) * 100.0
}
