//! Token-set Jaccard and when-map overlap scoring (spec.md §4.1 steps 4-6).

use crate::behavior::WhenMap;
use std::collections::BTreeSet;

/// Tokenizes on `[A-Za-z0-9_]` runs, lowercased, and returns the Jaccard
/// index of the two token sets. Two empty strings are defined as identical
/// (score 1.0) so `token_jaccard(a, a)` always holds for identity.
pub fn token_jaccard(a: &str, b: &str) -> f64 {
    let ta = tokenize(a);
    let tb = tokenize(b);

    if ta.is_empty() && tb.is_empty() {
        return 1.0;
    }

    let intersection = ta.intersection(&tb).count();
    let union = ta.union(&tb).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

fn tokenize(s: &str) -> BTreeSet<String> {
    let mut tokens = BTreeSet::new();
    let mut current = String::new();
    for ch in s.chars() {
        if ch.is_ascii_alphanumeric() || ch == '_' {
            current.push(ch.to_ascii_lowercase());
        } else if !current.is_empty() {
            tokens.insert(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        tokens.insert(current);
    }
    tokens
}

/// Overlap score for two `when` maps (spec.md §4.1 step 5). Two empty maps
/// overlap fully (score 1.0); exactly one empty scores 0.0. Otherwise each
/// matching key (present in both maps with overlapping values) counts as 2
/// successes out of `|a|+|b|` total — a match contributes once toward each
/// side's total, so two identical single-key maps score 1.0, not 0.5.
pub fn when_overlap(a: &WhenMap, b: &WhenMap) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let matches = a
        .iter()
        .filter(|(k, va)| b.get(*k).is_some_and(|vb| va.overlaps(vb)))
        .count();

    let total = a.len() + b.len();
    (2 * matches) as f64 / total as f64
}

/// Jaccard index over two tag lists, lowercased the same way as step 4's
/// canonical-content comparison so `"Files"` and `"files"` count as the same
/// tag. Returns `None` when both lists are empty — callers should then skip
/// the tag term of the weighted score rather than treat "no tags" as perfect
/// agreement.
pub fn tag_jaccard(a: &[String], b: &[String]) -> Option<f64> {
    if a.is_empty() && b.is_empty() {
        return None;
    }

    let ta: BTreeSet<String> = a.iter().map(|t| t.to_lowercase()).collect();
    let tb: BTreeSet<String> = b.iter().map(|t| t.to_lowercase()).collect();

    let intersection = ta.intersection(&tb).count();
    let union = ta.union(&tb).count();
    Some(if union == 0 { 0.0 } else { intersection as f64 / union as f64 })
}
