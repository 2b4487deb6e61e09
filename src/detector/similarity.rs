//! A from-scratch port of Python's `difflib.SequenceMatcher.ratio()`
//! (Ratcliff/Obershelt gestalt pattern matching), since no crate in the
//! corpus provides this exact algorithm and the Detector's fuzzy
//! threshold was tuned against its specific tie-breaking behavior.

use std::collections::HashMap;

/// Similarity ratio in `[0.0, 1.0]` between two strings, matching
/// `difflib.SequenceMatcher(None, a, b).ratio()` without junk heuristics
/// (our inputs are short normalized titles, not line-oriented text, so
/// autojunk's "popular element" detection never triggers here).
pub fn ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    if a.is_empty() && b.is_empty() {
        return 1.0;
    }

    let b2j = build_b2j(&b);
    let matches = matching_block_total(&a, &b, &b2j);

    (2.0 * matches as f64) / (a.len() + b.len()) as f64
}

fn build_b2j(b: &[char]) -> HashMap<char, Vec<usize>> {
    let mut b2j: HashMap<char, Vec<usize>> = HashMap::new();
    for (index, &ch) in b.iter().enumerate() {
        b2j.entry(ch).or_default().push(index);
    }
    b2j
}

struct Match {
    a_start: usize,
    b_start: usize,
    size: usize,
}

fn find_longest_match(a: &[char], b: &[char], alo: usize, ahi: usize, blo: usize, bhi: usize, b2j: &HashMap<char, Vec<usize>>) -> Match {
    let mut best_i = alo;
    let mut best_j = blo;
    let mut best_size = 0;

    let mut j2len: HashMap<usize, usize> = HashMap::new();

    for i in alo..ahi {
        let mut new_j2len: HashMap<usize, usize> = HashMap::new();

        if let Some(indices) = b2j.get(&a[i]) {
            for &j in indices {
                if j < blo {
                    continue;
                }
                if j >= bhi {
                    break;
                }

                let k = j2len.get(&j.wrapping_sub(1)).copied().unwrap_or(0) + 1;
                new_j2len.insert(j, k);

                if k > best_size {
                    best_i = i + 1 - k;
                    best_j = j + 1 - k;
                    best_size = k;
                }
            }
        }

        j2len = new_j2len;
    }

    Match { a_start: best_i, b_start: best_j, size: best_size }
}

fn matching_block_total(a: &[char], b: &[char], b2j: &HashMap<char, Vec<usize>>) -> usize {
    let mut total = 0;
    let mut queue = vec![(0usize, a.len(), 0usize, b.len())];

    while let Some((alo, ahi, blo, bhi)) = queue.pop() {
        if alo >= ahi || blo >= bhi {
            continue;
        }

        let m = find_longest_match(a, b, alo, ahi, blo, bhi, b2j);
        if m.size == 0 {
            continue;
        }

        total += m.size;

        if alo < m.a_start && blo < m.b_start {
            queue.push((alo, m.a_start, blo, m.b_start));
        }
        if m.a_start + m.size < ahi && m.b_start + m.size < bhi {
            queue.push((m.a_start + m.size, ahi, m.b_start + m.size, bhi));
        }
    }

    total
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_strings_have_ratio_one() {
        assert_eq!(ratio("hello world", "hello world"), 1.0);
    }

    #[test]
    fn empty_strings_have_ratio_one() {
        assert_eq!(ratio("", ""), 1.0);
    }

    #[test]
    fn completely_different_strings_have_low_ratio() {
        assert!(ratio("abc", "xyz") < 0.2);
    }

    #[test]
    fn matches_known_difflib_value() {
        // difflib.SequenceMatcher(None, "rain", "train").ratio() == 0.888...
        let r = ratio("rain", "train");
        assert!((r - (8.0 / 9.0)).abs() < 1e-9);
    }

    #[test]
    fn is_symmetric() {
        let a = "one more time";
        let b = "one more tim";
        assert!((ratio(a, b) - ratio(b, a)).abs() < 1e-12);
    }
}
