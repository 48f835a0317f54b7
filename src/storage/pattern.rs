// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Glob matching for `KEYS`-style patterns.
//!
//! Supports the same syntax as the remote store:
//! - `*` any run of characters (including none)
//! - `?` exactly one character
//! - `[abc]`, `[a-z]`, `[^a]` character classes
//! - `\x` matches `x` literally

/// Returns true if `key` matches the glob `pattern`.
#[must_use]
pub fn glob_match(pattern: &str, key: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let key: Vec<char> = key.chars().collect();
    match_from(&pattern, &key)
}

fn match_from(pattern: &[char], key: &[char]) -> bool {
    let (mut p, mut k) = (0, 0);
    // Backtrack point for the most recent `*`: (pattern index after star, key index)
    let mut star: Option<(usize, usize)> = None;

    while k < key.len() {
        let step = match pattern.get(p) {
            Some('*') => {
                // Collapse consecutive stars
                while pattern.get(p) == Some(&'*') {
                    p += 1;
                }
                if p == pattern.len() {
                    return true;
                }
                star = Some((p, k));
                continue;
            }
            Some('?') => Some(1),
            Some('[') => match_class(&pattern[p..], key[k]),
            Some('\\') if p + 1 < pattern.len() => (pattern[p + 1] == key[k]).then_some(2),
            Some(&c) => (c == key[k]).then_some(1),
            None => None,
        };

        match step {
            Some(width) => {
                p += width;
                k += 1;
            }
            None => match star {
                Some((star_p, star_k)) => {
                    p = star_p;
                    k = star_k + 1;
                    star = Some((star_p, star_k + 1));
                }
                None => return false,
            },
        }
    }

    pattern[p..].iter().all(|&c| c == '*')
}

/// Match `c` against the class starting at `pattern[0] == '['`.
///
/// Returns the width of the class in pattern characters on a match.
fn match_class(pattern: &[char], c: char) -> Option<usize> {
    let mut i = 1;
    let negate = pattern.get(i) == Some(&'^');
    if negate {
        i += 1;
    }

    let mut matched = false;
    loop {
        match pattern.get(i) {
            // Unterminated class: treat as running to the end of the pattern
            None => break,
            Some(']') => {
                i += 1;
                break;
            }
            Some('\\') if i + 1 < pattern.len() => {
                matched |= pattern[i + 1] == c;
                i += 2;
            }
            Some(&lo) if pattern.get(i + 1) == Some(&'-') && i + 2 < pattern.len() && pattern[i + 2] != ']' => {
                let hi = pattern[i + 2];
                let (lo, hi) = if lo <= hi { (lo, hi) } else { (hi, lo) };
                matched |= lo <= c && c <= hi;
                i += 3;
            }
            Some(&other) => {
                matched |= other == c;
                i += 1;
            }
        }
    }

    (matched != negate).then_some(i)
}
