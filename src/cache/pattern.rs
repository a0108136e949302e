//! Glob Pattern Module
//!
//! Redis-style key patterns used by bulk invalidation:
//! `*` any run of characters, `?` exactly one, `[abc]` / `[a-z]` / `[^a]`
//! character classes, and `\` to escape the next character.

use crate::error::{CacheError, Result};

// == Validate ==
/// Rejects empty patterns, a trailing `\` and unterminated `[` classes.
pub fn validate(pattern: &str) -> Result<()> {
    if pattern.is_empty() {
        return Err(CacheError::InvalidPattern("pattern is empty".to_string()));
    }

    let chars: Vec<char> = pattern.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '\\' => {
                if i + 1 == chars.len() {
                    return Err(CacheError::InvalidPattern(format!(
                        "'{}' ends with a dangling escape",
                        pattern
                    )));
                }
                i += 2;
            }
            '[' => {
                i = class_end(&chars, i).ok_or_else(|| {
                    CacheError::InvalidPattern(format!(
                        "'{}' has an unterminated character class",
                        pattern
                    ))
                })?;
            }
            _ => i += 1,
        }
    }
    Ok(())
}

// == Matches ==
/// Returns true if `key` matches `pattern` as a whole.
pub fn matches(pattern: &str, key: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let s: Vec<char> = key.chars().collect();

    let (mut pi, mut si) = (0, 0);
    // Last `*` seen and the key position it is currently absorbing up to
    let mut backtrack: Option<(usize, usize)> = None;

    while si < s.len() {
        if pi < p.len() && p[pi] == '*' {
            backtrack = Some((pi, si));
            pi += 1;
            continue;
        }
        if pi < p.len() {
            if let Some(next) = match_token(&p, pi, s[si]) {
                pi = next;
                si += 1;
                continue;
            }
        }
        match backtrack {
            Some((star, absorbed)) => {
                pi = star + 1;
                si = absorbed + 1;
                backtrack = Some((star, absorbed + 1));
            }
            None => return false,
        }
    }

    while pi < p.len() && p[pi] == '*' {
        pi += 1;
    }
    pi == p.len()
}

/// Matches the single non-star token at `pi` against `c`, returning the
/// index of the following token.
fn match_token(p: &[char], pi: usize, c: char) -> Option<usize> {
    match p[pi] {
        '?' => Some(pi + 1),
        '\\' if pi + 1 < p.len() => (p[pi + 1] == c).then_some(pi + 2),
        '[' => {
            let end = class_end(p, pi)?;
            class_contains(&p[pi + 1..end - 1], c).then_some(end)
        }
        literal => (literal == c).then_some(pi + 1),
    }
}

/// Index just past the `]` closing the class opened at `open`.
fn class_end(p: &[char], open: usize) -> Option<usize> {
    let mut i = open + 1;
    while i < p.len() {
        match p[i] {
            '\\' => i += 2,
            ']' => return Some(i + 1),
            _ => i += 1,
        }
    }
    None
}

/// `body` is the class without its brackets.
fn class_contains(body: &[char], c: char) -> bool {
    let (negated, body) = match body.first() {
        Some('^') => (true, &body[1..]),
        _ => (false, body),
    };

    let mut found = false;
    let mut i = 0;
    while i < body.len() {
        if body[i] == '\\' && i + 1 < body.len() {
            found |= body[i + 1] == c;
            i += 2;
        } else if i + 2 < body.len() && body[i + 1] == '-' {
            let (lo, hi) = if body[i] <= body[i + 2] {
                (body[i], body[i + 2])
            } else {
                (body[i + 2], body[i])
            };
            found |= lo <= c && c <= hi;
            i += 3;
        } else {
            found |= body[i] == c;
            i += 1;
        }
    }
    found != negated
}
