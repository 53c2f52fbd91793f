//! Round-trip similarity scoring
//!
//! Measures textual agreement between the normalized script and the text
//! recovered by transcribing the synthesized audio. Both strings are
//! lightly canonicalized first so whitespace and terminal punctuation
//! differences that do not change meaning cannot fail a verification.
//!
//! Pure function of two strings; no network or I/O.

/// Characters stripped from string ends before comparison
const TERMINAL_PUNCTUATION: [char; 7] = ['.', ',', '!', '?', '。', '、', '…'];

/// Canonicalize a string for comparison: collapse whitespace runs, strip
/// terminal punctuation, lowercase.
pub fn canonicalize(text: &str) -> String {
    let trimmed = text.trim().trim_matches(|c| TERMINAL_PUNCTUATION.contains(&c));
    trimmed
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Similarity of two strings in [0, 1]
///
/// Character-based normalized Levenshtein over the canonicalized inputs
/// (char-based, so Hangul syllables count as single edits). Identical
/// strings score exactly 1.0; the measure is symmetric.
pub fn score(expected: &str, actual: &str) -> f64 {
    let expected = canonicalize(expected);
    let actual = canonicalize(actual);

    if expected.is_empty() && actual.is_empty() {
        return 1.0;
    }

    strsim::normalized_levenshtein(&expected, &actual)
}
