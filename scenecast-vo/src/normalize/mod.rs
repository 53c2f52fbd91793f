//! Spoken-form text normalization
//!
//! Rewrites numerals, dates, phone numbers, currency amounts, ages, and
//! counted quantities into their locale-correct spoken word forms before
//! synthesis, recording an auditable mapping for every replacement. The
//! transcription round-trip can only match text the synthesizer actually
//! speaks, so this rewrite runs exactly once per task, up front.
//!
//! Pure and deterministic: no I/O, no failure mode. Text with no
//! recognizable pattern passes through unchanged.

mod english;
mod korean;

use serde::{Deserialize, Serialize};

pub use english::cardinal;
pub use korean::{native_count, sino, sino_digits};

/// Pattern category a replacement was derived from
///
/// Categories double as the overlap tie-breaker: when two patterns of the
/// same length claim the same span, the earlier category in this ordering
/// wins (date > phone > currency > age > count).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizationCategory {
    Date,
    Count,
    Age,
    Phone,
    Currency,
    Other,
}

impl NormalizationCategory {
    /// Overlap resolution rank, lower wins
    fn priority(&self) -> u8 {
        match self {
            NormalizationCategory::Date => 0,
            NormalizationCategory::Phone => 1,
            NormalizationCategory::Currency => 2,
            NormalizationCategory::Age => 3,
            NormalizationCategory::Count => 4,
            NormalizationCategory::Other => 5,
        }
    }
}

/// One recorded replacement, kept for the task's audit trail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizationMapping {
    pub original: String,
    pub replacement: String,
    pub category: NormalizationCategory,
}

/// Result of normalizing one script
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NormalizedText {
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mappings: Vec<NormalizationMapping>,
}

/// A pattern match proposed by a language module, before overlap resolution
#[derive(Debug, Clone)]
pub(crate) struct Candidate {
    pub start: usize,
    pub end: usize,
    pub category: NormalizationCategory,
    pub replacement: String,
}

/// Normalize a script into its spoken form
///
/// Matches are applied left to right and never overlap. When candidate
/// spans collide, the longer match wins; exact ties fall back to category
/// priority. Every applied replacement produces one mapping, even when the
/// replacement is byte-identical to the original.
pub fn normalize(text: &str, language: &str) -> NormalizedText {
    let mut candidates = if language.starts_with("ko") {
        korean::candidates(text)
    } else {
        english::candidates(text)
    };

    // Left to right; longer span first at equal start; category priority
    // breaks exact span ties.
    candidates.sort_by(|a, b| {
        a.start
            .cmp(&b.start)
            .then(b.end.cmp(&a.end))
            .then(a.category.priority().cmp(&b.category.priority()))
    });

    let mut accepted: Vec<Candidate> = Vec::new();
    for candidate in candidates {
        let overlaps = accepted
            .iter()
            .any(|kept| candidate.start < kept.end && kept.start < candidate.end);
        if !overlaps {
            accepted.push(candidate);
        }
    }
    accepted.sort_by_key(|c| c.start);

    let mut normalized = String::with_capacity(text.len());
    let mut mappings = Vec::with_capacity(accepted.len());
    let mut cursor = 0;
    for candidate in accepted {
        normalized.push_str(&text[cursor..candidate.start]);
        normalized.push_str(&candidate.replacement);
        mappings.push(NormalizationMapping {
            original: text[candidate.start..candidate.end].to_string(),
            replacement: candidate.replacement,
            category: candidate.category,
        });
        cursor = candidate.end;
    }
    normalized.push_str(&text[cursor..]);

    NormalizedText {
        text: normalized,
        mappings,
    }
}
