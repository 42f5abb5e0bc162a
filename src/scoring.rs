//! Similarity scoring and candidate acceptance.
//!
//! This module contains the string similarity measure, the per-strategy
//! acceptance thresholds, and best-candidate selection.

use crate::models::{Candidate, Strategy};

// ============================================================================
// Score Thresholds
// ============================================================================

/// Minimum title similarity for field-anchored strategies.
pub const ANCHORED_TITLE_THRESHOLD: f64 = 0.5;

/// Minimum artist similarity, all strategies.
pub const ARTIST_THRESHOLD: f64 = 0.4;

/// A combined score at or above this accepts on its own.
pub const COMBINED_THRESHOLD: f64 = 0.6;

/// Free-text queries carry no field anchoring, so the title gate is stricter.
pub const LOOSE_TITLE_THRESHOLD: f64 = 0.7;

/// Minimum title similarity before a recording is worth a release lookup.
pub const RECORDING_PREFILTER_THRESHOLD: f64 = 0.5;

// ============================================================================
// Similarity
// ============================================================================

/// Case-insensitive closeness of two strings in [0, 1].
///
/// Symmetric, and 1.0 exactly when the lowercased forms are equal.
pub fn similarity(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(&a.to_lowercase(), &b.to_lowercase())
}

// ============================================================================
// Acceptance Policy
// ============================================================================

/// Per-strategy acceptance thresholds.
#[derive(Clone, Copy, Debug)]
pub struct Thresholds {
    pub title: f64,
    pub artist: f64,
    pub combined: f64,
}

impl Thresholds {
    pub fn for_strategy(strategy: Strategy) -> Self {
        let title = match strategy {
            Strategy::Loose => LOOSE_TITLE_THRESHOLD,
            Strategy::ExactRelease | Strategy::ExactRecording => ANCHORED_TITLE_THRESHOLD,
        };
        Self {
            title,
            artist: ARTIST_THRESHOLD,
            combined: COMBINED_THRESHOLD,
        }
    }
}

/// Score one raw catalog hit against the query title and the artist variant
/// that produced it.
pub fn score_candidate(
    year: i32,
    matched_title: &str,
    matched_artist: &str,
    query_title: &str,
    variant: &str,
    strategy: Strategy,
) -> Candidate {
    let title_similarity = similarity(query_title, matched_title);
    let artist_similarity = similarity(variant, matched_artist);
    Candidate {
        year,
        matched_title: matched_title.to_string(),
        matched_artist: matched_artist.to_string(),
        title_similarity,
        artist_similarity,
        score: (title_similarity + artist_similarity) / 2.0,
        strategy,
    }
}

/// Accept iff both per-field similarities clear their gates, or the combined
/// score clears its own.
pub fn is_accepted(candidate: &Candidate) -> bool {
    let thresholds = Thresholds::for_strategy(candidate.strategy);
    (candidate.title_similarity >= thresholds.title
        && candidate.artist_similarity >= thresholds.artist)
        || candidate.score >= thresholds.combined
}

/// Keep the better of the current best and a new accepted candidate:
/// highest score wins, ties go to the earlier strategy in chain order.
pub fn better_of(current: Option<Candidate>, challenger: Candidate) -> Option<Candidate> {
    match current {
        None => Some(challenger),
        Some(best) => {
            let wins = challenger.score > best.score
                || (challenger.score == best.score
                    && challenger.strategy.rank() < best.strategy.rank());
            Some(if wins { challenger } else { best })
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
