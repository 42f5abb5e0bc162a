//! Core data models for year resolution.
//!
//! Struct definitions, the year-validation window, and the serializable
//! run statistics shared by the driver and the CLI.

use serde::Serialize;

// ============================================================================
// Year Validation
// ============================================================================

/// Earliest release year treated as plausible.
pub const MIN_VALID_YEAR: i32 = 1900;

/// Latest release year treated as plausible.
pub const MAX_VALID_YEAR: i32 = 2025;

/// Parse a catalog date field (ISO-prefixed, possibly partial) into a
/// validated 4-digit year. Malformed dates are rejected, never an error.
pub fn extract_year(date: &str) -> Option<i32> {
    let year: i32 = date.get(..4)?.trim().parse().ok()?;
    (MIN_VALID_YEAR..=MAX_VALID_YEAR).contains(&year).then_some(year)
}

/// Parse a dataset year cell. Accepts plain integers and float-formatted
/// values ("1987.0"); anything blank, "nan"-like, unparseable or outside
/// the plausible window counts as missing.
pub fn parse_year_cell(value: &str) -> Option<i32> {
    let text = value.trim();
    if text.is_empty() || text.eq_ignore_ascii_case("nan") {
        return None;
    }
    let year = text
        .parse::<i32>()
        .ok()
        .or_else(|| text.parse::<f64>().ok().map(|f| f as i32))?;
    (MIN_VALID_YEAR..=MAX_VALID_YEAR).contains(&year).then_some(year)
}

/// True when a year cell needs resolution.
pub fn is_year_missing(value: &str) -> bool {
    parse_year_cell(value).is_none()
}

// ============================================================================
// Row and Query Models
// ============================================================================

/// One dataset row as seen by the resolution engine.
#[derive(Clone, Debug)]
pub struct TrackRecord {
    pub title: String,
    pub artist: String,
    pub year: Option<i32>,
}

/// Normalized per-row query inputs: the canonicalized title plus the ordered
/// artist variants. Created fresh per row, discarded after resolution.
#[derive(Clone, Debug)]
pub struct NormalizedQuery {
    pub title: String,
    pub artist_variants: Vec<String>,
}

// ============================================================================
// Strategies and Candidates
// ============================================================================

/// Catalog query strategies, in chain priority order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Strategy {
    /// Release search with title and artist field-anchored.
    ExactRelease,
    /// Recording search, resolved to the recording's releases for a year.
    ExactRecording,
    /// Free-text release search, no field anchoring.
    Loose,
}

impl Strategy {
    /// Rank for tie-breaking: lower wins.
    pub fn rank(self) -> u8 {
        match self {
            Strategy::ExactRelease => 0,
            Strategy::ExactRecording => 1,
            Strategy::Loose => 2,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Strategy::ExactRelease => "release-exact",
            Strategy::ExactRecording => "recording-release",
            Strategy::Loose => "loose",
        }
    }
}

/// Scored result of one strategy/variant attempt. Only the best accepted
/// candidate's year is ever written back into a row.
#[derive(Clone, Debug)]
pub struct Candidate {
    pub year: i32,
    pub matched_title: String,
    pub matched_artist: String,
    pub title_similarity: f64,
    pub artist_similarity: f64,
    pub score: f64,
    pub strategy: Strategy,
}

// ============================================================================
// Statistics
// ============================================================================

/// Run totals reported at the end and optionally dumped as JSON.
#[derive(Default, Debug, Clone, Serialize)]
pub struct RunStats {
    pub rows_total: usize,
    pub rows_skipped_valid_year: usize,
    pub rows_skipped_blank: usize,
    pub rows_processed: usize,
    pub years_found: usize,
    pub catalog_calls: usize,
    pub transport_errors: usize,
    pub elapsed_seconds: f64,
}

impl RunStats {
    /// Years found as a percentage of rows that reached the engine.
    pub fn success_rate(&self) -> f64 {
        if self.rows_processed == 0 {
            0.0
        } else {
            100.0 * self.years_found as f64 / self.rows_processed as f64
        }
    }

    /// Write stats to a JSON file.
    pub fn write_to_file(&self, path: &std::path::Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
