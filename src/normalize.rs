//! Text normalization and artist variant expansion for catalog matching.
//!
//! CRITICAL: query building and candidate scoring both run through these
//! functions. Run tests after changes.

use any_ascii::any_ascii;
use once_cell::sync::Lazy;
use regex::Regex;
use rustc_hash::FxHashSet;
use unicode_normalization::UnicodeNormalization;

// ============================================================================
// REGEX PATTERNS
// ============================================================================

/// Collapses any whitespace run into a single space.
static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Parenthetical annotations like "(feat. Artist)" or "(En Vivo)".
static PARENTHETICAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\([^)]*\)").unwrap());

/// Featuring marker and everything after it: "Song feat. Artist" → "Song".
static FEAT_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:feat\.?|ft\.?|featuring)\b.*$").unwrap());

/// Collaboration separator for extracting the primary artist.
/// Matches: &, /, ,, the words "and"/"y", and feat/ft markers.
static COLLAB_SEPARATOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\s*(?:[&/,]|\band\b|\by\b|\bfeat\.?\b|\bft\.?\b)\s*").unwrap()
});

// ============================================================================
// MODES
// ============================================================================

/// How aggressively query text is canonicalized before hitting the catalog.
///
/// Strict stripping reduces query noise but can remove the very token the
/// catalog indexed; permissive keeps exact-match potential. The engine runs
/// in one mode per invocation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum NormalizationMode {
    /// Trim and collapse whitespace only; diacritics and parentheses kept.
    #[default]
    Permissive,
    /// Also strip diacritics, drop parentheticals and truncate at
    /// feat/ft/featuring markers.
    Strict,
}

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Check if a character is a Unicode combining mark (diacritical mark).
pub fn is_combining_mark(c: char) -> bool {
    matches!(c as u32, 0x0300..=0x036F | 0x1AB0..=0x1AFF | 0x1DC0..=0x1DFF | 0xFE20..=0xFE2F)
}

/// Strip diacritics via NFKD decomposition, then transliterate any remaining
/// non-ASCII (Cyrillic, Hebrew, CJK, etc.). Case is preserved so variants
/// stay faithful to the source spelling.
/// e.g., "Beyoncé" → "Beyonce", "Señor" → "Senor"
pub fn strip_diacritics(s: &str) -> String {
    let stripped: String = s.nfkd().filter(|c| !is_combining_mark(*c)).collect();
    any_ascii(&stripped)
}

/// Capitalize the first letter of each word, lowercasing the rest.
pub fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn collapse_whitespace(s: &str) -> String {
    WHITESPACE_RUN.replace_all(s.trim(), " ").to_string()
}

// ============================================================================
// NORMALIZATION
// ============================================================================

/// Canonicalize a raw dataset cell for catalog queries.
///
/// Blank and "nan"-like input collapses to the empty string, the signal to
/// skip the row. Idempotent in both modes.
pub fn normalize(text: &str, mode: NormalizationMode) -> String {
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nan") {
        return String::new();
    }
    let collapsed = collapse_whitespace(trimmed);
    match mode {
        NormalizationMode::Permissive => collapsed,
        NormalizationMode::Strict => {
            let mut result = strip_diacritics(&collapsed);
            result = PARENTHETICAL.replace_all(&result, "").to_string();
            result = FEAT_MARKER.replace(&result, "").to_string();
            collapse_whitespace(&result)
        }
    }
}

// ============================================================================
// ARTIST VARIANTS
// ============================================================================

/// Upper bound on variants per artist, to limit downstream query volume.
pub const MAX_ARTIST_VARIANTS: usize = 8;

/// Expand one artist credit into an ordered set of distinct search variants,
/// most faithful first.
///
/// Always includes the original (whitespace-cleaned) string and its
/// transliteration; when a collaboration separator is present, also the
/// substring before the first separator in both forms; then title-cased and
/// lower-cased renderings of each. Empty input yields an empty sequence.
pub fn artist_variants(artist: &str) -> Vec<String> {
    let base = normalize(artist, NormalizationMode::Permissive);
    if base.is_empty() {
        return Vec::new();
    }

    let mut faithful = vec![base.clone(), strip_diacritics(&base)];
    if let Some(separator) = COLLAB_SEPARATOR.find(&base) {
        if separator.start() > 0 {
            let primary = base[..separator.start()].trim().to_string();
            if !primary.is_empty() {
                faithful.push(primary.clone());
                faithful.push(strip_diacritics(&primary));
            }
        }
    }

    let mut variants = Vec::new();
    let mut seen: FxHashSet<String> = FxHashSet::default();
    for variant in &faithful {
        push_variant(&mut variants, &mut seen, variant);
    }
    // Case renderings come after every faithful form.
    for variant in &faithful {
        push_variant(&mut variants, &mut seen, &title_case(variant));
        push_variant(&mut variants, &mut seen, &variant.to_lowercase());
    }
    variants
}

fn push_variant(variants: &mut Vec<String>, seen: &mut FxHashSet<String>, value: &str) {
    if variants.len() >= MAX_ARTIST_VARIANTS {
        return;
    }
    let value = value.trim();
    if value.is_empty() {
        return;
    }
    if seen.insert(value.to_string()) {
        variants.push(value.to_string());
    }
}

// ============================================================================
// TESTS
// ============================================================================
