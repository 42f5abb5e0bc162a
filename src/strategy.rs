//! The ordered catalog-query strategy chain.
//!
//! Three strategies run in fixed priority order and short-circuit on the
//! first query whose response yields an accepted candidate. Transport
//! failures degrade to "zero candidates from this call"; a row is never
//! aborted by the catalog.

use std::thread;
use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::models::{extract_year, Candidate, NormalizedQuery, Strategy};
use crate::musicbrainz::{Catalog, RecordingHit, ReleaseHit};
use crate::scoring::{
    better_of, is_accepted, score_candidate, similarity, RECORDING_PREFILTER_THRESHOLD,
};

/// Anchored strategies try at most this many artist variants.
pub const VARIANT_LIMIT: usize = 3;

// ============================================================================
// Call Pacing
// ============================================================================

/// Enforces the minimum spacing between consecutive catalog calls that the
/// service's usage policy demands. One pacer per run; the first call is not
/// delayed.
pub struct CallPacer {
    min_gap: Duration,
    last_call: Option<Instant>,
}

impl CallPacer {
    pub fn new(min_gap: Duration) -> Self {
        Self {
            min_gap,
            last_call: None,
        }
    }

    /// Blocks until the gap since the previous call has elapsed.
    pub fn wait(&mut self) {
        if let Some(last) = self.last_call {
            let elapsed = last.elapsed();
            if elapsed < self.min_gap {
                thread::sleep(self.min_gap - elapsed);
            }
        }
        self.last_call = Some(Instant::now());
    }
}

// ============================================================================
// Query Building
// ============================================================================

fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\\\""))
}

fn anchored_query(field: &str, title: &str, variant: &str) -> String {
    format!("{field}:{} AND artist:{}", quote(title), quote(variant))
}

fn loose_query(title: &str, variant: &str) -> String {
    format!("{title} {variant}")
}

// ============================================================================
// Chain
// ============================================================================

/// Outcome of running the chain for one row.
#[derive(Debug, Default)]
pub struct Resolution {
    pub best: Option<Candidate>,
    pub catalog_calls: usize,
    pub transport_errors: usize,
}

/// Ordered, short-circuiting strategy chain over a catalog collaborator.
pub struct QueryStrategyChain<'a, C: Catalog> {
    catalog: &'a C,
    pacer: CallPacer,
    limit: u32,
}

impl<'a, C: Catalog> QueryStrategyChain<'a, C> {
    pub fn new(catalog: &'a C, min_gap: Duration, limit: u32) -> Self {
        Self {
            catalog,
            pacer: CallPacer::new(min_gap),
            limit,
        }
    }

    /// Run the chain for one normalized query. Strategies run in priority
    /// order; the chain stops after the first query whose response produced
    /// an accepted candidate, keeping the best-scoring one seen so far.
    pub fn resolve(&mut self, query: &NormalizedQuery) -> Resolution {
        let mut resolution = Resolution::default();
        if query.title.is_empty() || query.artist_variants.is_empty() {
            return resolution;
        }

        self.run_exact_release(query, &mut resolution);
        if resolution.best.is_some() {
            return resolution;
        }
        self.run_exact_recording(query, &mut resolution);
        if resolution.best.is_some() {
            return resolution;
        }
        self.run_loose(query, &mut resolution);
        resolution
    }

    fn run_exact_release(&mut self, query: &NormalizedQuery, resolution: &mut Resolution) {
        for variant in query.artist_variants.iter().take(VARIANT_LIMIT) {
            let q = anchored_query("release", &query.title, variant);
            let Some(hits) = self.search_releases(&q, resolution) else {
                continue;
            };
            for hit in hits {
                self.consider_release(&hit, query, variant, Strategy::ExactRelease, resolution);
            }
            if resolution.best.is_some() {
                return;
            }
        }
    }

    fn run_exact_recording(&mut self, query: &NormalizedQuery, resolution: &mut Resolution) {
        for variant in query.artist_variants.iter().take(VARIANT_LIMIT) {
            let q = anchored_query("recording", &query.title, variant);
            let Some(hits) = self.search_recordings(&q, resolution) else {
                continue;
            };
            for hit in hits {
                // Not every recording is worth a second round-trip.
                if similarity(&query.title, &hit.title) < RECORDING_PREFILTER_THRESHOLD {
                    continue;
                }
                let Some(year) = self.recording_year(&hit, resolution) else {
                    continue;
                };
                let candidate = score_candidate(
                    year,
                    &hit.title,
                    &hit.artist_credit_name,
                    &query.title,
                    variant,
                    Strategy::ExactRecording,
                );
                self.consider(candidate, resolution);
            }
            if resolution.best.is_some() {
                return;
            }
        }
    }

    fn run_loose(&mut self, query: &NormalizedQuery, resolution: &mut Resolution) {
        for variant in query.artist_variants.iter().take(VARIANT_LIMIT) {
            let q = loose_query(&query.title, variant);
            let Some(hits) = self.search_releases(&q, resolution) else {
                continue;
            };
            for hit in hits {
                self.consider_release(&hit, query, variant, Strategy::Loose, resolution);
            }
            if resolution.best.is_some() {
                return;
            }
        }
    }

    fn consider_release(
        &self,
        hit: &ReleaseHit,
        query: &NormalizedQuery,
        variant: &str,
        strategy: Strategy,
        resolution: &mut Resolution,
    ) {
        let Some(year) = hit.date.as_deref().and_then(extract_year) else {
            return;
        };
        let candidate = score_candidate(
            year,
            &hit.title,
            &hit.artist_credit_name,
            &query.title,
            variant,
            strategy,
        );
        self.consider(candidate, resolution);
    }

    fn consider(&self, candidate: Candidate, resolution: &mut Resolution) {
        debug!(
            "candidate [{}] {} '{}' by '{}' (title {:.2}, artist {:.2}, score {:.2})",
            candidate.strategy.label(),
            candidate.year,
            candidate.matched_title,
            candidate.matched_artist,
            candidate.title_similarity,
            candidate.artist_similarity,
            candidate.score,
        );
        if is_accepted(&candidate) {
            resolution.best = better_of(resolution.best.take(), candidate);
        }
    }

    /// Resolve the releases attached to a recording and keep the earliest
    /// valid year; the recording's own first-release date is the fallback.
    fn recording_year(&mut self, hit: &RecordingHit, resolution: &mut Resolution) -> Option<i32> {
        let earliest = self
            .search_releases(&format!("rid:{}", hit.id), resolution)
            .and_then(|releases| {
                releases
                    .iter()
                    .filter_map(|release| release.date.as_deref().and_then(extract_year))
                    .min()
            });
        earliest.or_else(|| hit.first_release_date.as_deref().and_then(extract_year))
    }

    fn search_releases(&mut self, query: &str, resolution: &mut Resolution) -> Option<Vec<ReleaseHit>> {
        self.pacer.wait();
        resolution.catalog_calls += 1;
        debug!("release search: {query}");
        match self.catalog.search_releases(query, self.limit) {
            Ok(hits) => Some(hits),
            Err(error) => {
                resolution.transport_errors += 1;
                warn!("release search failed ({error}); treating as no candidates");
                None
            }
        }
    }

    fn search_recordings(
        &mut self,
        query: &str,
        resolution: &mut Resolution,
    ) -> Option<Vec<RecordingHit>> {
        self.pacer.wait();
        resolution.catalog_calls += 1;
        debug!("recording search: {query}");
        match self.catalog.search_recordings(query, self.limit) {
            Ok(hits) => Some(hits),
            Err(error) => {
                resolution.transport_errors += 1;
                warn!("recording search failed ({error}); treating as no candidates");
                None
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::musicbrainz::testing::{recording, release, ScriptedCatalog};
    use crate::musicbrainz::DEFAULT_SEARCH_LIMIT;

    fn chain<C: Catalog>(catalog: &C) -> QueryStrategyChain<'_, C> {
        QueryStrategyChain::new(catalog, Duration::ZERO, DEFAULT_SEARCH_LIMIT)
    }

    fn query(title: &str, variants: &[&str]) -> NormalizedQuery {
        NormalizedQuery {
            title: title.to_string(),
            artist_variants: variants.iter().map(|v| v.to_string()).collect(),
        }
    }

    #[test]
    fn test_quote_escapes_embedded_quotes() {
        assert_eq!(quote(r#"Say "Hello""#), r#""Say \"Hello\"""#);
    }

    #[test]
    fn test_anchored_query_shape() {
        assert_eq!(
            anchored_query("release", "Bohemian Rhapsody", "Queen"),
            r#"release:"Bohemian Rhapsody" AND artist:"Queen""#
        );
    }

    #[test]
    fn test_exact_release_resolves_year() {
        let catalog = ScriptedCatalog::default().with_release(
            r#"release:"Bohemian Rhapsody""#,
            vec![release(
                "rel1",
                "Bohemian Rhapsody",
                Some("1975-10-31"),
                "Queen",
            )],
        );
        let mut chain = chain(&catalog);
        let resolution = chain.resolve(&query("Bohemian Rhapsody", &["Queen"]));
        let best = resolution.best.expect("accepted candidate");
        assert_eq!(best.year, 1975);
        assert_eq!(best.strategy, Strategy::ExactRelease);
        assert!(best.title_similarity > 0.99);
        // Short-circuit: nothing past the first successful query.
        assert_eq!(catalog.calls.borrow().len(), 1);
    }

    #[test]
    fn test_collaboration_matches_primary_variant() {
        // Catalog only knows the primary artist; the full credit never hits.
        let catalog = ScriptedCatalog::default().with_release(
            r#"artist:"Artist A""#,
            vec![release("rel1", "Song X", Some("1991-04-01"), "Artist A")],
        );
        let mut chain = chain(&catalog);
        let resolution = chain.resolve(&query("Song X", &["Artist A & Artist B", "Artist A"]));
        let best = resolution.best.expect("accepted candidate");
        assert_eq!(best.year, 1991);
        assert_eq!(best.matched_artist, "Artist A");
    }

    #[test]
    fn test_recording_strategy_uses_earliest_release_year() {
        let catalog = ScriptedCatalog::default()
            .with_recording(
                r#"recording:"Song Y""#,
                vec![recording("rec9", "Song Y", Some("2001"), "Artist")],
            )
            .with_release(
                "rid:rec9",
                vec![
                    release("rel1", "Reissue", Some("2002-05-05"), "Artist"),
                    release("rel2", "First Press", Some("1998-03-03"), "Artist"),
                    release("rel3", "Dateless", None, "Artist"),
                ],
            );
        let mut chain = chain(&catalog);
        let resolution = chain.resolve(&query("Song Y", &["Artist"]));
        let best = resolution.best.expect("accepted candidate");
        assert_eq!(best.year, 1998);
        assert_eq!(best.strategy, Strategy::ExactRecording);
    }

    #[test]
    fn test_recording_falls_back_to_first_release_date() {
        let catalog = ScriptedCatalog::default().with_recording(
            r#"recording:"Song Z""#,
            vec![recording("rec1", "Song Z", Some("1984-06-06"), "Artist")],
        );
        let mut chain = chain(&catalog);
        let resolution = chain.resolve(&query("Song Z", &["Artist"]));
        assert_eq!(resolution.best.expect("candidate").year, 1984);
    }

    #[test]
    fn test_recording_prefilter_skips_secondary_query() {
        let catalog = ScriptedCatalog::default().with_recording(
            r#"recording:"Song Z""#,
            vec![recording(
                "rec1",
                "Completely Different Name",
                Some("1984"),
                "Artist",
            )],
        );
        let mut chain = chain(&catalog);
        let resolution = chain.resolve(&query("Song Z", &["Artist"]));
        assert!(resolution.best.is_none());
        // No rid: lookup was issued for the dissimilar recording.
        assert!(catalog
            .calls
            .borrow()
            .iter()
            .all(|call| !call.contains("rid:")));
    }

    #[test]
    fn test_loose_strategy_reached_after_anchored_exhaust() {
        // Hit only findable through the unanchored free-text query.
        let catalog = ScriptedCatalog::default().with_release(
            "Somebody Told The Fillers",
            vec![release(
                "rel1",
                "Somebody Told",
                Some("2004-09-01"),
                "The Fillers",
            )],
        );
        let mut chain = chain(&catalog);
        let resolution = chain.resolve(&query("Somebody Told", &["The Fillers"]));
        let best = resolution.best.expect("candidate");
        assert_eq!(best.strategy, Strategy::Loose);
        assert_eq!(best.year, 2004);
        // Both anchored strategies ran and came up dry first.
        assert_eq!(catalog.calls.borrow().len(), 3);
    }

    #[test]
    fn test_transport_error_does_not_abort_row() {
        let catalog = ScriptedCatalog::default()
            .failing_on("release:")
            .failing_on("rid:")
            .with_recording(
                r#"recording:"Song W""#,
                vec![recording("rec1", "Song W", Some("1979-01-01"), "Artist")],
            );
        let mut chain = chain(&catalog);
        let resolution = chain.resolve(&query("Song W", &["Artist"]));
        // The anchored release queries and the rid: follow-up all failed, yet
        // the recording's own date still resolves the row.
        assert_eq!(resolution.best.expect("candidate").year, 1979);
        assert!(resolution.transport_errors > 0);
    }

    #[test]
    fn test_no_match_leaves_row_unresolved() {
        let catalog = ScriptedCatalog::default();
        let mut chain = chain(&catalog);
        let resolution = chain.resolve(&query("Unknown Track", &["Obscure Artist"]));
        assert!(resolution.best.is_none());
        assert!(resolution.catalog_calls > 0);
    }

    #[test]
    fn test_empty_query_makes_no_calls() {
        let catalog = ScriptedCatalog::default();
        let mut chain = chain(&catalog);
        assert!(chain.resolve(&query("", &["Artist"])).best.is_none());
        assert!(chain.resolve(&query("Title", &[])).best.is_none());
        assert!(catalog.calls.borrow().is_empty());
    }

    #[test]
    fn test_best_of_multiple_hits_in_one_response() {
        let catalog = ScriptedCatalog::default().with_release(
            r#"release:"Song Q""#,
            vec![
                release("rel1", "Song Q Live Version Extra", Some("2010"), "Artist"),
                release("rel2", "Song Q", Some("1990-02-02"), "Artist"),
            ],
        );
        let mut chain = chain(&catalog);
        let best = chain
            .resolve(&query("Song Q", &["Artist"]))
            .best
            .expect("candidate");
        assert_eq!(best.year, 1990);
    }

    #[test]
    fn test_anchored_variant_limit() {
        let catalog = ScriptedCatalog::default();
        let mut chain = chain(&catalog);
        let variants = ["V1", "V2", "V3", "V4", "V5"];
        chain.resolve(&query("Song", &variants));
        let calls = catalog.calls.borrow();
        // Three strategies, each capped at three variants.
        assert!(!calls.iter().any(|c| c.contains("V4")));
        assert_eq!(calls.len(), 9);
    }

    #[test]
    fn test_pacer_enforces_gap() {
        let mut pacer = CallPacer::new(Duration::from_millis(30));
        let start = Instant::now();
        pacer.wait();
        pacer.wait();
        assert!(start.elapsed() >= Duration::from_millis(30));
    }
}
