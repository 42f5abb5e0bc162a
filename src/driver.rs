//! Row-by-row batch driver.
//!
//! Walks the dataset in order, skips rows that already carry a valid year,
//! runs the strategy chain for the rest, writes accepted years back and
//! checkpoints the whole dataset after every resolved row so an interrupted
//! run loses at most the row in flight.

use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::Result;
use log::info;

use crate::dataset::{ColumnRoles, Dataset};
use crate::models::{NormalizedQuery, RunStats};
use crate::musicbrainz::Catalog;
use crate::normalize::{artist_variants, normalize, NormalizationMode};
use crate::progress::create_progress_bar;
use crate::strategy::QueryStrategyChain;

/// Engine configuration for one run.
#[derive(Clone, Debug)]
pub struct BatchConfig {
    /// Minimum spacing between catalog calls.
    pub sleep: Duration,
    /// Cap on rows sent to the resolution engine; `None` means all.
    pub limit: Option<usize>,
    /// Normalization strictness for query text.
    pub mode: NormalizationMode,
    /// Results requested per catalog search.
    pub search_limit: u32,
}

/// Terminal state of one row.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RowOutcome {
    /// Year already valid, or title/artist blank after normalization.
    Skipped,
    /// An accepted candidate's year was written back.
    Resolved(i32),
    /// The chain exhausted every strategy without an accepted candidate.
    Unresolved,
}

/// Process every row of `dataset`, writing checkpoints to `output`.
///
/// The output file always holds a complete dataset: one flush per resolved
/// row plus a final flush, each written atomically.
pub fn run<C: Catalog>(
    dataset: &mut Dataset,
    roles: ColumnRoles,
    catalog: &C,
    config: &BatchConfig,
    output: &Path,
) -> Result<RunStats> {
    let start = Instant::now();
    let mut stats = RunStats {
        rows_total: dataset.rows.len(),
        ..Default::default()
    };
    let mut chain = QueryStrategyChain::new(catalog, config.sleep, config.search_limit);

    let pb = create_progress_bar(dataset.rows.len() as u64, "Resolving years");
    for index in 0..dataset.rows.len() {
        if let Some(limit) = config.limit {
            if stats.rows_processed >= limit {
                break;
            }
        }
        let outcome = process_row(dataset, roles, index, &mut chain, config, &mut stats)?;
        if let RowOutcome::Resolved(_) = outcome {
            dataset.write_atomic(output)?;
        }
        pb.inc(1);
    }
    pb.finish_with_message(format!(
        "Resolved {} of {} rows searched",
        stats.years_found, stats.rows_processed
    ));

    // Final flush covers runs that resolved nothing (or were limit-capped),
    // so the output exists and is complete either way.
    dataset.write_atomic(output)?;

    stats.elapsed_seconds = start.elapsed().as_secs_f64();
    Ok(stats)
}

fn process_row<C: Catalog>(
    dataset: &mut Dataset,
    roles: ColumnRoles,
    index: usize,
    chain: &mut QueryStrategyChain<'_, C>,
    config: &BatchConfig,
    stats: &mut RunStats,
) -> Result<RowOutcome> {
    let record = dataset.record(index, roles);

    // Rows that already carry a valid year never reach the engine.
    if record.year.is_some() {
        stats.rows_skipped_valid_year += 1;
        return Ok(RowOutcome::Skipped);
    }

    let title = normalize(&record.title, config.mode);
    let variants = artist_variants(&record.artist);
    if title.is_empty() || variants.is_empty() {
        stats.rows_skipped_blank += 1;
        return Ok(RowOutcome::Skipped);
    }

    info!(
        "row {}: searching '{}' by '{}'",
        index + 1,
        record.title.trim(),
        record.artist.trim()
    );

    let resolution = chain.resolve(&NormalizedQuery {
        title,
        artist_variants: variants,
    });
    stats.rows_processed += 1;
    stats.catalog_calls += resolution.catalog_calls;
    stats.transport_errors += resolution.transport_errors;

    match resolution.best {
        Some(candidate) => {
            info!(
                "row {}: resolved {} via {} ('{}' by '{}', score {:.2})",
                index + 1,
                candidate.year,
                candidate.strategy.label(),
                candidate.matched_title,
                candidate.matched_artist,
                candidate.score
            );
            dataset.set_year(index, roles, candidate.year);
            stats.years_found += 1;
            Ok(RowOutcome::Resolved(candidate.year))
        }
        None => {
            info!("row {}: no confident match", index + 1);
            Ok(RowOutcome::Unresolved)
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
