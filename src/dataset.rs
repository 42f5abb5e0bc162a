//! Dataset I/O: delimited text with a header row, column-role detection,
//! and atomic checkpoint flushes.
//!
//! Every value is text; the engine never sees the file, only `TrackRecord`
//! views handed out by the `Dataset`.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};

use crate::models::{parse_year_cell, TrackRecord};

// ============================================================================
// Column Synonyms
// ============================================================================

pub const TITLE_KEYWORDS: &[&str] = &[
    "CANCION", "CANCIÓN", "TITULO", "TÍTULO", "SONG", "TRACK", "NOMBRE",
];
pub const ARTIST_KEYWORDS: &[&str] = &["ARTISTA", "ARTIST", "INTERPRETE", "INTÉRPRETE"];
pub const YEAR_KEYWORDS: &[&str] = &["AÑO", "ANO", "YEAR", "FECHA", "LANZAMIENTO"];

/// Header used when the dataset has no year column at all.
pub const CREATED_YEAR_HEADER: &str = "AÑO DE LANZAMIENTO";

/// Suffix inserted before the extension for the default output path.
pub const OUTPUT_SUFFIX: &str = "_with_years";

// ============================================================================
// Dataset
// ============================================================================

/// An in-memory tabular dataset: trimmed headers plus all-text rows in
/// original order.
#[derive(Clone, Debug)]
pub struct Dataset {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Resolved positions of the three role columns.
#[derive(Clone, Copy, Debug)]
pub struct ColumnRoles {
    pub title: usize,
    pub artist: usize,
    pub year: usize,
}

impl Dataset {
    pub fn read(path: &Path) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(path)
            .with_context(|| format!("failed to open dataset {}", path.display()))?;

        let headers: Vec<String> = reader
            .headers()
            .with_context(|| format!("failed to read header row of {}", path.display()))?
            .iter()
            .map(|header| header.trim().to_string())
            .collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record =
                record.with_context(|| format!("failed to read row from {}", path.display()))?;
            let mut row: Vec<String> = record.iter().map(str::to_string).collect();
            // Ragged rows are padded/truncated to the header width.
            row.resize(headers.len(), String::new());
            rows.push(row);
        }
        Ok(Self { headers, rows })
    }

    /// Locate the title/artist/year columns by keyword membership
    /// (case-insensitive, first match wins). A missing year column is
    /// created with all-missing values; missing title or artist is fatal.
    pub fn resolve_columns(&mut self) -> Result<ColumnRoles> {
        let title = self.find_column(TITLE_KEYWORDS);
        let artist = self.find_column(ARTIST_KEYWORDS);
        let (Some(title), Some(artist)) = (title, artist) else {
            bail!(
                "could not locate required columns (title: {title:?}, artist: {artist:?}); \
                 available headers: {:?}",
                self.headers
            );
        };
        let year = match self.find_column(YEAR_KEYWORDS) {
            Some(index) => index,
            None => {
                self.headers.push(CREATED_YEAR_HEADER.to_string());
                for row in &mut self.rows {
                    row.push(String::new());
                }
                self.headers.len() - 1
            }
        };
        Ok(ColumnRoles {
            title,
            artist,
            year,
        })
    }

    fn find_column(&self, keywords: &[&str]) -> Option<usize> {
        self.headers.iter().position(|header| {
            let upper = header.to_uppercase();
            keywords.iter().any(|keyword| upper.contains(keyword))
        })
    }

    /// Row view for the resolution engine.
    pub fn record(&self, row: usize, roles: ColumnRoles) -> TrackRecord {
        let cells = &self.rows[row];
        TrackRecord {
            title: cells[roles.title].clone(),
            artist: cells[roles.artist].clone(),
            year: parse_year_cell(&cells[roles.year]),
        }
    }

    /// The single mutation the driver performs.
    pub fn set_year(&mut self, row: usize, roles: ColumnRoles, year: i32) {
        self.rows[row][roles.year] = year.to_string();
    }

    /// Flush the full dataset to `path`: written to a temporary file in the
    /// destination directory, fsynced, then renamed into place, so the file
    /// at `path` is always a complete dataset.
    pub fn write_atomic(&self, path: &Path) -> Result<()> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let temp = tempfile::NamedTempFile::new_in(dir)
            .with_context(|| format!("failed to create checkpoint file in {}", dir.display()))?;
        {
            let mut writer = csv::Writer::from_writer(temp.as_file());
            writer
                .write_record(&self.headers)
                .context("failed to write header row")?;
            for row in &self.rows {
                writer.write_record(row).context("failed to write row")?;
            }
            writer.flush().context("failed to flush checkpoint")?;
        }
        temp.as_file()
            .sync_all()
            .context("failed to sync checkpoint")?;
        temp.persist(path)
            .with_context(|| format!("failed to move checkpoint into {}", path.display()))?;
        Ok(())
    }
}

// ============================================================================
// Paths
// ============================================================================

/// Default output path: `songs.csv` → `songs_with_years.csv`.
pub fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("dataset");
    let name = match input.extension().and_then(|ext| ext.to_str()) {
        Some(extension) => format!("{stem}{OUTPUT_SUFFIX}.{extension}"),
        None => format!("{stem}{OUTPUT_SUFFIX}"),
    };
    input.with_file_name(name)
}

// ============================================================================
// TESTS
// ============================================================================
