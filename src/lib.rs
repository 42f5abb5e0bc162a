//! Release-year enrichment library - shared modules for the yearfill binary.

pub mod dataset;
pub mod driver;
pub mod models;
pub mod musicbrainz;
pub mod normalize;
pub mod progress;
pub mod safety;
pub mod scoring;
pub mod strategy;
