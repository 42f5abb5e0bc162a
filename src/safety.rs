//! Safety utilities to prevent accidental dataset loss.
//!
//! The one real hazard this tool has is clobbering the input dataset with a
//! partially-enriched copy when the user meant to write elsewhere.

use anyhow::{bail, Result};
use std::path::Path;

/// Validates that an output path is safe to overwrite.
///
/// Writing over the input is only allowed through `--inplace`, which stages
/// into a temporary sibling and swaps at the end.
pub fn validate_output_path(output: &Path, input: &Path, inplace: bool) -> Result<()> {
    if !inplace && output == input {
        bail!(
            "Safety check failed: output '{}' is the input dataset; use --inplace to overwrite it",
            output.display()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_distinct_output_ok() {
        let input = PathBuf::from("/data/songs.csv");
        let output = PathBuf::from("/data/songs_with_years.csv");
        assert!(validate_output_path(&output, &input, false).is_ok());
    }

    #[test]
    fn test_output_equals_input_blocked() {
        let path = PathBuf::from("/data/songs.csv");
        let result = validate_output_path(&path, &path, false);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("--inplace"));
    }

    #[test]
    fn test_inplace_staging_path_ok() {
        // --inplace writes checkpoints to a temporary sibling, never to the
        // input path itself, so the staged path always differs.
        let input = PathBuf::from("/data/songs.csv");
        let staged = PathBuf::from("/data/.yearfill-x8a2.csv");
        assert!(validate_output_path(&staged, &input, true).is_ok());
    }
}
