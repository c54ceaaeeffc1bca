//! Safety utilities to prevent accidental overwrites of input data.
//!
//! A run writes four fixed file names into the output directory. These
//! checks refuse to start when one of those files would clobber an input.

use anyhow::{bail, Result};
use std::path::{Path, PathBuf};

use crate::writer::OUTPUT_FILES;

/// Resolve a path as far as the filesystem allows, so `./a/../b.csv` and
/// `b.csv` compare equal when the file exists.
fn resolved(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

/// Validates that writing the outputs into `output_dir` is safe.
///
/// Checks:
/// - `output_dir` is not an existing regular file
/// - no output file path coincides with any of `inputs`
///
/// # Returns
/// * `Ok(())` if the output directory is safe
/// * `Err` with a descriptive message if a check fails
pub fn validate_output_dir(output_dir: &Path, inputs: &[&Path]) -> Result<()> {
    if output_dir.is_file() {
        bail!(
            "Safety check failed: output directory '{}' is an existing file",
            output_dir.display()
        );
    }

    for name in OUTPUT_FILES {
        let target = resolved(&output_dir.join(name));
        for input in inputs {
            if target == resolved(input) {
                bail!(
                    "Safety check failed: output '{}' would overwrite input '{}'",
                    target.display(),
                    input.display()
                );
            }
        }
    }

    Ok(())
}
