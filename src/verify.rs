//! Completeness check of a fetched batch (existence and minimum size).

use crate::types::{ExpectedFile, InvalidReason, ValidationResult};
use std::path::Path;
use tracing::{debug, info};

/// Checks that every expected file exists under `destination` and is strictly
/// larger than `min_size` bytes.
///
/// Stops at the first offending file. Read-only and deterministic for a given
/// filesystem state.
///
/// # Arguments
///
/// * `destination` - Directory the attempt fetched into
/// * `expected` - One entry per non-marker object of the listing
/// * `min_size` - Threshold a file's size must exceed
///
/// # Returns
///
/// [`ValidationResult::Complete`], or the first missing or undersized file.
pub fn validate(destination: &Path, expected: &[ExpectedFile], min_size: u64) -> ValidationResult {
    for file in expected {
        let path = file.local_path(destination);
        let size = match std::fs::metadata(&path) {
            Ok(m) if m.is_file() => m.len(),
            _ => {
                info!("❌ {} is missing from {}", file.name(), destination.display());
                return ValidationResult::Incomplete {
                    file: file.clone(),
                    reason: InvalidReason::Missing,
                };
            }
        };

        if size <= min_size {
            info!(
                "❌ {} is {} bytes, must exceed {} bytes",
                file.name(),
                size,
                min_size
            );
            return ValidationResult::Incomplete {
                file: file.clone(),
                reason: InvalidReason::Undersized {
                    size,
                    threshold: min_size,
                },
            };
        }
        debug!("✅ {} verified ({} bytes)", file.name(), size);
    }

    ValidationResult::Complete
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expected(names: &[&str]) -> Vec<ExpectedFile> {
        names.iter().map(|n| ExpectedFile::new(*n)).collect()
    }

    #[test]
    fn complete_when_all_present_and_large_enough() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("part-0001"), b"abc").unwrap();
        std::fs::write(dir.path().join("part-0002"), b"de").unwrap();

        let result = validate(dir.path(), &expected(&["part-0001", "part-0002"]), 1);
        assert_eq!(result, ValidationResult::Complete);
    }

    #[test]
    fn missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("part-0001"), b"abc").unwrap();

        let result = validate(dir.path(), &expected(&["part-0001", "part-0002"]), 1);
        assert_eq!(
            result,
            ValidationResult::Incomplete {
                file: ExpectedFile::new("part-0002"),
                reason: InvalidReason::Missing,
            }
        );
    }

    #[test]
    fn file_at_threshold_fails() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("part-0001"), b"abc").unwrap();
        std::fs::write(dir.path().join("part-0002"), b"x").unwrap();

        let result = validate(dir.path(), &expected(&["part-0001", "part-0002"]), 1);
        assert_eq!(
            result,
            ValidationResult::Incomplete {
                file: ExpectedFile::new("part-0002"),
                reason: InvalidReason::Undersized {
                    size: 1,
                    threshold: 1
                },
            }
        );
    }

    #[test]
    fn empty_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("part-0001"), b"").unwrap();

        assert!(!validate(dir.path(), &expected(&["part-0001"]), 1).is_complete());
    }

    #[test]
    fn directory_in_place_of_file_counts_as_missing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("part-0001")).unwrap();

        let result = validate(dir.path(), &expected(&["part-0001"]), 1);
        assert!(matches!(
            result,
            ValidationResult::Incomplete {
                reason: InvalidReason::Missing,
                ..
            }
        ));
    }

    #[test]
    fn threshold_is_configurable() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("part-0001"), b"0123456789").unwrap();

        assert!(validate(dir.path(), &expected(&["part-0001"]), 9).is_complete());
        assert!(!validate(dir.path(), &expected(&["part-0001"]), 10).is_complete());
    }

    #[test]
    fn empty_expectation_is_complete() {
        let dir = tempfile::tempdir().unwrap();
        assert!(validate(dir.path(), &[], 1).is_complete());
    }
}
