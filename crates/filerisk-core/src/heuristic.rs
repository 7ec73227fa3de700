//! Deterministic heuristic suspicion score in [0, 1].
//!
//! ```text
//! score = 0.5  * max(0, (entropy - 6) / 2)
//!       + 0.15 if 0 < size < 1024
//!       + 0.1  if the extension is not a known one
//!       + 0.05 * (1 - max(0, avg_histogram - 1/16))
//! ```
//!
//! The weights sum to 1.0 and each term is bounded, so the final clamp only
//! absorbs rounding.

use crate::bytes::NUM_BINS;
use crate::features::FeatureRecord;

/// Entropy above this starts to count (packed or encrypted payloads).
pub const ENTROPY_BASELINE: f64 = 6.0;
pub const ENTROPY_SPAN: f64 = 2.0;
pub const ENTROPY_WEIGHT: f64 = 0.5;

pub const SMALL_FILE_LIMIT: u64 = 1024;
pub const SMALL_FILE_WEIGHT: f64 = 0.15;

pub const OTHER_EXTENSION_WEIGHT: f64 = 0.1;

pub const UNIFORMITY_WEIGHT: f64 = 0.05;

pub fn heuristic_score(features: &FeatureRecord) -> f64 {
    let mut score = 0.0;

    score += ((features.entropy - ENTROPY_BASELINE) / ENTROPY_SPAN).max(0.0) * ENTROPY_WEIGHT;

    if features.size > 0 && features.size < SMALL_FILE_LIMIT {
        score += SMALL_FILE_WEIGHT;
    }

    if features.is_other_extension {
        score += OTHER_EXTENSION_WEIGHT;
    }

    // Bins sum to 1 (or 0 when empty), so the mean never exceeds 1/16 by more
    // than rounding and this term is ~0.05 for every file.
    let uniformity = 1.0 - (features.avg_histogram() - 1.0 / NUM_BINS as f64).max(0.0);
    score += UNIFORMITY_WEIGHT * uniformity;

    score.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytes::ByteProfile;
    use crate::features::build_record;
    use std::path::Path;

    fn record(name: &str, size: u64, entropy: f64) -> FeatureRecord {
        let mut histogram = [0.0; NUM_BINS];
        if size > 0 {
            histogram[0] = 1.0;
        }
        let profile = ByteProfile {
            size,
            entropy,
            histogram,
        };
        build_record(Path::new(name), &profile)
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn entropy_below_baseline_adds_nothing() {
        let low = heuristic_score(&record("a.txt", 4096, 3.0));
        let at = heuristic_score(&record("a.txt", 4096, 6.0));
        assert!(approx(low, UNIFORMITY_WEIGHT));
        assert!(approx(at, UNIFORMITY_WEIGHT));
    }

    #[test]
    fn maximal_entropy_adds_full_weight() {
        let score = heuristic_score(&record("a.txt", 4096, 8.0));
        assert!(approx(score, ENTROPY_WEIGHT + UNIFORMITY_WEIGHT));
    }

    #[test]
    fn small_file_term_excludes_empty_and_boundary() {
        let empty = heuristic_score(&record("a.txt", 0, 0.0));
        let tiny = heuristic_score(&record("a.txt", 1, 0.0));
        let under = heuristic_score(&record("a.txt", 1023, 0.0));
        let at = heuristic_score(&record("a.txt", 1024, 0.0));
        assert!(approx(empty, UNIFORMITY_WEIGHT));
        assert!(approx(tiny, SMALL_FILE_WEIGHT + UNIFORMITY_WEIGHT));
        assert!(approx(under, SMALL_FILE_WEIGHT + UNIFORMITY_WEIGHT));
        assert!(approx(at, UNIFORMITY_WEIGHT));
    }

    #[test]
    fn unknown_extension_adds_weight() {
        let known = heuristic_score(&record("a.exe", 4096, 0.0));
        let unknown = heuristic_score(&record("a.weird", 4096, 0.0));
        assert!(approx(unknown - known, OTHER_EXTENSION_WEIGHT));
    }

    // The uniformity term cannot discriminate: an empty file (mean 0) and a
    // non-empty one (mean 1/16) both receive the whole 0.05. Kept as is so
    // scores stay comparable with existing deployments.
    #[test]
    fn uniformity_term_is_constant_quirk() {
        let empty = record("a.txt", 0, 0.0);
        let skewed = record("a.txt", 4096, 0.0);
        let mut flat = skewed.clone();
        flat.histogram = [1.0 / 16.0; NUM_BINS];

        assert!(approx(heuristic_score(&empty), 0.05));
        assert!(approx(heuristic_score(&skewed), 0.05));
        assert!(approx(heuristic_score(&flat), 0.05));
    }

    #[test]
    fn score_is_deterministic_and_bounded() {
        let worst = record("x.unknown", 512, 8.0);
        let first = heuristic_score(&worst);
        assert_eq!(first, heuristic_score(&worst));
        assert!((0.0..=1.0).contains(&first));
        assert!(approx(first, 0.5 + 0.15 + 0.1 + 0.05));

        for entropy in [0.0, 2.5, 5.99, 6.01, 7.5, 8.0] {
            for size in [0, 1, 1023, 1024, 1 << 20] {
                let s = heuristic_score(&record("f.bin", size, entropy));
                assert!((0.0..=1.0).contains(&s), "size={size} entropy={entropy}");
            }
        }
    }
}
