//! Feature extraction - fixed-order vector shared with external classifiers.
//!
//! Each file → 29 reals, in this exact order:
//! - `size` (bytes)
//! - `entropy` (bits per byte)
//! - `hist_0..hist_15`: normalized 16-bin byte histogram
//! - `extflag_0..extflag_9`: one-hot over [`KNOWN_EXTENSIONS`]
//! - `other_ext`: 1.0 when the extension is not a known one
//!
//! Models must be trained on vectors in this order.

use std::path::Path;

use crate::bytes::{analyze_file, ByteProfile, NUM_BINS};

pub const KNOWN_EXTENSIONS: [&str; 10] =
    ["exe", "dll", "py", "js", "sh", "bin", "txt", "doc", "docx", "pdf"];

pub const NUM_FEATURES: usize = 2 + NUM_BINS + KNOWN_EXTENSIONS.len() + 1; // 29

pub const FEATURE_NAMES: [&str; NUM_FEATURES] = [
    "size", "entropy", //
    "hist_0", "hist_1", "hist_2", "hist_3", "hist_4", "hist_5", "hist_6", "hist_7", //
    "hist_8", "hist_9", "hist_10", "hist_11", "hist_12", "hist_13", "hist_14", "hist_15", //
    "extflag_0", "extflag_1", "extflag_2", "extflag_3", "extflag_4", //
    "extflag_5", "extflag_6", "extflag_7", "extflag_8", "extflag_9", //
    "other_ext",
];

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRecord {
    pub size: u64,
    pub entropy: f64,
    pub extension: String,
    pub is_other_extension: bool,
    pub histogram: [f64; NUM_BINS],
    pub extension_onehot: [bool; KNOWN_EXTENSIONS.len()],
}

/// A [`FeatureRecord`] flattened in the order given by [`FEATURE_NAMES`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanonicalFeatureVector([f64; NUM_FEATURES]);

impl CanonicalFeatureVector {
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        NUM_FEATURES
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn into_array(self) -> [f64; NUM_FEATURES] {
        self.0
    }
}

impl FeatureRecord {
    pub fn to_vector(&self) -> CanonicalFeatureVector {
        let mut v = [0.0f64; NUM_FEATURES];
        v[0] = self.size as f64;
        v[1] = self.entropy;

        let hist_start = 2;
        v[hist_start..hist_start + NUM_BINS].copy_from_slice(&self.histogram);

        let ext_start = hist_start + NUM_BINS;
        for (i, &flag) in self.extension_onehot.iter().enumerate() {
            v[ext_start + i] = if flag { 1.0 } else { 0.0 };
        }

        v[NUM_FEATURES - 1] = if self.is_other_extension { 1.0 } else { 0.0 };
        CanonicalFeatureVector(v)
    }

    /// Mean of the 16 histogram bins: 1/16 for any non-empty file, 0 for an empty one.
    pub fn avg_histogram(&self) -> f64 {
        self.histogram.iter().sum::<f64>() / NUM_BINS as f64
    }
}

/// Last dot-suffix of the file name, lower-cased, without the dot.
/// Names without one (including dot-files like `.bashrc`) give "".
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

/// Combine a byte profile with path metadata. Infallible.
pub fn build_record(path: &Path, profile: &ByteProfile) -> FeatureRecord {
    let extension = extension_of(path);

    let mut extension_onehot = [false; KNOWN_EXTENSIONS.len()];
    let known = KNOWN_EXTENSIONS.iter().position(|&e| e == extension);
    if let Some(i) = known {
        extension_onehot[i] = true;
    }

    FeatureRecord {
        size: profile.size,
        entropy: profile.entropy,
        extension,
        is_other_extension: known.is_none(),
        histogram: profile.histogram,
        extension_onehot,
    }
}

/// Read a file and build its feature record; unreadable files get the empty profile.
pub fn extract_features(path: &Path) -> FeatureRecord {
    build_record(path, &analyze_file(path))
}
