//! Byte analysis: size, Shannon entropy and a 16-bin byte-value histogram.
//!
//! The whole file is read once. Unreadable files never fail the caller of
//! [`analyze_file`]; they degrade to [`ByteProfile::empty`].

use std::fs;
use std::io;
use std::path::Path;

use tracing::warn;

pub const NUM_BINS: usize = 16;

/// Width of one histogram bin in byte values (256 / 16).
const BIN_WIDTH: usize = 256 / NUM_BINS;

#[derive(Debug, Clone, PartialEq)]
pub struct ByteProfile {
    pub size: u64,
    pub entropy: f64,
    pub histogram: [f64; NUM_BINS],
}

impl ByteProfile {
    /// The result for empty input, also used for files that could not be read.
    pub fn empty() -> Self {
        Self {
            size: 0,
            entropy: 0.0,
            histogram: [0.0; NUM_BINS],
        }
    }

    pub fn from_bytes(data: &[u8]) -> Self {
        Self {
            size: data.len() as u64,
            entropy: shannon_entropy(data),
            histogram: byte_histogram(data),
        }
    }
}

/// Empirical Shannon entropy in bits per byte, in [0, 8]. Empty input is 0.0.
pub fn shannon_entropy(data: &[u8]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }

    let mut counts = [0u64; 256];
    for &b in data {
        counts[b as usize] += 1;
    }

    let len = data.len() as f64;
    let mut entropy = 0.0f64;
    for &c in &counts {
        if c > 0 {
            let p = c as f64 / len;
            entropy -= p * p.log2();
        }
    }
    // Summation error can land a hair outside the bound.
    entropy.clamp(0.0, 8.0)
}

/// Byte values grouped into 16 equal-width bins, normalized by total length.
/// Empty input yields all zeros.
pub fn byte_histogram(data: &[u8]) -> [f64; NUM_BINS] {
    let mut result = [0.0f64; NUM_BINS];
    if data.is_empty() {
        return result;
    }

    let mut counts = [0u64; NUM_BINS];
    for &b in data {
        counts[b as usize / BIN_WIDTH] += 1;
    }

    let total = data.len() as f64;
    for (slot, &c) in result.iter_mut().zip(counts.iter()) {
        *slot = c as f64 / total;
    }
    result
}

/// Read a regular file and profile its bytes.
///
/// Anything that is not a regular file (directories, FIFOs, devices) is
/// rejected without being opened, so a scan can never block on it.
pub fn try_analyze_file(path: &Path) -> io::Result<ByteProfile> {
    let meta = fs::metadata(path)?;
    if !meta.is_file() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "not a regular file",
        ));
    }
    let data = fs::read(path)?;
    Ok(ByteProfile::from_bytes(&data))
}

/// Infallible variant of [`try_analyze_file`].
pub fn analyze_file(path: &Path) -> ByteProfile {
    try_analyze_file(path).unwrap_or_else(|e| {
        warn!(path = %path.display(), error = %e, "unreadable file, using empty profile");
        ByteProfile::empty()
    })
}
