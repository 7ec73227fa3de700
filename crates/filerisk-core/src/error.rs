//! Error types surfaced by the library.
//!
//! Per-file faults (unreadable files, classifier failures) never reach these
//! types' callers as hard errors; they degrade locally. Only a scan whose root
//! cannot be walked and a quarantine move that did not happen are reported.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("cannot walk scan root {}: {source}", .path.display())]
    WalkRootUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Error)]
pub enum QuarantineError {
    #[error("cannot quarantine {}: {source}", .path.display())]
    Source {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{} is not a file", .0.display())]
    NotAFile(PathBuf),

    #[error("cannot create quarantine directory {}: {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot move {} to {}: {source}", .from.display(), .to.display())]
    MoveFailed {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Failure of an external probability estimator. The scanner treats every
/// variant as "no probability available".
#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("classifier backend failed: {0}")]
    Backend(String),

    #[error("classifier returned {0}, expected a probability in [0, 1]")]
    OutOfRange(f64),
}
