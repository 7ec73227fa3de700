//! filerisk-core - file-risk scoring engine.
//!
//! Provides byte-level feature extraction, heuristic and model-assisted
//! scoring, scan orchestration, result reporting and quarantine, used by the
//! `filerisk` CLI.

pub mod bytes;
pub mod classify;
pub mod error;
pub mod features;
pub mod heuristic;
pub mod inference;
pub mod quarantine;
pub mod report;
pub mod scan;

pub use classify::{assess, RiskAssessment};
pub use error::{ClassifierError, QuarantineError, ScanError};
pub use features::{CanonicalFeatureVector, FeatureRecord};
pub use inference::{load_classifier, Classifier, LinearModel};
pub use quarantine::{quarantine_file, Quarantine};
pub use report::ScanResult;
pub use scan::{run_scan, scan_file, ScanConfig, ScanProgress};
