//! Scan orchestrator: walk a tree, score every file, never let one file abort the walk.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::bytes::{try_analyze_file, ByteProfile};
use crate::classify::assess;
use crate::error::ScanError;
use crate::features::build_record;
use crate::inference::Classifier;
use crate::report::ScanResult;

/// Configuration for a scan run.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub root: PathBuf,
    pub threshold: f64,
    /// Descend into sub-directories; otherwise only files directly in `root`.
    pub recurse: bool,
    /// Analyze files on the rayon pool. Results keep walk order either way.
    pub parallel: bool,
}

impl ScanConfig {
    pub fn new(root: impl Into<PathBuf>, threshold: f64) -> Self {
        Self {
            root: root.into(),
            threshold,
            recurse: true,
            parallel: false,
        }
    }
}

/// Atomic progress tracking, readable from another thread while a scan runs.
#[derive(Debug, Default)]
pub struct ScanProgress {
    pub total_files: AtomicUsize,
    pub scanned_files: AtomicUsize,
    pub suspicious_count: AtomicUsize,
    pub unreadable_count: AtomicUsize,
}

impl ScanProgress {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Enumerate the files a scan of `root` covers, in walk order.
///
/// Fails only when `root` itself cannot be read. Sub-directories that cannot
/// be listed are logged and skipped.
pub fn collect_files(root: &Path, recurse: bool) -> Result<Vec<PathBuf>, ScanError> {
    let root_err = |source| ScanError::WalkRootUnreadable {
        path: root.to_path_buf(),
        source,
    };

    let meta = fs::metadata(root).map_err(root_err)?;
    if !meta.is_dir() {
        return Ok(vec![root.to_path_buf()]);
    }
    // walkdir reports an unlistable root as an ordinary entry error.
    fs::read_dir(root).map_err(root_err)?;

    let max_depth = if recurse { usize::MAX } else { 1 };
    let mut files = Vec::new();

    for entry in WalkDir::new(root)
        .min_depth(1)
        .max_depth(max_depth)
        .follow_links(false)
        .sort_by_file_name()
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "skipping unreadable directory entry");
                continue;
            }
        };

        if entry.file_type().is_dir() {
            continue;
        }
        // Links to directories are not followed; links to files (and dangling
        // links) are scanned like files.
        if entry.path_is_symlink() && entry.path().is_dir() {
            continue;
        }
        files.push(entry.into_path());
    }

    Ok(files)
}

/// Run the full per-file pipeline on one path. Never fails: unreadable files
/// are scored from an empty profile and carry the read error.
pub fn scan_file(path: &Path, classifier: Option<&dyn Classifier>, threshold: f64) -> ScanResult {
    let (profile, error) = match try_analyze_file(path) {
        Ok(profile) => (profile, None),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "unreadable file, scoring empty profile");
            (ByteProfile::empty(), Some(e.to_string()))
        }
    };

    let features = build_record(path, &profile);
    let assessment = assess(&features, classifier, threshold);
    debug!(
        path = %path.display(),
        heuristic = assessment.heuristic,
        combined = assessment.combined,
        suspicious = assessment.suspicious,
        "scored file"
    );

    ScanResult::new(path.to_path_buf(), &features, &assessment, error)
}

/// Scan `config.root`. Returns one result per enumerated file, in walk order.
pub fn run_scan(
    config: &ScanConfig,
    classifier: Option<&dyn Classifier>,
    progress: &ScanProgress,
) -> Result<Vec<ScanResult>, ScanError> {
    let files = collect_files(&config.root, config.recurse)?;
    progress.total_files.store(files.len(), Ordering::Relaxed);
    info!(root = %config.root.display(), files = files.len(), "starting scan");

    let scan_one = |path: &PathBuf| {
        let result = scan_file(path, classifier, config.threshold);
        if result.suspicious {
            progress.suspicious_count.fetch_add(1, Ordering::Relaxed);
        }
        if result.error.is_some() {
            progress.unreadable_count.fetch_add(1, Ordering::Relaxed);
        }
        progress.scanned_files.fetch_add(1, Ordering::Relaxed);
        result
    };

    // Indexed parallel iterators collect in input order.
    let results: Vec<ScanResult> = if config.parallel {
        files.par_iter().map(scan_one).collect()
    } else {
        files.iter().map(scan_one).collect()
    };

    info!(
        scanned = results.len(),
        suspicious = progress.suspicious_count.load(Ordering::Relaxed),
        "scan complete"
    );
    Ok(results)
}
