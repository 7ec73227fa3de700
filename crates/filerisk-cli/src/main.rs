//! filerisk CLI - scores files by entropy, byte histogram and extension, and
//! optionally moves suspicious ones into a quarantine directory.
//!
//! Usage:
//!   filerisk /path/to/scan
//!   filerisk /path/to/scan --model model.json --threshold 0.7 --format json
//!   filerisk /path/to/scan --quarantine ./quarantine --no-recurse

use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;

use anyhow::Result;
use clap::{ArgAction, Parser};
use tracing_subscriber::EnvFilter;

use filerisk_core::inference::{load_classifier, Classifier};
use filerisk_core::quarantine::Quarantine;
use filerisk_core::report::{print_results, OutputFormat};
use filerisk_core::scan::{run_scan, ScanConfig, ScanProgress};

#[derive(Parser)]
#[command(name = "filerisk")]
#[command(about = "Entropy and heuristic file-risk scanner with optional model scoring")]
#[command(version)]
struct Cli {
    /// File or directory to scan
    path: PathBuf,

    /// Optional classifier: JSON logistic model, or .onnx with the `onnx` feature
    #[arg(short, long)]
    model: Option<PathBuf>,

    /// Suspicion threshold for the combined score (0.0-1.0)
    #[arg(short, long, default_value = "0.6", value_parser = parse_threshold)]
    threshold: f64,

    /// Move suspicious files into this directory
    #[arg(short, long)]
    quarantine: Option<PathBuf>,

    /// Only scan files directly inside PATH
    #[arg(long)]
    no_recurse: bool,

    /// Analyze files in parallel
    #[arg(long)]
    parallel: bool,

    /// Output format
    #[arg(short, long, default_value = "text")]
    format: OutputFormat,

    /// Increase log verbosity (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn parse_threshold(s: &str) -> Result<f64, String> {
    let value: f64 = s.parse().map_err(|e| format!("{e}"))?;
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(format!("{value} is not in 0.0-1.0"))
    }
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "filerisk_core={default_level},filerisk={default_level}"
        ))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_model(path: &Path) -> Option<Box<dyn Classifier>> {
    eprintln!("[*] Loading model from {}...", path.display());
    match load_classifier(path) {
        Ok(model) => Some(model),
        Err(e) => {
            eprintln!("[!] Could not load model: {e:#}");
            eprintln!("[!] Continuing with heuristic scoring only.");
            None
        }
    }
}

/// Quarantine moves a symlink itself, never its target.
fn link_note(path: &Path) -> &'static str {
    match std::fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_symlink() => " (symlink; target left in place)",
        _ => "",
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let classifier = cli.model.as_deref().and_then(load_model);

    let config = ScanConfig {
        root: cli.path,
        threshold: cli.threshold,
        recurse: !cli.no_recurse,
        parallel: cli.parallel,
    };

    let progress = ScanProgress::new();

    eprintln!("[*] Scanning {}...", config.root.display());
    let results = run_scan(&config, classifier.as_deref(), &progress)?;

    let total = progress.total_files.load(Ordering::Relaxed);
    eprintln!("[*] Scanned {} files", total);

    if results.is_empty() {
        eprintln!("[*] No files to scan.");
        return Ok(());
    }

    print_results(&results, config.threshold, cli.format);

    if let Some(dir) = cli.quarantine {
        let quarantine = Quarantine::new(dir);
        let mut moved = 0usize;
        for r in results.iter().filter(|r| r.suspicious) {
            let note = link_note(&r.path);
            match quarantine.move_file(&r.path) {
                Ok(dest) => {
                    moved += 1;
                    eprintln!(
                        "[*] Quarantined {} -> {}{note}",
                        r.path.display(),
                        dest.display()
                    );
                }
                Err(e) => eprintln!("[!] {e}"),
            }
        }
        if moved > 0 {
            eprintln!(
                "[*] Moved {moved} suspicious file(s) to {}",
                quarantine.dir().display()
            );
        }
    }

    Ok(())
}
