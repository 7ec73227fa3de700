//! Scan results and output formatting.

use std::io::{self, Write};
use std::path::PathBuf;

use serde::Serialize;

use crate::classify::RiskAssessment;
use crate::features::FeatureRecord;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanResult {
    pub path: PathBuf,
    pub size: u64,
    pub entropy: f64,
    pub heuristic: f64,
    pub ml_prob: Option<f64>,
    pub combined: f64,
    pub suspicious: bool,
    /// Why the file was scored from an empty profile, if it was.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ScanResult {
    pub fn new(
        path: PathBuf,
        features: &FeatureRecord,
        assessment: &RiskAssessment,
        error: Option<String>,
    ) -> Self {
        Self {
            path,
            size: features.size,
            entropy: features.entropy,
            heuristic: round3(assessment.heuristic),
            ml_prob: assessment.probability.map(round3),
            combined: round3(assessment.combined),
            suspicious: assessment.suspicious,
            error,
        }
    }
}

/// Round to three decimal places.
pub fn round3(x: f64) -> f64 {
    (x * 1000.0).round() / 1000.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScanSummary {
    pub total: usize,
    pub suspicious: usize,
    pub clean: usize,
    pub degraded: usize,
}

impl ScanSummary {
    pub fn from_results(results: &[ScanResult]) -> Self {
        let suspicious = results.iter().filter(|r| r.suspicious).count();
        Self {
            total: results.len(),
            suspicious,
            clean: results.len() - suspicious,
            degraded: results.iter().filter(|r| r.error.is_some()).count(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown format: {s}. Use 'text' or 'json'.")),
        }
    }
}

pub fn print_results(results: &[ScanResult], threshold: f64, format: OutputFormat) {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let written = match format {
        OutputFormat::Text => write_text(&mut out, results, threshold),
        OutputFormat::Json => write_json(&mut out, results, threshold),
    };
    // A closed pipe is not worth failing a finished scan over.
    if let Err(e) = written {
        tracing::debug!(error = %e, "could not write scan report");
    }
}

fn format_prob(p: Option<f64>) -> String {
    p.map(|p| format!("{p:.3}")).unwrap_or_else(|| "-".into())
}

pub fn write_text<W: Write>(out: &mut W, results: &[ScanResult], threshold: f64) -> io::Result<()> {
    let summary = ScanSummary::from_results(results);

    writeln!(out, "\n{}", "=".repeat(70))?;
    writeln!(out, "SCAN RESULTS (threshold: {threshold:.2})")?;
    writeln!(out, "{}", "=".repeat(70))?;

    for r in results {
        let flag = if r.suspicious { "SUSP" } else { " ok " };
        writeln!(
            out,
            "  [{flag}] {}  combined={:.3} heuristic={:.3} ml_prob={} entropy={:.3} size={}",
            r.path.display(),
            r.combined,
            r.heuristic,
            format_prob(r.ml_prob),
            r.entropy,
            r.size,
        )?;
    }

    let suspicious: Vec<_> = results.iter().filter(|r| r.suspicious).collect();
    if !suspicious.is_empty() {
        writeln!(out, "\nSUSPICIOUS FILES ({}):", suspicious.len())?;
        for r in &suspicious {
            writeln!(out, "  [{:.3}] {}", r.combined, r.path.display())?;
        }
    }

    let degraded: Vec<_> = results.iter().filter(|r| r.error.is_some()).collect();
    if !degraded.is_empty() {
        writeln!(out, "\nUNREADABLE ({}):", degraded.len())?;
        for r in &degraded {
            let err = r.error.as_deref().unwrap_or("unknown");
            writeln!(out, "  [ERR ] {} -- {}", r.path.display(), err)?;
        }
    }

    writeln!(out, "\nSUMMARY:")?;
    writeln!(out, "  Total files scanned: {}", summary.total)?;
    writeln!(out, "  Suspicious:          {}", summary.suspicious)?;
    writeln!(out, "  Clean:               {}", summary.clean)?;
    writeln!(out, "  Unreadable:          {}", summary.degraded)?;
    writeln!(out, "{}", "=".repeat(70))
}

pub fn write_json<W: Write>(out: &mut W, results: &[ScanResult], threshold: f64) -> io::Result<()> {
    let output = serde_json::json!({
        "threshold": threshold,
        "results": results,
        "summary": ScanSummary::from_results(results),
    });
    serde_json::to_writer_pretty(&mut *out, &output)?;
    writeln!(out)
}
