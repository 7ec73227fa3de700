//! Risk classification: heuristic score blended with an optional model probability.

use std::panic::{self, AssertUnwindSafe};

use tracing::warn;

use crate::error::ClassifierError;
use crate::features::FeatureRecord;
use crate::heuristic::heuristic_score;
use crate::inference::Classifier;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskAssessment {
    pub heuristic: f64,
    pub probability: Option<f64>,
    pub combined: f64,
    pub suspicious: bool,
}

/// `heuristic` alone, or the equal-weight mean with `probability` when present.
pub fn combine(heuristic: f64, probability: Option<f64>) -> f64 {
    match probability {
        Some(p) => 0.5 * heuristic + 0.5 * p,
        None => heuristic,
    }
}

/// Ask the classifier once. Failures, panics and out-of-range answers count
/// as "no probability".
pub fn model_probability(
    classifier: Option<&dyn Classifier>,
    features: &FeatureRecord,
) -> Option<f64> {
    let classifier = classifier?;
    let vector = features.to_vector();
    let result = panic::catch_unwind(AssertUnwindSafe(|| classifier.predict_probability(&vector)))
        .unwrap_or_else(|_| Err(ClassifierError::Backend("classifier panicked".into())))
        .and_then(|p| {
            if (0.0..=1.0).contains(&p) {
                Ok(p)
            } else {
                Err(ClassifierError::OutOfRange(p))
            }
        });

    match result {
        Ok(p) => Some(p),
        Err(e) => {
            warn!(error = %e, "classifier unavailable for this file, using heuristic only");
            None
        }
    }
}

pub fn assess(
    features: &FeatureRecord,
    classifier: Option<&dyn Classifier>,
    threshold: f64,
) -> RiskAssessment {
    let heuristic = heuristic_score(features);
    let probability = model_probability(classifier, features);
    let combined = combine(heuristic, probability);

    RiskAssessment {
        heuristic,
        probability,
        combined,
        suspicious: combined >= threshold,
    }
}
