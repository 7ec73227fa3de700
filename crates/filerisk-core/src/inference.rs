//! Probability estimators consumed through the [`Classifier`] capability.
//!
//! Backends:
//! - [`LinearModel`]: logistic model stored as JSON (always available)
//! - `OnnxModel`: ONNX session via `ort` (cargo feature `onnx`)

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::error::ClassifierError;
use crate::features::{CanonicalFeatureVector, FEATURE_NAMES, NUM_FEATURES};

/// Anything that maps a canonical feature vector to P(malicious).
pub trait Classifier: Send + Sync {
    fn predict_probability(&self, vector: &CanonicalFeatureVector) -> Result<f64, ClassifierError>;
}

impl<F> Classifier for F
where
    F: Fn(&CanonicalFeatureVector) -> Result<f64, ClassifierError> + Send + Sync,
{
    fn predict_probability(&self, vector: &CanonicalFeatureVector) -> Result<f64, ClassifierError> {
        self(vector)
    }
}

#[derive(Debug, Deserialize)]
struct LinearModelFile {
    weights: Vec<f64>,
    bias: f64,
    #[serde(default)]
    feature_names: Option<Vec<String>>,
}

/// `sigmoid(w · x + b)` over the canonical vector.
#[derive(Debug, Clone)]
pub struct LinearModel {
    weights: [f64; NUM_FEATURES],
    bias: f64,
}

impl LinearModel {
    pub fn new(weights: [f64; NUM_FEATURES], bias: f64) -> Self {
        Self { weights, bias }
    }

    pub fn from_json(data: &str) -> Result<Self> {
        let file: LinearModelFile = serde_json::from_str(data).context("invalid model JSON")?;

        if let Some(names) = &file.feature_names {
            if names.len() != NUM_FEATURES || names.iter().zip(FEATURE_NAMES).any(|(a, b)| a != b) {
                bail!("model feature order does not match the scanner's {NUM_FEATURES}-feature layout");
            }
        }

        let weights: [f64; NUM_FEATURES] = file.weights.try_into().map_err(|w: Vec<f64>| {
            anyhow::anyhow!("model has {} weights, expected {NUM_FEATURES}", w.len())
        })?;

        if weights.iter().any(|w| !w.is_finite()) || !file.bias.is_finite() {
            bail!("model parameters must be finite");
        }

        Ok(Self::new(weights, file.bias))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("Cannot read model {}", path.display()))?;
        Self::from_json(&data).with_context(|| format!("Cannot load model {}", path.display()))
    }
}

impl Classifier for LinearModel {
    fn predict_probability(&self, vector: &CanonicalFeatureVector) -> Result<f64, ClassifierError> {
        let z = self
            .weights
            .iter()
            .zip(vector.as_slice())
            .fold(self.bias, |acc, (w, x)| acc + w * x);
        let p = 1.0 / (1.0 + (-z).exp());
        if p.is_nan() {
            return Err(ClassifierError::OutOfRange(p));
        }
        Ok(p)
    }
}

#[cfg(feature = "onnx")]
pub use onnx::OnnxModel;

#[cfg(feature = "onnx")]
mod onnx {
    use std::path::Path;
    use std::sync::Mutex;

    use anyhow::Result;
    use ndarray::Array2;
    use ort::session::Session;
    use ort::value::TensorRef;

    use super::Classifier;
    use crate::error::ClassifierError;
    use crate::features::{CanonicalFeatureVector, NUM_FEATURES};

    const INPUT_NAME: &str = "input";
    const OUTPUT_NAME: &str = "probabilities";

    /// ONNX classifier taking a `(1, 29)` f32 tensor named `input` and
    /// producing `probabilities` of shape `(1, 2)` or `(1, 1)`.
    pub struct OnnxModel {
        session: Mutex<Session>,
    }

    impl OnnxModel {
        pub fn load(model_path: &Path) -> Result<Self> {
            let session = Session::builder()?
                .with_intra_threads(1)?
                .commit_from_file(model_path)?;

            Ok(Self {
                session: Mutex::new(session),
            })
        }

        fn run(&self, vector: &CanonicalFeatureVector) -> Result<f64> {
            let row: Vec<f32> = vector.as_slice().iter().map(|&x| x as f32).collect();
            let input = Array2::from_shape_vec((1, NUM_FEATURES), row)?;
            let input_tensor = TensorRef::from_array_view(&input)?;

            let mut session = self
                .session
                .lock()
                .map_err(|e| anyhow::anyhow!("lock error: {e}"))?;
            let outputs = session.run(ort::inputs![INPUT_NAME => input_tensor])?;

            let output_array = outputs
                .get(OUTPUT_NAME)
                .ok_or_else(|| anyhow::anyhow!("model has no output named `{OUTPUT_NAME}`"))?
                .try_extract_array::<f32>()?;
            let scores: Vec<f32> = output_array.iter().copied().collect();
            // Two columns: [benign, malicious].
            let p = match scores.as_slice() {
                [_, malicious, ..] => *malicious,
                [only] => *only,
                [] => anyhow::bail!("model produced an empty output"),
            };
            Ok(f64::from(p))
        }
    }

    impl Classifier for OnnxModel {
        fn predict_probability(
            &self,
            vector: &CanonicalFeatureVector,
        ) -> Result<f64, ClassifierError> {
            self.run(vector)
                .map_err(|e| ClassifierError::Backend(format!("{e:#}")))
        }
    }
}

/// Load a classifier, choosing the backend by file extension.
pub fn load_classifier(path: &Path) -> Result<Box<dyn Classifier>> {
    let is_onnx = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("onnx"));

    if is_onnx {
        #[cfg(feature = "onnx")]
        return Ok(Box::new(OnnxModel::load(path)?));
        #[cfg(not(feature = "onnx"))]
        bail!(
            "{} is an ONNX model but this build lacks the `onnx` feature",
            path.display()
        );
    }

    Ok(Box::new(LinearModel::load(path)?))
}
