//! Scorer interface and the ONNX-backed classifier

use crate::feature_extractor::{FeatureMatrix, FEATURE_COUNT};
use crate::models::loader::{LoadedModel, ModelLoader};
use anyhow::{anyhow, bail, Context, Result};
use ort::value::Tensor;
use std::path::Path;
use std::sync::RwLock;
use tracing::debug;

/// Pre-trained classifier mapping feature rows to fraud probabilities.
///
/// Implementations receive matrices whose columns were already verified
/// against the feature schema, and must return one probability per row.
pub trait Scorer: Send + Sync {
    /// Name reported in logs
    fn name(&self) -> &str;

    /// Fraud probability of every row
    fn score(&self, features: &FeatureMatrix) -> Result<Vec<f64>>;
}

/// Classifier exported to ONNX, run through ONNX Runtime
pub struct OnnxScorer {
    name: String,
    /// Session run needs exclusive access
    model: RwLock<LoadedModel>,
}

impl OnnxScorer {
    /// Load the classifier from `path`
    pub fn load<P: AsRef<Path>>(path: P, onnx_threads: usize) -> Result<Self> {
        let loader = ModelLoader::with_threads(onnx_threads)?;
        Ok(Self::from_model(loader.load(path)?))
    }

    pub fn from_model(model: LoadedModel) -> Self {
        Self {
            name: model.name.clone(),
            model: RwLock::new(model),
        }
    }
}

impl Scorer for OnnxScorer {
    fn name(&self) -> &str {
        &self.name
    }

    fn score(&self, features: &FeatureMatrix) -> Result<Vec<f64>> {
        if features.is_empty() {
            return Ok(Vec::new());
        }

        // Prepare input tensor - shape [rows, num_features]
        let rows = features.len();
        let shape = vec![rows as i64, FEATURE_COUNT as i64];
        let input_tensor =
            Tensor::from_array((shape, features.to_flat())).context("Failed to create input tensor")?;

        let mut model = self
            .model
            .write()
            .map_err(|e| anyhow!("Lock error: {}", e))?;
        let input_name = model.input_name.clone();
        let output_name = model.output_name.clone();

        let outputs = model
            .session
            .run(ort::inputs![&input_name => input_tensor])?;

        if let Some(output) = outputs.get(&output_name) {
            if let Ok((shape, data)) = output.try_extract_tensor::<f32>() {
                let dims: Vec<i64> = shape.iter().copied().collect();
                return positive_class_probabilities(&dims, data, rows);
            }
        }

        // Fallback: first float tensor that is not the label output
        for (name, output) in outputs.iter() {
            if name.contains("label") {
                continue;
            }
            if let Ok((shape, data)) = output.try_extract_tensor::<f32>() {
                let dims: Vec<i64> = shape.iter().copied().collect();
                debug!(model = %self.name, output = %name, "Probabilities read from fallback output");
                return positive_class_probabilities(&dims, data, rows);
            }
        }

        bail!("model {} produced no probability tensor", self.name)
    }
}

/// Pick the fraud-class probability of each row from a classifier output.
///
/// Accepts `[rows, classes]` (class 1 is fraud), `[rows, 1]` and `[rows]`.
pub fn positive_class_probabilities(dims: &[i64], data: &[f32], rows: usize) -> Result<Vec<f64>> {
    let probabilities: Vec<f64> = match dims {
        [n, classes] if *n as usize == rows && *classes >= 2 => {
            let classes = *classes as usize;
            data.chunks_exact(classes).map(|c| c[1] as f64).collect()
        }
        [n, 1] | [n] if *n as usize == rows => data.iter().map(|&p| p as f64).collect(),
        _ => bail!("unexpected probability tensor shape {:?} for {} rows", dims, rows),
    };

    if probabilities.len() != rows {
        bail!(
            "probability tensor holds {} values for {} rows",
            probabilities.len(),
            rows
        );
    }
    Ok(probabilities)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_class_output() {
        let data = [0.9, 0.1, 0.25, 0.75];
        let probs = positive_class_probabilities(&[2, 2], &data, 2).unwrap();
        assert_eq!(probs.len(), 2);
        assert!((probs[0] - 0.1).abs() < 1e-6);
        assert!((probs[1] - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_single_column_output() {
        let probs = positive_class_probabilities(&[3, 1], &[0.2, 0.4, 0.6], 3).unwrap();
        assert!((probs[2] - 0.6).abs() < 1e-6);

        let probs = positive_class_probabilities(&[2], &[0.5, 0.25], 2).unwrap();
        assert_eq!(probs, vec![0.5, 0.25]);
    }

    #[test]
    fn test_row_count_mismatch() {
        assert!(positive_class_probabilities(&[1, 2], &[0.5, 0.5], 2).is_err());
        assert!(positive_class_probabilities(&[2, 2], &[0.5, 0.5], 2).is_err());
        assert!(positive_class_probabilities(&[2, 2, 1], &[0.5; 4], 2).is_err());
    }
}
