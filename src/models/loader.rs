//! Opens the fraud classifier exported to ONNX

use anyhow::{ensure, Context, Result};
use ort::session::{builder::GraphOptimizationLevel, Session};
use std::path::Path;
use tracing::info;

/// Name used for the classifier when its path has no file stem
const FALLBACK_NAME: &str = "classifier";

/// Open classifier session and the tensor names it is driven through
pub struct LoadedModel {
    pub name: String,
    pub session: Session,
    /// Takes the `[rows, 18]` feature tensor
    pub input_name: String,
    /// Yields per-class probabilities
    pub output_name: String,
}

/// Opens the classifier with a fixed intra-op thread budget.
pub struct ModelLoader {
    onnx_threads: usize,
}

impl ModelLoader {
    /// Initialize ONNX Runtime once for this process.
    pub fn with_threads(onnx_threads: usize) -> Result<Self> {
        ensure!(onnx_threads > 0, "onnx_threads must be at least 1");
        ort::init().with_name("fraud-simulator").commit()?;
        info!(onnx_threads, "ONNX Runtime ready");
        Ok(Self { onnx_threads })
    }

    pub fn load<P: AsRef<Path>>(&self, path: P) -> Result<LoadedModel> {
        let path = path.as_ref();
        let name = model_name(path);

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(self.onnx_threads)?
            .commit_from_file(path)
            .with_context(|| format!("Failed to open classifier {}", path.display()))?;

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .context("classifier declares no inputs")?;
        let output_name = probability_output(session.outputs.iter().map(|o| o.name.as_str()))
            .map(str::to_string)
            .context("classifier declares no outputs")?;

        info!(
            model = %name,
            path = %path.display(),
            input = %input_name,
            output = %output_name,
            "Classifier loaded"
        );

        Ok(LoadedModel {
            name,
            session,
            input_name,
            output_name,
        })
    }
}

fn model_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| FALLBACK_NAME.to_string())
}

/// Pick the probability output of a classifier export.
///
/// sklearn-onnx emits `label` then `probabilities`; other exporters vary, so
/// any name containing "prob" wins, then the last output.
fn probability_output<'a>(names: impl IntoIterator<Item = &'a str>) -> Option<&'a str> {
    let names: Vec<&str> = names.into_iter().collect();
    names
        .iter()
        .copied()
        .find(|n| n.to_ascii_lowercase().contains("prob"))
        .or_else(|| names.last().copied())
}
