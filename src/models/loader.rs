//! ONNX pipeline loader

use crate::config::ModelConfig;
use anyhow::{Context, Result};
use ort::session::{builder::GraphOptimizationLevel, Session};
use std::path::Path;
use tracing::{info, warn};

/// Loaded ONNX pipeline with metadata
pub struct LoadedPipeline {
    /// Pipeline name (file stem)
    pub name: String,
    /// ONNX Runtime session
    pub session: Session,
    /// Graph input names
    pub input_names: Vec<String>,
    /// Output holding the predicted label
    pub label_output: String,
    /// Output holding class probabilities
    pub probability_output: String,
}

/// Loader for exported ONNX pipelines
pub struct ModelLoader {
    /// Number of threads for ONNX inference
    onnx_threads: usize,
}

impl ModelLoader {
    /// Create a new model loader with specified number of threads
    pub fn with_threads(onnx_threads: usize) -> Result<Self> {
        ort::init().commit()?;
        info!(onnx_threads = onnx_threads, "ONNX Runtime initialized");
        Ok(Self { onnx_threads })
    }

    /// Load the pipeline described by `config`
    pub fn load_pipeline(&self, config: &ModelConfig) -> Result<LoadedPipeline> {
        let path = Path::new(&config.path);
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "pipeline".to_string());

        if !path.exists() {
            anyhow::bail!("Pipeline file not found: {}", path.display());
        }

        info!(model = %name, path = %path.display(), threads = self.onnx_threads, "Loading ONNX pipeline");

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(self.onnx_threads)?
            .commit_from_file(path)
            .with_context(|| format!("Failed to load pipeline from {}", path.display()))?;

        let input_names: Vec<String> = session.inputs.iter().map(|i| i.name.clone()).collect();
        let output_names: Vec<String> = session.outputs.iter().map(|o| o.name.clone()).collect();

        let label_output = resolve_output(&output_names, &config.label_output, |n| n.contains("label"))
            .context("Pipeline has no label output")?;
        let probability_output =
            resolve_output(&output_names, &config.probability_output, |n| n.contains("prob"))
                .context("Pipeline has no probability output")?;

        info!(
            model = %name,
            inputs = ?input_names,
            label = %label_output,
            probabilities = %probability_output,
            "Pipeline loaded successfully"
        );

        Ok(LoadedPipeline {
            name,
            session,
            input_names,
            label_output,
            probability_output,
        })
    }
}

/// Pick the configured output, falling back to the first name matching `heuristic`
fn resolve_output(
    outputs: &[String],
    configured: &str,
    heuristic: impl Fn(&str) -> bool,
) -> Option<String> {
    if outputs.iter().any(|o| o == configured) {
        return Some(configured.to_string());
    }

    let fallback = outputs.iter().find(|o| heuristic(&o.to_lowercase())).cloned();
    if let Some(name) = &fallback {
        warn!(configured = %configured, using = %name, "Configured output not found in graph");
    }
    fallback
}
