//! ONNX-backed review classifier

use crate::config::ModelConfig;
use crate::feature_extractor::{FeatureRow, FeatureValue};
use crate::models::classifier::ReviewClassifier;
use crate::models::loader::{LoadedPipeline, ModelLoader};
use anyhow::{anyhow, Context, Result};
use ort::memory::Allocator;
use ort::session::SessionOutputs;
use ort::value::{DowncastableTarget, DynMapValueType, DynSequenceValueType, DynValue, Tensor};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

/// Exported sklearn pipeline evaluated with ONNX Runtime.
///
/// `Session::run` needs exclusive access, so evaluations are serialized
/// behind a mutex.
pub struct OnnxPipeline {
    name: String,
    pipeline: Mutex<LoadedPipeline>,
}

impl OnnxPipeline {
    /// Load the pipeline described by the model configuration
    pub fn load(config: &ModelConfig) -> Result<Self> {
        let loader = ModelLoader::with_threads(config.onnx_threads)?;
        let pipeline = loader.load_pipeline(config)?;

        info!(
            model = %pipeline.name,
            inputs = pipeline.input_names.len(),
            "ONNX classifier ready"
        );

        Ok(Self {
            name: pipeline.name.clone(),
            pipeline: Mutex::new(pipeline),
        })
    }

    fn run(&self, row: &FeatureRow) -> Result<(i64, [f64; 2])> {
        let mut guard = lock_pipeline(&self.pipeline);
        let LoadedPipeline {
            session,
            input_names,
            label_output,
            probability_output,
            ..
        } = &mut *guard;

        let inputs = build_inputs(input_names, row)?;
        let outputs = session.run(inputs)?;

        let label = extract_label(&outputs, label_output)?;
        let probabilities = extract_probabilities(&outputs, probability_output)?;

        debug!(model = %self.name, label = label, probabilities = ?probabilities, "Pipeline evaluated");
        Ok((label, probabilities))
    }
}

impl ReviewClassifier for OnnxPipeline {
    fn classify(&self, row: &FeatureRow) -> Result<i64> {
        self.run(row).map(|(label, _)| label)
    }

    fn classify_probability(&self, row: &FeatureRow) -> Result<[f64; 2]> {
        self.run(row).map(|(_, probabilities)| probabilities)
    }

    fn evaluate(&self, row: &FeatureRow) -> Result<(i64, [f64; 2])> {
        self.run(row)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// A panic mid-run leaves the session itself usable, so a poisoned lock is recovered
fn lock_pipeline<T>(pipeline: &Mutex<T>) -> MutexGuard<'_, T> {
    pipeline.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One `[1, 1]` tensor per graph input, taken from the row column of the same name
fn build_inputs(input_names: &[String], row: &FeatureRow) -> Result<Vec<(String, DynValue)>> {
    let columns = row.columns();

    input_names
        .iter()
        .map(|name| {
            let value = columns
                .iter()
                .find(|(column, _)| *column == name.as_str())
                .map(|(_, value)| value)
                .ok_or_else(|| anyhow!("Pipeline input '{}' is not a known feature column", name))?;
            let tensor = to_tensor(value).with_context(|| format!("Failed to create tensor for '{}'", name))?;
            Ok((name.clone(), tensor))
        })
        .collect()
}

fn to_tensor(value: &FeatureValue) -> Result<DynValue> {
    let shape = vec![1_i64, 1];
    let tensor = match value {
        FeatureValue::Text(text) => Tensor::from_string_array((shape, std::slice::from_ref(text)))?.into_dyn(),
        FeatureValue::Int(v) => Tensor::from_array((shape, vec![*v]))?.into_dyn(),
        FeatureValue::Float(v) => Tensor::from_array((shape, vec![*v as f32]))?.into_dyn(),
    };
    Ok(tensor)
}

fn extract_label(outputs: &SessionOutputs, label_output: &str) -> Result<i64> {
    let output = outputs
        .get(label_output)
        .ok_or_else(|| anyhow!("Output '{}' missing from pipeline result", label_output))?;

    let (_, data) = output
        .try_extract_tensor::<i64>()
        .with_context(|| format!("Output '{}' is not an int64 label tensor", label_output))?;

    data.first()
        .copied()
        .ok_or_else(|| anyhow!("Output '{}' is empty", label_output))
}

/// Read class probabilities from either a float tensor or a zipmap `seq(map(int64, float))`
fn extract_probabilities(outputs: &SessionOutputs, probability_output: &str) -> Result<[f64; 2]> {
    let output = outputs
        .get(probability_output)
        .ok_or_else(|| anyhow!("Output '{}' missing from pipeline result", probability_output))?;

    if let Ok((shape, data)) = output.try_extract_tensor::<f32>() {
        let dims: Vec<i64> = shape.iter().copied().collect();
        return probabilities_from_tensor(&dims, data);
    }

    let dtype = output.dtype();
    if DynSequenceValueType::can_downcast(&dtype) {
        return probabilities_from_sequence_map(output);
    }

    Err(anyhow!(
        "Output '{}' has unsupported type {:?}",
        probability_output,
        dtype
    ))
}

fn probabilities_from_sequence_map(output: &DynValue) -> Result<[f64; 2]> {
    let allocator = Allocator::default();

    let sequence = output
        .downcast_ref::<DynSequenceValueType>()
        .map_err(|e| anyhow!("Failed to downcast to sequence: {}", e))?;
    let maps = sequence.try_extract_sequence::<DynMapValueType>(&allocator)?;

    // batch size is always 1
    let map_value = maps.first().ok_or_else(|| anyhow!("Empty probability sequence"))?;
    let pairs = map_value.try_extract_key_values::<i64, f32>()?;

    probabilities_from_class_map(&pairs)
}

/// Probabilities from a tensor of shape `[1, C]` or `[C]`
fn probabilities_from_tensor(dims: &[i64], data: &[f32]) -> Result<[f64; 2]> {
    let classes = match dims {
        [_, classes] | [classes] => *classes,
        _ => return Err(anyhow!("Unexpected probability shape {:?}", dims)),
    };

    match (classes, data) {
        (2, [negative, positive, ..]) => Ok([*negative as f64, *positive as f64]),
        (1, [positive, ..]) => Ok([1.0 - *positive as f64, *positive as f64]),
        _ => Err(anyhow!(
            "Expected 2 class probabilities, got shape {:?}",
            dims
        )),
    }
}

/// Probabilities from `(class, probability)` pairs as produced by a zipmap
fn probabilities_from_class_map(pairs: &[(i64, f32)]) -> Result<[f64; 2]> {
    let lookup = |class: i64| {
        pairs
            .iter()
            .find(|(id, _)| *id == class)
            .map(|(_, p)| *p as f64)
    };

    match (lookup(0), lookup(1)) {
        (Some(negative), Some(positive)) => Ok([negative, positive]),
        (None, Some(positive)) => Ok([1.0 - positive, positive]),
        (Some(negative), None) => Ok([negative, 1.0 - negative]),
        (None, None) => Err(anyhow!("No class probabilities found in map")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ort::tensor::TensorElementType;
    use ort::value::ValueType;

    #[test]
    fn test_tensor_two_classes() {
        let probs = probabilities_from_tensor(&[1, 2], &[0.25, 0.75]).unwrap();
        assert_eq!(probs, [0.25, 0.75]);
    }

    #[test]
    fn test_tensor_single_probability() {
        let probs = probabilities_from_tensor(&[1, 1], &[0.75]).unwrap();
        assert_eq!(probs, [0.25, 0.75]);
    }

    #[test]
    fn test_tensor_flat_shape() {
        let probs = probabilities_from_tensor(&[2], &[0.5, 0.5]).unwrap();
        assert_eq!(probs, [0.5, 0.5]);
    }

    #[test]
    fn test_tensor_multiclass_is_rejected() {
        assert!(probabilities_from_tensor(&[1, 3], &[0.2, 0.3, 0.5]).is_err());
        assert!(probabilities_from_tensor(&[1, 1, 2], &[0.2, 0.8]).is_err());
    }

    #[test]
    fn test_class_map() {
        assert_eq!(
            probabilities_from_class_map(&[(0, 0.25), (1, 0.75)]).unwrap(),
            [0.25, 0.75]
        );
        assert_eq!(probabilities_from_class_map(&[(1, 0.75)]).unwrap(), [0.25, 0.75]);
        assert!(probabilities_from_class_map(&[(7, 1.0)]).is_err());
    }

    #[test]
    fn test_inputs_require_known_columns() {
        let row = crate::feature_extractor::FeatureExtractor::new().extract(
            &crate::types::ReviewRecord::new("A", "B", "text", "summary", 4.0, true),
        );

        let err = build_inputs(&["helpful_votes".to_string()], &row).unwrap_err();
        assert!(err.to_string().contains("helpful_votes"));
    }

    #[test]
    fn test_inputs_follow_graph_order_and_types() {
        let row = crate::feature_extractor::FeatureExtractor::new().extract(
            &crate::types::ReviewRecord::new("A", "B", "Great product", "Loved it", 5.0, true),
        );
        let names = ["clean_text", "len_text", "overall"].map(String::from);

        let inputs = build_inputs(&names, &row).unwrap();
        let got: Vec<&str> = inputs.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(got, vec!["clean_text", "len_text", "overall"]);

        assert!(matches!(
            inputs[0].1.dtype(),
            ValueType::Tensor { ty: TensorElementType::String, .. }
        ));
        assert!(matches!(
            inputs[1].1.dtype(),
            ValueType::Tensor { ty: TensorElementType::Int64, .. }
        ));
        assert!(matches!(
            inputs[2].1.dtype(),
            ValueType::Tensor { ty: TensorElementType::Float32, .. }
        ));

        let (shape, len_text) = inputs[1].1.try_extract_tensor::<i64>().unwrap();
        assert_eq!(shape.to_vec(), vec![1, 1]);
        assert_eq!(len_text, &[22]);

        let (_, overall) = inputs[2].1.try_extract_tensor::<f32>().unwrap();
        assert_eq!(overall, &[5.0]);
    }

    #[test]
    fn test_poisoned_lock_is_recovered() {
        let pipeline = std::sync::Arc::new(Mutex::new(7_u32));

        let shared = pipeline.clone();
        let result = std::thread::spawn(move || {
            let _guard = shared.lock().unwrap();
            panic!("evaluation panicked");
        })
        .join();
        assert!(result.is_err());
        assert!(pipeline.is_poisoned());

        let guard = lock_pipeline(&pipeline);
        assert_eq!(*guard, 7);
    }
}
