//! Classifier capability consumed by the prediction service

use crate::feature_extractor::FeatureRow;
use anyhow::Result;

/// A pre-trained review classifier treated as a black box.
///
/// Implementations are loaded once and shared across requests, so every
/// method takes `&self`.
pub trait ReviewClassifier: Send + Sync {
    /// Predicted class label for a row.
    fn classify(&self, row: &FeatureRow) -> Result<i64>;

    /// Class probabilities `[negative, positive]` for a row.
    fn classify_probability(&self, row: &FeatureRow) -> Result<[f64; 2]>;

    /// Label and probabilities together. Backends that produce both from one
    /// evaluation should override this.
    fn evaluate(&self, row: &FeatureRow) -> Result<(i64, [f64; 2])> {
        Ok((self.classify(row)?, self.classify_probability(row)?))
    }

    /// Name used in logs and `/health`.
    fn name(&self) -> &str {
        "pipeline"
    }
}
