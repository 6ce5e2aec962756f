//! Prediction service: feature extraction plus classifier call

use crate::feature_extractor::FeatureExtractor;
use crate::models::classifier::ReviewClassifier;
use crate::types::{Prediction, ReviewRecord};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Failure after a record passed validation
#[derive(Debug, Error)]
pub enum PredictError {
    #[error("{0:#}")]
    Inference(#[source] anyhow::Error),

    #[error("classifier returned an invalid probability: {0}")]
    InvalidProbability(f64),
}

/// Stateless request handler around a shared classifier
pub struct PredictionService {
    extractor: FeatureExtractor,
    classifier: Arc<dyn ReviewClassifier>,
}

impl PredictionService {
    pub fn new(classifier: Arc<dyn ReviewClassifier>) -> Self {
        Self {
            extractor: FeatureExtractor::new(),
            classifier,
        }
    }

    /// Name of the underlying classifier
    pub fn classifier_name(&self) -> &str {
        self.classifier.name()
    }

    /// Classify one review.
    ///
    /// The probability is the positive-class probability rounded to 4 decimals.
    pub fn predict(&self, review: &ReviewRecord) -> Result<Prediction, PredictError> {
        let row = self.extractor.extract(review);

        let (label, [_, positive]) = self
            .classifier
            .evaluate(&row)
            .map_err(PredictError::Inference)?;

        if !positive.is_finite() || !(0.0..=1.0).contains(&positive) {
            return Err(PredictError::InvalidProbability(positive));
        }

        debug!(
            asin = %review.asin,
            reviewer_id = %review.reviewer_id,
            days = row.days,
            len_text = row.len_text,
            label = label,
            probability = positive,
            "Review classified"
        );

        Ok(Prediction {
            prediction: label,
            probability: round4(positive),
        })
    }
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature_extractor::FeatureRow;
    use anyhow::{anyhow, Result};

    struct FixedClassifier {
        label: i64,
        probabilities: [f64; 2],
    }

    impl ReviewClassifier for FixedClassifier {
        fn classify(&self, _row: &FeatureRow) -> Result<i64> {
            Ok(self.label)
        }

        fn classify_probability(&self, _row: &FeatureRow) -> Result<[f64; 2]> {
            Ok(self.probabilities)
        }
    }

    struct FailingClassifier;

    impl ReviewClassifier for FailingClassifier {
        fn classify(&self, _row: &FeatureRow) -> Result<i64> {
            Err(anyhow!("found unknown categories ['B999'] in column 0"))
        }

        fn classify_probability(&self, _row: &FeatureRow) -> Result<[f64; 2]> {
            Err(anyhow!("unreachable"))
        }
    }

    fn review() -> ReviewRecord {
        ReviewRecord::new("test_user", "B001", "Great product", "Loved it", 5.0, true)
    }

    fn service(label: i64, probabilities: [f64; 2]) -> PredictionService {
        PredictionService::new(Arc::new(FixedClassifier {
            label,
            probabilities,
        }))
    }

    #[test]
    fn test_prediction_uses_positive_probability() {
        let prediction = service(1, [0.123456, 0.876544]).predict(&review()).unwrap();
        assert_eq!(prediction.prediction, 1);
        assert_eq!(prediction.probability, 0.8765);
    }

    #[test]
    fn test_probability_is_rounded_to_four_decimals() {
        let prediction = service(0, [0.9, 0.00004]).predict(&review()).unwrap();
        assert_eq!(prediction.probability, 0.0);

        let prediction = service(1, [0.00004, 0.99996]).predict(&review()).unwrap();
        assert_eq!(prediction.probability, 1.0);
    }

    #[test]
    fn test_inference_error_is_reported() {
        let service = PredictionService::new(Arc::new(FailingClassifier));
        let err = service.predict(&review()).unwrap_err();

        assert!(matches!(err, PredictError::Inference(_)));
        assert_eq!(err.to_string(), "found unknown categories ['B999'] in column 0");
    }

    #[test]
    fn test_out_of_range_probability_is_rejected() {
        let err = service(1, [-0.5, 1.5]).predict(&review()).unwrap_err();
        assert!(matches!(err, PredictError::InvalidProbability(p) if p == 1.5));

        let err = service(1, [0.0, f64::NAN]).predict(&review()).unwrap_err();
        assert!(matches!(err, PredictError::InvalidProbability(_)));
    }

    #[test]
    fn test_repeated_predictions_are_identical() {
        let service = service(1, [0.2, 0.8]);
        assert_eq!(service.predict(&review()).unwrap(), service.predict(&review()).unwrap());
    }
}
