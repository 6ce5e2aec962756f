//! Review Sentiment Service Library
//!
//! Serves a pre-trained review sentiment pipeline over HTTP: validates
//! review records, derives the feature row the pipeline was trained on and
//! returns the predicted label with its positive-class probability.

pub mod api;
pub mod config;
pub mod feature_extractor;
pub mod metrics;
pub mod models;
pub mod service;
pub mod types;
pub mod validation;

pub use config::AppConfig;
pub use feature_extractor::{FeatureExtractor, FeatureRow};
pub use models::{OnnxPipeline, ReviewClassifier};
pub use service::{PredictError, PredictionService};
pub use types::{Prediction, ReviewRecord};
