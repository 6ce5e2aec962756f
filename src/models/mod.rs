//! Review classifier components

pub mod classifier;
pub mod inference;
pub mod loader;

pub use classifier::ReviewClassifier;
pub use inference::OnnxPipeline;
pub use loader::ModelLoader;
