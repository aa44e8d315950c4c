//! Pre-trained classifier and its artifacts

pub mod detector;
pub mod loader;
pub mod schema;
pub mod scorer;

pub use detector::FraudDetector;
pub use loader::ModelLoader;
pub use schema::{CategoryMapping, FeatureSchema};
pub use scorer::{OnnxScorer, Scorer};
