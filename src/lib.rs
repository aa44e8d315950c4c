//! Fraud Simulator Library
//!
//! Generates synthetic payment transactions under a fraud or legitimate
//! regime, derives the fixed feature set a pre-trained classifier expects,
//! and scores them.

pub mod bulk;
pub mod config;
pub mod error;
pub mod feature_extractor;
pub mod generator;
pub mod metrics;
pub mod models;
pub mod types;

pub use config::AppConfig;
pub use error::{PipelineError, Result};
pub use feature_extractor::{FeatureMatrix, FeaturePipeline, FEATURE_COLUMNS};
pub use generator::TransactionGenerator;
pub use metrics::PredictionLog;
pub use models::{FeatureSchema, FraudDetector, OnnxScorer, Scorer};
pub use types::{RawTransaction, ScoredTransaction, TransactionRecord};
