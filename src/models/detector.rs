//! Fraud detector: feature pipeline, schema check and scorer in one call

use crate::feature_extractor::{FeatureMatrix, FeaturePipeline};
use crate::models::schema::FeatureSchema;
use crate::models::scorer::Scorer;
use crate::types::score::{RiskLevelThresholds, ScoredTransaction};
use crate::types::transaction::{RawTransaction, TransactionRecord};
use anyhow::{anyhow, bail, Result};
use std::sync::Arc;
use tracing::{debug, info};

/// Scores raw transactions with a pre-trained classifier.
///
/// The schema and scorer are loaded once and injected here; both are
/// read-only afterwards, so a detector can be shared across threads.
pub struct FraudDetector {
    pipeline: FeaturePipeline,
    schema: FeatureSchema,
    scorer: Arc<dyn Scorer>,
}

impl FraudDetector {
    /// Build a detector, failing if the pipeline's columns differ from the
    /// schema the scorer was trained on.
    pub fn new(schema: FeatureSchema, scorer: Arc<dyn Scorer>) -> Result<Self> {
        let pipeline = FeaturePipeline::from_schema(&schema);
        schema.verify_columns(&FeatureMatrix::default().column_names())?;

        info!(
            scorer = %scorer.name(),
            schema_version = %schema.version,
            "Fraud detector initialized"
        );

        Ok(Self {
            pipeline,
            schema,
            scorer,
        })
    }

    pub fn pipeline(&self) -> &FeaturePipeline {
        &self.pipeline
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    /// Fraud probability of every row, in input order.
    ///
    /// Fails without calling the scorer when any row is invalid or the
    /// feature columns drift from the schema.
    pub fn predict_fraud(&self, records: &[RawTransaction]) -> Result<Vec<f64>> {
        let features = self.pipeline.transform(records)?;
        self.score_matrix(&features)
    }

    /// Score an already derived feature matrix.
    pub fn score_matrix(&self, features: &FeatureMatrix) -> Result<Vec<f64>> {
        self.schema.verify_columns(&features.column_names())?;

        if features.is_empty() {
            return Ok(Vec::new());
        }

        let probabilities = self.scorer.score(features)?;

        if probabilities.len() != features.len() {
            bail!(
                "scorer {} returned {} probabilities for {} rows",
                self.scorer.name(),
                probabilities.len(),
                features.len()
            );
        }
        if let Some(bad) = probabilities.iter().find(|p| !(0.0..=1.0).contains(*p)) {
            bail!("scorer {} returned probability {} outside [0, 1]", self.scorer.name(), bad);
        }

        debug!(rows = features.len(), scorer = %self.scorer.name(), "Batch scored");
        Ok(probabilities)
    }

    /// Score one generated transaction and classify its risk level.
    pub fn score_transaction(
        &self,
        tx: &TransactionRecord,
        thresholds: &RiskLevelThresholds,
    ) -> Result<ScoredTransaction> {
        let probabilities = self.predict_fraud(&[RawTransaction::from(tx)])?;
        let probability = probabilities
            .first()
            .copied()
            .ok_or_else(|| anyhow!("scorer {} returned no score", self.scorer.name()))?;

        Ok(ScoredTransaction::new(tx, probability, thresholds))
    }
}
