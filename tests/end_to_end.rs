//! End-to-end scenarios: generator -> feature pipeline -> scorer

use anyhow::Result;
use chrono::NaiveDate;
use fraud_simulator::{
    bulk,
    models::{FeatureSchema, FraudDetector, Scorer},
    types::{IpCountry, RiskLevel, RiskLevelThresholds},
    FeatureMatrix, FeaturePipeline, PipelineError, RawTransaction, TransactionGenerator,
    FEATURE_COLUMNS,
};
use std::sync::Arc;

/// Scores rows by a fixed rule on the risky-country and card-present columns
struct RuleScorer;

impl Scorer for RuleScorer {
    fn name(&self) -> &str {
        "rule"
    }

    fn score(&self, features: &FeatureMatrix) -> Result<Vec<f64>> {
        Ok(features
            .rows()
            .iter()
            .map(|r| {
                let risky = r[4] as f64;
                let card_absent = 1.0 - r[2] as f64;
                0.05 + 0.45 * risky + 0.45 * card_absent
            })
            .collect())
    }
}

const EXTERNAL_CSV: &str = include_str!("../data/sample_transactions.csv");

#[test]
fn generated_legitimate_record_pipes_through() {
    let mut gen = TransactionGenerator::from_seed(42).unwrap();
    let tx = gen.generate(Some(42), false);

    assert_eq!(tx.customer_id, 42);
    assert!(!tx.is_fraud);
    assert!(tx.is_consistent());
    assert!(tx.amount_usd > 0.0);
    assert!(tx.dist_to_home_km >= 0.0);
    assert!(tx.cust_prev_tx < 300);

    let matrix = FeaturePipeline::default().transform_records(&[tx]).unwrap();
    assert_eq!(matrix.len(), 1);
    assert_eq!(matrix.rows()[0].len(), 18);
    assert_eq!(
        matrix.column_names(),
        FEATURE_COLUMNS.iter().map(|c| c.name).collect::<Vec<_>>()
    );
    assert_eq!(matrix.column_names()[0], "amount_usd");
    assert_eq!(matrix.column_names()[17], "amount_to_hist_avg_ratio");
}

#[test]
fn external_bulk_rows_transform_and_score() {
    let input = bulk::read_transactions(EXTERNAL_CSV.as_bytes()).unwrap();
    assert_eq!(input.len(), 3);

    let matrix = FeaturePipeline::default().transform(&input.records).unwrap();
    assert_eq!(matrix.len(), 3);
    // 2025-06-01 is a Sunday
    assert_eq!(matrix.value(0, "day_of_week"), Some(6.0));
    assert_eq!(matrix.value(0, "hour_of_day"), Some(3.0));
    assert_eq!(matrix.value(1, "weekend"), Some(0.0));

    let detector = FraudDetector::new(FeatureSchema::default(), Arc::new(RuleScorer)).unwrap();
    let probs = detector.predict_fraud(&input.records).unwrap();
    assert_eq!(probs.len(), 3);
    assert!(probs[0] > 0.9);
    assert!(probs[1] < 0.1);

    let mut out = Vec::new();
    bulk::write_scored(&input, &probs, &mut out).unwrap();
    let text = String::from_utf8(out).unwrap();
    assert_eq!(text.lines().count(), 4);
    assert!(text.lines().next().unwrap().ends_with("fraud_probability"));
}

#[test]
fn empty_batch_yields_headers_only() {
    let matrix = FeaturePipeline::default().transform(&[]).unwrap();
    assert!(matrix.is_empty());
    assert_eq!(matrix.column_names().len(), 18);

    let detector = FraudDetector::new(FeatureSchema::default(), Arc::new(RuleScorer)).unwrap();
    assert!(detector.predict_fraud(&[]).unwrap().is_empty());
}

#[test]
fn missing_timestamp_is_never_defaulted() {
    let mut gen = TransactionGenerator::from_seed(3).unwrap();
    let mut raw = RawTransaction::from(gen.generate(None, true));
    raw.trans_ts = None;

    let err = FeaturePipeline::default().transform(&[raw]).unwrap_err();
    assert!(matches!(
        err,
        PipelineError::MissingField {
            field: "trans_ts",
            ..
        }
    ));
}

#[test]
fn fraud_regime_scores_higher_under_rule_scorer() {
    let mut gen = TransactionGenerator::from_seed(99)
        .unwrap()
        .with_date(NaiveDate::from_ymd_opt(2025, 6, 4).unwrap());
    let detector = FraudDetector::new(FeatureSchema::default(), Arc::new(RuleScorer)).unwrap();
    let thresholds = RiskLevelThresholds::default();

    let mut legit_high = 0;
    let mut fraud_high = 0;
    for _ in 0..2_000 {
        let legit = detector
            .score_transaction(&gen.generate(None, false), &thresholds)
            .unwrap();
        let fraud = detector
            .score_transaction(&gen.generate(None, true), &thresholds)
            .unwrap();
        legit_high += (legit.risk_level == RiskLevel::High) as u32;
        fraud_high += (fraud.risk_level == RiskLevel::High) as u32;
    }
    assert!(fraud_high > legit_high * 3);
}

#[test]
fn derived_fields_hold_across_regimes() {
    let mut gen = TransactionGenerator::from_seed(1234).unwrap();
    for tx in gen.generate_mixed(5_000, 0.5).unwrap() {
        assert_eq!(tx.foreign_ip, tx.ip_country != IpCountry::Us);
        assert_eq!(tx.risky_ip_country, IpCountry::RISKY.contains(&tx.ip_country));
        assert_eq!(
            tx.uncommon_os,
            matches!(tx.device_os.to_string().as_str(), "Linux" | "ChromeOS")
        );
        assert_eq!(tx.very_quick_succession, tx.time_since_prev_tx_sec < 300.0);
        let expected = tx.amount_usd / (tx.cust_hist_avg_amount + 1.0);
        assert!((tx.amount_to_hist_avg_ratio - expected).abs() < 1e-12);
    }
}
