//! Scored transaction data structures

use crate::types::category::IpCountry;
use crate::types::transaction::TransactionRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Risk level classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// Determine risk level from a fraud probability and thresholds
    pub fn from_score(score: f64, thresholds: &RiskLevelThresholds) -> Self {
        if score >= thresholds.high {
            RiskLevel::High
        } else if score >= thresholds.medium {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }
}

/// Configurable risk level thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskLevelThresholds {
    /// Lowest probability classed as medium risk
    pub medium: f64,
    /// Lowest probability classed as high risk
    pub high: f64,
}

impl Default for RiskLevelThresholds {
    fn default() -> Self {
        Self {
            medium: 0.3,
            high: 0.7,
        }
    }
}

/// Generated transaction together with its fraud score
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredTransaction {
    pub customer_id: u64,

    pub trans_ts: DateTime<Utc>,

    pub amount_usd: f64,

    pub ip_country: IpCountry,

    pub card_present: bool,

    /// Ground-truth label of the generation regime
    pub is_fraud: bool,

    /// Scorer's fraud probability (0.0 - 1.0)
    pub probability: f64,

    pub risk_level: RiskLevel,

    /// When the score was produced
    pub scored_at: DateTime<Utc>,
}

impl ScoredTransaction {
    pub fn new(tx: &TransactionRecord, probability: f64, thresholds: &RiskLevelThresholds) -> Self {
        Self {
            customer_id: tx.customer_id,
            trans_ts: tx.trans_ts,
            amount_usd: tx.amount_usd,
            ip_country: tx.ip_country,
            card_present: tx.card_present,
            is_fraud: tx.is_fraud,
            probability,
            risk_level: RiskLevel::from_score(probability, thresholds),
            scored_at: Utc::now(),
        }
    }
}
