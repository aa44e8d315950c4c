//! Rolling log of recent predictions and score statistics.

use crate::types::score::{RiskLevel, ScoredTransaction};
use std::collections::{HashMap, VecDeque};
use tracing::info;

/// Number of recent predictions kept
pub const DEFAULT_LOG_CAPACITY: usize = 50;

/// Recent scored transactions plus running totals
pub struct PredictionLog {
    /// Most recent predictions, oldest first
    entries: VecDeque<ScoredTransaction>,
    capacity: usize,
    /// Total transactions scored
    scored: u64,
    /// Predictions by risk level
    by_level: HashMap<RiskLevel, u64>,
    /// Score distribution buckets of width 0.1 over the recent entries
    score_buckets: [u64; 10],
    /// Transactions generated under the fraud regime
    fraud_labelled: u64,
    /// Fraud-regime transactions scored high risk
    fraud_caught: u64,
}

impl PredictionLog {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_LOG_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
            scored: 0,
            by_level: HashMap::new(),
            score_buckets: [0; 10],
            fraud_labelled: 0,
            fraud_caught: 0,
        }
    }

    /// Record a scored transaction, evicting the oldest beyond capacity
    pub fn record(&mut self, scored: ScoredTransaction) {
        self.scored += 1;
        *self.by_level.entry(scored.risk_level).or_insert(0) += 1;

        if scored.is_fraud {
            self.fraud_labelled += 1;
            if scored.risk_level == RiskLevel::High {
                self.fraud_caught += 1;
            }
        }

        self.score_buckets[bucket(scored.probability)] += 1;
        self.entries.push_back(scored);

        if self.entries.len() > self.capacity {
            if let Some(evicted) = self.entries.pop_front() {
                self.score_buckets[bucket(evicted.probability)] -= 1;
            }
        }
    }

    /// Recent predictions, oldest first
    pub fn entries(&self) -> impl Iterator<Item = &ScoredTransaction> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_scored(&self) -> u64 {
        self.scored
    }

    pub fn count_for(&self, level: RiskLevel) -> u64 {
        self.by_level.get(&level).copied().unwrap_or(0)
    }

    /// Score distribution of the recent entries
    pub fn score_distribution(&self) -> [u64; 10] {
        self.score_buckets
    }

    /// Share of fraud-regime transactions scored high risk
    pub fn fraud_recall(&self) -> Option<f64> {
        (self.fraud_labelled > 0).then(|| self.fraud_caught as f64 / self.fraud_labelled as f64)
    }

    /// Print summary statistics
    pub fn print_summary(&self) {
        info!("╔══════════════════════════════════════════════════════════════╗");
        info!("║              FRAUD SIMULATOR - PREDICTION SUMMARY            ║");
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Transactions Scored: {:>8}  │  Fraud Regime: {:>8}      ║",
            self.scored, self.fraud_labelled
        );
        if let Some(recall) = self.fraud_recall() {
            info!("║ Fraud Scored High Risk: {:>5.1}%                               ║", recall * 100.0);
        }
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!("║ Predictions by Risk Level:                                   ║");
        for level in [RiskLevel::Low, RiskLevel::Medium, RiskLevel::High] {
            let count = self.count_for(level);
            let pct = if self.scored > 0 {
                (count as f64 / self.scored as f64) * 100.0
            } else {
                0.0
            };
            info!("║   {:10}: {:>6} ({:>5.1}%)                                ║", level.as_str(), count, pct);
        }
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!("║ Score Distribution (last {:>3}):                              ║", self.entries.len());
        let total: u64 = self.score_buckets.iter().sum();
        for (i, &count) in self.score_buckets.iter().enumerate() {
            let pct = if total > 0 { (count as f64 / total as f64) * 100.0 } else { 0.0 };
            let bar: String = "█".repeat(((pct / 2.0) as usize).min(20));
            info!(
                "║   {:.1}-{:.1}: {:>6} ({:>5.1}%) {}",
                i as f64 / 10.0,
                (i + 1) as f64 / 10.0,
                count,
                pct,
                bar
            );
        }
        info!("╚══════════════════════════════════════════════════════════════╝");

        info!("Recent predictions:");
        for entry in &self.entries {
            info!(
                "  {} ${:>9.2} {} card_present={} p={:>6.2}% {}",
                entry.scored_at.format("%H:%M:%S"),
                entry.amount_usd,
                entry.ip_country,
                entry.card_present,
                entry.probability * 100.0,
                level_marker(entry.risk_level)
            );
        }
    }
}

impl Default for PredictionLog {
    fn default() -> Self {
        Self::new()
    }
}

fn bucket(probability: f64) -> usize {
    ((probability * 10.0).max(0.0) as usize).min(9)
}

fn level_marker(level: RiskLevel) -> &'static str {
    match level {
        RiskLevel::Low => "[ok]",
        RiskLevel::Medium => "[review]",
        RiskLevel::High => "[FRAUD]",
    }
}
