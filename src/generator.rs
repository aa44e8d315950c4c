//! Synthetic transaction generator.
//!
//! Fraud and legitimate transactions share one schema and differ only in the
//! parameters of the distributions they are drawn from, so the same
//! preprocessing and scoring path applies to both classes.

use crate::error::{PipelineError, Result};
use crate::types::category::{DeviceLang, DeviceOs, IpCountry, IpIsp, MerchantCategory};
use crate::types::transaction::{TransactionRecord, CUSTOMER_ID_RANGE, QUICK_SUCCESSION_SECS};
use chrono::{Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use rand::distributions::{Bernoulli, Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Exp, LogNormal};
use tracing::debug;

/// Distribution parameters of one generation regime
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegimeParams {
    /// Log-domain mean of the amount
    pub amount_log_mean: f64,
    /// Log-domain standard deviation of the amount
    pub amount_log_sigma: f64,
    /// Mean distance from home in km
    pub mean_dist_km: f64,
    /// The card counts as present when a uniform draw exceeds this
    pub card_present_cutoff: f64,
    /// Mean seconds since the previous transaction
    pub mean_secs_since_prev: f64,
    /// Probabilities over `IpCountry::ALL`
    pub country_weights: [f64; 9],
}

/// Legitimate customers: modest amounts, close to home, mostly US.
pub const LEGITIMATE: RegimeParams = RegimeParams {
    amount_log_mean: 3.1,
    amount_log_sigma: 0.8,
    mean_dist_km: 12.0,
    card_present_cutoff: 0.2,
    mean_secs_since_prev: 900.0,
    country_weights: [0.65, 0.10, 0.02, 0.03, 0.01, 0.01, 0.01, 0.12, 0.05],
};

/// Fraud: larger and more volatile amounts, far from home, risky countries.
pub const FRAUD: RegimeParams = RegimeParams {
    amount_log_mean: 4.2,
    amount_log_sigma: 1.4,
    mean_dist_km: 50.0,
    card_present_cutoff: 0.7,
    mean_secs_since_prev: 90.0,
    country_weights: [0.10, 0.05, 0.15, 0.15, 0.10, 0.10, 0.10, 0.15, 0.10],
};

/// Log-domain sigma of the noise applied to the historical average amount
const HIST_AVG_NOISE_SIGMA: f64 = 0.2;

/// Distributions of one regime, built once from its parameters
#[derive(Debug, Clone)]
struct RegimeSampler {
    amount: LogNormal<f64>,
    dist_km: Exp<f64>,
    secs_since_prev: Exp<f64>,
    countries: WeightedIndex<f64>,
    card_present_cutoff: f64,
}

impl RegimeSampler {
    fn new(params: &RegimeParams) -> Result<Self> {
        let invalid = |what: &str, e: &dyn std::fmt::Display| {
            PipelineError::InvalidArtifact(format!("{what}: {e}"))
        };

        Ok(Self {
            amount: LogNormal::new(params.amount_log_mean, params.amount_log_sigma)
                .map_err(|e| invalid("amount distribution", &e))?,
            dist_km: Exp::new(1.0 / params.mean_dist_km)
                .map_err(|e| invalid("distance distribution", &e))?,
            secs_since_prev: Exp::new(1.0 / params.mean_secs_since_prev)
                .map_err(|e| invalid("velocity distribution", &e))?,
            countries: WeightedIndex::new(params.country_weights)
                .map_err(|e| invalid("country weights", &e))?,
            card_present_cutoff: params.card_present_cutoff,
        })
    }
}

/// Generates synthetic transactions from an injected random source.
pub struct TransactionGenerator<R = StdRng> {
    rng: R,
    /// Pinned transaction date; today's UTC date when unset
    date: Option<NaiveDate>,
    legit: RegimeSampler,
    fraud: RegimeSampler,
    hist_avg_noise: LogNormal<f64>,
}

impl TransactionGenerator<StdRng> {
    /// Generator with a deterministic random stream.
    pub fn from_seed(seed: u64) -> Result<Self> {
        Self::new(StdRng::seed_from_u64(seed))
    }

    /// Generator seeded from OS entropy.
    pub fn from_entropy() -> Result<Self> {
        Self::new(StdRng::from_entropy())
    }
}

impl<R: Rng> TransactionGenerator<R> {
    /// Create a generator drawing from `rng`.
    pub fn new(rng: R) -> Result<Self> {
        Ok(Self {
            rng,
            date: None,
            legit: RegimeSampler::new(&LEGITIMATE)?,
            fraud: RegimeSampler::new(&FRAUD)?,
            hist_avg_noise: LogNormal::new(0.0, HIST_AVG_NOISE_SIGMA)
                .map_err(|e| PipelineError::InvalidArtifact(format!("history noise: {e}")))?,
        })
    }

    /// Place every generated transaction on `date` instead of today.
    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    /// Generate one transaction.
    ///
    /// `customer_id` is sampled when absent; `fraud` selects the regime.
    pub fn generate(&mut self, customer_id: Option<u64>, fraud: bool) -> TransactionRecord {
        let regime = if fraud { &self.fraud } else { &self.legit };
        let rng = &mut self.rng;

        let date = self.date.unwrap_or_else(|| Utc::now().date_naive());
        let hour: i64 = rng.gen_range(0..24);
        let minute: i64 = rng.gen_range(0..60);
        let second: i64 = rng.gen_range(0..60);
        let naive = date.and_time(NaiveTime::default())
            + Duration::seconds(hour * 3600 + minute * 60 + second);
        let trans_ts = Utc.from_utc_datetime(&naive);

        // amount
        let amount_usd = round_to(regime.amount.sample(rng), 2);

        // location
        let dist_to_home_km = round_to(regime.dist_km.sample(rng), 1);

        // categorical
        let merchant_category = pick(rng, MerchantCategory::ALL);
        let device_os = pick(rng, DeviceOs::ALL);
        let device_lang = pick(rng, DeviceLang::ALL);
        let ip_country = IpCountry::ALL[regime.countries.sample(rng)];
        let ip_isp = pick(rng, IpIsp::ALL);

        // booleans
        let card_present = rng.gen::<f64>() > regime.card_present_cutoff;

        // velocity
        let cust_prev_tx = rng.gen_range(0..300);
        let time_since_prev_tx_sec = regime.secs_since_prev.sample(rng);
        let cust_hist_avg_amount = amount_usd * self.hist_avg_noise.sample(rng);

        let customer_id = match customer_id {
            Some(id) => id,
            None => rng.gen_range(CUSTOMER_ID_RANGE),
        };

        debug!(customer_id, fraud, amount_usd, ip_country = %ip_country, "Generated transaction");

        TransactionRecord {
            trans_ts,
            customer_id,
            amount_usd,
            dist_to_home_km,
            merchant_category,
            device_os,
            device_lang,
            ip_country,
            ip_isp,
            card_present,
            foreign_ip: ip_country.is_foreign(),
            risky_ip_country: ip_country.is_risky(),
            uncommon_os: device_os.is_uncommon(),
            cust_prev_tx,
            time_since_prev_tx_sec,
            very_quick_succession: time_since_prev_tx_sec < QUICK_SUCCESSION_SECS,
            cust_hist_avg_amount,
            amount_to_hist_avg_ratio: amount_usd / (cust_hist_avg_amount + 1.0),
            is_fraud: fraud,
        }
    }

    /// Generate `count` transactions, each fraudulent with probability `fraud_rate`.
    pub fn generate_mixed(&mut self, count: usize, fraud_rate: f64) -> Result<Vec<TransactionRecord>> {
        self.generate_mixed_for(None, count, fraud_rate)
    }

    /// Like [`generate_mixed`](Self::generate_mixed), optionally pinning the customer.
    pub fn generate_mixed_for(
        &mut self,
        customer_id: Option<u64>,
        count: usize,
        fraud_rate: f64,
    ) -> Result<Vec<TransactionRecord>> {
        let coin = Bernoulli::new(fraud_rate).map_err(|_| PipelineError::InvalidFraudRate(fraud_rate))?;

        Ok((0..count)
            .map(|_| {
                let fraud = coin.sample(&mut self.rng);
                self.generate(customer_id, fraud)
            })
            .collect())
    }
}

fn pick<R: Rng, T: Copy>(rng: &mut R, choices: &[T]) -> T {
    choices[rng.gen_range(0..choices.len())]
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    fn generator(seed: u64) -> TransactionGenerator {
        TransactionGenerator::from_seed(seed)
            .unwrap()
            .with_date(NaiveDate::from_ymd_opt(2025, 6, 14).unwrap())
    }

    #[test]
    fn test_regime_weights_sum_to_one() {
        for params in [LEGITIMATE, FRAUD] {
            let total: f64 = params.country_weights.iter().sum();
            assert!((total - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_bad_regime_parameters_rejected() {
        let bad_sigma = RegimeParams {
            amount_log_sigma: -1.0,
            ..LEGITIMATE
        };
        assert!(matches!(
            RegimeSampler::new(&bad_sigma),
            Err(PipelineError::InvalidArtifact(_))
        ));

        let no_countries = RegimeParams {
            country_weights: [0.0; 9],
            ..FRAUD
        };
        assert!(RegimeSampler::new(&no_countries).is_err());
        assert!(RegimeSampler::new(&FRAUD).is_ok());
    }

    #[test]
    fn test_customer_id_passthrough() {
        let mut gen = generator(1);
        let tx = gen.generate(Some(42), false);
        assert_eq!(tx.customer_id, 42);
        assert!(!tx.is_fraud);

        let tx = gen.generate(None, true);
        assert!(CUSTOMER_ID_RANGE.contains(&tx.customer_id));
        assert!(tx.is_fraud);
    }

    #[test]
    fn test_zero_customer_id_is_kept() {
        let mut gen = generator(2);
        assert_eq!(gen.generate(Some(0), false).customer_id, 0);
    }

    #[test]
    fn test_derived_fields_hold() {
        let mut gen = generator(3);
        for i in 0..2_000 {
            let tx = gen.generate(None, i % 2 == 0);
            assert!(tx.is_consistent(), "inconsistent: {:?}", tx.inconsistent_fields());
            assert_eq!(tx.foreign_ip, tx.ip_country != IpCountry::Us);
            assert_eq!(
                tx.amount_to_hist_avg_ratio,
                tx.amount_usd / (tx.cust_hist_avg_amount + 1.0)
            );
        }
    }

    #[test]
    fn test_field_domains() {
        let mut gen = generator(4);
        for _ in 0..1_000 {
            let tx = gen.generate(None, false);
            assert_eq!(tx.trans_ts.date_naive().day(), 14);
            assert!(tx.trans_ts.hour() < 24);
            assert!(tx.amount_usd > 0.0);
            assert_eq!(tx.amount_usd, round_to(tx.amount_usd, 2));
            assert!(tx.dist_to_home_km >= 0.0);
            assert_eq!(tx.dist_to_home_km, round_to(tx.dist_to_home_km, 1));
            assert!(tx.cust_prev_tx < 300);
            assert!(tx.time_since_prev_tx_sec >= 0.0);
            assert!(tx.cust_hist_avg_amount > 0.0);
        }
    }

    #[test]
    fn test_same_seed_same_stream() {
        let mut first = generator(9);
        let mut second = generator(9);
        for _ in 0..20 {
            assert_eq!(first.generate(None, true), second.generate(None, true));
        }
    }

    #[test]
    fn test_fraud_regime_shifts_distributions() {
        let mut gen = generator(5);
        let n = 10_000;

        let legit: Vec<_> = (0..n).map(|_| gen.generate(None, false)).collect();
        let fraud: Vec<_> = (0..n).map(|_| gen.generate(None, true)).collect();

        let mean = |xs: &[TransactionRecord], f: fn(&TransactionRecord) -> f64| {
            xs.iter().map(f).sum::<f64>() / xs.len() as f64
        };

        assert!(mean(&fraud, |t| t.amount_usd) > mean(&legit, |t| t.amount_usd));
        assert!(mean(&fraud, |t| t.dist_to_home_km) > mean(&legit, |t| t.dist_to_home_km));
        assert!(mean(&fraud, |t| t.time_since_prev_tx_sec) < mean(&legit, |t| t.time_since_prev_tx_sec));

        let present = |xs: &[TransactionRecord]| {
            xs.iter().filter(|t| t.card_present).count() as f64 / xs.len() as f64
        };
        assert!((present(&legit) - 0.8).abs() < 0.03);
        assert!((present(&fraud) - 0.3).abs() < 0.03);

        let us_share = legit.iter().filter(|t| t.ip_country == IpCountry::Us).count() as f64 / n as f64;
        assert!((us_share - 0.65).abs() < 0.03);

        // exp(3.1 + 0.8^2 / 2) ~= 30.6
        let legit_amount = mean(&legit, |t| t.amount_usd);
        assert!((legit_amount - 30.6).abs() < 2.0, "legit mean amount {legit_amount}");
    }

    #[test]
    fn test_generate_mixed() {
        let mut gen = generator(6);
        let txs = gen.generate_mixed(1_000, 0.25).unwrap();
        assert_eq!(txs.len(), 1_000);
        let fraud = txs.iter().filter(|t| t.is_fraud).count();
        assert!((150..350).contains(&fraud));

        assert!(gen.generate_mixed(0, 0.5).unwrap().is_empty());
        assert!(gen.generate_mixed(50, 0.0).unwrap().iter().all(|t| !t.is_fraud));
        assert!(gen
            .generate_mixed_for(Some(77), 50, 1.0)
            .unwrap()
            .iter()
            .all(|t| t.is_fraud && t.customer_id == 77));
        assert_eq!(
            gen.generate_mixed(10, 1.5).unwrap_err(),
            PipelineError::InvalidFraudRate(1.5)
        );
    }
}
