//! Transaction records produced by the generator or supplied in bulk

use crate::types::category::{DeviceLang, DeviceOs, IpCountry, IpIsp, MerchantCategory};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Inclusive lower / exclusive upper bound for sampled customer ids
pub const CUSTOMER_ID_RANGE: std::ops::Range<u64> = 1_000_000..9_999_999;

/// Time gap below which two transactions count as quick succession
pub const QUICK_SUCCESSION_SECS: f64 = 300.0;

/// One simulated payment event with raw and derived fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Transaction time
    pub trans_ts: DateTime<Utc>,

    /// Customer identifier
    pub customer_id: u64,

    /// Amount in USD, 2 decimals
    pub amount_usd: f64,

    /// Distance from the customer's home, 1 decimal
    pub dist_to_home_km: f64,

    pub merchant_category: MerchantCategory,
    pub device_os: DeviceOs,
    pub device_lang: DeviceLang,
    pub ip_country: IpCountry,
    pub ip_isp: IpIsp,

    /// Physical card was present
    #[serde(with = "flag")]
    pub card_present: bool,

    /// `ip_country` is not US
    #[serde(with = "flag")]
    pub foreign_ip: bool,

    /// `ip_country` is in the risky set
    #[serde(with = "flag")]
    pub risky_ip_country: bool,

    /// `device_os` is Linux or ChromeOS
    #[serde(with = "flag")]
    pub uncommon_os: bool,

    /// Number of earlier transactions by this customer
    pub cust_prev_tx: u32,

    /// Seconds since the customer's previous transaction
    pub time_since_prev_tx_sec: f64,

    /// `time_since_prev_tx_sec` below five minutes
    #[serde(with = "flag")]
    pub very_quick_succession: bool,

    /// Customer's historical average amount
    pub cust_hist_avg_amount: f64,

    /// `amount_usd / (cust_hist_avg_amount + 1)`
    pub amount_to_hist_avg_ratio: f64,

    /// Ground-truth generation regime
    #[serde(with = "flag")]
    pub is_fraud: bool,
}

impl TransactionRecord {
    /// Names of derived fields whose defining relation does not hold.
    pub fn inconsistent_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();

        if self.foreign_ip != self.ip_country.is_foreign() {
            fields.push("foreign_ip");
        }
        if self.risky_ip_country != self.ip_country.is_risky() {
            fields.push("risky_ip_country");
        }
        if self.uncommon_os != self.device_os.is_uncommon() {
            fields.push("uncommon_os");
        }
        if self.very_quick_succession != (self.time_since_prev_tx_sec < QUICK_SUCCESSION_SECS) {
            fields.push("very_quick_succession");
        }

        let expected_ratio = self.amount_usd / (self.cust_hist_avg_amount + 1.0);
        if (self.amount_to_hist_avg_ratio - expected_ratio).abs() > 1e-9 * expected_ratio.max(1.0) {
            fields.push("amount_to_hist_avg_ratio");
        }

        fields
    }

    pub fn is_consistent(&self) -> bool {
        self.inconsistent_fields().is_empty()
    }
}

/// Pipeline input row.
///
/// Every field is optional so that externally supplied rows with absent
/// columns can be represented and rejected during feature derivation.
/// Fields the pipeline does not use (`customer_id`, `cust_hist_avg_amount`,
/// `is_fraud`) are carried but never required.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawTransaction {
    pub trans_ts: Option<String>,
    pub customer_id: Option<u64>,
    pub amount_usd: Option<f64>,
    pub dist_to_home_km: Option<f64>,
    pub merchant_category: Option<String>,
    pub device_os: Option<String>,
    pub device_lang: Option<String>,
    pub ip_country: Option<String>,
    pub ip_isp: Option<String>,
    #[serde(deserialize_with = "flag::deserialize_cell")]
    pub card_present: Option<u8>,
    #[serde(deserialize_with = "flag::deserialize_cell")]
    pub foreign_ip: Option<u8>,
    #[serde(deserialize_with = "flag::deserialize_cell")]
    pub risky_ip_country: Option<u8>,
    #[serde(deserialize_with = "flag::deserialize_cell")]
    pub uncommon_os: Option<u8>,
    pub cust_prev_tx: Option<u32>,
    pub time_since_prev_tx_sec: Option<f64>,
    #[serde(deserialize_with = "flag::deserialize_cell")]
    pub very_quick_succession: Option<u8>,
    pub cust_hist_avg_amount: Option<f64>,
    pub amount_to_hist_avg_ratio: Option<f64>,
}

impl RawTransaction {
    /// Column names, in declaration order
    pub const FIELDS: [&'static str; 18] = [
        "trans_ts",
        "customer_id",
        "amount_usd",
        "dist_to_home_km",
        "merchant_category",
        "device_os",
        "device_lang",
        "ip_country",
        "ip_isp",
        "card_present",
        "foreign_ip",
        "risky_ip_country",
        "uncommon_os",
        "cust_prev_tx",
        "time_since_prev_tx_sec",
        "very_quick_succession",
        "cust_hist_avg_amount",
        "amount_to_hist_avg_ratio",
    ];

    /// Columns read through the 0/1 flag adapter
    pub const FLAG_FIELDS: [&'static str; 5] = [
        "card_present",
        "foreign_ip",
        "risky_ip_country",
        "uncommon_os",
        "very_quick_succession",
    ];

    /// Static name of a known column.
    pub fn field_name(column: &str) -> Option<&'static str> {
        Self::FIELDS.iter().copied().find(|f| *f == column)
    }
}

impl From<&TransactionRecord> for RawTransaction {
    fn from(tx: &TransactionRecord) -> Self {
        Self {
            trans_ts: Some(tx.trans_ts.to_rfc3339()),
            customer_id: Some(tx.customer_id),
            amount_usd: Some(tx.amount_usd),
            dist_to_home_km: Some(tx.dist_to_home_km),
            merchant_category: Some(tx.merchant_category.to_string()),
            device_os: Some(tx.device_os.to_string()),
            device_lang: Some(tx.device_lang.to_string()),
            ip_country: Some(tx.ip_country.to_string()),
            ip_isp: Some(tx.ip_isp.to_string()),
            card_present: Some(tx.card_present as u8),
            foreign_ip: Some(tx.foreign_ip as u8),
            risky_ip_country: Some(tx.risky_ip_country as u8),
            uncommon_os: Some(tx.uncommon_os as u8),
            cust_prev_tx: Some(tx.cust_prev_tx),
            time_since_prev_tx_sec: Some(tx.time_since_prev_tx_sec),
            very_quick_succession: Some(tx.very_quick_succession as u8),
            cust_hist_avg_amount: Some(tx.cust_hist_avg_amount),
            amount_to_hist_avg_ratio: Some(tx.amount_to_hist_avg_ratio),
        }
    }
}

impl From<TransactionRecord> for RawTransaction {
    fn from(tx: TransactionRecord) -> Self {
        Self::from(&tx)
    }
}

/// Serializes booleans as 0/1; accepts integers, booleans or their string forms.
///
/// `deserialize_cell` reads an optional raw flag. Integers pass through
/// unchecked so that out-of-range values are reported during feature
/// derivation with their row.
pub(crate) mod flag {
    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};
    use std::fmt;

    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(*value as u8)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        deserializer.deserialize_any(FlagVisitor)
    }

    pub fn deserialize_cell<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<u8>, D::Error> {
        deserializer.deserialize_option(CellVisitor)
    }

    struct CellVisitor;

    impl<'de> Visitor<'de> for CellVisitor {
        type Value = Option<u8>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("an empty cell, 0, 1, true or false")
        }

        fn visit_none<E: de::Error>(self) -> Result<Option<u8>, E> {
            Ok(None)
        }

        fn visit_unit<E: de::Error>(self) -> Result<Option<u8>, E> {
            Ok(None)
        }

        fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Option<u8>, D::Error> {
            deserializer.deserialize_any(self)
        }

        fn visit_bool<E: de::Error>(self, v: bool) -> Result<Option<u8>, E> {
            Ok(Some(v as u8))
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Option<u8>, E> {
            u8::try_from(v)
                .map(Some)
                .map_err(|_| E::invalid_value(de::Unexpected::Unsigned(v), &self))
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Option<u8>, E> {
            u8::try_from(v)
                .map(Some)
                .map_err(|_| E::invalid_value(de::Unexpected::Signed(v), &self))
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<Option<u8>, E> {
            if v == 0.0 || v == 1.0 {
                Ok(Some(v as u8))
            } else {
                Err(E::invalid_value(de::Unexpected::Float(v), &self))
            }
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Option<u8>, E> {
            if v.trim().is_empty() {
                return Ok(None);
            }
            parse_cell(v)
                .map(Some)
                .ok_or_else(|| E::invalid_value(de::Unexpected::Str(v), &self))
        }
    }

    /// Text form of a raw flag cell.
    pub fn parse_cell(v: &str) -> Option<u8> {
        match v.trim() {
            "false" | "False" => Some(0),
            "true" | "True" => Some(1),
            other => other.parse::<u8>().ok().or_else(|| match other.parse::<f64>() {
                Ok(f) if f == 0.0 || f == 1.0 => Some(f as u8),
                _ => None,
            }),
        }
    }

    struct FlagVisitor;

    impl<'de> Visitor<'de> for FlagVisitor {
        type Value = bool;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("0, 1, true or false")
        }

        fn visit_bool<E: de::Error>(self, v: bool) -> Result<bool, E> {
            Ok(v)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<bool, E> {
            match v {
                0 => Ok(false),
                1 => Ok(true),
                _ => Err(E::invalid_value(de::Unexpected::Unsigned(v), &self)),
            }
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<bool, E> {
            match v {
                0 => Ok(false),
                1 => Ok(true),
                _ => Err(E::invalid_value(de::Unexpected::Signed(v), &self)),
            }
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<bool, E> {
            match v.trim() {
                "0" | "false" | "False" => Ok(false),
                "1" | "true" | "True" => Ok(true),
                other => Err(E::invalid_value(de::Unexpected::Str(other), &self)),
            }
        }
    }
}
