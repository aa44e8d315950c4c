//! Feature pipeline for fraud classifier inference.
//!
//! Turns raw transaction rows into the ordered feature matrix the trained
//! classifier expects. The column list below is the input contract of the
//! model: order and names must match the schema artifact exactly.

use crate::error::{PipelineError, Result};
use crate::models::schema::{CategoryMapping, FeatureSchema};
use crate::types::category::{
    Categorical, DeviceLang, DeviceOs, IpCountry, IpIsp, MerchantCategory, UnknownCategory,
};
use crate::types::transaction::{RawTransaction, TransactionRecord};
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Timelike};
use std::str::FromStr;
use tracing::debug;

/// How the classifier treats a column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Numeric,
    /// Ordinal code from the schema's category mapping
    Categorical,
}

/// One column of the feature matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureColumn {
    pub name: &'static str,
    pub kind: ColumnKind,
}

const fn numeric(name: &'static str) -> FeatureColumn {
    FeatureColumn {
        name,
        kind: ColumnKind::Numeric,
    }
}

const fn categorical(name: &'static str) -> FeatureColumn {
    FeatureColumn {
        name,
        kind: ColumnKind::Categorical,
    }
}

/// Number of model input features
pub const FEATURE_COUNT: usize = 18;

/// Model input columns, in order.
pub const FEATURE_COLUMNS: [FeatureColumn; FEATURE_COUNT] = [
    // direct
    numeric("amount_usd"),
    numeric("dist_to_home_km"),
    // signal
    numeric("card_present"),
    numeric("foreign_ip"),
    numeric("risky_ip_country"),
    numeric("uncommon_os"),
    // time
    numeric("hour_of_day"),
    numeric("day_of_week"),
    numeric("weekend"),
    // categorical
    categorical("merchant_category"),
    categorical("device_os"),
    categorical("device_lang"),
    categorical("ip_country"),
    categorical("ip_isp"),
    // velocity
    numeric("cust_prev_tx"),
    numeric("time_since_prev_tx_sec"),
    numeric("very_quick_succession"),
    numeric("amount_to_hist_avg_ratio"),
];

/// One row of model input
pub type FeatureVector = [f32; FEATURE_COUNT];

/// Feature rows with the fixed column header.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureMatrix {
    rows: Vec<FeatureVector>,
}

impl FeatureMatrix {
    pub fn columns(&self) -> &'static [FeatureColumn] {
        &FEATURE_COLUMNS
    }

    pub fn column_names(&self) -> Vec<&'static str> {
        FEATURE_COLUMNS.iter().map(|c| c.name).collect()
    }

    pub fn rows(&self) -> &[FeatureVector] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Value of column `name` in row `row`
    pub fn value(&self, row: usize, name: &str) -> Option<f32> {
        let col = FEATURE_COLUMNS.iter().position(|c| c.name == name)?;
        self.rows.get(row).map(|r| r[col])
    }

    /// Row-major copy of every value, for building a `[rows, FEATURE_COUNT]` tensor
    pub fn to_flat(&self) -> Vec<f32> {
        self.rows.iter().flat_map(|r| r.iter().copied()).collect()
    }
}

/// Derives model features from raw transactions.
///
/// Pure and stateless apart from the read-only category mapping: the same
/// rows always produce the same matrix.
#[derive(Debug, Clone, Default)]
pub struct FeaturePipeline {
    mapping: CategoryMapping,
}

impl FeaturePipeline {
    pub fn new(mapping: CategoryMapping) -> Self {
        Self { mapping }
    }

    /// Pipeline using the category codes of a schema artifact.
    pub fn from_schema(schema: &FeatureSchema) -> Self {
        Self::new(schema.categories.clone())
    }

    pub fn mapping(&self) -> &CategoryMapping {
        &self.mapping
    }

    /// Transform rows into a feature matrix, failing on the first invalid row.
    pub fn transform(&self, records: &[RawTransaction]) -> Result<FeatureMatrix> {
        let rows = records
            .iter()
            .enumerate()
            .map(|(i, raw)| self.extract(i, raw))
            .collect::<Result<Vec<_>>>()?;

        debug!(rows = rows.len(), "Feature matrix built");
        Ok(FeatureMatrix { rows })
    }

    /// Transform generated records.
    pub fn transform_records(&self, records: &[TransactionRecord]) -> Result<FeatureMatrix> {
        let raw: Vec<RawTransaction> = records.iter().map(RawTransaction::from).collect();
        self.transform(&raw)
    }

    /// Derive the feature vector of a single row; `row` is used in errors.
    pub fn extract(&self, row: usize, tx: &RawTransaction) -> Result<FeatureVector> {
        let ts = match tx.trans_ts.as_deref().map(str::trim) {
            None | Some("") => {
                return Err(PipelineError::MissingField {
                    row,
                    field: "trans_ts",
                })
            }
            Some(s) => parse_timestamp(s).ok_or_else(|| PipelineError::MalformedTimestamp {
                row,
                value: s.to_string(),
            })?,
        };

        let hour_of_day = ts.hour();
        let day_of_week = ts.weekday().num_days_from_monday();
        let weekend = day_of_week >= 5;

        Ok([
            number(row, "amount_usd", tx.amount_usd)? as f32,
            number(row, "dist_to_home_km", tx.dist_to_home_km)? as f32,
            flag(row, "card_present", tx.card_present)?,
            flag(row, "foreign_ip", tx.foreign_ip)?,
            flag(row, "risky_ip_country", tx.risky_ip_country)?,
            flag(row, "uncommon_os", tx.uncommon_os)?,
            hour_of_day as f32,
            day_of_week as f32,
            if weekend { 1.0 } else { 0.0 },
            self.category::<MerchantCategory>(row, &tx.merchant_category)?,
            self.category::<DeviceOs>(row, &tx.device_os)?,
            self.category::<DeviceLang>(row, &tx.device_lang)?,
            self.category::<IpCountry>(row, &tx.ip_country)?,
            self.category::<IpIsp>(row, &tx.ip_isp)?,
            required(row, "cust_prev_tx", tx.cust_prev_tx)? as f32,
            number(row, "time_since_prev_tx_sec", tx.time_since_prev_tx_sec)? as f32,
            flag(row, "very_quick_succession", tx.very_quick_succession)?,
            number(row, "amount_to_hist_avg_ratio", tx.amount_to_hist_avg_ratio)? as f32,
        ])
    }

    fn category<C>(&self, row: usize, value: &Option<String>) -> Result<f32>
    where
        C: Categorical + FromStr<Err = UnknownCategory>,
    {
        let label = match value.as_deref().map(str::trim) {
            None | Some("") => return Err(PipelineError::MissingField { row, field: C::FIELD }),
            Some(label) => label,
        };

        let parsed = C::from_str(label).map_err(|e| PipelineError::InvalidValue {
            row,
            field: e.field,
            value: e.value,
        })?;

        self.mapping.code(parsed).map(|code| code as f32).ok_or_else(|| {
            PipelineError::InvalidArtifact(format!(
                "category mapping has no code for {} `{}`",
                C::FIELD,
                label
            ))
        })
    }
}

fn required<T>(row: usize, field: &'static str, value: Option<T>) -> Result<T> {
    value.ok_or(PipelineError::MissingField { row, field })
}

fn number(row: usize, field: &'static str, value: Option<f64>) -> Result<f64> {
    let value = required(row, field, value)?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(PipelineError::InvalidValue {
            row,
            field,
            value: value.to_string(),
        })
    }
}

fn flag(row: usize, field: &'static str, value: Option<u8>) -> Result<f32> {
    match required(row, field, value)? {
        0 => Ok(0.0),
        1 => Ok(1.0),
        other => Err(PipelineError::InvalidValue {
            row,
            field,
            value: other.to_string(),
        }),
    }
}

const OFFSET_FORMATS: [&str; 3] = [
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f%z",
];

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// Parse a transaction timestamp into wall-clock time.
///
/// Offsets are kept, not converted: hour and weekday are read in the
/// timestamp's own zone.
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_local());
    }
    if let Some(dt) = OFFSET_FORMATS
        .iter()
        .find_map(|fmt| DateTime::parse_from_str(s, fmt).ok())
    {
        return Some(dt.naive_local());
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::TransactionGenerator;

    fn raw_row() -> RawTransaction {
        RawTransaction {
            // Saturday
            trans_ts: Some("2025-03-08 14:05:30".to_string()),
            customer_id: Some(1_234_567),
            amount_usd: Some(125.4),
            dist_to_home_km: Some(48.2),
            merchant_category: Some("online_retail".to_string()),
            device_os: Some("Linux".to_string()),
            device_lang: Some("zh-CN".to_string()),
            ip_country: Some("RU".to_string()),
            ip_isp: Some("aws".to_string()),
            card_present: Some(0),
            foreign_ip: Some(1),
            risky_ip_country: Some(1),
            uncommon_os: Some(1),
            cust_prev_tx: Some(17),
            time_since_prev_tx_sec: Some(42.5),
            very_quick_succession: Some(1),
            cust_hist_avg_amount: Some(110.0),
            amount_to_hist_avg_ratio: Some(125.4 / 111.0),
        }
    }

    #[test]
    fn test_column_contract() {
        let names: Vec<&str> = FEATURE_COLUMNS.iter().map(|c| c.name).collect();
        assert_eq!(
            names,
            [
                "amount_usd",
                "dist_to_home_km",
                "card_present",
                "foreign_ip",
                "risky_ip_country",
                "uncommon_os",
                "hour_of_day",
                "day_of_week",
                "weekend",
                "merchant_category",
                "device_os",
                "device_lang",
                "ip_country",
                "ip_isp",
                "cust_prev_tx",
                "time_since_prev_tx_sec",
                "very_quick_succession",
                "amount_to_hist_avg_ratio",
            ]
        );
        let categorical: Vec<&str> = FEATURE_COLUMNS
            .iter()
            .filter(|c| c.kind == ColumnKind::Categorical)
            .map(|c| c.name)
            .collect();
        assert_eq!(
            categorical,
            ["merchant_category", "device_os", "device_lang", "ip_country", "ip_isp"]
        );
    }

    #[test]
    fn test_feature_extraction() {
        let pipeline = FeaturePipeline::default();
        let matrix = pipeline.transform(&[raw_row()]).unwrap();

        assert_eq!(matrix.len(), 1);
        assert_eq!(matrix.value(0, "amount_usd"), Some(125.4));
        assert_eq!(matrix.value(0, "card_present"), Some(0.0));
        assert_eq!(matrix.value(0, "hour_of_day"), Some(14.0));
        assert_eq!(matrix.value(0, "day_of_week"), Some(5.0));
        assert_eq!(matrix.value(0, "weekend"), Some(1.0));
        // v1 codes: byte-ordered vocabularies
        assert_eq!(matrix.value(0, "merchant_category"), Some(3.0));
        assert_eq!(matrix.value(0, "device_os"), Some(2.0));
        assert_eq!(matrix.value(0, "device_lang"), Some(3.0));
        assert_eq!(matrix.value(0, "ip_country"), Some(6.0));
        assert_eq!(matrix.value(0, "ip_isp"), Some(0.0));
        assert_eq!(matrix.value(0, "cust_prev_tx"), Some(17.0));
        assert_eq!(matrix.value(0, "very_quick_succession"), Some(1.0));
    }

    #[test]
    fn test_weekday_convention() {
        let pipeline = FeaturePipeline::default();
        let mut monday = raw_row();
        monday.trans_ts = Some("2025-03-10T00:00:00Z".to_string());
        let mut sunday = raw_row();
        sunday.trans_ts = Some("2025-03-09T23:59:59Z".to_string());

        let matrix = pipeline.transform(&[monday, sunday]).unwrap();
        assert_eq!(matrix.value(0, "day_of_week"), Some(0.0));
        assert_eq!(matrix.value(0, "weekend"), Some(0.0));
        assert_eq!(matrix.value(1, "day_of_week"), Some(6.0));
        assert_eq!(matrix.value(1, "weekend"), Some(1.0));
        assert_eq!(matrix.value(1, "hour_of_day"), Some(23.0));
    }

    #[test]
    fn test_empty_input() {
        let matrix = FeaturePipeline::default().transform(&[]).unwrap();
        assert!(matrix.is_empty());
        assert_eq!(matrix.column_names().len(), FEATURE_COUNT);
        assert!(matrix.to_flat().is_empty());
    }

    #[test]
    fn test_transform_is_idempotent() {
        let pipeline = FeaturePipeline::default();
        let rows = vec![raw_row(), raw_row()];
        assert_eq!(pipeline.transform(&rows).unwrap(), pipeline.transform(&rows).unwrap());
    }

    #[test]
    fn test_missing_timestamp() {
        let mut row = raw_row();
        row.trans_ts = None;
        let err = FeaturePipeline::default().transform(&[raw_row(), row]).unwrap_err();
        assert_eq!(
            err,
            PipelineError::MissingField {
                row: 1,
                field: "trans_ts"
            }
        );
        assert!(err.is_schema_error());
    }

    #[test]
    fn test_malformed_timestamp() {
        let mut row = raw_row();
        row.trans_ts = Some("08/03/2025 2pm".to_string());
        let err = FeaturePipeline::default().transform(&[row]).unwrap_err();
        assert!(err.is_malformed_timestamp());
    }

    #[test]
    fn test_missing_and_invalid_fields() {
        let pipeline = FeaturePipeline::default();

        let mut row = raw_row();
        row.amount_to_hist_avg_ratio = None;
        assert_eq!(
            pipeline.transform(&[row]).unwrap_err(),
            PipelineError::MissingField {
                row: 0,
                field: "amount_to_hist_avg_ratio"
            }
        );

        let mut row = raw_row();
        row.ip_country = Some("FR".to_string());
        assert_eq!(
            pipeline.transform(&[row]).unwrap_err(),
            PipelineError::InvalidValue {
                row: 0,
                field: "ip_country",
                value: "FR".to_string()
            }
        );

        let mut row = raw_row();
        row.foreign_ip = Some(2);
        assert!(pipeline.transform(&[row]).unwrap_err().is_schema_error());

        let mut row = raw_row();
        row.amount_usd = Some(f64::NAN);
        assert!(pipeline.transform(&[row]).unwrap_err().is_schema_error());
    }

    #[test]
    fn test_unused_fields_are_optional() {
        let mut row = raw_row();
        row.customer_id = None;
        row.cust_hist_avg_amount = None;
        assert!(FeaturePipeline::default().transform(&[row]).is_ok());
    }

    #[test]
    fn test_generated_records_transform() {
        let mut gen = TransactionGenerator::from_seed(11).unwrap();
        let records = gen.generate_mixed(200, 0.5).unwrap();
        let matrix = FeaturePipeline::default().transform_records(&records).unwrap();

        assert_eq!(matrix.len(), records.len());
        for (i, tx) in records.iter().enumerate() {
            assert_eq!(matrix.value(i, "amount_usd"), Some(tx.amount_usd as f32));
            assert_eq!(matrix.value(i, "foreign_ip"), Some(tx.foreign_ip as u8 as f32));
        }
    }

    #[test]
    fn test_parse_timestamp_formats() {
        for s in [
            "2025-03-08T14:05:30Z",
            "2025-03-08T14:05:30.123456+00:00",
            "2025-03-08 14:05:30+00:00",
            "2025-03-08 14:05:30",
            "2025-03-08T14:05:30.5",
            "2025-03-08 14:05",
        ] {
            let ts = parse_timestamp(s).unwrap_or_else(|| panic!("failed to parse {s}"));
            assert_eq!(ts.hour(), 14, "{s}");
        }
        assert_eq!(parse_timestamp("2025-03-08").unwrap().hour(), 0);
        assert_eq!(
            parse_timestamp("2025-03-08T23:30:00-05:00").unwrap().hour(),
            23
        );
        assert_eq!(
            parse_timestamp("2025-03-08T14:05:30+0000"),
            parse_timestamp("2025-03-08 14:05:30")
        );
        assert_eq!(parse_timestamp("2025-03-08 22:15:00+0530").unwrap().hour(), 22);
        assert_eq!(
            parse_timestamp("2025-03-09T01:00:00.250-0800").unwrap().weekday(),
            chrono::Weekday::Sun
        );
        assert!(parse_timestamp("not a date").is_none());
    }
}
