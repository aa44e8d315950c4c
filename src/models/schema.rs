//! Feature schema artifact shipped alongside the trained classifier.
//!
//! The artifact pins the ordered feature-name list and the ordinal code of
//! every categorical label. Both must match what the classifier was trained
//! on, so neither is ever inferred from the data being scored.

use crate::error::{PipelineError, Result};
use crate::feature_extractor::FEATURE_COLUMNS;
use crate::types::category::{
    Categorical, DeviceLang, DeviceOs, IpCountry, IpIsp, MerchantCategory,
};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

/// Version tag of the built-in mapping
pub const DEFAULT_MAPPING_VERSION: &str = "v1";

/// Ordinal code tables for every categorical field.
///
/// A label's code is its position in the field's table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<String, Vec<String>>",
    into = "BTreeMap<String, Vec<String>>"
)]
pub struct CategoryMapping {
    tables: BTreeMap<String, Vec<String>>,
}

impl CategoryMapping {
    /// Built-in mapping: each vocabulary in byte order, as pandas orders
    /// inferred categories.
    pub fn v1() -> Self {
        let mut tables = BTreeMap::new();
        insert_sorted::<MerchantCategory>(&mut tables);
        insert_sorted::<DeviceOs>(&mut tables);
        insert_sorted::<DeviceLang>(&mut tables);
        insert_sorted::<IpCountry>(&mut tables);
        insert_sorted::<IpIsp>(&mut tables);
        Self { tables }
    }

    /// Build a mapping from explicit tables, checking each covers its
    /// field's vocabulary exactly once.
    pub fn from_tables(tables: BTreeMap<String, Vec<String>>) -> Result<Self> {
        check_table::<MerchantCategory>(&tables)?;
        check_table::<DeviceOs>(&tables)?;
        check_table::<DeviceLang>(&tables)?;
        check_table::<IpCountry>(&tables)?;
        check_table::<IpIsp>(&tables)?;

        let known = [
            MerchantCategory::FIELD,
            DeviceOs::FIELD,
            DeviceLang::FIELD,
            IpCountry::FIELD,
            IpIsp::FIELD,
        ];
        if let Some(extra) = tables.keys().find(|k| !known.contains(&k.as_str())) {
            return Err(PipelineError::InvalidArtifact(format!(
                "category table for unknown field `{extra}`"
            )));
        }

        Ok(Self { tables })
    }

    /// Ordinal code of `value`.
    pub fn code<C: Categorical>(&self, value: C) -> Option<u32> {
        self.tables
            .get(C::FIELD)?
            .iter()
            .position(|label| label == value.as_str())
            .map(|i| i as u32)
    }

    /// Code table of one field
    pub fn table(&self, field: &str) -> Option<&[String]> {
        self.tables.get(field).map(Vec::as_slice)
    }
}

impl Default for CategoryMapping {
    fn default() -> Self {
        Self::v1()
    }
}

impl TryFrom<BTreeMap<String, Vec<String>>> for CategoryMapping {
    type Error = PipelineError;

    fn try_from(tables: BTreeMap<String, Vec<String>>) -> Result<Self> {
        Self::from_tables(tables)
    }
}

impl From<CategoryMapping> for BTreeMap<String, Vec<String>> {
    fn from(mapping: CategoryMapping) -> Self {
        mapping.tables
    }
}

fn insert_sorted<C: Categorical>(tables: &mut BTreeMap<String, Vec<String>>) {
    let mut labels: Vec<String> = C::labels().into_iter().map(String::from).collect();
    labels.sort();
    tables.insert(C::FIELD.to_string(), labels);
}

fn check_table<C: Categorical>(tables: &BTreeMap<String, Vec<String>>) -> Result<()> {
    let table = tables.get(C::FIELD).ok_or_else(|| {
        PipelineError::InvalidArtifact(format!("no category table for `{}`", C::FIELD))
    })?;

    let mut expected = C::labels();
    expected.sort_unstable();
    let mut actual: Vec<&str> = table.iter().map(String::as_str).collect();
    actual.sort_unstable();

    if actual != expected {
        return Err(PipelineError::InvalidArtifact(format!(
            "category table for `{}` must list {:?} exactly once, got {:?}",
            C::FIELD,
            expected,
            table
        )));
    }
    Ok(())
}

/// Ordered feature list and categorical codes the classifier was trained on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSchema {
    /// Artifact version, reported in logs
    pub version: String,
    /// Feature names in model input order
    pub feature_names: Vec<String>,
    /// Categorical code tables; the built-in v1 tables when omitted
    #[serde(default)]
    pub categories: CategoryMapping,
}

impl FeatureSchema {
    /// Load the schema artifact from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read feature schema from {}", path.display()))?;
        let schema: Self = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse feature schema {}", path.display()))?;

        info!(
            version = %schema.version,
            features = schema.feature_names.len(),
            path = %path.display(),
            "Feature schema loaded"
        );

        Ok(schema)
    }

    /// Fail unless `columns` equals the schema's feature list, in order.
    pub fn verify_columns(&self, columns: &[&str]) -> Result<()> {
        let matches = self.feature_names.len() == columns.len()
            && self
                .feature_names
                .iter()
                .zip(columns)
                .all(|(expected, actual)| expected == actual);

        if matches {
            Ok(())
        } else {
            Err(PipelineError::ColumnMismatch {
                expected: self.feature_names.clone(),
                actual: columns.iter().map(|c| c.to_string()).collect(),
            })
        }
    }
}

impl Default for FeatureSchema {
    fn default() -> Self {
        Self {
            version: DEFAULT_MAPPING_VERSION.to_string(),
            feature_names: FEATURE_COLUMNS.iter().map(|c| c.name.to_string()).collect(),
            categories: CategoryMapping::v1(),
        }
    }
}
