//! CSV input and output for bulk scoring

use crate::error::PipelineError;
use crate::feature_extractor::FeatureMatrix;
use crate::types::transaction::{flag, RawTransaction, TransactionRecord};
use anyhow::{ensure, Context, Result};
use csv::StringRecord;
use std::io::{Read, Write};
use tracing::info;

/// Name of the column appended by bulk scoring
pub const PROBABILITY_COLUMN: &str = "fraud_probability";

/// Externally supplied rows, kept verbatim next to their parsed form
#[derive(Debug, Clone)]
pub struct BulkInput {
    pub headers: StringRecord,
    pub rows: Vec<StringRecord>,
    pub records: Vec<RawTransaction>,
}

impl BulkInput {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Read a CSV with a header row into raw transactions.
///
/// Columns the pipeline does not know are kept for output but otherwise
/// ignored; absent required columns surface later as schema errors. A
/// known column holding a value of the wrong type fails with
/// [`PipelineError::InvalidValue`].
pub fn read_transactions<R: Read>(reader: R) -> Result<BulkInput> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let headers = rdr.headers().context("Failed to read CSV header")?.clone();

    let mut rows = Vec::new();
    let mut records = Vec::new();
    for (i, result) in rdr.records().enumerate() {
        let row = result.with_context(|| format!("Failed to read CSV row {}", i + 1))?;
        let record: RawTransaction = match row.deserialize(Some(&headers)) {
            Ok(record) => record,
            Err(e) => match invalid_cell(i, &headers, &row, &e) {
                Some(invalid) => return Err(invalid.into()),
                None => return Err(e).with_context(|| format!("Failed to parse CSV row {}", i + 1)),
            },
        };
        rows.push(row);
        records.push(record);
    }

    info!(rows = records.len(), columns = headers.len(), "Bulk input loaded");

    Ok(BulkInput {
        headers,
        rows,
        records,
    })
}

/// Locate the cell a deserialize error points at.
fn invalid_cell(
    row: usize,
    headers: &StringRecord,
    record: &StringRecord,
    err: &csv::Error,
) -> Option<PipelineError> {
    let csv::ErrorKind::Deserialize { err, .. } = err.kind() else {
        return None;
    };
    let index = match err.field() {
        Some(index) => usize::try_from(index).ok()?,
        // errors raised by the flag adapter carry no position
        None => headers.iter().zip(record.iter()).position(|(header, cell)| {
            RawTransaction::FLAG_FIELDS.contains(&header)
                && !cell.trim().is_empty()
                && flag::parse_cell(cell).is_none()
        })?,
    };
    let field = RawTransaction::field_name(headers.get(index)?)?;

    Some(PipelineError::InvalidValue {
        row,
        field,
        value: record.get(index).unwrap_or_default().to_string(),
    })
}

/// Write the input rows with a `fraud_probability` column appended.
pub fn write_scored<W: Write>(input: &BulkInput, probabilities: &[f64], writer: W) -> Result<()> {
    ensure!(
        input.rows.len() == probabilities.len(),
        "{} probabilities for {} rows",
        probabilities.len(),
        input.rows.len()
    );

    let mut wtr = csv::Writer::from_writer(writer);

    let mut headers = input.headers.clone();
    headers.push_field(PROBABILITY_COLUMN);
    wtr.write_record(&headers)?;

    for (row, probability) in input.rows.iter().zip(probabilities) {
        let mut out = row.clone();
        out.push_field(&probability.to_string());
        wtr.write_record(&out)?;
    }

    wtr.flush()?;
    Ok(())
}

/// Write a feature matrix with its column header.
pub fn write_features<W: Write>(matrix: &FeatureMatrix, writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(matrix.column_names())?;
    for row in matrix.rows() {
        wtr.write_record(row.iter().map(|v| v.to_string()))?;
    }
    wtr.flush()?;
    Ok(())
}

/// Write generated records as CSV.
pub fn write_records<W: Write>(records: &[TransactionRecord], writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for record in records {
        wtr.serialize(record)?;
    }
    wtr.flush()?;
    Ok(())
}
