//! Error types for record generation and feature preprocessing

use thiserror::Error;

/// Result type alias for the core pipeline
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors raised while generating records or deriving features.
///
/// None of these are retryable: every operation is a pure function of its
/// input, so the same input reproduces the same error.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    /// A field required for feature derivation is absent
    #[error("row {row}: missing required field `{field}`")]
    MissingField { row: usize, field: &'static str },

    /// A field is present but holds a value outside its domain
    #[error("row {row}: field `{field}` has invalid value `{value}`")]
    InvalidValue {
        row: usize,
        field: &'static str,
        value: String,
    },

    /// Feature columns differ from what the scorer was trained on
    #[error("feature columns do not match scorer schema: expected {expected:?}, got {actual:?}")]
    ColumnMismatch {
        expected: Vec<String>,
        actual: Vec<String>,
    },

    /// `trans_ts` cannot be parsed into a date and time
    #[error("row {row}: cannot parse timestamp `{value}`")]
    MalformedTimestamp { row: usize, value: String },

    /// A schema or category mapping artifact is unusable
    #[error("invalid artifact: {0}")]
    InvalidArtifact(String),

    /// Fraud rate outside [0, 1]
    #[error("fraud rate must be within [0, 1], got {0}")]
    InvalidFraudRate(f64),
}

impl PipelineError {
    /// True for the schema family: missing fields, bad values, column drift.
    pub fn is_schema_error(&self) -> bool {
        matches!(
            self,
            PipelineError::MissingField { .. }
                | PipelineError::InvalidValue { .. }
                | PipelineError::ColumnMismatch { .. }
        )
    }

    /// True when the timestamp was present but unparseable.
    pub fn is_malformed_timestamp(&self) -> bool {
        matches!(self, PipelineError::MalformedTimestamp { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let missing = PipelineError::MissingField {
            row: 0,
            field: "trans_ts",
        };
        assert!(missing.is_schema_error());
        assert!(!missing.is_malformed_timestamp());

        let ts = PipelineError::MalformedTimestamp {
            row: 2,
            value: "yesterday".to_string(),
        };
        assert!(ts.is_malformed_timestamp());
        assert!(!ts.is_schema_error());
        assert_eq!(ts.to_string(), "row 2: cannot parse timestamp `yesterday`");
    }
}
