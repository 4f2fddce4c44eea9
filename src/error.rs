use thiserror::Error;

/// What a field value was expected to parse as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Number,
    Date,
}

impl std::fmt::Display for ValueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueKind::Number => write!(f, "number"),
            ValueKind::Date => write!(f, "date"),
        }
    }
}

/// A single cell could not be coerced to its expected type.
///
/// Always recovered by the caller: the field becomes the missing sentinel
/// and a diagnostic is recorded. Never aborts a row or a file.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("column '{column}': cannot read {raw:?} as {expected}")]
pub struct ParseError {
    pub column: String,
    pub raw: String,
    pub expected: ValueKind,
}

impl ParseError {
    pub fn new(column: &str, raw: impl Into<String>, expected: ValueKind) -> Self {
        ParseError {
            column: column.to_string(),
            raw: raw.into(),
            expected,
        }
    }
}

/// File-level ingestion failures. One of these excludes the offending file
/// and becomes a diagnostic entry; the other in-flight loads continue.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to open workbook {path}: {source}")]
    Workbook {
        path: String,
        #[source]
        source: calamine::Error,
    },

    #[error("{path}: workbook has no sheets")]
    EmptyWorkbook { path: String },

    #[error("{path}: no header row found (expected a '{anchor}' column)")]
    HeaderNotFound { path: String, anchor: &'static str },

    #[error("{source_name}: missing required columns: {}", missing.join(", "))]
    SchemaMismatch {
        source_name: String,
        missing: Vec<String>,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl IngestError {
    pub fn is_schema_mismatch(&self) -> bool {
        matches!(self, IngestError::SchemaMismatch { .. })
    }
}
