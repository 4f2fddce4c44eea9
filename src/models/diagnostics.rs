use serde::Serialize;

/// Classification of an excluded file, row, or field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IssueKind {
    /// A single field could not be coerced; the field became missing.
    ParseError,
    /// A whole file's column set did not match its expected schema.
    SchemaMismatch,
    /// Rows lacked the product identifier needed for aggregation.
    GroupingKeyMissing,
    /// A file-load worker failed or panicked; that file was skipped.
    ConcurrentLoadFailure,
    /// Rows dropped by the (order, product, period) dedup pass.
    DuplicateRow,
}

/// One entry of the diagnostics list handed to the presentation layer.
///
/// `source` is the file name (or a stage name for dataset-level counts).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub source: String,
    pub issue: IssueKind,
    pub detail: String,
}

impl Diagnostic {
    pub fn new(source: impl Into<String>, issue: IssueKind, detail: impl Into<String>) -> Self {
        Diagnostic {
            source: source.into(),
            issue,
            detail: detail.into(),
        }
    }
}
