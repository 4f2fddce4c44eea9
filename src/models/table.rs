use std::collections::HashMap;

use crate::models::RawValue;

static MISSING: RawValue = RawValue::Missing;

/// An untyped table straight out of a workbook sheet: named columns,
/// rows of [`RawValue`] cells, original row order preserved.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    source: String,
    headers: Vec<String>,
    index: HashMap<String, usize>,
    rows: Vec<Vec<RawValue>>,
}

impl RawTable {
    pub fn new(source: impl Into<String>, headers: Vec<String>) -> Self {
        let headers: Vec<String> = headers.into_iter().map(|h| h.trim().to_string()).collect();
        let index = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.clone(), i))
            .collect();
        RawTable {
            source: source.into(),
            headers,
            index,
            rows: Vec::new(),
        }
    }

    /// Rows shorter than the header are padded with missing cells so every
    /// row has one cell per column.
    pub fn push_row(&mut self, mut row: Vec<RawValue>) {
        row.resize(self.headers.len(), RawValue::Missing);
        self.rows.push(row);
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn rows(&self) -> &[Vec<RawValue>] {
        &self.rows
    }

    /// Cell lookup by header name; absent columns read as missing.
    pub fn value(&self, row: usize, column: &str) -> &RawValue {
        match self.column_index(column) {
            Some(col) => self.rows.get(row).map(|r| &r[col]).unwrap_or(&MISSING),
            None => &MISSING,
        }
    }

    pub fn set_value(&mut self, row: usize, col: usize, value: RawValue) {
        if let Some(r) = self.rows.get_mut(row) {
            if col < r.len() {
                r[col] = value;
            }
        }
    }
}
